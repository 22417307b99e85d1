//! Re-entrant 2D unit cell: parameters, sketch construction and parts

mod cell;
mod params;
mod sketch;

pub use cell::UnitCell;
pub use params::{BoundingBoxParams, FullParams, SimplifiedParams, UnitCellParams};
pub use sketch::{
    build_from_full, build_sketch, Constraint, LineName, MirrorOp, SketchLine, SketchPlan,
};
