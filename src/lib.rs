//! Auxetic Lattice - parametric re-entrant lattice structures in Rust
//!
//! This library builds planar auxetic lattices out of re-entrant unit
//! cells and drives them through a finite-element analysis, supporting:
//! - Three unit cell parameterizations (full, bounding box, simplified)
//! - Uniform and non-uniform patterns of cells with loading ribbons
//! - Loading sets, reference points and equation constraints
//! - Material, step, boundary condition, mesh and job set-up
//! - Reduction of displacement output to strains and Poisson's ratio
//! - Batch runs aggregated into a single table
//!
//! Geometry and analysis go through the [`kernel::GeometryKernel`] trait;
//! [`kernel::MemoryKernel`] is an in-memory implementation with an affine
//! synthetic response.
//!
//! ## Example
//! ```rust
//! use auxetic_lattice::prelude::*;
//!
//! let dir = std::env::temp_dir().join("auxetic_doc_example");
//! let mut kernel = MemoryKernel::new(dir.join("work"));
//! let loading = LoadingParams::displacement(Axis::X, 2.0);
//!
//! let mut structure = AuxeticStructure::new(&mut kernel, "doc", &loading).unwrap();
//!
//! // One 10 x 8 cell repeated three times along X and twice along Y
//! structure
//!     .add_unit_cells(&[UnitCellParams::BoundingBox(BoundingBoxParams {
//!         id: 1,
//!         extrusion_depth: 1.0,
//!         horz_bounding_box: 10.0,
//!         vert_bounding_box: 8.0,
//!         vert_strut_thickness: 1.0,
//!         diag_strut_thickness: 0.5,
//!         diag_strut_angle: 60.0,
//!     })])
//!     .unwrap();
//! structure
//!     .add_pattern_params(&PatternSpec::Uniform {
//!         num_cell_repeat: CellRepeat::new(3, 2),
//!     })
//!     .unwrap();
//! structure.assemble_structure(true).unwrap();
//!
//! // Analysis set-up
//! structure.assign_material(&MaterialParams::elastic(1.0e3, 0.3)).unwrap();
//! structure.define_step(&StepParams::default()).unwrap();
//! structure.define_bcs(&loading).unwrap();
//! structure
//!     .mesh_part(&MeshParams::new(0.5, ElementShape::Quad, "CPE4H"))
//!     .unwrap();
//! structure.create_job(&JobParams::default()).unwrap();
//! structure.submit_job().unwrap();
//! assert_eq!(structure.state(), StructureState::JobSubmitted);
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod kernel;
pub mod logging;
pub mod pattern;
pub mod results;
pub mod runner;
pub mod structure;
pub mod unit_cell;

// Re-export common types
pub mod prelude {
    pub use crate::config::{BatchConfig, RunConfig};
    pub use crate::error::{AuxeticError, AuxeticResult};
    pub use crate::geometry::{Axis, BoundingBox};
    pub use crate::kernel::{GeometryKernel, JobStatus, MemoryKernel, RecordedOutput};
    pub use crate::logging::RunLog;
    pub use crate::pattern::{CellRepeat, PatternSpec, StructureMap};
    pub use crate::results::{aggregate_batch, reduce_single, BatchTable, ResultRow, ResultsTable};
    pub use crate::runner::{preview, run_batch, run_single, BatchSummary, RunSummary};
    pub use crate::structure::params::{
        ElementLibrary, ElementShape, JobParams, LoadingKind, LoadingParams, MaterialParams,
        MeshParams, OutputParams, StepParams,
    };
    pub use crate::structure::{AuxeticStructure, BoundarySets, StructureState};
    pub use crate::unit_cell::{
        BoundingBoxParams, FullParams, SimplifiedParams, UnitCell, UnitCellParams,
    };
}
