//! Closed-form construction of the re-entrant unit cell profile.
//!
//! One quarter of the cell is laid out as a chain of named lines starting at
//! the origin. The chain is then mirrored across a horizontal construction
//! line and the result across the vertical line `x = 0`, giving a profile of
//! two closed loops: the outer boundary and the re-entrant hole.
//!
//! ```text
//!            P5 ____ P4          y = y_m (horizontal mirror axis)
//!             |      |
//!          P6 |      | outer vertical
//!            \|      |
//!   inner     \      P3
//!   diagonal   \      \  outer diagonal
//!               P7     \
//!               |  P2 __\
//!               |   |      tail riser
//!               P0--P1     tail stub
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{AuxeticError, AuxeticResult};
use crate::geometry::{BoundingBox, Pt2, Segment};

use super::params::{FullParams, UnitCellParams};

/// Tolerance for the tail centerline consistency check
const CENTERLINE_TOL: f64 = 1e-6;

/// Named line of the quarter chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineName {
    TailStub,
    TailRiser,
    OuterDiagonal,
    OuterVertical,
    MirrorHorizontal,
    InnerVertical,
    InnerDiagonal,
    MirrorVertical,
}

impl LineName {
    pub fn is_construction(self) -> bool {
        matches!(self, LineName::MirrorHorizontal | LineName::MirrorVertical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SketchLine {
    pub name: LineName,
    pub segment: Segment,
}

/// Dimensional and geometric constraints recorded for the host sketcher
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    FixedOrigin,
    Horizontal(LineName),
    Vertical(LineName),
    Parallel(LineName, LineName),
    Coincident(LineName, LineName),
    Fixed(LineName),
    Length { line: LineName, value: f64 },
    HorizontalDistance { from: LineName, to: LineName, value: f64 },
    /// Perpendicular distance between two parallel lines
    Distance { from: LineName, to: LineName, value: f64 },
    Angle { from: LineName, to: LineName, degrees: f64 },
}

/// Mirror operation applied after the quarter chain is drawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MirrorOp {
    /// Mirror the regular quarter lines across `y = axis`
    Horizontal { axis: f64, lines: Vec<LineName> },
    /// Mirror everything drawn so far across `x = axis`
    Vertical { axis: f64 },
}

/// Full sketch plan for one unit cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchPlan {
    pub params: FullParams,
    pub lines: Vec<SketchLine>,
    pub constraints: Vec<Constraint>,
    pub mirrors: Vec<MirrorOp>,
    /// Resolved segments of the mirrored profile
    pub profile: Vec<Segment>,
    pub horizontal_axis: f64,
}

impl SketchPlan {
    pub fn line(&self, name: LineName) -> Option<&SketchLine> {
        self.lines.iter().find(|l| l.name == name)
    }

    /// Bounding box of the resolved profile
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_segments(&self.profile)
            .unwrap_or_else(|| BoundingBox::from_origin([0.0, 0.0, 0.0]))
    }

    /// Planar size `[width, height]` of the cell
    pub fn size(&self) -> [f64; 2] {
        let s = self.bounding_box().size();
        [s[0], s[1]]
    }

    /// Profile is closed when every vertex joins an even number of segments
    pub fn is_closed(&self, tol: f64) -> bool {
        let mut vertices: Vec<(Pt2, usize)> = Vec::new();
        for p in self.profile.iter().flat_map(|s| [s.start, s.end]) {
            match vertices.iter_mut().find(|(q, _)| (p - *q).norm() <= tol) {
                Some((_, count)) => *count += 1,
                None => vertices.push((p, 1)),
            }
        }
        vertices.iter().all(|(_, count)| count % 2 == 0)
    }
}

/// Build the sketch plan for any parameterization
pub fn build_sketch(params: &UnitCellParams) -> AuxeticResult<SketchPlan> {
    let full = params.to_full()?;
    let plan = build_from_full(&full)?;

    if let UnitCellParams::BoundingBox(_) = params {
        let half_vert = full.vert_strut_length / 2.0;
        let tail_top = tail_centerline_top(&plan);
        if (half_vert - tail_top).abs() > CENTERLINE_TOL {
            return Err(AuxeticError::InvalidGeometry(format!(
                "unit cell {}: tail centerline {:.9} does not match half vertical strut {:.9}",
                full.id, tail_top, half_vert
            )));
        }
    }
    Ok(plan)
}

fn tail_centerline_top(plan: &SketchPlan) -> f64 {
    plan.line(LineName::InnerDiagonal)
        .map(|l| l.segment.end.y)
        .unwrap_or(0.0)
}

/// Build the sketch plan from resolved full parameters
pub fn build_from_full(p: &FullParams) -> AuxeticResult<SketchPlan> {
    UnitCellParams::Full(*p).validate()?;

    let theta = p.diag_strut_angle.to_radians();
    let (sin, cos, tan) = (theta.sin(), theta.cos(), theta.tan());

    let tail_half = p.tail_strut_thickness / 2.0;
    let vert_half = p.vert_strut_length / 2.0;
    let t_v = p.vert_strut_thickness;
    let t_d = p.diag_strut_thickness;
    let l_d = p.diag_strut_length;

    let p0 = Pt2::new(0.0, 0.0);
    let p1 = Pt2::new(-tail_half, 0.0);
    let p2 = Pt2::new(-tail_half, p.tail_strut_length);
    let p3 = Pt2::new(p2.x - l_d * sin, p2.y - l_d * cos);
    let p4 = Pt2::new(p3.x, p3.y + vert_half);
    let y_m = p4.y;
    let p5 = Pt2::new(p4.x + t_v, y_m);

    let inner_vert = vert_half - t_d / sin - t_v / tan;
    if inner_vert <= 0.0 {
        return Err(AuxeticError::InvalidGeometry(format!(
            "unit cell {}: strut thicknesses leave no inner vertical strut (length {:.6})",
            p.id, inner_vert
        )));
    }
    let inner_diag = (tail_half + l_d * sin - t_v) / sin;
    if inner_diag <= 0.0 {
        return Err(AuxeticError::InvalidGeometry(format!(
            "unit cell {}: vertical strut thickness {} closes the cell",
            p.id, t_v
        )));
    }
    let p6 = Pt2::new(p5.x, y_m - inner_vert);
    let p7 = Pt2::new(p6.x + inner_diag * sin, p6.y + inner_diag * cos);

    if p7.y > y_m {
        return Err(AuxeticError::InvalidGeometry(format!(
            "unit cell {}: inner diagonal crosses the cell center ({:.6} > {:.6})",
            p.id, p7.y, y_m
        )));
    }

    let lines = vec![
        SketchLine { name: LineName::TailStub, segment: Segment::new(p0, p1) },
        SketchLine { name: LineName::TailRiser, segment: Segment::new(p1, p2) },
        SketchLine { name: LineName::OuterDiagonal, segment: Segment::new(p2, p3) },
        SketchLine { name: LineName::OuterVertical, segment: Segment::new(p3, p4) },
        SketchLine { name: LineName::MirrorHorizontal, segment: Segment::new(p4, p5) },
        SketchLine { name: LineName::InnerVertical, segment: Segment::new(p5, p6) },
        SketchLine { name: LineName::InnerDiagonal, segment: Segment::new(p6, p7) },
        SketchLine {
            name: LineName::MirrorVertical,
            segment: Segment::new(p0, Pt2::new(0.0, 2.0 * y_m)),
        },
    ];

    let constraints = vec![
        Constraint::FixedOrigin,
        Constraint::Horizontal(LineName::TailStub),
        Constraint::Length { line: LineName::TailStub, value: tail_half },
        Constraint::Vertical(LineName::TailRiser),
        Constraint::Length { line: LineName::TailRiser, value: p.tail_strut_length },
        Constraint::Length { line: LineName::OuterDiagonal, value: l_d },
        Constraint::Angle {
            from: LineName::TailRiser,
            to: LineName::OuterDiagonal,
            degrees: 180.0 - p.diag_strut_angle,
        },
        Constraint::Vertical(LineName::OuterVertical),
        Constraint::Length { line: LineName::OuterVertical, value: vert_half },
        Constraint::Horizontal(LineName::MirrorHorizontal),
        Constraint::Fixed(LineName::MirrorHorizontal),
        Constraint::Vertical(LineName::InnerVertical),
        Constraint::Parallel(LineName::OuterVertical, LineName::InnerVertical),
        Constraint::HorizontalDistance {
            from: LineName::OuterVertical,
            to: LineName::InnerVertical,
            value: t_v,
        },
        Constraint::Parallel(LineName::OuterDiagonal, LineName::InnerDiagonal),
        Constraint::Distance {
            from: LineName::OuterDiagonal,
            to: LineName::InnerDiagonal,
            value: t_d,
        },
        Constraint::Angle {
            from: LineName::InnerDiagonal,
            to: LineName::InnerVertical,
            degrees: 180.0 - p.diag_strut_angle,
        },
        Constraint::Coincident(LineName::InnerDiagonal, LineName::MirrorVertical),
        Constraint::Vertical(LineName::MirrorVertical),
        Constraint::Fixed(LineName::MirrorVertical),
    ];

    let regular: Vec<LineName> = lines
        .iter()
        .filter(|l| !l.name.is_construction())
        .map(|l| l.name)
        .collect();

    let quarter: Vec<Segment> = lines
        .iter()
        .filter(|l| !l.name.is_construction())
        .map(|l| l.segment)
        .collect();
    let mut half = quarter.clone();
    half.extend(quarter.iter().map(|s| s.mirror_horizontal(y_m)));
    let mut profile = half.clone();
    profile.extend(half.iter().map(|s| s.mirror_vertical(0.0)));

    let mirrors = vec![
        MirrorOp::Horizontal { axis: y_m, lines: regular },
        MirrorOp::Vertical { axis: 0.0 },
    ];

    log::debug!(
        "Built sketch for unit cell {}: {} profile segments, mirror axis y = {:.6}",
        p.id,
        profile.len(),
        y_m
    );

    Ok(SketchPlan {
        params: *p,
        lines,
        constraints,
        mirrors,
        profile,
        horizontal_axis: y_m,
    })
}
