//! Geometric primitives shared by the sketcher, the pattern engine and the kernel

use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Pt2 = Point2<f64>;
pub type Pt3 = Point3<f64>;
pub type Vec3 = Vector3<f64>;

/// Coordinate tolerance used for bounding-box comparison and coordinate matching
pub const COORD_TOL: f64 = 1e-6;

/// Global axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Component index (0, 1, 2)
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// 1-based degree-of-freedom number used by the solver
    pub fn dof(self) -> usize {
        self.index() + 1
    }

    /// The other in-plane axis for planar structures
    pub fn in_plane_transverse(self) -> Option<Axis> {
        match self {
            Axis::X => Some(Axis::Y),
            Axis::Y => Some(Axis::X),
            Axis::Z => None,
        }
    }

    pub fn unit(self) -> Vec3 {
        let mut v = Vec3::zeros();
        v[self.index()] = 1.0;
        v
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        };
        f.write_str(s)
    }
}

/// Straight 2D segment of a sketch profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Pt2,
    pub end: Pt2,
}

impl Segment {
    pub fn new(start: Pt2, end: Pt2) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    /// Mirror across the horizontal line `y = y_axis`
    pub fn mirror_horizontal(&self, y_axis: f64) -> Self {
        let m = |p: Pt2| Pt2::new(p.x, 2.0 * y_axis - p.y);
        Self::new(m(self.start), m(self.end))
    }

    /// Mirror across the vertical line `x = x_axis`
    pub fn mirror_vertical(&self, x_axis: f64) -> Self {
        let m = |p: Pt2| Pt2::new(2.0 * x_axis - p.x, p.y);
        Self::new(m(self.start), m(self.end))
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        let d = nalgebra::Vector2::new(dx, dy);
        Self::new(self.start + d, self.end + d)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Pt3,
    pub max: Pt3,
}

impl BoundingBox {
    pub fn new(min: Pt3, max: Pt3) -> Self {
        Self { min, max }
    }

    /// Box spanning `[0, size]` on every axis
    pub fn from_origin(size: [f64; 3]) -> Self {
        Self::new(Pt3::origin(), Pt3::new(size[0], size[1], size[2]))
    }

    /// Smallest box enclosing a set of planar segments, at zero depth
    pub fn from_segments(segments: &[Segment]) -> Option<Self> {
        let mut iter = segments.iter().flat_map(|s| [s.start, s.end]);
        let first = iter.next()?;
        let mut min = Pt3::new(first.x, first.y, 0.0);
        let mut max = min;
        for p in iter {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self::new(min, max))
    }

    pub fn size(&self) -> [f64; 3] {
        let d = self.max - self.min;
        [d.x, d.y, d.z]
    }

    pub fn extent(&self, axis: Axis) -> f64 {
        self.max[axis.index()] - self.min[axis.index()]
    }

    pub fn center(&self) -> Pt3 {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn translated(&self, offset: &Vec3) -> Self {
        Self::new(self.min + offset, self.max + offset)
    }

    pub fn union(&self, other: &BoundingBox) -> Self {
        Self::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Boxes overlap, or share a boundary segment of positive length, in the
    /// XY plane. Corner contact does not count.
    pub fn shares_edge_xy(&self, other: &BoundingBox, tol: f64) -> bool {
        let overlap_x = self.max.x.min(other.max.x) - self.min.x.max(other.min.x);
        let overlap_y = self.max.y.min(other.max.y) - self.min.y.max(other.min.y);
        (overlap_x >= -tol && overlap_y > tol) || (overlap_y >= -tol && overlap_x > tol)
    }
}

/// Compare two sizes component-wise within `tol`
pub fn sizes_match(a: [f64; 3], b: [f64; 3], tol: f64) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= tol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_mirrors() {
        let s = Segment::new(Pt2::new(-1.0, 0.0), Pt2::new(-1.0, 3.0));
        let h = s.mirror_horizontal(5.0);
        assert!((h.start.y - 10.0).abs() < 1e-12);
        assert!((h.end.y - 7.0).abs() < 1e-12);
        let v = s.mirror_vertical(0.0);
        assert!((v.start.x - 1.0).abs() < 1e-12);
        assert!((s.length() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_bbox_union_and_touch() {
        let a = BoundingBox::from_origin([1.0, 1.0, 0.0]);
        let b = a.translated(&Vec3::new(1.0, 0.0, 0.0));
        let c = a.translated(&Vec3::new(3.0, 0.0, 0.0));
        assert!(a.shares_edge_xy(&b, COORD_TOL));
        assert!(!a.shares_edge_xy(&c, COORD_TOL));
        let u = a.union(&c);
        assert!((u.extent(Axis::X) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_corner_contact_is_not_an_edge() {
        let a = BoundingBox::from_origin([1.0, 1.0, 0.0]);
        let diagonal = a.translated(&Vec3::new(1.0, 1.0, 0.0));
        let above = a.translated(&Vec3::new(0.5, 1.0, 0.0));
        assert!(!a.shares_edge_xy(&diagonal, COORD_TOL));
        assert!(!diagonal.shares_edge_xy(&a, COORD_TOL));
        assert!(a.shares_edge_xy(&above, COORD_TOL));
    }

    #[test]
    fn test_axis_dofs() {
        assert_eq!(Axis::X.dof(), 1);
        assert_eq!(Axis::Y.in_plane_transverse(), Some(Axis::X));
        assert_eq!(Axis::Z.in_plane_transverse(), None);
    }
}
