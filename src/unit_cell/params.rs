//! Re-entrant unit cell parameterizations

use serde::{Deserialize, Serialize};

use crate::error::{AuxeticError, AuxeticResult};

/// Full parameter set; every strut dimension is given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FullParams {
    pub id: u32,
    pub extrusion_depth: f64,
    pub tail_strut_length: f64,
    pub tail_strut_thickness: f64,
    pub diag_strut_length: f64,
    pub diag_strut_thickness: f64,
    /// Angle between the diagonal strut and the vertical, in degrees
    pub diag_strut_angle: f64,
    pub vert_strut_length: f64,
    pub vert_strut_thickness: f64,
}

/// Cell described by its full outer extents.
///
/// The tail thickness is taken equal to the vertical strut thickness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxParams {
    pub id: u32,
    pub extrusion_depth: f64,
    pub horz_bounding_box: f64,
    pub vert_bounding_box: f64,
    pub vert_strut_thickness: f64,
    pub diag_strut_thickness: f64,
    pub diag_strut_angle: f64,
}

/// Cell described by the vertical strut alone.
///
/// The diagonal length is fixed at `vert_strut_length / 1.5`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedParams {
    pub id: u32,
    pub extrusion_depth: f64,
    pub vert_strut_length: f64,
    pub vert_strut_thickness: f64,
    pub diag_strut_thickness: f64,
    pub diag_strut_angle: f64,
}

/// Parameterization of a re-entrant 2D unit cell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum UnitCellParams {
    Full(FullParams),
    BoundingBox(BoundingBoxParams),
    Simplified(SimplifiedParams),
}

impl UnitCellParams {
    pub fn id(&self) -> u32 {
        match self {
            UnitCellParams::Full(p) => p.id,
            UnitCellParams::BoundingBox(p) => p.id,
            UnitCellParams::Simplified(p) => p.id,
        }
    }

    pub fn extrusion_depth(&self) -> f64 {
        match self {
            UnitCellParams::Full(p) => p.extrusion_depth,
            UnitCellParams::BoundingBox(p) => p.extrusion_depth,
            UnitCellParams::Simplified(p) => p.extrusion_depth,
        }
    }

    pub fn vert_strut_thickness(&self) -> f64 {
        match self {
            UnitCellParams::Full(p) => p.vert_strut_thickness,
            UnitCellParams::BoundingBox(p) => p.vert_strut_thickness,
            UnitCellParams::Simplified(p) => p.vert_strut_thickness,
        }
    }

    /// Human-readable variant name
    pub fn variant_name(&self) -> &'static str {
        match self {
            UnitCellParams::Full(_) => "Full Parameters",
            UnitCellParams::BoundingBox(_) => "Bounding Box",
            UnitCellParams::Simplified(_) => "Simplified",
        }
    }

    /// Non-id field names in declaration order
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            UnitCellParams::Full(_) => &[
                "extrusion_depth",
                "tail_strut_length",
                "tail_strut_thickness",
                "diag_strut_length",
                "diag_strut_thickness",
                "diag_strut_angle",
                "vert_strut_length",
                "vert_strut_thickness",
            ],
            UnitCellParams::BoundingBox(_) => &[
                "extrusion_depth",
                "horz_bounding_box",
                "vert_bounding_box",
                "vert_strut_thickness",
                "diag_strut_thickness",
                "diag_strut_angle",
            ],
            UnitCellParams::Simplified(_) => &[
                "extrusion_depth",
                "vert_strut_length",
                "vert_strut_thickness",
                "diag_strut_thickness",
                "diag_strut_angle",
            ],
        }
    }

    /// Non-id field values, aligned with [`field_names`](Self::field_names)
    pub fn field_values(&self) -> Vec<f64> {
        match *self {
            UnitCellParams::Full(p) => vec![
                p.extrusion_depth,
                p.tail_strut_length,
                p.tail_strut_thickness,
                p.diag_strut_length,
                p.diag_strut_thickness,
                p.diag_strut_angle,
                p.vert_strut_length,
                p.vert_strut_thickness,
            ],
            UnitCellParams::BoundingBox(p) => vec![
                p.extrusion_depth,
                p.horz_bounding_box,
                p.vert_bounding_box,
                p.vert_strut_thickness,
                p.diag_strut_thickness,
                p.diag_strut_angle,
            ],
            UnitCellParams::Simplified(p) => vec![
                p.extrusion_depth,
                p.vert_strut_length,
                p.vert_strut_thickness,
                p.diag_strut_thickness,
                p.diag_strut_angle,
            ],
        }
    }

    pub fn same_variant(&self, other: &UnitCellParams) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Check the invariants shared by every variant
    pub fn validate(&self) -> AuxeticResult<()> {
        if self.id() == 0 {
            return Err(AuxeticError::InvalidInput(
                "unit cell id must be a positive integer".to_string(),
            ));
        }
        let names = self.field_names();
        for (name, value) in names.iter().zip(self.field_values()) {
            if *name == "diag_strut_angle" {
                continue;
            }
            if !(value.is_finite() && value > 0.0) {
                return Err(AuxeticError::InvalidInput(format!(
                    "unit cell {}: {} must be positive, got {}",
                    self.id(),
                    name,
                    value
                )));
            }
        }
        let angle = self.diag_strut_angle();
        if !(angle > 0.0 && angle < 90.0) {
            return Err(AuxeticError::InvalidGeometry(format!(
                "unit cell {}: diag_strut_angle must be strictly between 0 and 90 degrees, got {}",
                self.id(),
                angle
            )));
        }
        Ok(())
    }

    pub fn diag_strut_angle(&self) -> f64 {
        match self {
            UnitCellParams::Full(p) => p.diag_strut_angle,
            UnitCellParams::BoundingBox(p) => p.diag_strut_angle,
            UnitCellParams::Simplified(p) => p.diag_strut_angle,
        }
    }

    /// Resolve any parameterization to the canonical full form
    pub fn to_full(&self) -> AuxeticResult<FullParams> {
        self.validate()?;
        match *self {
            UnitCellParams::Full(p) => Ok(p),
            UnitCellParams::BoundingBox(p) => bounding_box_to_full(&p),
            UnitCellParams::Simplified(p) => simplified_to_full(&p),
        }
    }
}

fn bounding_box_to_full(p: &BoundingBoxParams) -> AuxeticResult<FullParams> {
    let theta = p.diag_strut_angle.to_radians();
    let (sin, cos, tan) = (theta.sin(), theta.cos(), theta.tan());

    let half_width = p.horz_bounding_box / 2.0;
    let half_height = p.vert_bounding_box / 2.0;
    let tail_half = p.vert_strut_thickness / 2.0;

    let diag_strut_length = (half_width - tail_half) / sin;
    if diag_strut_length <= 0.0 {
        return Err(AuxeticError::InvalidGeometry(format!(
            "unit cell {}: horizontal bounding box {} is too narrow for vertical strut thickness {}",
            p.id, p.horz_bounding_box, p.vert_strut_thickness
        )));
    }

    let diag_offset = p.diag_strut_thickness / sin;
    let tail_offset = tail_half / tan;
    let vert_half = (half_height + diag_strut_length * cos + diag_offset + tail_offset) / 2.0;
    let tail_strut_length = vert_half - diag_offset - tail_offset;

    if tail_strut_length < diag_strut_length * cos {
        return Err(AuxeticError::InvalidGeometry(format!(
            "unit cell {}: tail strut length {:.6} is shorter than the vertical projection \
             of the diagonal strut {:.6}",
            p.id,
            tail_strut_length,
            diag_strut_length * cos
        )));
    }

    Ok(FullParams {
        id: p.id,
        extrusion_depth: p.extrusion_depth,
        tail_strut_length,
        tail_strut_thickness: p.vert_strut_thickness,
        diag_strut_length,
        diag_strut_thickness: p.diag_strut_thickness,
        diag_strut_angle: p.diag_strut_angle,
        vert_strut_length: 2.0 * vert_half,
        vert_strut_thickness: p.vert_strut_thickness,
    })
}

fn simplified_to_full(p: &SimplifiedParams) -> AuxeticResult<FullParams> {
    let theta = p.diag_strut_angle.to_radians();
    let tail_half = p.vert_strut_thickness / 2.0;
    let tail_strut_length = p.vert_strut_length / 2.0
        - p.diag_strut_thickness / theta.sin()
        - tail_half / theta.tan();
    if tail_strut_length <= 0.0 {
        return Err(AuxeticError::InvalidGeometry(format!(
            "unit cell {}: vertical strut length {} leaves no room for the tail strut",
            p.id, p.vert_strut_length
        )));
    }
    Ok(FullParams {
        id: p.id,
        extrusion_depth: p.extrusion_depth,
        tail_strut_length,
        tail_strut_thickness: p.vert_strut_thickness,
        diag_strut_length: p.vert_strut_length / 1.5,
        diag_strut_thickness: p.diag_strut_thickness,
        diag_strut_angle: p.diag_strut_angle,
        vert_strut_length: p.vert_strut_length,
        vert_strut_thickness: p.vert_strut_thickness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn box_params(horz: f64, vert: f64, angle: f64) -> UnitCellParams {
        UnitCellParams::BoundingBox(BoundingBoxParams {
            id: 1,
            extrusion_depth: 1.0,
            horz_bounding_box: horz,
            vert_bounding_box: vert,
            vert_strut_thickness: 2.0,
            diag_strut_thickness: 1.5,
            diag_strut_angle: angle,
        })
    }

    #[test]
    fn test_bounding_box_conversion() {
        let full = box_params(20.0, 24.0, 60.0).to_full().unwrap();
        let theta = 60f64.to_radians();
        assert_relative_eq!(full.diag_strut_length, 9.0 / theta.sin(), epsilon = 1e-9);
        assert_relative_eq!(full.tail_strut_thickness, 2.0);
        assert!(full.tail_strut_length >= full.diag_strut_length * theta.cos());
    }

    #[test]
    fn test_right_angle_rejected() {
        let err = box_params(20.0, 24.0, 90.0).to_full().unwrap_err();
        assert!(matches!(err, AuxeticError::InvalidGeometry(_)));
    }

    #[test]
    fn test_short_tail_rejected() {
        // A flat, wide box pushes the diagonal projection above the tail
        let err = box_params(40.0, 4.0, 60.0).to_full().unwrap_err();
        assert!(matches!(err, AuxeticError::InvalidGeometry(_)));
    }

    #[test]
    fn test_simplified_conversion() {
        let p = UnitCellParams::Simplified(SimplifiedParams {
            id: 3,
            extrusion_depth: 1.0,
            vert_strut_length: 12.0,
            vert_strut_thickness: 1.0,
            diag_strut_thickness: 0.5,
            diag_strut_angle: 60.0,
        });
        let full = p.to_full().unwrap();
        assert_relative_eq!(full.diag_strut_length, 8.0);
        assert_eq!(full.id, 3);
    }

    #[test]
    fn test_field_names_align_with_values() {
        let p = box_params(20.0, 24.0, 60.0);
        assert_eq!(p.field_names().len(), p.field_values().len());
        assert_eq!(p.field_names()[1], "horz_bounding_box");
    }

    #[test]
    fn test_zero_id_rejected() {
        let mut p = box_params(20.0, 24.0, 60.0);
        if let UnitCellParams::BoundingBox(ref mut b) = p {
            b.id = 0;
        }
        assert!(matches!(p.validate(), Err(AuxeticError::InvalidInput(_))));
    }
}
