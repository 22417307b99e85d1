//! Unit cell: resolved geometry plus the kernel parts built from it

use serde::Serialize;

use crate::error::AuxeticResult;
use crate::kernel::{GeometryKernel, PartId};

use super::params::{FullParams, UnitCellParams};
use super::sketch::{build_sketch, SketchPlan};

/// One unit cell registered on a structure.
///
/// The planar part (analysis) and the extruded part (3D printing) are
/// created on first use and can be destroyed independently.
#[derive(Debug, Clone, Serialize)]
pub struct UnitCell {
    pub id: u32,
    pub name: String,
    pub params: UnitCellParams,
    pub full: FullParams,
    pub sketch: SketchPlan,
    pub bound_size: [f64; 3],
    part_main: Option<PartId>,
    part_3dprint: Option<PartId>,
}

impl UnitCell {
    /// Resolve parameters and solve the sketch; no kernel work is done yet
    pub fn new(params: UnitCellParams) -> AuxeticResult<Self> {
        let sketch = build_sketch(&params)?;
        let full = sketch.params;
        let [w, h] = sketch.size();
        let id = params.id();
        Ok(Self {
            id,
            name: format!("reentrant2d-{id:03}"),
            params,
            full,
            bound_size: [w, h, 0.0],
            sketch,
            part_main: None,
            part_3dprint: None,
        })
    }

    pub fn extrusion_depth(&self) -> f64 {
        self.params.extrusion_depth()
    }

    pub fn part_main(&self) -> Option<PartId> {
        self.part_main
    }

    pub fn part_3dprint(&self) -> Option<PartId> {
        self.part_3dprint
    }

    /// Planar shell part, created on first call
    pub fn ensure_part_main<K: GeometryKernel + ?Sized>(
        &mut self,
        kernel: &mut K,
    ) -> AuxeticResult<PartId> {
        if let Some(part) = self.part_main {
            return Ok(part);
        }
        let part = kernel.create_planar_part(&self.name, &self.sketch)?;
        log::debug!("Created planar part for unit cell {}", self.name);
        self.part_main = Some(part);
        Ok(part)
    }

    /// Extruded solid part, created on first call
    pub fn ensure_part_3dprint<K: GeometryKernel + ?Sized>(
        &mut self,
        kernel: &mut K,
        depth: f64,
    ) -> AuxeticResult<PartId> {
        if let Some(part) = self.part_3dprint {
            return Ok(part);
        }
        let part =
            kernel.create_extruded_part(&format!("{}-3dprint", self.name), &self.sketch, depth)?;
        log::debug!("Created 3D-print part for unit cell {} (depth {})", self.name, depth);
        self.part_3dprint = Some(part);
        Ok(part)
    }

    pub fn destroy_part_main<K: GeometryKernel + ?Sized>(
        &mut self,
        kernel: &mut K,
    ) -> AuxeticResult<()> {
        if let Some(part) = self.part_main.take() {
            kernel.delete_part(part)?;
        }
        Ok(())
    }

    pub fn destroy_part_3dprint<K: GeometryKernel + ?Sized>(
        &mut self,
        kernel: &mut K,
    ) -> AuxeticResult<()> {
        if let Some(part) = self.part_3dprint.take() {
            kernel.delete_part(part)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MemoryKernel;
    use crate::unit_cell::params::BoundingBoxParams;

    fn cell() -> UnitCell {
        UnitCell::new(UnitCellParams::BoundingBox(BoundingBoxParams {
            id: 7,
            extrusion_depth: 2.0,
            horz_bounding_box: 10.0,
            vert_bounding_box: 8.0,
            vert_strut_thickness: 1.0,
            diag_strut_thickness: 0.5,
            diag_strut_angle: 60.0,
        }))
        .unwrap()
    }

    #[test]
    fn test_name_and_bound_size() {
        let c = cell();
        assert_eq!(c.name, "reentrant2d-007");
        assert!((c.bound_size[0] - 10.0).abs() < 1e-6);
        assert!((c.bound_size[1] - 8.0).abs() < 1e-6);
        assert!(c.part_main().is_none());
    }

    #[test]
    fn test_parts_created_once_and_destroyed() {
        let mut k = MemoryKernel::default();
        let mut c = cell();
        let a = c.ensure_part_main(&mut k).unwrap();
        let b = c.ensure_part_main(&mut k).unwrap();
        assert_eq!(a, b);
        c.ensure_part_3dprint(&mut k, 2.0).unwrap();
        assert_eq!(k.part_count(), 2);

        c.destroy_part_main(&mut k).unwrap();
        c.destroy_part_3dprint(&mut k).unwrap();
        assert_eq!(k.part_count(), 0);
        assert!(c.part_3dprint().is_none());
    }
}
