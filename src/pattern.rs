//! Structure patterning: structure maps, tiling and ribbon assembly.
//!
//! A structure map holds unit cell ids on a rectangular grid indexed
//! `map[i][j]`, `i` along X and `j` along Y, with `0` marking an empty slot.
//! Tiling instances one part per occupied slot, places it on the grid and
//! merges everything into a single core part. Assembly then adds a loading
//! ribbon on each side of the core along the loading axis and merges again.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{AuxeticError, AuxeticResult};
use crate::geometry::{sizes_match, Axis, BoundingBox, Vec3, COORD_TOL};
use crate::kernel::{GeometryKernel, InstanceId, Merged, OriginalInstances, PartId};
use crate::unit_cell::UnitCell;

/// Number of repetitions along each axis for uniform patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRepeat {
    pub x: usize,
    pub y: usize,
    #[serde(default)]
    pub z: Option<usize>,
}

impl CellRepeat {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y, z: None }
    }
}

/// Rectangular grid of unit cell ids, `cells[i][j]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u32>>", into = "Vec<Vec<u32>>")]
pub struct StructureMap {
    cells: Vec<Vec<u32>>,
}

impl TryFrom<Vec<Vec<u32>>> for StructureMap {
    type Error = AuxeticError;

    fn try_from(columns: Vec<Vec<u32>>) -> AuxeticResult<Self> {
        StructureMap::new(columns)
    }
}

impl From<StructureMap> for Vec<Vec<u32>> {
    fn from(map: StructureMap) -> Self {
        map.cells
    }
}

impl StructureMap {
    /// Map from columns: `columns[i][j]` is the cell at X index `i`, Y index `j`
    pub fn new(columns: Vec<Vec<u32>>) -> AuxeticResult<Self> {
        let ny = columns.first().map_or(0, |c| c.len());
        if columns.is_empty() || ny == 0 {
            return Err(AuxeticError::InvalidInput("structure map is empty".to_string()));
        }
        if columns.iter().any(|c| c.len() != ny) {
            return Err(AuxeticError::InvalidInput(
                "structure map must be rectangular".to_string(),
            ));
        }
        if columns.iter().flatten().all(|&id| id == 0) {
            return Err(AuxeticError::InvalidInput(
                "structure map has no unit cells".to_string(),
            ));
        }
        Ok(Self { cells: columns })
    }

    /// Map from rows as they read on paper, first row on top
    pub fn from_rows_top_down(rows: Vec<Vec<u32>>) -> AuxeticResult<Self> {
        let nx = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != nx) {
            return Err(AuxeticError::InvalidInput(
                "structure map must be rectangular".to_string(),
            ));
        }
        let columns = (0..nx)
            .map(|i| rows.iter().rev().map(|row| row[i]).collect())
            .collect();
        Self::new(columns)
    }

    /// Grid filled with a single cell id
    pub fn uniform(id: u32, repeat: CellRepeat) -> AuxeticResult<Self> {
        Self::new(vec![vec![id; repeat.y]; repeat.x])
    }

    pub fn nx(&self) -> usize {
        self.cells.len()
    }

    pub fn ny(&self) -> usize {
        self.cells[0].len()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<u32> {
        self.cells.get(i).and_then(|c| c.get(j)).copied()
    }

    /// Distinct nonzero ids
    pub fn ids(&self) -> BTreeSet<u32> {
        self.cells.iter().flatten().copied().filter(|&id| id != 0).collect()
    }

    /// Occupied slots as `(i, j, id)` in row-major order
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize, u32)> + '_ {
        self.cells.iter().enumerate().flat_map(|(i, col)| {
            col.iter()
                .enumerate()
                .filter(|(_, id)| **id != 0)
                .map(move |(j, id)| (i, j, *id))
        })
    }

    pub fn repeat(&self) -> CellRepeat {
        CellRepeat::new(self.nx(), self.ny())
    }
}

/// How unit cells are laid out in the structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PatternSpec {
    /// A single registered cell repeated on a grid
    Uniform { num_cell_repeat: CellRepeat },
    /// Cells placed according to a map
    NonUniform { structure_map: StructureMap },
}

/// Which part of each cell is used for tiling
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PartFlavor {
    Analysis,
    Print { depth: f64 },
}

/// Assembly options derived from the structure and output parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyOptions {
    pub loading_axis: Axis,
    pub flavor: PartFlavor,
    /// Overrides the widest vertical strut as ribbon width
    pub ribbon_width: Option<f64>,
    pub delete_all: bool,
}

/// Final part of an assembly
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assembled {
    pub part: PartId,
    pub instance: InstanceId,
    pub bounding_box: BoundingBox,
}

fn cell_index(cells: &[UnitCell], id: u32) -> AuxeticResult<usize> {
    cells
        .iter()
        .position(|c| c.id == id)
        .ok_or(AuxeticError::UnitCellNotFound(id))
}

/// Every id in the map must be registered
pub fn check_map_ids(cells: &[UnitCell], map: &StructureMap) -> AuxeticResult<()> {
    for id in map.ids() {
        cell_index(cells, id)?;
    }
    Ok(())
}

/// Cells must share bound size and extrusion depth to be patterned together
pub fn check_homogeneous(cells: &[UnitCell]) -> AuxeticResult<[f64; 3]> {
    let first = cells
        .first()
        .ok_or_else(|| AuxeticError::InvalidInput("no unit cells registered".to_string()))?;
    for cell in &cells[1..] {
        if !sizes_match(cell.bound_size, first.bound_size, COORD_TOL) {
            return Err(AuxeticError::InvalidInput(format!(
                "unit cell {} has bound size {:?}, expected {:?}",
                cell.id, cell.bound_size, first.bound_size
            )));
        }
        if (cell.extrusion_depth() - first.extrusion_depth()).abs() > COORD_TOL {
            return Err(AuxeticError::InvalidInput(format!(
                "unit cell {} has extrusion depth {}, expected {}",
                cell.id,
                cell.extrusion_depth(),
                first.extrusion_depth()
            )));
        }
    }
    Ok(first.bound_size)
}

/// Instance, place and merge the cells of a map into one part
pub fn tile<K: GeometryKernel + ?Sized>(
    kernel: &mut K,
    cells: &mut [UnitCell],
    map: &StructureMap,
    bound_size: [f64; 3],
    flavor: PartFlavor,
    delete_all: bool,
) -> AuxeticResult<Merged> {
    check_map_ids(cells, map)?;

    let mut instances = Vec::new();
    let mut used = BTreeSet::new();
    for (i, j, id) in map.occupied() {
        let idx = cell_index(cells, id)?;
        let cell = &mut cells[idx];
        let part = match flavor {
            PartFlavor::Analysis => cell.ensure_part_main(kernel)?,
            PartFlavor::Print { depth } => cell.ensure_part_3dprint(kernel, depth)?,
        };
        let flat = i * map.ny() + j;
        let instance = kernel.instance_part(&format!("{}-ins-{:03}", cell.name, flat), part)?;
        let bb = kernel.instance_bounding_box(instance)?;
        let grid = Vec3::new(i as f64 * bound_size[0], j as f64 * bound_size[1], 0.0);
        kernel.translate_instance(instance, grid - bb.min.coords)?;
        instances.push(instance);
        used.insert(idx);
    }

    let originals = if delete_all {
        OriginalInstances::Delete
    } else {
        OriginalInstances::Suppress
    };
    let name = match flavor {
        PartFlavor::Analysis => "core",
        PartFlavor::Print { .. } => "core-3dprint",
    };
    let merged = kernel.merge_instances(name, &instances, originals)?;
    log::debug!("Tiled {} unit cell instances into '{}'", instances.len(), name);

    if delete_all {
        for idx in used {
            match flavor {
                PartFlavor::Analysis => cells[idx].destroy_part_main(kernel)?,
                PartFlavor::Print { .. } => cells[idx].destroy_part_3dprint(kernel)?,
            }
        }
    }
    Ok(merged)
}

/// Tile the map and add loading ribbons on both sides of the core
pub fn assemble<K: GeometryKernel + ?Sized>(
    kernel: &mut K,
    cells: &mut [UnitCell],
    map: &StructureMap,
    options: &AssemblyOptions,
) -> AuxeticResult<Assembled> {
    let axis = options.loading_axis;
    let transverse = axis.in_plane_transverse().ok_or_else(|| {
        AuxeticError::InvalidInput("ribbons can only be placed for in-plane loading".to_string())
    })?;

    if !kernel.assembly_is_empty() {
        log::warn!("Assembly is not empty; clearing it before assembling the structure");
        kernel.clear_assembly()?;
    }

    let bound_size = check_homogeneous(cells)?;
    check_map_ids(cells, map)?;

    let core = tile(kernel, cells, map, bound_size, options.flavor, options.delete_all)?;

    let ribbon_width = match options.ribbon_width {
        Some(w) if w > 0.0 => w,
        Some(w) => {
            return Err(AuxeticError::InvalidInput(format!(
                "ribbon width must be positive, got {w}"
            )))
        }
        None => cells
            .iter()
            .map(|c| c.full.vert_strut_thickness)
            .fold(0.0, f64::max),
    };
    let core_bb = kernel.instance_bounding_box(core.instance)?;
    let ribbon_length = core_bb.extent(transverse);
    let (width, height) = match axis {
        Axis::X => (ribbon_width, ribbon_length),
        _ => (ribbon_length, ribbon_width),
    };
    let (ribbon_name, depth) = match options.flavor {
        PartFlavor::Analysis => ("ribbon", None),
        PartFlavor::Print { depth } => ("ribbon-3dprint", Some(depth)),
    };
    let ribbon = kernel.create_rectangle_part(ribbon_name, width, height, depth)?;

    let r1 = kernel.instance_part(&format!("{ribbon_name}-1"), ribbon)?;
    let r1_bb = kernel.instance_bounding_box(r1)?;

    // Core flush against the first ribbon along the loading axis
    let mut core_target = r1_bb.min;
    core_target[axis.index()] = r1_bb.max[axis.index()];
    kernel.translate_instance(core.instance, core_target - core_bb.min)?;
    let core_bb = kernel.instance_bounding_box(core.instance)?;

    let r2 = kernel.instance_part(&format!("{ribbon_name}-2"), ribbon)?;
    let r2_bb = kernel.instance_bounding_box(r2)?;
    let mut r2_target = r1_bb.min;
    r2_target[axis.index()] = core_bb.max[axis.index()];
    kernel.translate_instance(r2, r2_target - r2_bb.min)?;

    let originals = if options.delete_all {
        OriginalInstances::Delete
    } else {
        OriginalInstances::Suppress
    };
    let final_name = match options.flavor {
        PartFlavor::Analysis => "main",
        PartFlavor::Print { .. } => "main-3dprint",
    };
    let merged = kernel.merge_instances(final_name, &[r1, core.instance, r2], originals)?;
    if options.delete_all {
        kernel.delete_part(core.part)?;
        kernel.delete_part(ribbon)?;
    }

    let bounding_box = kernel.instance_bounding_box(merged.instance)?;
    log::info!(
        "Assembled '{}' with size {:.4} x {:.4}",
        final_name,
        bounding_box.extent(Axis::X),
        bounding_box.extent(Axis::Y)
    );
    Ok(Assembled {
        part: merged.part,
        instance: merged.instance,
        bounding_box,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MemoryKernel;
    use crate::unit_cell::{BoundingBoxParams, UnitCellParams};

    fn box_cell(id: u32) -> UnitCell {
        UnitCell::new(UnitCellParams::BoundingBox(BoundingBoxParams {
            id,
            extrusion_depth: 1.0,
            horz_bounding_box: 10.0,
            vert_bounding_box: 8.0,
            vert_strut_thickness: 1.0,
            diag_strut_thickness: 0.5,
            diag_strut_angle: 60.0,
        }))
        .unwrap()
    }

    #[test]
    fn test_rows_top_down_layout() {
        let map = StructureMap::from_rows_top_down(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        assert_eq!(map.nx(), 3);
        assert_eq!(map.ny(), 2);
        // Bottom-left slot holds the first entry of the last row
        assert_eq!(map.get(0, 0), Some(4));
        assert_eq!(map.get(2, 1), Some(3));
    }

    #[test]
    fn test_ragged_map_rejected() {
        assert!(StructureMap::new(vec![vec![1, 2], vec![1]]).is_err());
        assert!(StructureMap::new(vec![vec![0, 0]]).is_err());
        let parsed: Result<StructureMap, _> = serde_json::from_str("[[1, 2], [3]]");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_uniform_tiling_size() {
        let mut k = MemoryKernel::default();
        let mut cells = vec![box_cell(1)];
        let bound = cells[0].bound_size;
        let map = StructureMap::uniform(1, CellRepeat::new(3, 2)).unwrap();
        let core = tile(&mut k, &mut cells, &map, bound, PartFlavor::Analysis, true).unwrap();
        let bb = k.instance_bounding_box(core.instance).unwrap();
        assert!((bb.extent(Axis::X) - 30.0).abs() < 1e-6);
        assert!((bb.extent(Axis::Y) - 16.0).abs() < 1e-6);
        assert_eq!(k.face_count(core.part).unwrap(), 1);
        assert!(cells[0].part_main().is_none());
    }

    #[test]
    fn test_unknown_id_fails_before_instancing() {
        let mut k = MemoryKernel::default();
        let mut cells = vec![box_cell(1)];
        let bound = cells[0].bound_size;
        let map = StructureMap::new(vec![vec![1, 9]]).unwrap();
        let err = tile(&mut k, &mut cells, &map, bound, PartFlavor::Analysis, true).unwrap_err();
        assert!(matches!(err, AuxeticError::UnitCellNotFound(9)));
        assert_eq!(k.instance_count(), 0);
    }

    #[test]
    fn test_assembly_adds_ribbons_along_loading() {
        let mut k = MemoryKernel::default();
        let mut cells = vec![box_cell(1), box_cell(2)];
        let map = StructureMap::new(vec![vec![1, 2], vec![2, 1]]).unwrap();
        let options = AssemblyOptions {
            loading_axis: Axis::Y,
            flavor: PartFlavor::Analysis,
            ribbon_width: None,
            delete_all: true,
        };
        let out = assemble(&mut k, &mut cells, &map, &options).unwrap();
        assert!((out.bounding_box.extent(Axis::X) - 20.0).abs() < 1e-6);
        assert!((out.bounding_box.extent(Axis::Y) - 18.0).abs() < 1e-6);
        assert_eq!(k.face_count(out.part).unwrap(), 1);
        assert_eq!(k.part_count(), 1);
    }

    #[test]
    fn test_mismatched_cells_rejected() {
        let mut k = MemoryKernel::default();
        let mut other = box_cell(2);
        other.bound_size = [12.0, 8.0, 0.0];
        let mut cells = vec![box_cell(1), other];
        let map = StructureMap::new(vec![vec![1, 2]]).unwrap();
        let options = AssemblyOptions {
            loading_axis: Axis::X,
            flavor: PartFlavor::Analysis,
            ribbon_width: None,
            delete_all: true,
        };
        assert!(matches!(
            assemble(&mut k, &mut cells, &map, &options),
            Err(AuxeticError::InvalidInput(_))
        ));
    }
}
