//! Auxetic structure orchestration.
//!
//! [`AuxeticStructure`] drives one structure through geometry, analysis
//! set-up, submission and output. Each operation is checked against the
//! transition table in [`state`]; calling one out of order fails with
//! [`AuxeticError::OutOfOrder`] and leaves the structure untouched.

pub mod params;
mod sets;
mod state;

pub use sets::BoundarySets;
pub use state::{Operation, StructureState};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AuxeticError, AuxeticResult};
use crate::geometry::{Axis, Pt3, COORD_TOL};
use crate::kernel::{
    BcKind, BoundaryCondition, EquationTerm, GeometryKernel, JobArtifact, JobStatus, PartId,
    VertexHit,
};
use crate::pattern::{
    self, Assembled, AssemblyOptions, CellRepeat, PartFlavor, PatternSpec, StructureMap,
};
use crate::results::{self, ResultsTable};
use crate::unit_cell::{UnitCell, UnitCellParams};

use params::{
    JobParams, LoadingKind, LoadingParams, MaterialParams, MeshParams, OutputParams, StepParams,
};

const MATERIAL_NAME: &str = "Material-1";
const STEP_NAME: &str = "Step-1";
const INITIAL_STEP: &str = "Initial";
const SECTION_THICKNESS: f64 = 1.0;

/// Geometric family of the structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StructureType {
    /// Planar lattice meshed with 2D elements
    PlanarShell,
}

/// Layout chosen by `add_pattern_params`
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub spec: PatternSpec,
    pub map: StructureMap,
    pub num_cell_repeat: CellRepeat,
}

/// One re-entrant lattice structure bound to a kernel for its whole lifetime
pub struct AuxeticStructure<'k, K: GeometryKernel + ?Sized> {
    kernel: &'k mut K,
    name: String,
    structure_type: StructureType,
    loading_axis: Axis,
    transverse_axis: Axis,
    unit_cells: Vec<UnitCell>,
    pattern: Option<Pattern>,
    main: Option<Assembled>,
    print: Option<Assembled>,
    sets: BoundarySets,
    job_name: Option<String>,
    odb_path: Option<PathBuf>,
    results_folder: Option<PathBuf>,
    results: Option<ResultsTable>,
    state: StructureState,
}

impl<'k, K: GeometryKernel + ?Sized> AuxeticStructure<'k, K> {
    /// New planar structure loaded along `loading.direction`
    pub fn new(kernel: &'k mut K, name: &str, loading: &LoadingParams) -> AuxeticResult<Self> {
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(AuxeticError::InvalidInput(format!(
                "'{name}' is not a valid structure name"
            )));
        }
        let transverse_axis = loading.transverse()?;
        log::debug!("Created structure '{}' loaded along {}", name, loading.direction);
        Ok(Self {
            kernel,
            name: name.to_string(),
            structure_type: StructureType::PlanarShell,
            loading_axis: loading.direction,
            transverse_axis,
            unit_cells: Vec::new(),
            pattern: None,
            main: None,
            print: None,
            sets: BoundarySets::new(loading.direction, transverse_axis),
            job_name: None,
            odb_path: None,
            results_folder: None,
            results: None,
            state: StructureState::Created,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> StructureState {
        self.state
    }

    pub fn structure_type(&self) -> StructureType {
        self.structure_type
    }

    pub fn loading_axis(&self) -> Axis {
        self.loading_axis
    }

    pub fn transverse_axis(&self) -> Axis {
        self.transverse_axis
    }

    pub fn unit_cells(&self) -> &[UnitCell] {
        &self.unit_cells
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    pub fn main_part(&self) -> Option<&Assembled> {
        self.main.as_ref()
    }

    pub fn print_part(&self) -> Option<&Assembled> {
        self.print.as_ref()
    }

    pub fn boundary_sets(&self) -> &BoundarySets {
        &self.sets
    }

    pub fn odb_path(&self) -> Option<&Path> {
        self.odb_path.as_deref()
    }

    pub fn results_folder(&self) -> Option<&Path> {
        self.results_folder.as_deref()
    }

    pub fn results(&self) -> Option<&ResultsTable> {
        self.results.as_ref()
    }

    pub fn kernel(&self) -> &K {
        &*self.kernel
    }

    fn main_part_id(&self) -> AuxeticResult<PartId> {
        self.main.map(|m| m.part).ok_or_else(|| {
            AuxeticError::InvalidInput("structure has not been assembled".to_string())
        })
    }

    // ========================
    // Geometry
    // ========================

    /// Register unit cells; the whole batch is validated before any is added
    pub fn add_unit_cells(&mut self, params: &[UnitCellParams]) -> AuxeticResult<()> {
        let next = Operation::AddUnitCells.check(self.state)?;
        if params.is_empty() {
            return Err(AuxeticError::InvalidInput("no unit cells given".to_string()));
        }

        let mut seen: BTreeSet<u32> = self.unit_cells.iter().map(|c| c.id).collect();
        for p in params {
            if !seen.insert(p.id()) {
                return Err(AuxeticError::DuplicateId(p.id()));
            }
        }

        let depth = self
            .unit_cells
            .first()
            .map(|c| c.extrusion_depth())
            .unwrap_or_else(|| params[0].extrusion_depth());
        if let Some(p) = params
            .iter()
            .find(|p| (p.extrusion_depth() - depth).abs() > COORD_TOL)
        {
            return Err(AuxeticError::InvalidInput(format!(
                "unit cell {} has extrusion depth {}, expected {}",
                p.id(),
                p.extrusion_depth(),
                depth
            )));
        }

        let cells = params
            .iter()
            .map(|p| UnitCell::new(*p))
            .collect::<AuxeticResult<Vec<_>>>()?;
        log::info!("Added {} unit cell(s) to '{}'", cells.len(), self.name);
        self.unit_cells.extend(cells);
        self.state = next;
        Ok(())
    }

    pub fn add_pattern_params(&mut self, spec: &PatternSpec) -> AuxeticResult<()> {
        let next = Operation::AddPatternParams.check(self.state)?;
        let map = match spec {
            PatternSpec::Uniform { num_cell_repeat } => {
                if self.unit_cells.len() != 1 {
                    return Err(AuxeticError::InvalidInput(format!(
                        "uniform patterns need exactly one unit cell, {} registered",
                        self.unit_cells.len()
                    )));
                }
                if num_cell_repeat.x == 0 || num_cell_repeat.y == 0 {
                    return Err(AuxeticError::InvalidInput(
                        "cell repeat counts must be positive".to_string(),
                    ));
                }
                if num_cell_repeat.z.is_some_and(|z| z != 1) {
                    return Err(AuxeticError::InvalidInput(
                        "planar structures cannot repeat along Z".to_string(),
                    ));
                }
                StructureMap::uniform(self.unit_cells[0].id, *num_cell_repeat)?
            }
            PatternSpec::NonUniform { structure_map } => {
                pattern::check_map_ids(&self.unit_cells, structure_map)?;
                structure_map.clone()
            }
        };
        let num_cell_repeat = map.repeat();
        log::info!(
            "Pattern for '{}': {} x {} cells",
            self.name,
            num_cell_repeat.x,
            num_cell_repeat.y
        );
        self.pattern = Some(Pattern {
            spec: spec.clone(),
            map,
            num_cell_repeat,
        });
        self.state = next;
        Ok(())
    }

    /// Tile the cells, add ribbons and derive the loading sets
    pub fn assemble_structure(&mut self, delete_all: bool) -> AuxeticResult<()> {
        let next = Operation::AssembleStructure.check(self.state)?;
        let map = match &self.pattern {
            Some(p) => p.map.clone(),
            None => {
                return Err(AuxeticError::InvalidInput("no pattern defined".to_string()));
            }
        };
        let options = AssemblyOptions {
            loading_axis: self.loading_axis,
            flavor: PartFlavor::Analysis,
            ribbon_width: None,
            delete_all,
        };
        let assembled = pattern::assemble(&mut *self.kernel, &mut self.unit_cells, &map, &options)?;
        self.main = Some(assembled);
        self.prepare_for_loading(assembled.part)?;
        self.state = next;
        Ok(())
    }

    fn edge_set(&mut self, part: PartId, name: &str, axis: Axis, value: f64) -> AuxeticResult<()> {
        let edges = self.kernel.edges_at(part, axis, value, COORD_TOL)?;
        if edges.is_empty() {
            return Err(AuxeticError::InvalidGeometry(format!(
                "no edges found at {axis} = {value:.6} for set '{name}'"
            )));
        }
        self.kernel.create_edge_set(part, name, &edges)?;
        Ok(())
    }

    fn prepare_for_loading(&mut self, part: PartId) -> AuxeticResult<()> {
        let faces = self.kernel.face_count(part)?;
        if faces != 1 {
            return Err(AuxeticError::InvalidGeometry(format!(
                "merged structure has {faces} faces; unit cells must join into a single face"
            )));
        }

        let bb = self.kernel.part_bounding_box(part)?;
        let center = bb.center();
        self.kernel.partition_faces(
            part,
            Pt3::new(bb.min.x, center.y, 0.0),
            Pt3::new(bb.max.x, center.y, 0.0),
        )?;
        self.kernel.partition_faces(
            part,
            Pt3::new(center.x, bb.min.y, 0.0),
            Pt3::new(center.x, bb.max.y, 0.0),
        )?;

        let (ld, td) = (self.loading_axis, self.transverse_axis);
        let sets = self.sets.clone();
        self.edge_set(part, &sets.ld_edge_1, ld, bb.min[ld.index()])?;
        self.edge_set(part, &sets.ld_edge_2, ld, bb.max[ld.index()])?;
        self.edge_set(part, &sets.td_edge_1, td, bb.min[td.index()])?;
        self.edge_set(part, &sets.td_edge_2, td, bb.max[td.index()])?;

        let mut mids: Vec<VertexHit> =
            self.kernel.vertices_at(part, ld, center[ld.index()], COORD_TOL)?;
        if mids.is_empty() {
            return Err(AuxeticError::InvalidGeometry(format!(
                "no vertices on the {ld} midline of the structure"
            )));
        }
        mids.sort_by(|a, b| a.point[td.index()].total_cmp(&b.point[td.index()]));
        let (low, high) = (mids[0], mids[mids.len() - 1]);
        self.kernel.create_vertex_set(part, &sets.mid_vertice_1, &[low.id])?;
        self.kernel.create_vertex_set(part, &sets.mid_vertice_2, &[high.id])?;

        let mut rp1 = center;
        rp1[ld.index()] = bb.min[ld.index()];
        let mut rp2 = center;
        rp2[ld.index()] = bb.max[ld.index()];
        self.kernel.create_reference_point(&sets.rp_1, rp1)?;
        self.kernel.create_reference_point(&sets.rp_2, rp2)?;

        let tie = |edge: &str, rp: &str, axis: Axis| {
            [
                EquationTerm {
                    coefficient: 1.0,
                    set: edge.to_string(),
                    dof: axis.dof(),
                },
                EquationTerm {
                    coefficient: -1.0,
                    set: rp.to_string(),
                    dof: axis.dof(),
                },
            ]
        };
        for axis in [Axis::X, Axis::Y] {
            self.kernel.create_equation(
                &format!("Constraint-RP1-{axis}"),
                &tie(&sets.ld_edge_1, &sets.rp_1, axis),
            )?;
        }
        self.kernel.create_equation(
            &format!("Constraint-RP2-{ld}"),
            &tie(&sets.ld_edge_2, &sets.rp_2, ld),
        )?;
        log::debug!("Defined loading sets, reference points and equations for '{}'", self.name);
        Ok(())
    }

    // ========================
    // Analysis set-up
    // ========================

    pub fn assign_material(&mut self, material: &MaterialParams) -> AuxeticResult<()> {
        let next = Operation::AssignMaterial.check(self.state)?;
        material.validate()?;
        let part = self.main_part_id()?;
        self.kernel.create_material(MATERIAL_NAME, material)?;
        self.kernel.assign_section(part, MATERIAL_NAME, Some(SECTION_THICKNESS))?;
        log::info!("Defined material properties for '{}'", self.name);
        self.state = next;
        Ok(())
    }

    pub fn define_step(&mut self, step: &StepParams) -> AuxeticResult<()> {
        let next = Operation::DefineStep.check(self.state)?;
        step.validate()?;
        self.kernel.create_static_step(STEP_NAME, INITIAL_STEP, step, true)?;
        log::info!("Defined '{}' for '{}'", STEP_NAME, self.name);
        self.state = next;
        Ok(())
    }

    pub fn define_bcs(&mut self, loading: &LoadingParams) -> AuxeticResult<()> {
        let next = Operation::DefineBcs.check(self.state)?;
        if loading.direction != self.loading_axis {
            return Err(AuxeticError::InvalidInput(format!(
                "structure '{}' is loaded along {}, not {}",
                self.name, self.loading_axis, loading.direction
            )));
        }
        let steps: Vec<String> = self
            .kernel
            .step_names()
            .into_iter()
            .filter(|s| s != INITIAL_STEP)
            .collect();
        let step = match steps.as_slice() {
            [only] => only.clone(),
            _ => {
                return Err(AuxeticError::InvalidInput(format!(
                    "exactly one analysis step is required, found {}",
                    steps.len()
                )))
            }
        };

        self.kernel.create_boundary_condition(&BoundaryCondition {
            name: "Fixed-BC".to_string(),
            step: INITIAL_STEP.to_string(),
            region: self.sets.rp_1.clone(),
            kind: BcKind::Encastre,
        })?;
        let dof = loading.direction.dof();
        let (name, kind) = match loading.kind {
            LoadingKind::Displacement => (
                "UM-Disp-BC",
                BcKind::Displacement {
                    dof,
                    value: loading.magnitude,
                },
            ),
            LoadingKind::Force => (
                "UM-Force-BC",
                BcKind::ConcentratedForce {
                    dof,
                    magnitude: loading.magnitude,
                },
            ),
        };
        self.kernel.create_boundary_condition(&BoundaryCondition {
            name: name.to_string(),
            step,
            region: self.sets.rp_2.clone(),
            kind,
        })?;
        log::info!("Defined boundary conditions for '{}'", self.name);
        self.state = next;
        Ok(())
    }

    pub fn mesh_part(&mut self, mesh: &MeshParams) -> AuxeticResult<()> {
        let next = Operation::MeshPart.check(self.state)?;
        mesh.validate()?;
        match self.structure_type {
            StructureType::PlanarShell if !mesh.elem_shape.is_planar() => {
                return Err(AuxeticError::InvalidInput(format!(
                    "{} elements cannot mesh a planar shell structure",
                    mesh.elem_shape
                )));
            }
            _ => {}
        }
        let part = self.main_part_id()?;
        self.kernel.seed_part(part, mesh.seed_size)?;
        self.kernel.set_mesh_controls(part, mesh.elem_shape)?;
        self.kernel
            .set_element_types(part, mesh.elem_library, &mesh.elem_code)?;
        self.kernel.generate_mesh(part)?;

        let histogram = self.kernel.element_histogram(part)?;
        let total: usize = histogram.values().sum();
        log::info!("Meshed '{}' with {} elements", self.name, total);
        for (code, count) in &histogram {
            log::info!("  {}: {}", code, count);
        }
        self.state = next;
        Ok(())
    }

    pub fn create_job(&mut self, job: &JobParams) -> AuxeticResult<()> {
        let next = Operation::CreateJob.check(self.state)?;
        job.validate()?;
        self.kernel.create_job(&self.name, job)?;
        self.job_name = Some(self.name.clone());
        self.state = next;
        Ok(())
    }

    /// Submit and wait; the job must end `COMPLETED`
    pub fn submit_job(&mut self) -> AuxeticResult<()> {
        let next = Operation::SubmitJob.check(self.state)?;
        let job = self.job_name.clone().unwrap_or_else(|| self.name.clone());
        log::info!("Submitting job '{}'", job);
        self.kernel.submit_job(&job)?;
        self.kernel.wait_for_completion(&job)?;

        let status = self.kernel.job_status(&job)?;
        if status != JobStatus::Completed {
            log::error!("Job '{}' ended with status {}", job, status);
            return Err(AuxeticError::JobFailed {
                name: job,
                status: status.to_string(),
            });
        }
        let odb = self
            .kernel
            .job_artifact(&job, JobArtifact::OutputDatabase)
            .ok_or_else(|| AuxeticError::JobFailed {
                name: job.clone(),
                status: format!("{status} without an output database"),
            })?;
        log::info!("Job '{}' completed", job);
        self.odb_path = Some(odb);
        self.state = next;
        Ok(())
    }

    // ========================
    // Output
    // ========================

    pub fn output_results(&mut self, output: &OutputParams) -> AuxeticResult<()> {
        let next = Operation::OutputResults.check(self.state)?;
        if output.wants_export() && output.export_ribbon_width.is_none() {
            return Err(AuxeticError::InvalidInput(
                "export_ribbon_width is required for STL or STP export".to_string(),
            ));
        }
        let odb_path = self.odb_path.clone().ok_or_else(|| {
            AuxeticError::InvalidInput("no output database recorded".to_string())
        })?;
        let job = self.job_name.clone().unwrap_or_else(|| self.name.clone());

        let folder = output.results_folder(&self.name);
        if folder.exists() {
            return Err(AuxeticError::FolderExists(folder));
        }
        // The folder is only created once reduction has succeeded
        let table = {
            let odb = self.kernel.open_output(&odb_path)?;
            results::reduce_single(odb.as_ref(), &self.sets, &self.name)?
        };

        fs::create_dir_all(&folder)?;
        log::debug!("Created the folder for analysis results: {:?}", folder);
        table.write_to_folder(&folder)?;

        if output.save_job_files {
            for artifact in [JobArtifact::Input, JobArtifact::Message, JobArtifact::Status] {
                if let Some(src) = self.kernel.job_artifact(&job, artifact) {
                    move_file(&src, &folder.join(format!("{}.{}", job, artifact.extension())))?;
                }
            }
            log::debug!("Saved job files to {:?}", folder);
        }
        if output.save_odb {
            let dest = folder.join(format!("{}.odb", job));
            move_file(&odb_path, &dest)?;
            self.odb_path = Some(dest);
        }

        if output.wants_export() {
            self.export_3dprint(output, &folder)?;
        }

        if output.save_cae {
            self.kernel.save_model(&folder.join(format!("{}.cae", self.name)))?;
            log::debug!("Saved the model database to {:?}", folder);
        }

        log::info!("Results of '{}' written to {:?}", self.name, folder);
        self.results = Some(table);
        self.results_folder = Some(folder);
        self.state = next;
        Ok(())
    }

    /// Re-assemble from extruded cells and export; replaces the analysis assembly
    fn export_3dprint(&mut self, output: &OutputParams, folder: &Path) -> AuxeticResult<()> {
        let depth = output
            .export_extrusion_depth
            .or_else(|| self.unit_cells.first().map(|c| c.extrusion_depth()))
            .ok_or_else(|| AuxeticError::InvalidInput("no unit cells registered".to_string()))?;
        let map = match &self.pattern {
            Some(p) => p.map.clone(),
            None => return Err(AuxeticError::InvalidInput("no pattern defined".to_string())),
        };
        let options = AssemblyOptions {
            loading_axis: self.loading_axis,
            flavor: PartFlavor::Print { depth },
            ribbon_width: output.export_ribbon_width,
            delete_all: true,
        };
        let assembled = pattern::assemble(&mut *self.kernel, &mut self.unit_cells, &map, &options)?;
        self.main = None;
        self.print = Some(assembled);

        if output.export_stl {
            self.kernel
                .export_stl(assembled.part, &folder.join(format!("{}.stl", self.name)))?;
            log::debug!("Exported the part in the STL format");
        }
        if output.export_stp {
            self.kernel
                .export_step(assembled.part, &folder.join(format!("{}.stp", self.name)))?;
            log::debug!("Exported the part in the STP format");
        }
        Ok(())
    }
}

/// Rename, falling back to copy and remove across file systems
fn move_file(from: &Path, to: &Path) -> AuxeticResult<()> {
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::params::ElementShape;
    use super::*;
    use crate::kernel::MemoryKernel;
    use crate::unit_cell::BoundingBoxParams;

    fn cell(id: u32) -> UnitCellParams {
        UnitCellParams::BoundingBox(BoundingBoxParams {
            id,
            extrusion_depth: 1.0,
            horz_bounding_box: 10.0,
            vert_bounding_box: 8.0,
            vert_strut_thickness: 1.0,
            diag_strut_thickness: 0.5,
            diag_strut_angle: 60.0,
        })
    }

    fn loading() -> LoadingParams {
        LoadingParams::displacement(Axis::X, 2.0)
    }

    #[test]
    fn test_duplicate_ids_leave_cells_unchanged() {
        let mut k = MemoryKernel::default();
        let mut s = AuxeticStructure::new(&mut k, "dup", &loading()).unwrap();
        s.add_unit_cells(&[cell(1)]).unwrap();

        let err = s.add_unit_cells(&[cell(2), cell(1)]).unwrap_err();
        assert!(matches!(err, AuxeticError::DuplicateId(1)));
        assert_eq!(s.unit_cells().len(), 1);

        let err = s.add_unit_cells(&[cell(3), cell(3)]).unwrap_err();
        assert!(matches!(err, AuxeticError::DuplicateId(3)));
        assert_eq!(s.unit_cells().len(), 1);
    }

    #[test]
    fn test_operations_out_of_order() {
        let mut k = MemoryKernel::default();
        let mut s = AuxeticStructure::new(&mut k, "order", &loading()).unwrap();
        let err = s.assemble_structure(true).unwrap_err();
        assert!(matches!(err, AuxeticError::OutOfOrder { .. }));
        assert!(s.define_step(&StepParams::default()).is_err());
        assert_eq!(s.state(), StructureState::Created);
    }

    #[test]
    fn test_uniform_needs_single_cell() {
        let mut k = MemoryKernel::default();
        let mut s = AuxeticStructure::new(&mut k, "u", &loading()).unwrap();
        s.add_unit_cells(&[cell(1), cell(2)]).unwrap();
        let spec = PatternSpec::Uniform {
            num_cell_repeat: CellRepeat::new(2, 2),
        };
        assert!(matches!(
            s.add_pattern_params(&spec),
            Err(AuxeticError::InvalidInput(_))
        ));
        assert_eq!(s.state(), StructureState::UnitCellsAdded);
    }

    #[test]
    fn test_assembly_creates_loading_sets() {
        let mut k = MemoryKernel::default();
        let mut s = AuxeticStructure::new(&mut k, "sets", &loading()).unwrap();
        s.add_unit_cells(&[cell(1)]).unwrap();
        s.add_pattern_params(&PatternSpec::Uniform {
            num_cell_repeat: CellRepeat::new(3, 2),
        })
        .unwrap();
        s.assemble_structure(true).unwrap();
        assert_eq!(s.state(), StructureState::Assembled);

        let bb = s.main_part().unwrap().bounding_box;
        assert!((bb.extent(Axis::X) - 32.0).abs() < 1e-6);
        assert!((bb.extent(Axis::Y) - 16.0).abs() < 1e-6);
        drop(s);

        let rp2 = k.reference_point("RP-2").unwrap();
        assert!((rp2.x - 32.0).abs() < 1e-6);
        assert!((rp2.y - 8.0).abs() < 1e-6);
        assert_eq!(k.equation("Constraint-RP2-X").unwrap().len(), 2);
        assert!(k.equation("Constraint-RP1-Y").is_some());
    }

    #[test]
    fn test_hex_mesh_rejected_for_shells() {
        let mut k = MemoryKernel::default();
        let mut s = AuxeticStructure::new(&mut k, "mesh", &loading()).unwrap();
        s.add_unit_cells(&[cell(1)]).unwrap();
        s.add_pattern_params(&PatternSpec::Uniform {
            num_cell_repeat: CellRepeat::new(1, 1),
        })
        .unwrap();
        s.assemble_structure(true).unwrap();
        s.assign_material(&MaterialParams::elastic(1.0e3, 0.3)).unwrap();
        s.define_step(&StepParams::default()).unwrap();
        s.define_bcs(&loading()).unwrap();

        let hex = MeshParams::new(0.5, ElementShape::Hex, "C3D8R");
        assert!(matches!(s.mesh_part(&hex), Err(AuxeticError::InvalidInput(_))));
        assert_eq!(s.state(), StructureState::BcsDefined);
        s.mesh_part(&MeshParams::new(0.5, ElementShape::Quad, "CPE4H")).unwrap();
        assert_eq!(s.state(), StructureState::Meshed);
    }

    #[test]
    fn test_loading_direction_must_match() {
        let mut k = MemoryKernel::default();
        let mut s = AuxeticStructure::new(&mut k, "dir", &loading()).unwrap();
        s.add_unit_cells(&[cell(1)]).unwrap();
        s.add_pattern_params(&PatternSpec::Uniform {
            num_cell_repeat: CellRepeat::new(1, 1),
        })
        .unwrap();
        s.assemble_structure(true).unwrap();
        s.assign_material(&MaterialParams::elastic(1.0e3, 0.3)).unwrap();
        s.define_step(&StepParams::default()).unwrap();
        let wrong = LoadingParams::force(Axis::Y, 1.0);
        assert!(s.define_bcs(&wrong).is_err());
        s.define_bcs(&LoadingParams::force(Axis::X, 1.0)).unwrap();
        drop(s);

        let bcs = k.boundary_conditions();
        assert_eq!(bcs.len(), 2);
        assert_eq!((bcs[0].name.as_str(), bcs[0].step.as_str()), ("Fixed-BC", "Initial"));
        assert_eq!(bcs[0].region, "RP-1");
        assert_eq!((bcs[1].name.as_str(), bcs[1].step.as_str()), ("UM-Force-BC", "Step-1"));
        assert_eq!(
            bcs[1].kind,
            BcKind::ConcentratedForce {
                dof: 1,
                magnitude: 1.0
            }
        );
    }
}
