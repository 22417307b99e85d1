//! Host CAD/FEA kernel abstraction.
//!
//! Every geometric, meshing and solver operation the pipeline needs goes
//! through [`GeometryKernel`]. A host binding implements it against a real
//! CAD/FEA environment; [`MemoryKernel`] is the in-process reference
//! implementation used for dry runs and tests.

mod memory;
mod output;

pub use memory::{MemoryKernel, SyntheticResponse};
pub use output::{Frame, FrameRecord, OutputDatabase, RecordedOutput};

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Axis, BoundingBox, Pt3, Vec3};
use crate::structure::params::{ElementLibrary, ElementShape, JobParams, MaterialParams, StepParams};
use crate::unit_cell::SketchPlan;

/// Errors reported by a kernel implementation
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Kernel IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output database error: {0}")]
    Output(#[from] serde_json::Error),
}

impl KernelError {
    pub fn not_found(kind: &'static str, name: impl fmt::Display) -> Self {
        KernelError::NotFound {
            kind,
            name: name.to_string(),
        }
    }
}

pub type KernelResult<T> = Result<T, KernelError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub u64);

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part#{}", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// What happens to the source instances of a boolean merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginalInstances {
    Delete,
    Suppress,
}

/// Part and instance produced by a boolean merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Merged {
    pub part: PartId,
    pub instance: InstanceId,
}

/// Vertex found by a coordinate query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexHit {
    pub id: VertexId,
    pub point: Pt3,
}

/// One term `coefficient * u(set, dof)` of a linear constraint equation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationTerm {
    pub coefficient: f64,
    pub set: String,
    pub dof: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BcKind {
    /// All six degrees of freedom fixed
    Encastre,
    Displacement { dof: usize, value: f64 },
    ConcentratedForce { dof: usize, magnitude: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCondition {
    pub name: String,
    pub step: String,
    pub region: String,
    pub kind: BcKind,
}

/// Status reported by the solver after a job ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Created,
    Submitted,
    Running,
    Completed,
    Aborted,
    Terminated,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Created => "CREATED",
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Aborted => "ABORTED",
            JobStatus::Terminated => "TERMINATED",
        };
        f.write_str(s)
    }
}

/// Files a job leaves in its working directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JobArtifact {
    Input,
    Message,
    Status,
    OutputDatabase,
}

impl JobArtifact {
    pub fn extension(self) -> &'static str {
        match self {
            JobArtifact::Input => "inp",
            JobArtifact::Message => "msg",
            JobArtifact::Status => "sta",
            JobArtifact::OutputDatabase => "odb",
        }
    }
}

/// Operations the pipeline requests from the host CAD/FEA environment
pub trait GeometryKernel {
    /// Start a fresh model database, discarding everything in the current one
    fn new_model(&mut self, name: &str) -> KernelResult<()>;

    // ---- parts ----

    /// Planar shell part from a unit cell sketch
    fn create_planar_part(&mut self, name: &str, sketch: &SketchPlan) -> KernelResult<PartId>;

    /// Solid part extruded from a unit cell sketch
    fn create_extruded_part(
        &mut self,
        name: &str,
        sketch: &SketchPlan,
        depth: f64,
    ) -> KernelResult<PartId>;

    /// Rectangle with its lower-left corner at the origin; extruded when `depth` is given
    fn create_rectangle_part(
        &mut self,
        name: &str,
        width: f64,
        height: f64,
        depth: Option<f64>,
    ) -> KernelResult<PartId>;

    fn delete_part(&mut self, part: PartId) -> KernelResult<()>;

    fn part_bounding_box(&self, part: PartId) -> KernelResult<BoundingBox>;

    fn face_count(&self, part: PartId) -> KernelResult<usize>;

    /// Split the part's faces along the shortest path between two points
    fn partition_faces(&mut self, part: PartId, from: Pt3, to: Pt3) -> KernelResult<()>;

    /// Edges lying on the plane `axis = value`
    fn edges_at(&self, part: PartId, axis: Axis, value: f64, tol: f64)
        -> KernelResult<Vec<EdgeId>>;

    /// Vertices lying on the plane `axis = value`
    fn vertices_at(
        &self,
        part: PartId,
        axis: Axis,
        value: f64,
        tol: f64,
    ) -> KernelResult<Vec<VertexHit>>;

    fn create_edge_set(&mut self, part: PartId, name: &str, edges: &[EdgeId]) -> KernelResult<()>;

    fn create_vertex_set(
        &mut self,
        part: PartId,
        name: &str,
        vertices: &[VertexId],
    ) -> KernelResult<()>;

    // ---- assembly ----

    fn assembly_is_empty(&self) -> bool;

    fn clear_assembly(&mut self) -> KernelResult<()>;

    fn instance_part(&mut self, name: &str, part: PartId) -> KernelResult<InstanceId>;

    fn instance_bounding_box(&self, instance: InstanceId) -> KernelResult<BoundingBox>;

    fn translate_instance(&mut self, instance: InstanceId, offset: Vec3) -> KernelResult<()>;

    /// Boolean merge of instances into a new part and instance
    fn merge_instances(
        &mut self,
        name: &str,
        instances: &[InstanceId],
        originals: OriginalInstances,
    ) -> KernelResult<Merged>;

    /// Bounding box of every active instance
    fn assembly_bounding_box(&self) -> KernelResult<BoundingBox>;

    fn create_reference_point(&mut self, set_name: &str, at: Pt3) -> KernelResult<()>;

    fn create_equation(&mut self, name: &str, terms: &[EquationTerm]) -> KernelResult<()>;

    // ---- properties and analysis ----

    fn create_material(&mut self, name: &str, params: &MaterialParams) -> KernelResult<()>;

    /// Homogeneous shell or solid section assigned to the whole part
    fn assign_section(
        &mut self,
        part: PartId,
        material: &str,
        thickness: Option<f64>,
    ) -> KernelResult<()>;

    fn create_static_step(
        &mut self,
        name: &str,
        previous: &str,
        params: &StepParams,
        nlgeom: bool,
    ) -> KernelResult<()>;

    /// Step names in order, starting with `Initial`
    fn step_names(&self) -> Vec<String>;

    fn create_boundary_condition(&mut self, bc: &BoundaryCondition) -> KernelResult<()>;

    // ---- mesh ----

    fn seed_part(&mut self, part: PartId, size: f64) -> KernelResult<()>;

    fn set_mesh_controls(&mut self, part: PartId, shape: ElementShape) -> KernelResult<()>;

    fn set_element_types(
        &mut self,
        part: PartId,
        library: ElementLibrary,
        codes: &[String],
    ) -> KernelResult<()>;

    fn generate_mesh(&mut self, part: PartId) -> KernelResult<()>;

    /// Element count per element type of the generated mesh
    fn element_histogram(&self, part: PartId) -> KernelResult<BTreeMap<String, usize>>;

    // ---- jobs and output ----

    fn create_job(&mut self, name: &str, params: &JobParams) -> KernelResult<()>;

    fn submit_job(&mut self, name: &str) -> KernelResult<()>;

    fn wait_for_completion(&mut self, name: &str) -> KernelResult<()>;

    fn job_status(&self, name: &str) -> KernelResult<JobStatus>;

    /// Location of a job file, if the job produced it
    fn job_artifact(&self, name: &str, artifact: JobArtifact) -> Option<PathBuf>;

    fn open_output(&self, path: &Path) -> KernelResult<Box<dyn OutputDatabase>>;

    fn export_stl(&mut self, part: PartId, path: &Path) -> KernelResult<()>;

    fn export_step(&mut self, part: PartId, path: &Path) -> KernelResult<()>;

    fn save_model(&mut self, path: &Path) -> KernelResult<()>;
}
