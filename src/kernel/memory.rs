//! In-process reference kernel.
//!
//! Geometry is kept as planar polylines plus rectangular footprints used for
//! connectivity. Submitting a job does not solve anything: it imposes an
//! affine displacement field (uniform strain along the loading axis and a
//! configurable Poisson contraction) on every node set and writes the job
//! files to the working directory, the `.odb` being a [`RecordedOutput`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{
    BcKind, BoundaryCondition, EdgeId, EquationTerm, GeometryKernel, InstanceId, JobArtifact,
    JobStatus, KernelError, KernelResult, Merged, OriginalInstances, OutputDatabase, PartId,
    RecordedOutput, VertexHit, VertexId,
};
use crate::geometry::{Axis, BoundingBox, Pt2, Pt3, Segment, Vec3, COORD_TOL};
use crate::structure::params::{
    ElementLibrary, ElementShape, JobParams, MaterialParams, StepParams,
};
use crate::unit_cell::SketchPlan;

const VERTEX_TOL: f64 = 1e-9;

/// Displacement field imposed when a job runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticResponse {
    /// Ratio of transverse to loading strain, with the usual sign convention
    pub poisson_ratio: f64,
}

impl Default for SyntheticResponse {
    fn default() -> Self {
        Self {
            poisson_ratio: -0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct MemPart {
    name: String,
    depth: Option<f64>,
    segments: Vec<Segment>,
    pieces: Vec<BoundingBox>,
    cuts: usize,
    edge_sets: BTreeMap<String, Vec<Segment>>,
    vertex_sets: BTreeMap<String, Vec<Pt2>>,
    section: Option<(String, Option<f64>)>,
    seed: Option<f64>,
    shape: Option<ElementShape>,
    element_types: Option<(ElementLibrary, Vec<String>)>,
    mesh: Option<BTreeMap<String, usize>>,
}

impl MemPart {
    fn new(name: &str, segments: Vec<Segment>, pieces: Vec<BoundingBox>, depth: Option<f64>) -> Self {
        Self {
            name: name.to_string(),
            depth,
            segments,
            pieces,
            cuts: 0,
            edge_sets: BTreeMap::new(),
            vertex_sets: BTreeMap::new(),
            section: None,
            seed: None,
            shape: None,
            element_types: None,
            mesh: None,
        }
    }

    fn bounding_box(&self) -> BoundingBox {
        let planar = self
            .pieces
            .iter()
            .copied()
            .reduce(|a, b| a.union(&b))
            .or_else(|| BoundingBox::from_segments(&self.segments))
            .unwrap_or_else(|| BoundingBox::from_origin([0.0; 3]));
        let mut bb = planar;
        bb.min.z = 0.0;
        bb.max.z = self.depth.unwrap_or(0.0);
        bb
    }

    fn vertices(&self) -> Vec<Pt2> {
        let mut out: Vec<Pt2> = Vec::new();
        for p in self.segments.iter().flat_map(|s| [s.start, s.end]) {
            if !out.iter().any(|q| (p - *q).norm() <= VERTEX_TOL) {
                out.push(p);
            }
        }
        out
    }

    fn has_set(&self, name: &str) -> bool {
        self.edge_sets.contains_key(name) || self.vertex_sets.contains_key(name)
    }
}

#[derive(Debug, Clone, Serialize)]
struct MemInstance {
    name: String,
    part: PartId,
    offset: Vec3,
    suppressed: bool,
}

#[derive(Debug, Clone, Serialize)]
struct MemJob {
    params: JobParams,
    status: JobStatus,
    #[serde(skip)]
    final_status: Option<JobStatus>,
    #[serde(skip)]
    artifacts: BTreeMap<JobArtifact, PathBuf>,
}

/// Everything that belongs to one model database
#[derive(Debug, Clone, Default, Serialize)]
struct ModelState {
    name: String,
    next_id: u64,
    parts: BTreeMap<PartId, MemPart>,
    instances: BTreeMap<InstanceId, MemInstance>,
    reference_points: BTreeMap<String, Pt3>,
    equations: BTreeMap<String, Vec<EquationTerm>>,
    materials: BTreeMap<String, MaterialParams>,
    steps: Vec<(String, Option<StepParams>)>,
    boundary_conditions: Vec<BoundaryCondition>,
    jobs: BTreeMap<String, MemJob>,
}

impl ModelState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: vec![("Initial".to_string(), None)],
            ..Self::default()
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn part(&self, id: PartId) -> KernelResult<&MemPart> {
        self.parts
            .get(&id)
            .ok_or_else(|| KernelError::not_found("part", id))
    }

    fn part_mut(&mut self, id: PartId) -> KernelResult<&mut MemPart> {
        self.parts
            .get_mut(&id)
            .ok_or_else(|| KernelError::not_found("part", id))
    }

    fn instance(&self, id: InstanceId) -> KernelResult<&MemInstance> {
        self.instances
            .get(&id)
            .ok_or_else(|| KernelError::not_found("instance", id))
    }

    fn active_instances(&self) -> impl Iterator<Item = &MemInstance> {
        self.instances.values().filter(|i| !i.suppressed)
    }

    fn set_exists(&self, name: &str) -> bool {
        self.reference_points.contains_key(name)
            || self
                .active_instances()
                .filter_map(|i| self.parts.get(&i.part))
                .any(|p| p.has_set(name))
    }
}

/// Reference implementation of [`GeometryKernel`]
#[derive(Debug, Clone)]
pub struct MemoryKernel {
    work_dir: PathBuf,
    response: SyntheticResponse,
    job_outcome: JobStatus,
    model: ModelState,
}

impl Default for MemoryKernel {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("auxetic_work"))
    }
}

impl MemoryKernel {
    /// Kernel writing job files into `work_dir`
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            response: SyntheticResponse::default(),
            job_outcome: JobStatus::Completed,
            model: ModelState::new("Model-1"),
        }
    }

    pub fn with_response(mut self, response: SyntheticResponse) -> Self {
        self.response = response;
        self
    }

    /// Status every submitted job ends with
    pub fn with_job_outcome(mut self, status: JobStatus) -> Self {
        self.job_outcome = status;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn model_name(&self) -> &str {
        &self.model.name
    }

    pub fn part_count(&self) -> usize {
        self.model.parts.len()
    }

    pub fn instance_count(&self) -> usize {
        self.model.instances.len()
    }

    pub fn reference_point(&self, name: &str) -> Option<Pt3> {
        self.model.reference_points.get(name).copied()
    }

    pub fn equation(&self, name: &str) -> Option<&[EquationTerm]> {
        self.model.equations.get(name).map(|t| t.as_slice())
    }

    pub fn boundary_conditions(&self) -> &[BoundaryCondition] {
        &self.model.boundary_conditions
    }

    fn add_part(&mut self, part: MemPart) -> PartId {
        let id = PartId(self.model.next_id());
        log::debug!("Created part '{}' as {}", part.name, id);
        self.model.parts.insert(id, part);
        id
    }

    fn sketch_part(&mut self, name: &str, sketch: &SketchPlan, depth: Option<f64>) -> PartId {
        let pieces = vec![sketch.bounding_box()];
        self.add_part(MemPart::new(name, sketch.profile.clone(), pieces, depth))
    }

    /// Node sets of the active assembly in global coordinates
    fn collect_node_sets(&self) -> BTreeMap<String, Vec<[f64; 3]>> {
        let mut sets = BTreeMap::new();
        for inst in self.model.active_instances() {
            let Some(part) = self.model.parts.get(&inst.part) else {
                continue;
            };
            let shift = |p: Pt2| [p.x + inst.offset.x, p.y + inst.offset.y, inst.offset.z];
            for (name, segments) in &part.edge_sets {
                let mut nodes: Vec<Pt2> = Vec::new();
                for p in segments.iter().flat_map(|s| [s.start, s.end]) {
                    if !nodes.iter().any(|q| (p - *q).norm() <= VERTEX_TOL) {
                        nodes.push(p);
                    }
                }
                nodes.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
                sets.insert(name.clone(), nodes.into_iter().map(shift).collect());
            }
            for (name, points) in &part.vertex_sets {
                sets.insert(name.clone(), points.iter().copied().map(shift).collect());
            }
        }
        for (name, p) in &self.model.reference_points {
            sets.insert(name.clone(), vec![[p.x, p.y, p.z]]);
        }
        sets
    }

    fn loading(&self) -> Option<(Axis, f64, bool)> {
        self.model
            .boundary_conditions
            .iter()
            .find_map(|bc| match bc.kind {
                BcKind::Displacement { dof, value } => axis_from_dof(dof).map(|a| (a, value, false)),
                BcKind::ConcentratedForce { dof, magnitude } => {
                    axis_from_dof(dof).map(|a| (a, magnitude, true))
                }
                BcKind::Encastre => None,
            })
    }

    fn material_modulus(&self) -> f64 {
        let Some(material) = self.model.materials.values().next() else {
            return 1.0;
        };
        if let Some(e) = material.elastic {
            return e.youngs_modulus;
        }
        material
            .hyperelastic
            .as_ref()
            .and_then(|h| h.data().iter().find(|(_, strain)| *strain != 0.0).copied())
            .map(|(stress, strain)| stress / strain)
            .unwrap_or(1.0)
    }

    fn section_thickness(&self) -> f64 {
        self.model
            .active_instances()
            .filter_map(|i| self.model.parts.get(&i.part))
            .find_map(|p| p.section.as_ref().and_then(|(_, t)| *t).or(p.depth))
            .unwrap_or(1.0)
    }

    /// Run the synthetic analysis and produce the output database
    fn run_analysis(&self) -> Result<RecordedOutput, String> {
        let (axis, magnitude, is_force) = self
            .loading()
            .ok_or_else(|| "no loading boundary condition defined".to_string())?;
        let transverse = axis
            .in_plane_transverse()
            .ok_or_else(|| "out-of-plane loading".to_string())?;
        let step = self
            .model
            .steps
            .iter()
            .rev()
            .find_map(|(_, p)| *p)
            .ok_or_else(|| "no analysis step defined".to_string())?;
        let bb = self.assembly_bounding_box().map_err(|e| e.to_string())?;

        let length = bb.extent(axis);
        let width = bb.extent(transverse);
        if length <= 0.0 || width <= 0.0 {
            return Err("assembly has no extent".to_string());
        }
        let total_strain = if is_force {
            magnitude / (self.material_modulus() * width * self.section_thickness())
        } else {
            magnitude / length
        };

        let increments = ((step.time_period / step.max_inc_size).ceil() as u32)
            .clamp(1, step.max_num_inc.max(1));
        let origin = bb.min[axis.index()];
        let center = bb.center()[transverse.index()];
        let nu = self.response.poisson_ratio;

        let node_sets = self.collect_node_sets();
        let mut odb = RecordedOutput::new();
        odb.node_sets = node_sets.clone();
        for k in 0..=increments {
            let fraction = k as f64 / increments as f64;
            let strain = total_strain * fraction;
            let mut frame = BTreeMap::new();
            for (name, nodes) in &node_sets {
                let values = nodes
                    .iter()
                    .map(|c| {
                        let mut u = [0.0; 3];
                        u[axis.index()] = strain * (c[axis.index()] - origin);
                        u[transverse.index()] = -nu * strain * (c[transverse.index()] - center);
                        u
                    })
                    .collect();
                frame.insert(name.clone(), values);
            }
            odb.push_frame(step.time_period * fraction, frame);
        }
        Ok(odb)
    }

    fn job_file(&self, name: &str, artifact: JobArtifact) -> PathBuf {
        self.work_dir.join(format!("{}.{}", name, artifact.extension()))
    }

    fn input_summary(&self, job: &str) -> String {
        let mut s = String::new();
        s.push_str("*Heading\n");
        s.push_str(&format!("** Job name: {} Model name: {}\n", job, self.model.name));
        for inst in self.model.active_instances() {
            if let Some(part) = self.model.parts.get(&inst.part) {
                s.push_str(&format!("*Part, name={}\n", part.name));
                s.push_str(&format!("** {} edges\n", part.segments.len()));
                for name in part.edge_sets.keys().chain(part.vertex_sets.keys()) {
                    s.push_str(&format!("*Nset, nset={}\n", name));
                }
                s.push_str("*End Part\n");
            }
        }
        for (name, terms) in &self.model.equations {
            s.push_str(&format!("** Constraint: {}\n", name));
            s.push_str("*Equation\n");
            s.push_str(&format!("{}\n", terms.len()));
            for t in terms {
                s.push_str(&format!("{}, {}, {}\n", t.set, t.dof, t.coefficient));
            }
        }
        for (name, step) in &self.model.steps {
            if let Some(p) = step {
                s.push_str(&format!("*Step, name={}, nlgeom=YES, inc={}\n", name, p.max_num_inc));
                s.push_str(&format!(
                    "{}, {}, {}, {}\n",
                    p.init_inc_size, p.time_period, p.min_inc_size, p.max_inc_size
                ));
            }
        }
        for bc in &self.model.boundary_conditions {
            s.push_str(&format!("** Name: {} Step: {} Region: {}\n", bc.name, bc.step, bc.region));
            match bc.kind {
                BcKind::Encastre => {
                    s.push_str(&format!("*Boundary\n{}, ENCASTRE\n", bc.region));
                }
                BcKind::Displacement { dof, value } => {
                    s.push_str(&format!("*Boundary\n{}, {}, {}, {}\n", bc.region, dof, dof, value));
                }
                BcKind::ConcentratedForce { dof, magnitude } => {
                    s.push_str(&format!("*Cload\n{}, {}, {}\n", bc.region, dof, magnitude));
                }
            }
        }
        s
    }
}

fn axis_from_dof(dof: usize) -> Option<Axis> {
    match dof {
        1 => Some(Axis::X),
        2 => Some(Axis::Y),
        3 => Some(Axis::Z),
        _ => None,
    }
}

/// Point where `seg` properly crosses `cut`
fn crossing(seg: &Segment, cut: &Segment) -> Option<Pt2> {
    let r = seg.end - seg.start;
    let s = cut.end - cut.start;
    let denom = r.x * s.y - r.y * s.x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let q = cut.start - seg.start;
    let t = (q.x * s.y - q.y * s.x) / denom;
    let u = (q.x * r.y - q.y * r.x) / denom;
    let eps = 1e-9;
    if t > eps && t < 1.0 - eps && (-eps..=1.0 + eps).contains(&u) {
        Some(seg.start + r * t)
    } else {
        None
    }
}

fn connected_components(pieces: &[BoundingBox]) -> usize {
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let mut parent: Vec<usize> = (0..pieces.len()).collect();
    for i in 0..pieces.len() {
        for j in (i + 1)..pieces.len() {
            if pieces[i].shares_edge_xy(&pieces[j], COORD_TOL) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[a] = b;
                }
            }
        }
    }
    (0..pieces.len())
        .filter(|&i| find(&mut parent, i) == i)
        .count()
}

fn box_facets(bb: &BoundingBox) -> Vec<[Pt3; 3]> {
    let (a, b) = (bb.min, bb.max);
    let c = |x: f64, y: f64, z: f64| Pt3::new(x, y, z);
    let quads = [
        [c(a.x, a.y, a.z), c(a.x, b.y, a.z), c(b.x, b.y, a.z), c(b.x, a.y, a.z)],
        [c(a.x, a.y, b.z), c(b.x, a.y, b.z), c(b.x, b.y, b.z), c(a.x, b.y, b.z)],
        [c(a.x, a.y, a.z), c(b.x, a.y, a.z), c(b.x, a.y, b.z), c(a.x, a.y, b.z)],
        [c(a.x, b.y, a.z), c(a.x, b.y, b.z), c(b.x, b.y, b.z), c(b.x, b.y, a.z)],
        [c(a.x, a.y, a.z), c(a.x, a.y, b.z), c(a.x, b.y, b.z), c(a.x, b.y, a.z)],
        [c(b.x, a.y, a.z), c(b.x, b.y, a.z), c(b.x, b.y, b.z), c(b.x, a.y, b.z)],
    ];
    quads
        .iter()
        .flat_map(|q| [[q[0], q[1], q[2]], [q[0], q[2], q[3]]])
        .collect()
}

impl GeometryKernel for MemoryKernel {
    fn new_model(&mut self, name: &str) -> KernelResult<()> {
        log::debug!("Opening new model database '{}'", name);
        self.model = ModelState::new(name);
        Ok(())
    }

    fn create_planar_part(&mut self, name: &str, sketch: &SketchPlan) -> KernelResult<PartId> {
        if sketch.profile.is_empty() {
            return Err(KernelError::Rejected(format!("sketch for '{name}' is empty")));
        }
        Ok(self.sketch_part(name, sketch, None))
    }

    fn create_extruded_part(
        &mut self,
        name: &str,
        sketch: &SketchPlan,
        depth: f64,
    ) -> KernelResult<PartId> {
        if !(depth > 0.0) {
            return Err(KernelError::Rejected(format!(
                "extrusion depth for '{name}' must be positive"
            )));
        }
        Ok(self.sketch_part(name, sketch, Some(depth)))
    }

    fn create_rectangle_part(
        &mut self,
        name: &str,
        width: f64,
        height: f64,
        depth: Option<f64>,
    ) -> KernelResult<PartId> {
        if !(width > 0.0 && height > 0.0) {
            return Err(KernelError::Rejected(format!(
                "rectangle '{name}' must have positive size, got {width} x {height}"
            )));
        }
        let corners = [
            Pt2::new(0.0, 0.0),
            Pt2::new(width, 0.0),
            Pt2::new(width, height),
            Pt2::new(0.0, height),
        ];
        let segments = (0..4)
            .map(|i| Segment::new(corners[i], corners[(i + 1) % 4]))
            .collect();
        let pieces = vec![BoundingBox::from_origin([width, height, 0.0])];
        Ok(self.add_part(MemPart::new(name, segments, pieces, depth)))
    }

    fn delete_part(&mut self, part: PartId) -> KernelResult<()> {
        if self.model.instances.values().any(|i| i.part == part) {
            return Err(KernelError::Rejected(format!(
                "{part} is still instanced in the assembly"
            )));
        }
        self.model
            .parts
            .remove(&part)
            .map(|_| ())
            .ok_or_else(|| KernelError::not_found("part", part))
    }

    fn part_bounding_box(&self, part: PartId) -> KernelResult<BoundingBox> {
        Ok(self.model.part(part)?.bounding_box())
    }

    fn face_count(&self, part: PartId) -> KernelResult<usize> {
        let p = self.model.part(part)?;
        Ok(connected_components(&p.pieces) + p.cuts)
    }

    fn partition_faces(&mut self, part: PartId, from: Pt3, to: Pt3) -> KernelResult<()> {
        let cut = Segment::new(Pt2::new(from.x, from.y), Pt2::new(to.x, to.y));
        let p = self.model.part_mut(part)?;
        let mut split = Vec::with_capacity(p.segments.len());
        for seg in &p.segments {
            match crossing(seg, &cut) {
                Some(x) => {
                    split.push(Segment::new(seg.start, x));
                    split.push(Segment::new(x, seg.end));
                }
                None => split.push(*seg),
            }
        }
        log::debug!(
            "Partitioned '{}': {} edges became {}",
            p.name,
            p.segments.len(),
            split.len()
        );
        p.segments = split;
        p.cuts += 1;
        Ok(())
    }

    fn edges_at(
        &self,
        part: PartId,
        axis: Axis,
        value: f64,
        tol: f64,
    ) -> KernelResult<Vec<EdgeId>> {
        let p = self.model.part(part)?;
        let i = axis.index();
        let coord = |q: Pt2| if i == 0 { q.x } else if i == 1 { q.y } else { 0.0 };
        Ok(p.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| (coord(s.start) - value).abs() <= tol && (coord(s.end) - value).abs() <= tol)
            .map(|(k, _)| EdgeId(k as u64))
            .collect())
    }

    fn vertices_at(
        &self,
        part: PartId,
        axis: Axis,
        value: f64,
        tol: f64,
    ) -> KernelResult<Vec<VertexHit>> {
        let p = self.model.part(part)?;
        Ok(p.vertices()
            .into_iter()
            .enumerate()
            .map(|(k, v)| VertexHit {
                id: VertexId(k as u64),
                point: Pt3::new(v.x, v.y, 0.0),
            })
            .filter(|h| (h.point[axis.index()] - value).abs() <= tol)
            .collect())
    }

    fn create_edge_set(&mut self, part: PartId, name: &str, edges: &[EdgeId]) -> KernelResult<()> {
        let p = self.model.part_mut(part)?;
        let mut chosen = Vec::with_capacity(edges.len());
        for e in edges {
            let seg = p
                .segments
                .get(e.0 as usize)
                .ok_or_else(|| KernelError::not_found("edge", e.0))?;
            chosen.push(*seg);
        }
        p.edge_sets.insert(name.to_string(), chosen);
        Ok(())
    }

    fn create_vertex_set(
        &mut self,
        part: PartId,
        name: &str,
        vertices: &[VertexId],
    ) -> KernelResult<()> {
        let p = self.model.part_mut(part)?;
        let all = p.vertices();
        let mut chosen = Vec::with_capacity(vertices.len());
        for v in vertices {
            let point = all
                .get(v.0 as usize)
                .ok_or_else(|| KernelError::not_found("vertex", v.0))?;
            chosen.push(*point);
        }
        p.vertex_sets.insert(name.to_string(), chosen);
        Ok(())
    }

    fn assembly_is_empty(&self) -> bool {
        self.model.instances.is_empty()
    }

    fn clear_assembly(&mut self) -> KernelResult<()> {
        self.model.instances.clear();
        self.model.reference_points.clear();
        self.model.equations.clear();
        Ok(())
    }

    fn instance_part(&mut self, name: &str, part: PartId) -> KernelResult<InstanceId> {
        self.model.part(part)?;
        if self.model.instances.values().any(|i| i.name == name) {
            return Err(KernelError::Rejected(format!("instance '{name}' already exists")));
        }
        let id = InstanceId(self.model.next_id());
        self.model.instances.insert(
            id,
            MemInstance {
                name: name.to_string(),
                part,
                offset: Vec3::zeros(),
                suppressed: false,
            },
        );
        Ok(id)
    }

    fn instance_bounding_box(&self, instance: InstanceId) -> KernelResult<BoundingBox> {
        let inst = self.model.instance(instance)?;
        let bb = self.model.part(inst.part)?.bounding_box();
        Ok(bb.translated(&inst.offset))
    }

    fn translate_instance(&mut self, instance: InstanceId, offset: Vec3) -> KernelResult<()> {
        let inst = self
            .model
            .instances
            .get_mut(&instance)
            .ok_or_else(|| KernelError::not_found("instance", instance))?;
        inst.offset += offset;
        Ok(())
    }

    fn merge_instances(
        &mut self,
        name: &str,
        instances: &[InstanceId],
        originals: OriginalInstances,
    ) -> KernelResult<Merged> {
        if instances.is_empty() {
            return Err(KernelError::Rejected(format!("merge '{name}' has no instances")));
        }
        let mut segments = Vec::new();
        let mut pieces = Vec::new();
        let mut depth: Option<f64> = None;
        for id in instances {
            let inst = self.model.instance(*id)?;
            let part = self.model.part(inst.part)?;
            let (dx, dy) = (inst.offset.x, inst.offset.y);
            segments.extend(part.segments.iter().map(|s| s.translated(dx, dy)));
            pieces.extend(part.pieces.iter().map(|b| b.translated(&Vec3::new(dx, dy, 0.0))));
            depth = match (depth, part.depth) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }
        for id in instances {
            match originals {
                OriginalInstances::Delete => {
                    self.model.instances.remove(id);
                }
                OriginalInstances::Suppress => {
                    if let Some(inst) = self.model.instances.get_mut(id) {
                        inst.suppressed = true;
                    }
                }
            }
        }
        let part = self.add_part(MemPart::new(name, segments, pieces, depth));
        let instance = self.instance_part(&format!("{name}-1"), part)?;
        log::debug!(
            "Merged {} instances into '{}' ({:?} originals)",
            instances.len(),
            name,
            originals
        );
        Ok(Merged { part, instance })
    }

    fn assembly_bounding_box(&self) -> KernelResult<BoundingBox> {
        let mut bb: Option<BoundingBox> = None;
        for inst in self.model.active_instances() {
            let b = self.model.part(inst.part)?.bounding_box().translated(&inst.offset);
            bb = Some(bb.map_or(b, |acc| acc.union(&b)));
        }
        bb.ok_or_else(|| KernelError::Rejected("assembly is empty".to_string()))
    }

    fn create_reference_point(&mut self, set_name: &str, at: Pt3) -> KernelResult<()> {
        if self.model.reference_points.contains_key(set_name) {
            return Err(KernelError::Rejected(format!(
                "reference point set '{set_name}' already exists"
            )));
        }
        self.model.reference_points.insert(set_name.to_string(), at);
        Ok(())
    }

    fn create_equation(&mut self, name: &str, terms: &[EquationTerm]) -> KernelResult<()> {
        for t in terms {
            if !self.model.set_exists(&t.set) {
                return Err(KernelError::not_found("set", &t.set));
            }
        }
        self.model.equations.insert(name.to_string(), terms.to_vec());
        Ok(())
    }

    fn create_material(&mut self, name: &str, params: &MaterialParams) -> KernelResult<()> {
        self.model.materials.insert(name.to_string(), params.clone());
        Ok(())
    }

    fn assign_section(
        &mut self,
        part: PartId,
        material: &str,
        thickness: Option<f64>,
    ) -> KernelResult<()> {
        if !self.model.materials.contains_key(material) {
            return Err(KernelError::not_found("material", material));
        }
        self.model.part_mut(part)?.section = Some((material.to_string(), thickness));
        Ok(())
    }

    fn create_static_step(
        &mut self,
        name: &str,
        previous: &str,
        params: &StepParams,
        nlgeom: bool,
    ) -> KernelResult<()> {
        if !self.model.steps.iter().any(|(n, _)| n == previous) {
            return Err(KernelError::not_found("step", previous));
        }
        if self.model.steps.iter().any(|(n, _)| n == name) {
            return Err(KernelError::Rejected(format!("step '{name}' already exists")));
        }
        log::debug!("Created static step '{}' after '{}' (nlgeom={})", name, previous, nlgeom);
        self.model.steps.push((name.to_string(), Some(*params)));
        Ok(())
    }

    fn step_names(&self) -> Vec<String> {
        self.model.steps.iter().map(|(n, _)| n.clone()).collect()
    }

    fn create_boundary_condition(&mut self, bc: &BoundaryCondition) -> KernelResult<()> {
        if !self.model.steps.iter().any(|(n, _)| *n == bc.step) {
            return Err(KernelError::not_found("step", &bc.step));
        }
        if !self.model.set_exists(&bc.region) {
            return Err(KernelError::not_found("set", &bc.region));
        }
        self.model.boundary_conditions.push(bc.clone());
        Ok(())
    }

    fn seed_part(&mut self, part: PartId, size: f64) -> KernelResult<()> {
        if !(size > 0.0) {
            return Err(KernelError::Rejected(format!("seed size {size} must be positive")));
        }
        self.model.part_mut(part)?.seed = Some(size);
        Ok(())
    }

    fn set_mesh_controls(&mut self, part: PartId, shape: ElementShape) -> KernelResult<()> {
        self.model.part_mut(part)?.shape = Some(shape);
        Ok(())
    }

    fn set_element_types(
        &mut self,
        part: PartId,
        library: ElementLibrary,
        codes: &[String],
    ) -> KernelResult<()> {
        self.model.part_mut(part)?.element_types = Some((library, codes.to_vec()));
        Ok(())
    }

    fn generate_mesh(&mut self, part: PartId) -> KernelResult<()> {
        let p = self.model.part_mut(part)?;
        let seed = p
            .seed
            .ok_or_else(|| KernelError::Rejected(format!("part '{}' is not seeded", p.name)))?;
        let codes = match &p.element_types {
            Some((_, codes)) if !codes.is_empty() => codes.clone(),
            _ => {
                return Err(KernelError::Rejected(format!(
                    "part '{}' has no element type",
                    p.name
                )))
            }
        };
        let layers = p.depth.map_or(1.0, |d| (d / seed).ceil().max(1.0));
        let total: usize = p
            .pieces
            .iter()
            .map(|b| {
                let [w, h, _] = b.size();
                ((w / seed).ceil().max(1.0) * (h / seed).ceil().max(1.0) * layers) as usize
            })
            .sum();
        let mut histogram = BTreeMap::new();
        match codes.as_slice() {
            [primary, secondary] => {
                let minor = total / 10;
                histogram.insert(primary.clone(), total - minor);
                histogram.insert(secondary.clone(), minor);
            }
            _ => {
                histogram.insert(codes[0].clone(), total);
            }
        }
        p.mesh = Some(histogram);
        Ok(())
    }

    fn element_histogram(&self, part: PartId) -> KernelResult<BTreeMap<String, usize>> {
        let p = self.model.part(part)?;
        p.mesh
            .clone()
            .ok_or_else(|| KernelError::Rejected(format!("part '{}' is not meshed", p.name)))
    }

    fn create_job(&mut self, name: &str, params: &JobParams) -> KernelResult<()> {
        if self.model.jobs.contains_key(name) {
            return Err(KernelError::Rejected(format!("job '{name}' already exists")));
        }
        self.model.jobs.insert(
            name.to_string(),
            MemJob {
                params: params.clone(),
                status: JobStatus::Created,
                final_status: None,
                artifacts: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn submit_job(&mut self, name: &str) -> KernelResult<()> {
        if !self.model.jobs.contains_key(name) {
            return Err(KernelError::not_found("job", name));
        }
        fs::create_dir_all(&self.work_dir)?;

        let mut artifacts = BTreeMap::new();
        let inp = self.job_file(name, JobArtifact::Input);
        fs::write(&inp, self.input_summary(name))?;
        artifacts.insert(JobArtifact::Input, inp);

        let (status, message) = match self.run_analysis() {
            Ok(odb) if self.job_outcome == JobStatus::Completed => {
                let path = self.job_file(name, JobArtifact::OutputDatabase);
                odb.save(&path)?;
                artifacts.insert(JobArtifact::OutputDatabase, path);
                let sta = self.job_file(name, JobArtifact::Status);
                let mut table = String::from("STEP  INC  TOTAL TIME\n");
                for (k, frame) in odb.frames.iter().enumerate().skip(1) {
                    table.push_str(&format!("   1 {:4}  {:.6}\n", k, frame.time));
                }
                table.push_str(" THE ANALYSIS HAS COMPLETED SUCCESSFULLY\n");
                fs::write(&sta, table)?;
                artifacts.insert(JobArtifact::Status, sta);
                (JobStatus::Completed, "analysis completed".to_string())
            }
            Ok(_) => (self.job_outcome, format!("analysis ended with {}", self.job_outcome)),
            Err(reason) => (JobStatus::Aborted, reason),
        };
        let msg = self.job_file(name, JobArtifact::Message);
        fs::write(&msg, format!("Job {name}: {message}\n"))?;
        artifacts.insert(JobArtifact::Message, msg);

        log::debug!("Submitted job '{}': {}", name, message);
        if let Some(job) = self.model.jobs.get_mut(name) {
            job.status = JobStatus::Submitted;
            job.final_status = Some(status);
            job.artifacts = artifacts;
        }
        Ok(())
    }

    fn wait_for_completion(&mut self, name: &str) -> KernelResult<()> {
        let job = self
            .model
            .jobs
            .get_mut(name)
            .ok_or_else(|| KernelError::not_found("job", name))?;
        if let Some(status) = job.final_status.take() {
            job.status = status;
        }
        Ok(())
    }

    fn job_status(&self, name: &str) -> KernelResult<JobStatus> {
        self.model
            .jobs
            .get(name)
            .map(|j| j.status)
            .ok_or_else(|| KernelError::not_found("job", name))
    }

    fn job_artifact(&self, name: &str, artifact: JobArtifact) -> Option<PathBuf> {
        self.model
            .jobs
            .get(name)
            .and_then(|j| j.artifacts.get(&artifact))
            .filter(|p| p.exists())
            .cloned()
    }

    fn open_output(&self, path: &Path) -> KernelResult<Box<dyn OutputDatabase>> {
        Ok(Box::new(RecordedOutput::load(path)?))
    }

    fn export_stl(&mut self, part: PartId, path: &Path) -> KernelResult<()> {
        let p = self.model.part(part)?;
        let depth = p.depth.unwrap_or(0.0);
        let mut s = format!("solid {}\n", p.name);
        for piece in &p.pieces {
            let mut bb = *piece;
            bb.max.z = bb.min.z + depth;
            for [a, b, c] in box_facets(&bb) {
                let n = (b - a).cross(&(c - a));
                let n = if n.norm() > 0.0 { n.normalize() } else { n };
                s.push_str(&format!("  facet normal {:e} {:e} {:e}\n", n.x, n.y, n.z));
                s.push_str("    outer loop\n");
                for v in [a, b, c] {
                    s.push_str(&format!("      vertex {:e} {:e} {:e}\n", v.x, v.y, v.z));
                }
                s.push_str("    endloop\n");
                s.push_str("  endfacet\n");
            }
        }
        s.push_str(&format!("endsolid {}\n", p.name));
        fs::write(path, s)?;
        Ok(())
    }

    fn export_step(&mut self, part: PartId, path: &Path) -> KernelResult<()> {
        let p = self.model.part(part)?;
        let mut s = String::from("ISO-10303-21;\nHEADER;\n");
        s.push_str(&format!("FILE_DESCRIPTION(('{}'),'2;1');\n", p.name));
        s.push_str(&format!("FILE_NAME('{}','{}',(''),(''),'','','');\n", p.name, chrono::Utc::now().to_rfc3339()));
        s.push_str("FILE_SCHEMA(('AUTOMOTIVE_DESIGN'));\nENDSEC;\nDATA;\n");
        let mut n = 0usize;
        for seg in &p.segments {
            for q in [seg.start, seg.end] {
                n += 1;
                s.push_str(&format!("#{}=CARTESIAN_POINT('',({:.9},{:.9},0.));\n", n, q.x, q.y));
            }
        }
        s.push_str("ENDSEC;\nEND-ISO-10303-21;\n");
        fs::write(path, s)?;
        Ok(())
    }

    fn save_model(&mut self, path: &Path) -> KernelResult<()> {
        fs::write(path, serde_json::to_string_pretty(&self.model)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_partition_splits_edges() {
        let mut k = MemoryKernel::default();
        let part = k.create_rectangle_part("r", 4.0, 2.0, None).unwrap();
        assert_eq!(k.face_count(part).unwrap(), 1);

        k.partition_faces(part, Pt3::new(0.0, 1.0, 0.0), Pt3::new(4.0, 1.0, 0.0))
            .unwrap();
        let left = k.edges_at(part, Axis::X, 0.0, 1e-6).unwrap();
        assert_eq!(left.len(), 2);
        let mids = k.vertices_at(part, Axis::Y, 1.0, 1e-6).unwrap();
        assert_eq!(mids.len(), 2);
    }

    #[test]
    fn test_merge_counts_components() {
        let mut k = MemoryKernel::default();
        let a = k.create_rectangle_part("a", 1.0, 1.0, None).unwrap();
        let i1 = k.instance_part("a-1", a).unwrap();
        let i2 = k.instance_part("a-2", a).unwrap();
        let i3 = k.instance_part("a-3", a).unwrap();
        k.translate_instance(i2, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        k.translate_instance(i3, Vec3::new(5.0, 0.0, 0.0)).unwrap();

        let merged = k
            .merge_instances("m", &[i1, i2, i3], OriginalInstances::Delete)
            .unwrap();
        assert_eq!(k.face_count(merged.part).unwrap(), 2);
        assert_eq!(k.instance_count(), 1);
        let bb = k.assembly_bounding_box().unwrap();
        assert!((bb.extent(Axis::X) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_corner_contact_leaves_two_faces() {
        let mut k = MemoryKernel::default();
        let a = k.create_rectangle_part("a", 1.0, 1.0, None).unwrap();
        let i1 = k.instance_part("a-1", a).unwrap();
        let i2 = k.instance_part("a-2", a).unwrap();
        k.translate_instance(i2, Vec3::new(1.0, 1.0, 0.0)).unwrap();

        let merged = k
            .merge_instances("m", &[i1, i2], OriginalInstances::Delete)
            .unwrap();
        assert_eq!(k.face_count(merged.part).unwrap(), 2);
    }

    #[test]
    fn test_suppressed_instances_leave_bbox() {
        let mut k = MemoryKernel::default();
        let a = k.create_rectangle_part("a", 1.0, 1.0, None).unwrap();
        let i1 = k.instance_part("a-1", a).unwrap();
        let i2 = k.instance_part("a-2", a).unwrap();
        k.translate_instance(i2, Vec3::new(0.0, 1.0, 0.0)).unwrap();
        k.merge_instances("m", &[i1, i2], OriginalInstances::Suppress)
            .unwrap();
        assert_eq!(k.instance_count(), 3);
        assert!(k.delete_part(a).is_err());
        let bb = k.assembly_bounding_box().unwrap();
        assert!((bb.extent(Axis::Y) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_equation_requires_sets() {
        let mut k = MemoryKernel::default();
        let term = EquationTerm {
            coefficient: 1.0,
            set: "RP-1".to_string(),
            dof: 1,
        };
        assert!(k.create_equation("eq", &[term.clone()]).is_err());
        k.create_reference_point("RP-1", Pt3::origin()).unwrap();
        assert!(k.create_equation("eq", &[term]).is_ok());
    }

    #[test]
    fn test_crossing_ignores_endpoints() {
        let seg = Segment::new(Pt2::new(0.0, 0.0), Pt2::new(0.0, 2.0));
        let cut = Segment::new(Pt2::new(-1.0, 1.0), Pt2::new(1.0, 1.0));
        let p = crossing(&seg, &cut).unwrap();
        assert!((p.y - 1.0).abs() < 1e-12);
        let touching = Segment::new(Pt2::new(-1.0, 2.0), Pt2::new(1.0, 2.0));
        assert!(crossing(&seg, &touching).is_none());
    }
}
