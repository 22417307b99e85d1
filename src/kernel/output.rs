//! Read access to analysis output

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{KernelError, KernelResult};
use crate::geometry::{Pt3, Vec3};

/// Frame metadata
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: usize,
    pub time: f64,
}

/// Output database of a completed analysis
pub trait OutputDatabase {
    /// Frames of the analysis step in increment order
    fn frames(&self) -> Vec<Frame>;

    /// Undeformed coordinates of the nodes of a node set
    fn reference_coordinates(&self, set: &str) -> KernelResult<Vec<Pt3>>;

    /// Nodal displacements of a node set at a frame, in the same node order
    fn displacements(&self, set: &str, frame: usize) -> KernelResult<Vec<Vec3>>;
}

/// One recorded frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub time: f64,
    pub displacements: BTreeMap<String, Vec<[f64; 3]>>,
}

/// Output database held in memory and stored as JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedOutput {
    pub node_sets: BTreeMap<String, Vec<[f64; 3]>>,
    pub frames: Vec<FrameRecord>,
}

impl RecordedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node_set(mut self, name: &str, nodes: Vec<[f64; 3]>) -> Self {
        self.node_sets.insert(name.to_string(), nodes);
        self
    }

    pub fn push_frame(&mut self, time: f64, displacements: BTreeMap<String, Vec<[f64; 3]>>) {
        self.frames.push(FrameRecord {
            time,
            displacements,
        });
    }

    pub fn load(path: &Path) -> KernelResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> KernelResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl OutputDatabase for RecordedOutput {
    fn frames(&self) -> Vec<Frame> {
        self.frames
            .iter()
            .enumerate()
            .map(|(id, f)| Frame { id, time: f.time })
            .collect()
    }

    fn reference_coordinates(&self, set: &str) -> KernelResult<Vec<Pt3>> {
        let nodes = self
            .node_sets
            .get(set)
            .ok_or_else(|| KernelError::not_found("node set", set))?;
        Ok(nodes.iter().map(|c| Pt3::new(c[0], c[1], c[2])).collect())
    }

    fn displacements(&self, set: &str, frame: usize) -> KernelResult<Vec<Vec3>> {
        let record = self
            .frames
            .get(frame)
            .ok_or_else(|| KernelError::not_found("frame", frame))?;
        let values = record
            .displacements
            .get(set)
            .ok_or_else(|| KernelError::not_found("node set", set))?;
        Ok(values.iter().map(|u| Vec3::new(u[0], u[1], u[2])).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_set_reported() {
        let odb = RecordedOutput::new().with_node_set("LD-Edge-1", vec![[0.0, 1.0, 0.0]]);
        assert_eq!(odb.reference_coordinates("LD-Edge-1").unwrap().len(), 1);
        assert!(matches!(
            odb.reference_coordinates("LD-Edge-2"),
            Err(KernelError::NotFound { .. })
        ));
        assert!(odb.displacements("LD-Edge-1", 0).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.odb");
        let mut odb = RecordedOutput::new().with_node_set("S", vec![[1.0, 2.0, 0.0]]);
        let mut disp = BTreeMap::new();
        disp.insert("S".to_string(), vec![[0.5, 0.0, 0.0]]);
        odb.push_frame(0.5, disp);
        odb.save(&path).unwrap();

        let loaded = RecordedOutput::load(&path).unwrap();
        assert_eq!(loaded.frames().len(), 1);
        assert!((loaded.displacements("S", 0).unwrap()[0].x - 0.5).abs() < 1e-12);
    }
}
