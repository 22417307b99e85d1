//! JSON run configurations
//!
//! A [`RunConfig`] describes one structure end to end; a [`BatchConfig`]
//! describes a family of uniform structures that differ only in their
//! unit cell parameters.
//!
//! ```json
//! {
//!   "name": "demo",
//!   "unit_cells": [{ "variant": "bounding_box", "id": 1, "extrusion_depth": 1.0,
//!                    "horz_bounding_box": 10.0, "vert_bounding_box": 8.0,
//!                    "vert_strut_thickness": 1.0, "diag_strut_thickness": 0.5,
//!                    "diag_strut_angle": 60.0 }],
//!   "pattern": { "mode": "uniform", "num_cell_repeat": { "x": 3, "y": 2 } },
//!   "material": { "elastic": { "youngs_modulus": 1000.0, "poisson_ratio": 0.3 } },
//!   "loading": { "kind": "displacement", "direction": "X", "magnitude": 2.0 },
//!   "mesh": { "seed_size": 0.5, "elem_shape": "QUAD", "elem_code": ["CPE4H"] }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AuxeticError, AuxeticResult};
use crate::pattern::{CellRepeat, PatternSpec};
use crate::structure::params::{
    JobParams, LoadingParams, MaterialParams, MeshParams, OutputParams, StepParams,
};
use crate::unit_cell::UnitCellParams;

fn default_true() -> bool {
    true
}

fn default_target_time() -> f64 {
    1.0
}

/// Everything needed to model and analyse one structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub name: String,
    pub unit_cells: Vec<UnitCellParams>,
    pub pattern: PatternSpec,
    pub loading: LoadingParams,
    #[serde(default)]
    pub material: Option<MaterialParams>,
    /// Defaults to [`StepParams::default`]
    #[serde(default)]
    pub step: Option<StepParams>,
    #[serde(default)]
    pub mesh: Option<MeshParams>,
    #[serde(default)]
    pub job: JobParams,
    #[serde(default)]
    pub output: OutputParams,
    /// Stop after assembling the geometry when false
    #[serde(default = "default_true")]
    pub run_analysis: bool,
}

/// A series of uniform structures named `<prefix>-001`, `<prefix>-002`, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub prefix: String,
    /// One entry per structure
    pub unit_cells: Vec<UnitCellParams>,
    pub num_cell_repeat: CellRepeat,
    pub loading: LoadingParams,
    pub material: MaterialParams,
    #[serde(default)]
    pub step: Option<StepParams>,
    pub mesh: MeshParams,
    #[serde(default)]
    pub job: JobParams,
    #[serde(default)]
    pub output: OutputParams,
    /// Model time at which results are collected
    #[serde(default = "default_target_time")]
    pub target_time: f64,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> AuxeticResult<T> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> AuxeticResult<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> AuxeticResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> AuxeticResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that do not need a kernel
    pub fn validate(&self) -> AuxeticResult<()> {
        if self.unit_cells.is_empty() {
            return Err(AuxeticError::InvalidInput(format!(
                "run '{}' defines no unit cells",
                self.name
            )));
        }
        for cell in &self.unit_cells {
            cell.validate()?;
        }
        self.loading.transverse()?;
        if self.run_analysis {
            match (&self.material, &self.mesh) {
                (Some(material), Some(mesh)) => {
                    material.validate()?;
                    mesh.validate()?;
                }
                _ => {
                    return Err(AuxeticError::InvalidInput(
                        "material and mesh parameters are required to run the analysis"
                            .to_string(),
                    ))
                }
            }
            self.step.unwrap_or_default().validate()?;
            self.job.validate()?;
        }
        Ok(())
    }

    pub fn results_folder(&self) -> PathBuf {
        self.output.results_folder(&self.name)
    }
}

impl BatchConfig {
    pub fn load(path: impl AsRef<Path>) -> AuxeticResult<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> AuxeticResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AuxeticResult<()> {
        if self.unit_cells.is_empty() {
            return Err(AuxeticError::InvalidInput(format!(
                "batch '{}' defines no structures",
                self.prefix
            )));
        }
        if let Some(other) = self
            .unit_cells
            .iter()
            .find(|p| !p.same_variant(&self.unit_cells[0]))
        {
            return Err(AuxeticError::InvalidInput(format!(
                "batch '{}' mixes '{}' and '{}' unit cells",
                self.prefix,
                self.unit_cells[0].variant_name(),
                other.variant_name()
            )));
        }
        for cell in &self.unit_cells {
            cell.validate()?;
        }
        if self.target_time < 0.0 {
            return Err(AuxeticError::InvalidInput(format!(
                "target time must not be negative, got {}",
                self.target_time
            )));
        }
        self.loading.transverse()?;
        self.material.validate()?;
        self.mesh.validate()?;
        self.step.unwrap_or_default().validate()?;
        self.job.validate()
    }

    /// Name of the `index`-th structure, counting from 1
    pub fn structure_name(&self, index: usize) -> String {
        format!("{}-{:03}", self.prefix, index)
    }

    /// Folder holding every structure of the batch
    pub fn batch_folder(&self) -> PathBuf {
        self.output.results_folder(&format!("{}-batch run", self.prefix))
    }

    /// Single-structure configuration for the `index`-th entry, counting from 1
    pub fn run_config(&self, index: usize) -> AuxeticResult<RunConfig> {
        let params = index
            .checked_sub(1)
            .and_then(|k| self.unit_cells.get(k))
            .ok_or_else(|| {
                AuxeticError::InvalidInput(format!(
                    "batch '{}' has no structure {}",
                    self.prefix, index
                ))
            })?;
        let mut output = self.output.clone();
        output.result_folder = Some(self.batch_folder());
        Ok(RunConfig {
            name: self.structure_name(index),
            unit_cells: vec![*params],
            pattern: PatternSpec::Uniform {
                num_cell_repeat: self.num_cell_repeat,
            },
            loading: self.loading,
            material: Some(self.material.clone()),
            step: self.step,
            mesh: Some(self.mesh.clone()),
            job: self.job.clone(),
            output,
            run_analysis: true,
        })
    }
}
