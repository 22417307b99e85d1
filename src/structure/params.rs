//! Analysis parameters: material, step, loading, mesh, job and output

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AuxeticError, AuxeticResult};
use crate::geometry::Axis;

/// Isotropic linear elastic behavior
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Elastic {
    pub youngs_modulus: f64,
    pub poisson_ratio: f64,
}

/// Hyperelastic behavior defined by uniaxial test data `(stress, strain)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", content = "uniaxial", rename_all = "snake_case")]
pub enum Hyperelastic {
    Ogden(Vec<(f64, f64)>),
    Marlow(Vec<(f64, f64)>),
}

impl Hyperelastic {
    pub fn data(&self) -> &[(f64, f64)] {
        match self {
            Hyperelastic::Ogden(d) | Hyperelastic::Marlow(d) => d,
        }
    }
}

/// Material assigned to the whole structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialParams {
    #[serde(default)]
    pub elastic: Option<Elastic>,
    #[serde(default)]
    pub density: Option<f64>,
    #[serde(default)]
    pub hyperelastic: Option<Hyperelastic>,
}

impl MaterialParams {
    pub fn elastic(youngs_modulus: f64, poisson_ratio: f64) -> Self {
        Self {
            elastic: Some(Elastic {
                youngs_modulus,
                poisson_ratio,
            }),
            ..Self::default()
        }
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = Some(density);
        self
    }

    pub fn validate(&self) -> AuxeticResult<()> {
        if self.elastic.is_some() && self.hyperelastic.is_some() {
            return Err(AuxeticError::InvalidInput(
                "define at most one of elastic, ogden or marlow behavior".to_string(),
            ));
        }
        if let Some(rho) = self.density {
            if !(rho > 0.0) {
                return Err(AuxeticError::InvalidInput(format!(
                    "density must be positive, got {rho}"
                )));
            }
        }
        if let Some(h) = &self.hyperelastic {
            if h.data().is_empty() {
                return Err(AuxeticError::InvalidInput(
                    "hyperelastic test data is empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Static general step settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepParams {
    pub time_period: f64,
    pub init_inc_size: f64,
    pub min_inc_size: f64,
    pub max_inc_size: f64,
    pub max_num_inc: u32,
}

impl Default for StepParams {
    fn default() -> Self {
        Self {
            time_period: 1.0,
            init_inc_size: 0.1,
            min_inc_size: 0.05,
            max_inc_size: 0.1,
            max_num_inc: 100,
        }
    }
}

impl StepParams {
    pub fn validate(&self) -> AuxeticResult<()> {
        let sizes = [
            self.time_period,
            self.init_inc_size,
            self.min_inc_size,
            self.max_inc_size,
        ];
        if sizes.iter().any(|v| !(*v > 0.0)) || self.max_num_inc == 0 {
            return Err(AuxeticError::InvalidInput(format!(
                "step sizes and increment count must be positive: {self:?}"
            )));
        }
        if self.min_inc_size > self.max_inc_size {
            return Err(AuxeticError::InvalidInput(format!(
                "min_inc_size {} exceeds max_inc_size {}",
                self.min_inc_size, self.max_inc_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingKind {
    /// Uniaxial monotonic displacement
    Displacement,
    /// Uniaxial monotonic concentrated force
    Force,
}

/// Loading applied at the second reference point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadingParams {
    pub kind: LoadingKind,
    pub direction: Axis,
    pub magnitude: f64,
}

impl LoadingParams {
    pub fn displacement(direction: Axis, magnitude: f64) -> Self {
        Self {
            kind: LoadingKind::Displacement,
            direction,
            magnitude,
        }
    }

    pub fn force(direction: Axis, magnitude: f64) -> Self {
        Self {
            kind: LoadingKind::Force,
            direction,
            magnitude,
        }
    }

    /// In-plane axis transverse to loading
    pub fn transverse(&self) -> AuxeticResult<Axis> {
        self.direction.in_plane_transverse().ok_or_else(|| {
            AuxeticError::InvalidInput("loading along Z is not supported".to_string())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementShape {
    Quad,
    QuadDominated,
    Tri,
    Hex,
    HexDominated,
    Tet,
    Wedge,
}

impl ElementShape {
    /// Shapes usable on shell (2D) parts
    pub fn is_planar(self) -> bool {
        matches!(
            self,
            ElementShape::Quad | ElementShape::QuadDominated | ElementShape::Tri
        )
    }

    pub fn is_dominated(self) -> bool {
        matches!(self, ElementShape::QuadDominated | ElementShape::HexDominated)
    }
}

impl fmt::Display for ElementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ElementShape::Quad => "QUAD",
            ElementShape::QuadDominated => "QUAD_DOMINATED",
            ElementShape::Tri => "TRI",
            ElementShape::Hex => "HEX",
            ElementShape::HexDominated => "HEX_DOMINATED",
            ElementShape::Tet => "TET",
            ElementShape::Wedge => "WEDGE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementLibrary {
    #[default]
    Standard,
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshParams {
    pub seed_size: f64,
    pub elem_shape: ElementShape,
    /// Element codes, e.g. `CPE4H`; dominated shapes may list two
    pub elem_code: Vec<String>,
    #[serde(default)]
    pub elem_library: ElementLibrary,
}

impl MeshParams {
    pub fn new(seed_size: f64, elem_shape: ElementShape, elem_code: &str) -> Self {
        Self {
            seed_size,
            elem_shape,
            elem_code: vec![elem_code.to_string()],
            elem_library: ElementLibrary::Standard,
        }
    }

    pub fn validate(&self) -> AuxeticResult<()> {
        if !(self.seed_size > 0.0) {
            return Err(AuxeticError::InvalidInput(format!(
                "seed size must be positive, got {}",
                self.seed_size
            )));
        }
        let max_codes = if self.elem_shape.is_dominated() { 2 } else { 1 };
        if self.elem_code.is_empty() || self.elem_code.len() > max_codes {
            return Err(AuxeticError::InvalidInput(format!(
                "{} takes 1 to {} element codes, got {}",
                self.elem_shape,
                max_codes,
                self.elem_code.len()
            )));
        }
        for code in &self.elem_code {
            let valid = !code.is_empty()
                && code
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
            if !valid {
                return Err(AuxeticError::InvalidInput(format!(
                    "element code '{code}' must be an upper-case identifier"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Single,
    Double,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobParams {
    pub description: String,
    pub num_cpus: u32,
    pub memory_percent: u32,
    pub explicit_precision: Precision,
    pub nodal_output_precision: Precision,
}

impl Default for JobParams {
    fn default() -> Self {
        Self {
            description: String::new(),
            num_cpus: 1,
            memory_percent: 90,
            explicit_precision: Precision::Single,
            nodal_output_precision: Precision::Single,
        }
    }
}

impl JobParams {
    pub fn validate(&self) -> AuxeticResult<()> {
        if self.num_cpus == 0 {
            return Err(AuxeticError::InvalidInput("num_cpus must be at least 1".to_string()));
        }
        if self.memory_percent == 0 || self.memory_percent > 100 {
            return Err(AuxeticError::InvalidInput(format!(
                "memory_percent must be in 1..=100, got {}",
                self.memory_percent
            )));
        }
        Ok(())
    }
}

/// What to keep after a successful analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputParams {
    /// Root folder for results; the structure gets its own subfolder
    pub result_folder: Option<PathBuf>,
    pub save_cae: bool,
    pub save_odb: bool,
    pub save_job_files: bool,
    pub export_extrusion_depth: Option<f64>,
    pub export_ribbon_width: Option<f64>,
    pub export_stl: bool,
    pub export_stp: bool,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            result_folder: None,
            save_cae: true,
            save_odb: true,
            save_job_files: true,
            export_extrusion_depth: None,
            export_ribbon_width: None,
            export_stl: false,
            export_stp: false,
        }
    }
}

impl OutputParams {
    pub fn with_result_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.result_folder = Some(folder.into());
        self
    }

    /// Folder holding the results of structure `name`
    pub fn results_folder(&self, name: &str) -> PathBuf {
        match &self.result_folder {
            Some(root) => root.join(name),
            None => PathBuf::from(name),
        }
    }

    pub fn wants_export(&self) -> bool {
        self.export_stl || self.export_stp
    }
}
