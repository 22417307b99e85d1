//! Single and batch pipeline runs
//!
//! These drive [`AuxeticStructure`] from a [`RunConfig`] or a
//! [`BatchConfig`]. Every run writes its milestones to a caller-supplied
//! [`RunLog`], which is finished whether the run succeeds or not.

use std::fs;
use std::path::PathBuf;

use crate::config::{BatchConfig, RunConfig};
use crate::error::{AuxeticError, AuxeticResult};
use crate::geometry::BoundingBox;
use crate::kernel::GeometryKernel;
use crate::logging::RunLog;
use crate::pattern::PatternSpec;
use crate::results::{self, BatchTable, ResultsTable};
use crate::structure::{AuxeticStructure, StructureState};

/// What is left of a structure once its pipeline has run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub name: String,
    pub state: StructureState,
    pub bounding_box: Option<BoundingBox>,
    pub results_folder: Option<PathBuf>,
    pub results: Option<ResultsTable>,
}

impl<K: GeometryKernel + ?Sized> From<&AuxeticStructure<'_, K>> for RunSummary {
    fn from(structure: &AuxeticStructure<'_, K>) -> Self {
        Self {
            name: structure.name().to_string(),
            state: structure.state(),
            bounding_box: structure.main_part().map(|a| a.bounding_box),
            results_folder: structure.results_folder().map(|p| p.to_path_buf()),
            results: structure.results().cloned(),
        }
    }
}

/// Outcome of a batch run
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub folder: PathBuf,
    pub csv_path: PathBuf,
    pub runs: Vec<RunSummary>,
    pub table: BatchTable,
}

/// Build the geometry of `config` without analysing it or touching the disk
pub fn preview<K: GeometryKernel + ?Sized>(
    kernel: &mut K,
    config: &RunConfig,
) -> AuxeticResult<RunSummary> {
    config.validate()?;
    kernel.new_model(&config.name)?;
    let mut structure = AuxeticStructure::new(kernel, &config.name, &config.loading)?;
    structure.add_unit_cells(&config.unit_cells)?;
    structure.add_pattern_params(&config.pattern)?;
    structure.assemble_structure(true)?;
    Ok(RunSummary::from(&structure))
}

/// Model and, unless disabled, analyse one structure
pub fn run_single<K: GeometryKernel + ?Sized>(
    kernel: &mut K,
    config: &RunConfig,
    run_log: &mut RunLog,
) -> AuxeticResult<RunSummary> {
    run_log.info(&format!("Starting {}", results::banner()))?;
    let outcome = run_pipeline(kernel, config, run_log);
    if let Err(err) = &outcome {
        run_log.error(&format!("Run '{}' failed: {}", config.name, err))?;
    }
    run_log.finish()?;
    outcome
}

fn run_pipeline<K: GeometryKernel + ?Sized>(
    kernel: &mut K,
    config: &RunConfig,
    run_log: &mut RunLog,
) -> AuxeticResult<RunSummary> {
    config.validate()?;
    let mode = match config.pattern {
        PatternSpec::Uniform { .. } => "uniform",
        PatternSpec::NonUniform { .. } => "non-uniform",
    };
    run_log.info(&format!(
        "Starting modeling and analysis for {} structure {}",
        mode, config.name
    ))?;

    let folder = config.results_folder();
    run_log.info(&format!("Results will be placed in {:?}", folder))?;
    if folder.exists() {
        return Err(AuxeticError::FolderExists(folder));
    }

    kernel.new_model(&config.name)?;
    let mut structure = AuxeticStructure::new(kernel, &config.name, &config.loading)?;
    run_log.info("Modeling structure geometry")?;
    structure.add_unit_cells(&config.unit_cells)?;
    structure.add_pattern_params(&config.pattern)?;
    structure.assemble_structure(true)?;
    run_log.info("Modeling of structure geometry completed")?;

    if config.run_analysis {
        let (material, mesh) = match (&config.material, &config.mesh) {
            (Some(material), Some(mesh)) => (material, mesh),
            _ => {
                return Err(AuxeticError::InvalidInput(
                    "material and mesh parameters are required to run the analysis".to_string(),
                ))
            }
        };
        run_log.info("Preparing the analysis")?;
        structure.assign_material(material)?;
        structure.define_step(&config.step.unwrap_or_default())?;
        structure.define_bcs(&config.loading)?;
        structure.mesh_part(mesh)?;
        structure.create_job(&config.job)?;
        run_log.info(&format!("Submitting job '{}'", config.name))?;
        structure.submit_job()?;
        structure.output_results(&config.output)?;
        run_log.info(&format!("Analysis of structure {} completed", config.name))?;
    }

    run_log.info(&format!(
        "Modeling and analysis of structure {} completed",
        config.name
    ))?;
    Ok(RunSummary::from(&structure))
}

/// Run every structure of a batch in turn and collect their results.
///
/// The first failing structure aborts the batch; folders of the structures
/// that already finished are kept.
pub fn run_batch<K: GeometryKernel + ?Sized>(
    kernel: &mut K,
    config: &BatchConfig,
    run_log: &mut RunLog,
) -> AuxeticResult<BatchSummary> {
    run_log.info(&format!("Starting {}", results::banner()))?;
    let outcome = batch_pipeline(kernel, config, run_log);
    if let Err(err) = &outcome {
        run_log.error(&format!("Batch '{}' failed: {}", config.prefix, err))?;
    }
    run_log.finish()?;
    outcome
}

fn batch_pipeline<K: GeometryKernel + ?Sized>(
    kernel: &mut K,
    config: &BatchConfig,
    run_log: &mut RunLog,
) -> AuxeticResult<BatchSummary> {
    config.validate()?;
    run_log.info(&format!(
        "Starting batch modeling and analysis of {} structures",
        config.unit_cells.len()
    ))?;

    let folder = config.batch_folder();
    run_log.info(&format!("Results will be placed in {:?}", folder))?;
    if folder.exists() {
        return Err(AuxeticError::FolderExists(folder));
    }
    fs::create_dir_all(&folder)?;

    let mut runs = Vec::with_capacity(config.unit_cells.len());
    let mut tables = Vec::with_capacity(config.unit_cells.len());
    for index in 1..=config.unit_cells.len() {
        let run = config.run_config(index)?;
        let summary = run_pipeline(kernel, &run, run_log)?;
        let table = summary.results.clone().ok_or_else(|| {
            AuxeticError::InvalidInput(format!("structure '{}' produced no results", run.name))
        })?;
        tables.push(table);
        runs.push(summary);
    }

    let table = results::aggregate_batch(&tables, config.target_time, &config.unit_cells)?;
    let csv_path = table.write_to_folder(&folder)?;
    run_log.info("Batch modeling and analysis completed")?;
    Ok(BatchSummary {
        folder,
        csv_path,
        runs,
        table,
    })
}
