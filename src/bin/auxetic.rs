//! Command line front end for auxetic lattice runs

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;

use auxetic_lattice::kernel::SyntheticResponse;
use auxetic_lattice::prelude::*;
use auxetic_lattice::results::results_file_name;

#[derive(Parser)]
#[command(name = "auxetic")]
#[command(about = "Model, analyse and post-process re-entrant auxetic lattices")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the geometry of a run configuration and report its size
    Preview {
        /// Run configuration (JSON)
        config: PathBuf,
    },
    /// Run a configuration through the in-memory kernel
    Run {
        /// Run or batch configuration (JSON)
        config: PathBuf,

        /// Treat the configuration as a batch
        #[arg(long)]
        batch: bool,

        /// Folder for job files
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Poisson's ratio of the synthetic response
        #[arg(long, default_value_t = -0.5, allow_hyphen_values = true)]
        poisson: f64,

        /// Also write the run log to this file
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Reduce a recorded output database to a results table
    Reduce {
        /// Recorded output (JSON)
        recorded: PathBuf,

        /// Structure name used for the results file
        #[arg(long)]
        name: String,

        /// Destination folder
        #[arg(long)]
        out: PathBuf,

        /// Loading axis (X or Y)
        #[arg(long, default_value = "X", value_parser = parse_axis)]
        loading: Axis,
    },
    /// Merge the results of a finished batch into one table
    Aggregate {
        /// Batch configuration (JSON)
        config: PathBuf,

        /// Model time to collect; defaults to the configured target time
        #[arg(long)]
        time: Option<f64>,
    },
}

fn parse_axis(s: &str) -> Result<Axis, String> {
    match s.to_ascii_uppercase().as_str() {
        "X" => Ok(Axis::X),
        "Y" => Ok(Axis::Y),
        "Z" => Ok(Axis::Z),
        other => Err(format!("unknown axis '{other}'")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Preview { config } => preview_config(config),
        Commands::Run {
            config,
            batch,
            work_dir,
            poisson,
            log,
        } => run_config(config, batch, work_dir, poisson, log),
        Commands::Reduce {
            recorded,
            name,
            out,
            loading,
        } => reduce_recorded(recorded, &name, out, loading),
        Commands::Aggregate { config, time } => aggregate_results(config, time),
    }
}

fn preview_config(path: PathBuf) -> Result<()> {
    let config = RunConfig::load(&path).with_context(|| format!("loading {:?}", path))?;
    let mut kernel = MemoryKernel::default();
    let summary = preview(&mut kernel, &config)?;

    for params in &config.unit_cells {
        let cell = UnitCell::new(*params)?;
        println!(
            "{}: {} cell, {:.4} x {:.4}",
            cell.name,
            params.variant_name(),
            cell.bound_size[0],
            cell.bound_size[1]
        );
    }
    if let Some(bb) = summary.bounding_box {
        println!(
            "{}: {:.4} x {:.4} loaded along {}",
            summary.name,
            bb.extent(Axis::X),
            bb.extent(Axis::Y),
            config.loading.direction
        );
    }
    Ok(())
}

fn run_config(
    path: PathBuf,
    batch: bool,
    work_dir: Option<PathBuf>,
    poisson: f64,
    log_path: Option<PathBuf>,
) -> Result<()> {
    let work_dir = work_dir.unwrap_or_else(|| std::env::temp_dir().join("auxetic_work"));
    let mut kernel = MemoryKernel::new(work_dir).with_response(SyntheticResponse {
        poisson_ratio: poisson,
    });
    let mut run_log = match &log_path {
        Some(p) => RunLog::to_file(p)?,
        None => RunLog::disabled(),
    };

    if batch {
        let config = BatchConfig::load(&path).with_context(|| format!("loading {:?}", path))?;
        let summary = run_batch(&mut kernel, &config, &mut run_log)?;
        info!("Batch results written to {:?}", summary.csv_path);
        for entry in &summary.table.entries {
            println!(
                "{:>4} {}: poisson = {:.6}",
                entry.run_id, entry.structure, entry.row.poisson_mean
            );
        }
    } else {
        let config = RunConfig::load(&path).with_context(|| format!("loading {:?}", path))?;
        let summary = run_single(&mut kernel, &config, &mut run_log)?;
        match (&summary.results, &summary.results_folder) {
            (Some(table), Some(folder)) => {
                if let Some(last) = table.last() {
                    println!(
                        "{}: strain = {:.6}, poisson = {:.6}",
                        summary.name, last.strain_ld, last.poisson_mean
                    );
                }
                info!("Results written to {:?}", folder);
            }
            _ => println!("{}: geometry built, analysis skipped", summary.name),
        }
    }
    Ok(())
}

fn reduce_recorded(recorded: PathBuf, name: &str, out: PathBuf, loading: Axis) -> Result<()> {
    let Some(transverse) = loading.in_plane_transverse() else {
        bail!("loading along {} is not supported", loading);
    };
    let output = RecordedOutput::load(&recorded)
        .with_context(|| format!("reading recorded output {:?}", recorded))?;
    let sets = BoundarySets::new(loading, transverse);
    let table = reduce_single(&output, &sets, name)?;
    std::fs::create_dir_all(&out)?;
    let path = table.write_to_folder(&out)?;
    println!("{} rows written to {:?}", table.rows.len(), path);
    Ok(())
}

fn aggregate_results(path: PathBuf, time: Option<f64>) -> Result<()> {
    let config = BatchConfig::load(&path).with_context(|| format!("loading {:?}", path))?;
    let folder = config.batch_folder();
    let tables = (1..=config.unit_cells.len())
        .map(|index| {
            let name = config.structure_name(index);
            let file = folder.join(&name).join(results_file_name(&name));
            ResultsTable::read_csv(&file, &name).with_context(|| format!("reading {:?}", file))
        })
        .collect::<Result<Vec<_>>>()?;

    let table = aggregate_batch(&tables, time.unwrap_or(config.target_time), &config.unit_cells)?;
    let csv = table.write_to_folder(&folder)?;
    println!("{} runs aggregated into {:?}", table.entries.len(), csv);
    Ok(())
}
