//! Post-processing: strain and Poisson's ratio histories, batch tables and CSV output

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AuxeticError, AuxeticResult};
use crate::kernel::OutputDatabase;
use crate::structure::BoundarySets;
use crate::unit_cell::UnitCellParams;

/// Column labels of a single results file
pub const RESULT_COLUMNS: [&str; 10] = [
    "Inc",
    "Time",
    "U_ld",
    "U_td_mean",
    "U_td_midpoint",
    "strain_ld",
    "strain_td_mean",
    "strain_td_midpoint",
    "poisson_midpoint",
    "poisson_mean",
];

const DELIMITER: &str = ", ";

/// Banner written on the first line of every results file
pub fn banner() -> String {
    format!(
        "Modeling and post-processing done by {} v{}.",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

/// Reduced output of one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub frame_id: usize,
    pub time: f64,
    pub u_ld: f64,
    pub u_td_mean: f64,
    pub u_td_midpoint: f64,
    pub strain_ld: f64,
    pub strain_td_mean: f64,
    pub strain_td_midpoint: f64,
    pub poisson_midpoint: f64,
    pub poisson_mean: f64,
}

impl ResultRow {
    /// Values after `Inc` and `Time`, in column order
    pub fn values(&self) -> [f64; 8] {
        [
            self.u_ld,
            self.u_td_mean,
            self.u_td_midpoint,
            self.strain_ld,
            self.strain_td_mean,
            self.strain_td_midpoint,
            self.poisson_midpoint,
            self.poisson_mean,
        ]
    }
}

/// Time history of one structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    pub structure: String,
    pub rows: Vec<ResultRow>,
}

/// Round to the two decimals the results file stores time with
fn file_time(t: f64) -> f64 {
    (t * 100.0).round() / 100.0
}

impl ResultsTable {
    /// First row whose time matches `time` at file precision
    pub fn row_at_time(&self, time: f64) -> Option<&ResultRow> {
        let target = file_time(time);
        self.rows
            .iter()
            .find(|r| (file_time(r.time) - target).abs() < 1e-9)
    }

    pub fn last(&self) -> Option<&ResultRow> {
        self.rows.last()
    }

    pub fn to_csv(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("{}\n", banner()));
        s.push_str(&format!("{}\n", RESULT_COLUMNS.join(DELIMITER)));
        for row in &self.rows {
            let mut fields = vec![format!("{}", row.frame_id), format!("{:.2}", row.time)];
            fields.extend(row.values().iter().map(|v| format!("{v:.8}")));
            s.push_str(&format!("{}\n", fields.join(DELIMITER)));
        }
        s
    }

    /// Write `<folder>/<structure> results.csv`
    pub fn write_to_folder(&self, folder: &Path) -> AuxeticResult<PathBuf> {
        let path = folder.join(results_file_name(&self.structure));
        write_atomic(&path, &self.to_csv())?;
        log::info!("Exported the numerical output for structure {}", self.structure);
        Ok(path)
    }

    pub fn read_csv(path: &Path, structure: &str) -> AuxeticResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse_csv(&text, structure)
    }

    /// Parse a results file; the banner and header lines are skipped
    pub fn parse_csv(text: &str, structure: &str) -> AuxeticResult<Self> {
        let mut rows = Vec::new();
        for (n, line) in text.lines().enumerate().skip(2) {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != RESULT_COLUMNS.len() {
                return Err(AuxeticError::ParseError(format!(
                    "line {}: expected {} columns, found {}",
                    n + 1,
                    RESULT_COLUMNS.len(),
                    fields.len()
                )));
            }
            let num = |k: usize| -> AuxeticResult<f64> {
                fields[k].parse::<f64>().map_err(|e| {
                    AuxeticError::ParseError(format!("line {}, {}: {}", n + 1, RESULT_COLUMNS[k], e))
                })
            };
            let frame_id = fields[0].parse::<usize>().map_err(|e| {
                AuxeticError::ParseError(format!("line {}, Inc: {}", n + 1, e))
            })?;
            rows.push(ResultRow {
                frame_id,
                time: num(1)?,
                u_ld: num(2)?,
                u_td_mean: num(3)?,
                u_td_midpoint: num(4)?,
                strain_ld: num(5)?,
                strain_td_mean: num(6)?,
                strain_td_midpoint: num(7)?,
                poisson_midpoint: num(8)?,
                poisson_mean: num(9)?,
            });
        }
        Ok(Self {
            structure: structure.to_string(),
            rows,
        })
    }
}

pub fn results_file_name(structure: &str) -> String {
    format!("{structure} results.csv")
}

fn write_atomic(path: &Path, contents: &str) -> AuxeticResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn first_coord(odb: &dyn OutputDatabase, set: &str, axis: usize) -> AuxeticResult<f64> {
    odb.reference_coordinates(set)?
        .first()
        .map(|p| p[axis])
        .ok_or_else(|| AuxeticError::InvalidInput(format!("node set '{set}' is empty")))
}

fn first_disp(odb: &dyn OutputDatabase, set: &str, frame: usize, axis: usize) -> AuxeticResult<f64> {
    odb.displacements(set, frame)?
        .first()
        .map(|u| u[axis])
        .ok_or_else(|| AuxeticError::InvalidInput(format!("node set '{set}' is empty")))
}

fn mean_disp(odb: &dyn OutputDatabase, set: &str, frame: usize, axis: usize) -> AuxeticResult<f64> {
    let values = odb.displacements(set, frame)?;
    if values.is_empty() {
        return Err(AuxeticError::InvalidInput(format!("node set '{set}' is empty")));
    }
    Ok(values.iter().map(|u| u[axis]).sum::<f64>() / values.len() as f64)
}

fn baseline(value: f64, what: &str) -> AuxeticResult<f64> {
    if value.abs() < f64::EPSILON {
        return Err(AuxeticError::DegenerateStrain {
            frame_id: 0,
            reason: format!("{what} baseline length is zero"),
        });
    }
    Ok(value)
}

/// Reduce an output database to the strain and Poisson's ratio history
pub fn reduce_single(
    odb: &dyn OutputDatabase,
    sets: &BoundarySets,
    structure: &str,
) -> AuxeticResult<ResultsTable> {
    log::info!("Calculating the numerical output for {}", structure);
    let ld = sets.loading_axis.index();
    let td = sets.transverse_axis.index();

    let frames = odb.frames();
    if frames.is_empty() {
        return Err(AuxeticError::InvalidInput(format!(
            "output database of '{structure}' has no frames"
        )));
    }

    let ld_0 = baseline(
        first_coord(odb, &sets.ld_edge_2, ld)? - first_coord(odb, &sets.ld_edge_1, ld)?,
        "loading",
    )?;
    let mid_0 = baseline(
        first_coord(odb, &sets.mid_vertice_2, td)? - first_coord(odb, &sets.mid_vertice_1, td)?,
        "midpoint",
    )?;
    let mean_0 = baseline(
        first_coord(odb, &sets.td_edge_2, td)? - first_coord(odb, &sets.td_edge_1, td)?,
        "transverse edge",
    )?;

    let mut rows: Vec<ResultRow> = Vec::with_capacity(frames.len());
    for (k, frame) in frames.iter().enumerate() {
        let u_ld = first_disp(odb, &sets.ld_edge_2, frame.id, ld)?
            - first_disp(odb, &sets.ld_edge_1, frame.id, ld)?;
        let u_td_midpoint = first_disp(odb, &sets.mid_vertice_2, frame.id, td)?
            - first_disp(odb, &sets.mid_vertice_1, frame.id, td)?;
        let u_td_mean = mean_disp(odb, &sets.td_edge_2, frame.id, td)?
            - mean_disp(odb, &sets.td_edge_1, frame.id, td)?;

        let mut row = ResultRow {
            frame_id: frame.id,
            time: frame.time,
            u_ld,
            u_td_mean,
            u_td_midpoint,
            strain_ld: 0.0,
            strain_td_mean: 0.0,
            strain_td_midpoint: 0.0,
            poisson_midpoint: 0.0,
            poisson_mean: 0.0,
        };
        if let Some(prev) = rows.last() {
            row.strain_ld = (u_ld - prev.u_ld) / ld_0;
            row.strain_td_midpoint = (u_td_midpoint - prev.u_td_midpoint) / mid_0;
            row.strain_td_mean = (u_td_mean - prev.u_td_mean) / mean_0;
            if row.strain_ld == 0.0 {
                return Err(AuxeticError::DegenerateStrain {
                    frame_id: frame.id,
                    reason: "loading strain increment is zero".to_string(),
                });
            }
            row.poisson_midpoint = -row.strain_td_midpoint / row.strain_ld;
            row.poisson_mean = -row.strain_td_mean / row.strain_ld;
        }
        log::debug!("Calculated the output data for frame {} (t={:.2})", k, frame.time);
        rows.push(row);
    }

    Ok(ResultsTable {
        structure: structure.to_string(),
        rows,
    })
}

/// One structure of a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchEntry {
    pub run_id: usize,
    pub structure: String,
    pub params: UnitCellParams,
    pub row: ResultRow,
}

/// Results of several structures at one model time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchTable {
    pub target_time: f64,
    pub entries: Vec<BatchEntry>,
}

/// Collect the row at `target_time` from every table; run ids are 1-based
pub fn aggregate_batch(
    tables: &[ResultsTable],
    target_time: f64,
    params: &[UnitCellParams],
) -> AuxeticResult<BatchTable> {
    if tables.len() != params.len() {
        return Err(AuxeticError::InvalidInput(format!(
            "{} result tables for {} parameter sets",
            tables.len(),
            params.len()
        )));
    }
    if let Some(first) = params.first() {
        if let Some(other) = params.iter().find(|p| !p.same_variant(first)) {
            return Err(AuxeticError::InvalidInput(format!(
                "batch mixes '{}' and '{}' parameter variants",
                first.variant_name(),
                other.variant_name()
            )));
        }
    }
    log::info!("Assembling results of {} analyses at t={:.2}", tables.len(), target_time);

    let entries = tables
        .iter()
        .zip(params)
        .enumerate()
        .map(|(k, (table, p))| {
            let row = table
                .row_at_time(target_time)
                .ok_or_else(|| AuxeticError::NoMatchingTimeRow {
                    time: target_time,
                    structure: table.structure.clone(),
                })?;
            Ok(BatchEntry {
                run_id: k + 1,
                structure: table.structure.clone(),
                params: *p,
                row: *row,
            })
        })
        .collect::<AuxeticResult<Vec<_>>>()?;

    Ok(BatchTable {
        target_time,
        entries,
    })
}

impl BatchTable {
    pub fn to_csv(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("{}\n", banner()));
        s.push_str("Results of batch analysis.\n");
        s.push_str(&format!("Model Time = {:.2}.\n", self.target_time));

        let mut header = vec!["Run #"];
        if let Some(first) = self.entries.first() {
            header.extend(first.params.field_names().iter().copied());
        }
        header.extend(RESULT_COLUMNS[2..].iter().copied());
        s.push_str(&format!("{}\n", header.join(DELIMITER)));

        for entry in &self.entries {
            let mut fields = vec![entry.run_id.to_string()];
            fields.extend(entry.params.field_values().iter().map(|v| format!("{v:.6}")));
            fields.extend(entry.row.values().iter().map(|v| format!("{v:.8}")));
            s.push_str(&format!("{}\n", fields.join(DELIMITER)));
        }
        s
    }

    /// Write `<folder>/batch results.csv`
    pub fn write_to_folder(&self, folder: &Path) -> AuxeticResult<PathBuf> {
        let path = folder.join("batch results.csv");
        write_atomic(&path, &self.to_csv())?;
        log::info!("Exported results of {} analyses at t={:.2}", self.entries.len(), self.target_time);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Axis;
    use crate::kernel::RecordedOutput;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    /// Output of a rectangle `length x width` stretched along X with contraction `nu`
    fn affine_output(length: f64, width: f64, strains: &[f64], nu: f64) -> RecordedOutput {
        let mut odb = RecordedOutput::new()
            .with_node_set("LD-Edge-1", vec![[0.0, 0.0, 0.0], [0.0, width, 0.0]])
            .with_node_set("LD-Edge-2", vec![[length, 0.0, 0.0], [length, width, 0.0]])
            .with_node_set("TD-Edge-1", vec![[0.0, 0.0, 0.0], [length, 0.0, 0.0]])
            .with_node_set("TD-Edge-2", vec![[0.0, width, 0.0], [length, width, 0.0]])
            .with_node_set("Mid-Vertice-1", vec![[length / 2.0, 0.0, 0.0]])
            .with_node_set("Mid-Vertice-2", vec![[length / 2.0, width, 0.0]]);
        let sets = odb.node_sets.clone();
        for (k, e) in strains.iter().enumerate() {
            let mut frame = BTreeMap::new();
            for (name, nodes) in &sets {
                let u = nodes
                    .iter()
                    .map(|c| [e * c[0], -nu * e * (c[1] - width / 2.0), 0.0])
                    .collect();
                frame.insert(name.clone(), u);
            }
            odb.push_frame(k as f64 * 0.25, frame);
        }
        odb
    }

    #[test]
    fn test_first_row_is_zero() {
        let odb = affine_output(20.0, 10.0, &[0.0, 0.01, 0.02], -0.4);
        let sets = BoundarySets::new(Axis::X, Axis::Y);
        let table = reduce_single(&odb, &sets, "s").unwrap();
        let first = table.rows[0];
        assert_eq!(first.strain_ld, 0.0);
        assert_eq!(first.poisson_mean, 0.0);
        assert_eq!(first.poisson_midpoint, 0.0);
    }

    #[test]
    fn test_incremental_strain_and_poisson() {
        let odb = affine_output(20.0, 10.0, &[0.0, 0.01, 0.03], -0.4);
        let sets = BoundarySets::new(Axis::X, Axis::Y);
        let table = reduce_single(&odb, &sets, "s").unwrap();
        assert_eq!(table.rows.len(), 3);

        let row = table.rows[2];
        assert_relative_eq!(row.u_ld, 0.6, epsilon = 1e-12);
        // Strain is computed from the increment, not the total
        assert_relative_eq!(row.strain_ld, 0.02, epsilon = 1e-12);
        assert_relative_eq!(row.strain_td_mean, 0.008, epsilon = 1e-12);
        assert_relative_eq!(row.poisson_mean, -0.4, epsilon = 1e-9);
        assert_relative_eq!(row.poisson_midpoint, -0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_loading_increment_is_degenerate() {
        let odb = affine_output(20.0, 10.0, &[0.0, 0.01, 0.01], 0.3);
        let sets = BoundarySets::new(Axis::X, Axis::Y);
        let err = reduce_single(&odb, &sets, "s").unwrap_err();
        assert!(matches!(err, AuxeticError::DegenerateStrain { frame_id: 2, .. }));
    }

    #[test]
    fn test_csv_layout_and_parse_back() {
        let odb = affine_output(20.0, 10.0, &[0.0, 0.01], -0.4);
        let sets = BoundarySets::new(Axis::X, Axis::Y);
        let table = reduce_single(&odb, &sets, "lattice").unwrap();
        let csv = table.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[0].starts_with("Modeling and post-processing done by"));
        assert_eq!(lines[1], RESULT_COLUMNS.join(", "));
        assert!(lines[3].starts_with("1, 0.25, 0.20000000, "));

        let parsed = ResultsTable::parse_csv(&csv, "lattice").unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_relative_eq!(parsed.rows[1].poisson_mean, -0.4, epsilon = 1e-8);
    }

    #[test]
    fn test_batch_selects_time_rows() {
        let sets = BoundarySets::new(Axis::X, Axis::Y);
        let tables: Vec<ResultsTable> = [-0.2, -0.3]
            .iter()
            .enumerate()
            .map(|(k, nu)| {
                let odb = affine_output(20.0, 10.0, &[0.0, 0.01, 0.02, 0.03, 0.04], *nu);
                reduce_single(&odb, &sets, &format!("b-{:03}", k + 1)).unwrap()
            })
            .collect();
        let params = [box_params(1), box_params(2)];

        let batch = aggregate_batch(&tables, 1.0, &params).unwrap();
        assert_eq!(batch.entries.len(), 2);
        assert_eq!(batch.entries[1].run_id, 2);
        assert_relative_eq!(batch.entries[1].row.poisson_mean, -0.3, epsilon = 1e-9);

        let csv = batch.to_csv();
        let header = csv.lines().nth(3).unwrap();
        assert!(header.starts_with("Run #, extrusion_depth, horz_bounding_box"));
        assert!(header.ends_with("poisson_midpoint, poisson_mean"));

        let missing = aggregate_batch(&tables, 0.6, &params).unwrap_err();
        assert!(matches!(missing, AuxeticError::NoMatchingTimeRow { .. }));
    }

    fn box_params(id: u32) -> UnitCellParams {
        UnitCellParams::BoundingBox(crate::unit_cell::BoundingBoxParams {
            id,
            extrusion_depth: 1.0,
            horz_bounding_box: 10.0,
            vert_bounding_box: 8.0,
            vert_strut_thickness: 1.0,
            diag_strut_thickness: 0.5,
            diag_strut_angle: 60.0,
        })
    }
}
