use std::fs;
use std::path::Path;

use approx::assert_relative_eq;
use auxetic_lattice::kernel::SyntheticResponse;
use auxetic_lattice::pattern::{assemble, AssemblyOptions, PartFlavor};
use auxetic_lattice::prelude::*;

fn box_cell(id: u32, vert_strut_thickness: f64, diag_strut_angle: f64) -> UnitCellParams {
    UnitCellParams::BoundingBox(BoundingBoxParams {
        id,
        extrusion_depth: 2.0,
        horz_bounding_box: 20.0,
        vert_bounding_box: 24.0,
        vert_strut_thickness,
        diag_strut_thickness: 1.5,
        diag_strut_angle,
    })
}

fn build_nonuniform_config(root: &Path, name: &str) -> RunConfig {
    // Checkerboard of two cells with the same outer size
    let structure_map = StructureMap::new(vec![vec![1, 2], vec![2, 1]]).unwrap();
    RunConfig {
        name: name.to_string(),
        unit_cells: vec![box_cell(1, 2.0, 60.0), box_cell(2, 2.0, 70.0)],
        pattern: PatternSpec::NonUniform { structure_map },
        loading: LoadingParams::displacement(Axis::X, 4.0),
        material: Some(MaterialParams::elastic(1.0e3, 0.3)),
        step: None,
        mesh: Some(MeshParams::new(1.0, ElementShape::Quad, "CPE4H")),
        job: JobParams::default(),
        output: OutputParams::default().with_result_folder(root),
        run_analysis: true,
    }
}

fn build_batch_config(root: &Path, angles: &[f64]) -> BatchConfig {
    BatchConfig {
        prefix: "sweep".to_string(),
        unit_cells: angles
            .iter()
            .enumerate()
            .map(|(k, angle)| box_cell(k as u32 + 1, 2.0, *angle))
            .collect(),
        num_cell_repeat: CellRepeat::new(2, 2),
        loading: LoadingParams::displacement(Axis::Y, 2.0),
        material: MaterialParams::elastic(1.0e3, 0.3),
        step: None,
        mesh: MeshParams::new(1.0, ElementShape::Quad, "CPE4H"),
        job: JobParams::default(),
        output: OutputParams {
            save_cae: false,
            save_odb: false,
            ..OutputParams::default().with_result_folder(root)
        },
        target_time: 1.0,
    }
}

#[test]
fn test_nonuniform_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = build_nonuniform_config(dir.path(), "checker");
    let mut kernel = MemoryKernel::new(dir.path().join("work"));
    let mut run_log = RunLog::to_file(dir.path().join("checker.log")).unwrap();

    let summary = run_single(&mut kernel, &config, &mut run_log).unwrap();
    assert_eq!(summary.state, StructureState::ResultsOutput);

    // two 20 mm columns and two ribbons of the vertical strut thickness
    let bb = summary.bounding_box.unwrap();
    assert_relative_eq!(bb.extent(Axis::X), 44.0, epsilon = 1e-6);
    assert_relative_eq!(bb.extent(Axis::Y), 48.0, epsilon = 1e-6);

    let folder = dir.path().join("checker");
    assert_eq!(summary.results_folder.as_deref(), Some(folder.as_path()));
    for file in [
        "checker results.csv",
        "checker.inp",
        "checker.msg",
        "checker.sta",
        "checker.odb",
        "checker.cae",
    ] {
        assert!(folder.join(file).exists(), "missing {file}");
    }
    assert!(!kernel.work_dir().join("checker.odb").exists());

    let inp = fs::read_to_string(folder.join("checker.inp")).unwrap();
    assert!(inp.starts_with("*Heading\n"));
    assert!(inp.contains("** Constraint: Constraint-RP2-X\n*Equation\n"));
    assert!(inp.contains("*Boundary\nRP-1, ENCASTRE\n"));
    let sta = fs::read_to_string(folder.join("checker.sta")).unwrap();
    assert_eq!(sta.lines().count(), 1 + 10 + 1);
    assert!(sta.ends_with("COMPLETED SUCCESSFULLY\n"));

    let table = summary.results.unwrap();
    let first = table.rows[0];
    assert_eq!(first.values(), [0.0; 8]);
    let last = table.last().unwrap();
    assert_relative_eq!(last.time, 1.0, epsilon = 1e-9);
    assert_relative_eq!(last.poisson_mean, -0.5, epsilon = 1e-6);
    assert_relative_eq!(last.poisson_midpoint, -0.5, epsilon = 1e-6);

    let reread = ResultsTable::read_csv(&folder.join("checker results.csv"), "checker").unwrap();
    assert_eq!(reread.rows.len(), table.rows.len());

    let log_text = fs::read_to_string(dir.path().join("checker.log")).unwrap();
    assert!(log_text.contains("Modeling and analysis of structure checker completed"));
}

#[test]
fn test_configured_poisson_ratio_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = build_nonuniform_config(dir.path(), "stiff");
    config.loading = LoadingParams::force(Axis::X, 50.0);
    let mut kernel = MemoryKernel::new(dir.path().join("work"))
        .with_response(SyntheticResponse { poisson_ratio: -0.8 });

    let summary = run_single(&mut kernel, &config, &mut RunLog::disabled()).unwrap();
    let last = *summary.results.unwrap().last().unwrap();
    assert!(last.strain_ld > 0.0);
    assert_relative_eq!(last.poisson_mean, -0.8, epsilon = 1e-6);
}

#[test]
fn test_export_requires_ribbon_width() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = build_nonuniform_config(dir.path(), "print");
    config.output.export_stl = true;
    let mut kernel = MemoryKernel::new(dir.path().join("work"));

    let err = run_single(&mut kernel, &config, &mut RunLog::disabled()).unwrap_err();
    assert!(matches!(err, AuxeticError::InvalidInput(_)));
    assert!(!dir.path().join("print").exists());

    config.output.export_ribbon_width = Some(3.0);
    config.output.export_stp = true;
    let mut kernel = MemoryKernel::new(dir.path().join("work"));
    run_single(&mut kernel, &config, &mut RunLog::disabled()).unwrap();
    assert!(dir.path().join("print").join("print.stl").exists());
    assert!(dir.path().join("print").join("print.stp").exists());
}

#[test]
fn test_existing_results_folder_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("taken")).unwrap();
    let config = build_nonuniform_config(dir.path(), "taken");
    let mut kernel = MemoryKernel::new(dir.path().join("work"));

    let err = run_single(&mut kernel, &config, &mut RunLog::disabled()).unwrap_err();
    assert!(matches!(err, AuxeticError::FolderExists(_)));
}

#[test]
fn test_degenerate_reduction_leaves_no_folder() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = build_nonuniform_config(dir.path(), "still");
    config.loading = LoadingParams::displacement(Axis::X, 0.0);
    let mut kernel = MemoryKernel::new(dir.path().join("work"));

    let err = run_single(&mut kernel, &config, &mut RunLog::disabled()).unwrap_err();
    assert!(matches!(err, AuxeticError::DegenerateStrain { .. }));
    assert!(!dir.path().join("still").exists());
}

#[test]
fn test_failed_job_stays_created() {
    let dir = tempfile::tempdir().unwrap();
    let config = build_nonuniform_config(dir.path(), "aborted");
    let mut kernel =
        MemoryKernel::new(dir.path().join("work")).with_job_outcome(JobStatus::Aborted);
    let loading = config.loading;

    let mut structure = AuxeticStructure::new(&mut kernel, &config.name, &loading).unwrap();
    structure.add_unit_cells(&config.unit_cells).unwrap();
    structure.add_pattern_params(&config.pattern).unwrap();
    structure.assemble_structure(true).unwrap();
    structure
        .assign_material(config.material.as_ref().unwrap())
        .unwrap();
    structure.define_step(&StepParams::default()).unwrap();
    structure.define_bcs(&loading).unwrap();
    structure.mesh_part(config.mesh.as_ref().unwrap()).unwrap();
    structure.create_job(&config.job).unwrap();

    let err = structure.submit_job().unwrap_err();
    match err {
        AuxeticError::JobFailed { name, status } => {
            assert_eq!(name, "aborted");
            assert_eq!(status, "ABORTED");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(structure.state(), StructureState::JobCreated);

    let err = structure.output_results(&config.output).unwrap_err();
    assert!(matches!(err, AuxeticError::OutOfOrder { .. }));
}

#[test]
fn test_unknown_map_id_fails_before_instancing() {
    let mut kernel = MemoryKernel::default();
    let loading = LoadingParams::displacement(Axis::X, 1.0);
    let mut structure = AuxeticStructure::new(&mut kernel, "unknown", &loading).unwrap();
    structure.add_unit_cells(&[box_cell(1, 2.0, 60.0)]).unwrap();

    let structure_map = StructureMap::new(vec![vec![1, 5]]).unwrap();
    let err = structure
        .add_pattern_params(&PatternSpec::NonUniform { structure_map })
        .unwrap_err();
    assert!(matches!(err, AuxeticError::UnitCellNotFound(5)));
    assert_eq!(structure.state(), StructureState::UnitCellsAdded);
    drop(structure);
    assert_eq!(kernel.instance_count(), 0);
}

// Same struts and angle, different thicknesses; every cell is 2 + 20 sin 60 by 26
fn full_cell(id: u32, diag_strut_thickness: f64, vert_strut_thickness: f64) -> UnitCellParams {
    UnitCellParams::Full(FullParams {
        id,
        extrusion_depth: 2.0,
        tail_strut_length: 8.0,
        tail_strut_thickness: 2.0,
        diag_strut_length: 10.0,
        diag_strut_thickness,
        diag_strut_angle: 60.0,
        vert_strut_length: 20.0,
        vert_strut_thickness,
    })
}

#[test]
fn test_full_cells_checkerboard_single_face() {
    let params = [
        full_cell(1, 1.0, 1.5),
        full_cell(2, 1.5, 2.0),
        full_cell(3, 2.0, 2.5),
    ];
    let cell_width = 2.0 + 20.0 * 60f64.to_radians().sin();

    let mut kernel = MemoryKernel::default();
    let mut cells = params
        .iter()
        .map(|p| UnitCell::new(*p))
        .collect::<AuxeticResult<Vec<_>>>()
        .unwrap();
    for cell in &cells {
        assert_relative_eq!(cell.bound_size[0], cell_width, epsilon = 1e-9);
        assert_relative_eq!(cell.bound_size[1], 26.0, epsilon = 1e-9);
    }
    let map = StructureMap::new(vec![vec![1, 2], vec![2, 1]]).unwrap();
    let options = AssemblyOptions {
        loading_axis: Axis::X,
        flavor: PartFlavor::Analysis,
        ribbon_width: None,
        delete_all: true,
    };
    let assembled = assemble(&mut kernel, &mut cells, &map, &options).unwrap();
    assert_eq!(kernel.face_count(assembled.part).unwrap(), 1);
    // ribbons take the widest vertical strut of the registered cells
    assert_relative_eq!(
        assembled.bounding_box.extent(Axis::X),
        2.0 * cell_width + 2.0 * 2.5,
        epsilon = 1e-6
    );
    assert_relative_eq!(assembled.bounding_box.extent(Axis::Y), 52.0, epsilon = 1e-6);

    let dir = tempfile::tempdir().unwrap();
    let mut config = build_nonuniform_config(dir.path(), "full-checker");
    config.unit_cells = params.to_vec();
    let mut kernel = MemoryKernel::new(dir.path().join("work"));
    let summary = run_single(&mut kernel, &config, &mut RunLog::disabled()).unwrap();
    assert_eq!(summary.state, StructureState::ResultsOutput);
    let last = *summary.results.unwrap().last().unwrap();
    assert_relative_eq!(last.poisson_mean, -0.5, epsilon = 1e-6);
}

#[test]
fn test_diagonal_map_is_rejected_as_disjoint() {
    let mut kernel = MemoryKernel::default();
    let loading = LoadingParams::displacement(Axis::X, 1.0);
    let mut structure = AuxeticStructure::new(&mut kernel, "diagonal", &loading).unwrap();
    structure.add_unit_cells(&[box_cell(1, 2.0, 60.0)]).unwrap();

    // cells meet only at a corner, where a re-entrant cell has no material
    let structure_map = StructureMap::new(vec![vec![1, 0], vec![0, 1]]).unwrap();
    structure
        .add_pattern_params(&PatternSpec::NonUniform { structure_map })
        .unwrap();

    let err = structure.assemble_structure(true).unwrap_err();
    assert!(matches!(err, AuxeticError::InvalidGeometry(_)));
    assert_eq!(structure.state(), StructureState::PatternSet);
}

#[test]
fn test_batch_rows_are_numbered_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = build_batch_config(dir.path(), &[60.0, 65.0, 70.0]);
    let mut kernel = MemoryKernel::new(dir.path().join("work"));

    let summary = run_batch(&mut kernel, &config, &mut RunLog::disabled()).unwrap();
    let ids: Vec<usize> = summary.table.entries.iter().map(|e| e.run_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    let names: Vec<&str> = summary
        .table
        .entries
        .iter()
        .map(|e| e.structure.as_str())
        .collect();
    assert_eq!(names, vec!["sweep-001", "sweep-002", "sweep-003"]);

    let batch_folder = dir.path().join("sweep-batch run");
    assert_eq!(summary.csv_path, batch_folder.join("batch results.csv"));
    assert!(batch_folder.join("sweep-002").join("sweep-002 results.csv").exists());

    let text = fs::read_to_string(&summary.csv_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4 + 3);
    assert_eq!(lines[1], "Results of batch analysis.");
    assert_eq!(lines[2], "Model Time = 1.00.");
    assert!(lines[3].starts_with("Run #, extrusion_depth, horz_bounding_box"));
    assert!(lines[6].starts_with("3, "));
}

#[test]
fn test_batch_folder_must_not_exist() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("sweep-batch run")).unwrap();
    let config = build_batch_config(dir.path(), &[60.0]);
    let mut kernel = MemoryKernel::new(dir.path().join("work"));

    let err = run_batch(&mut kernel, &config, &mut RunLog::disabled()).unwrap_err();
    assert!(matches!(err, AuxeticError::FolderExists(_)));
}
