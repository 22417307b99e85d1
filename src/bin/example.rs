//! Auxetic Lattice Example - Non-uniform Re-entrant Structure

use auxetic_lattice::prelude::*;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("=== Auxetic Lattice Example: Non-uniform Structure ===\n");

    // Four 20 x 24 cells that differ in strut thickness and angle
    //
    //     row 2:  3  4  4  3
    //     row 1:  1  2  2  1
    //     row 0:  1  2  2  1
    //
    let box_cell = |id, vert_thickness, angle| {
        UnitCellParams::BoundingBox(BoundingBoxParams {
            id,
            extrusion_depth: 5.0,
            horz_bounding_box: 20.0,
            vert_bounding_box: 24.0,
            vert_strut_thickness: vert_thickness,
            diag_strut_thickness: 1.5,
            diag_strut_angle: angle,
        })
    };
    let unit_cells = vec![
        box_cell(1, 3.0, 60.0),
        box_cell(2, 2.0, 60.0),
        box_cell(3, 2.0, 65.0),
        box_cell(4, 2.0, 70.0),
    ];
    let structure_map = StructureMap::from_rows_top_down(vec![
        vec![3, 4, 4, 3],
        vec![1, 2, 2, 1],
        vec![1, 2, 2, 1],
    ])
    .expect("Invalid structure map");

    let root = std::env::temp_dir().join("auxetic_example");
    let name = format!("nonuniform-{}", chrono::Local::now().format("%Y%m%d-%H%M%S"));

    let config = RunConfig {
        name: name.clone(),
        unit_cells,
        pattern: PatternSpec::NonUniform { structure_map },
        loading: LoadingParams::displacement(Axis::X, 20.0),
        material: Some(MaterialParams::elastic(2.0e3, 0.45).with_density(1.1e-9)),
        step: Some(StepParams::default()),
        mesh: Some(MeshParams::new(1.0, ElementShape::Quad, "CPE4H")),
        job: JobParams {
            num_cpus: 2,
            memory_percent: 80,
            ..JobParams::default()
        },
        output: OutputParams {
            export_ribbon_width: Some(4.0),
            export_stl: true,
            ..OutputParams::default().with_result_folder(&root)
        },
        run_analysis: true,
    };

    let mut kernel = MemoryKernel::new(root.join("work"));
    let mut run_log = RunLog::to_file(root.join(format!("{name}.log"))).expect("Failed to open log");

    let summary = run_single(&mut kernel, &config, &mut run_log).expect("Run failed");

    if let Some(bb) = summary.bounding_box {
        println!(
            "Structure '{}' assembled: {:.3} x {:.3}",
            summary.name,
            bb.extent(Axis::X),
            bb.extent(Axis::Y)
        );
    }

    let table = summary.results.expect("No results");
    println!("\n--- Results ---");
    println!(
        "{:>4} {:>6} {:>12} {:>12} {:>12}",
        "Inc", "Time", "strain_ld", "strain_td", "poisson"
    );
    for row in &table.rows {
        println!(
            "{:>4} {:>6.2} {:>12.6} {:>12.6} {:>12.6}",
            row.frame_id, row.time, row.strain_ld, row.strain_td_mean, row.poisson_mean
        );
    }

    if let Some(folder) = summary.results_folder {
        println!("\nResults written to {:?}", folder);
    }
    println!("\n=== Example Complete ===");
}
