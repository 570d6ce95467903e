use diffusion_common::{
    dump_path, frame_path, Cell, DumpFormat, Lattice, LatticeDump, OutputConfig, PopulationRates, RenderPolicy,
    SimulationConfig, SimulationParameters, UpdateMode,
};
use diffusion_visualizer::render;
use genetics_diffusion::Simulation;
use std::fs;
use std::path::Path;

fn quiet_output(dir: &Path) -> OutputConfig {
    OutputConfig {
        directory: dir.to_string_lossy().into_owned(),
        save_cells: false,
        render_policies: Vec::new(),
        save_population_csv: false,
        ..OutputConfig::default()
    }
}

fn config(dir: &Path, body: &str) -> SimulationConfig {
    let toml = format!("{}\n[output]\ndirectory = {:?}\n", body, dir.to_string_lossy());
    SimulationConfig::from_toml_str(&toml).unwrap()
}

fn params_from(body: &str) -> SimulationParameters {
    SimulationConfig::from_toml_str(body).unwrap().get_sim_params()
}

#[test]
fn frozen_rates_keep_every_lattice_bit_identical() {
    for mode in ["asynchronous", "synchronous"] {
        let dir = tempfile::tempdir().unwrap();
        let params = params_from(&format!(
            r#"
            [lattice]
            width = 16
            capacity = 5
            [run]
            genome_length = 8
            update_mode = "{}"
            [host]
            name = "human"
            birth_rate = 0.0
            death_rate = 0.0
            migration_rate = 0.0
            mutation_rate = 0.0
            "#,
            mode
        ));
        let mut sim = Simulation::with_parameters(params, quiet_output(dir.path())).unwrap();
        let start = sim.population("human").unwrap().lattice.clone();
        assert!(start.total_population() > 0);
        for _ in 0..30 {
            sim.step().unwrap();
        }
        assert_eq!(sim.population("human").unwrap().lattice, start, "{}", mode);
    }
}

#[test]
fn capacity_holds_for_every_population_every_generation() {
    for mode in ["asynchronous", "synchronous"] {
        let dir = tempfile::tempdir().unwrap();
        let params = params_from(&format!(
            r#"
            [lattice]
            width = 20
            capacity = 6
            seed_radius = 6.0
            [run]
            seed = 99
            update_mode = "{}"
            [host]
            name = "human"
            migration_rate = 0.6
            [[dependents]]
            name = "crop"
            migration_rate = 0.9
            transmission_sensitivity = 0.5
            [[dependents]]
            name = "lang"
            migration_rate = 0.9
            transmission_sensitivity = 0.0
            "#,
            mode
        ));
        let mut sim = Simulation::with_parameters(params, quiet_output(dir.path())).unwrap();
        for _ in 0..25 {
            sim.step().unwrap();
            for population in sim.populations() {
                assert!(population.lattice.cells().iter().all(|c| c.len() <= 6));
            }
        }
    }
}

#[test]
fn dependents_only_live_where_hosts_have_been() {
    // Hosts never move, so dependents cannot spread beyond the seeded disk.
    let dir = tempfile::tempdir().unwrap();
    let params = params_from(
        r#"
        [lattice]
        width = 24
        capacity = 4
        seed_radius = 4.0
        [host]
        name = "human"
        birth_rate = 1.0
        death_rate = 0.0
        migration_rate = 0.0
        [[dependents]]
        name = "crop"
        migration_rate = 1.0
        death_rate = 0.0
        transmission_sensitivity = 0.0
        "#,
    );
    let mut sim = Simulation::with_parameters(params, quiet_output(dir.path())).unwrap();
    for _ in 0..10 {
        sim.step().unwrap();
    }
    let host = &sim.population("human").unwrap().lattice;
    let crop = &sim.population("crop").unwrap().lattice;
    for (host_cell, crop_cell) in host.cells().iter().zip(crop.cells()) {
        if host_cell.is_empty() {
            assert!(crop_cell.is_empty());
        }
    }
}

#[test]
fn extinction_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let params = params_from(
        r#"
        [run]
        generations = 5
        [host]
        name = "human"
        birth_rate = 0.0
        death_rate = 1.0
        migration_rate = 0.0
        [[dependents]]
        name = "crop"
        birth_rate = 0.0
        death_rate = 1.0
        migration_rate = 0.0
        "#,
    );
    let mut sim = Simulation::with_parameters(params, quiet_output(dir.path())).unwrap();
    sim.record_snapshot().unwrap();
    for _ in 0..5 {
        sim.step().unwrap();
        sim.record_snapshot().unwrap();
    }
    let last = sim.get_recorded_snapshots().last().unwrap();
    assert_eq!(last.total("human"), Some(0));
    assert_eq!(last.total("crop"), Some(0));
}

#[test]
fn panmictic_runs_keep_the_occupancy_profile() {
    let dir = tempfile::tempdir().unwrap();
    let params = params_from(
        r#"
        [lattice]
        width = 30
        capacity = 8
        seeding = "square"
        [run]
        update_mode = "panmictic"
        [host]
        name = "human"
        "#,
    );
    let mut sim = Simulation::with_parameters(params, quiet_output(dir.path())).unwrap();
    let occupancy = |sim: &Simulation| -> Vec<usize> {
        sim.population("human").unwrap().lattice.cells().iter().map(Cell::len).collect()
    };
    let start = occupancy(&sim);
    for _ in 0..5 {
        sim.step().unwrap();
        assert_eq!(occupancy(&sim), start);
    }
}

#[test]
fn recorded_run_can_be_replayed_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(
        dir.path(),
        r#"
        [lattice]
        width = 18
        capacity = 5
        seed_radius = 5.0
        [run]
        generations = 3
        [host]
        name = "human"
        [[dependents]]
        name = "crop"
        "#,
    );
    let mut sim = Simulation::new(cfg).unwrap();
    sim.record_snapshot().unwrap();
    for _ in 0..3 {
        sim.step().unwrap();
        sim.record_snapshot().unwrap();
    }
    sim.finish().unwrap();

    for name in ["human", "crop"] {
        let bytes = fs::read(dump_path(dir.path(), name, 3, DumpFormat::Json)).unwrap();
        let lattice: Lattice = LatticeDump::from_bytes(DumpFormat::Json, &bytes)
            .unwrap()
            .into_lattice()
            .unwrap();
        assert_eq!(&lattice, &sim.population(name).unwrap().lattice);

        for policy in [RenderPolicy::Genotype, RenderPolicy::Density] {
            let decoded = image::open(frame_path(dir.path(), name, policy, 3)).unwrap().to_rgb8();
            let expected = render(&lattice, policy);
            assert_eq!(decoded.dimensions(), (18, 18));
            for (column, row, pixel) in decoded.enumerate_pixels() {
                assert_eq!(pixel.0, expected.get(row, column));
            }
        }
    }

    let csv = fs::read_to_string(dir.path().join("population.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "generation,human,crop");
    assert_eq!(lines.len(), 5);
    assert!(dir.path().join("parameters.json").exists());
}

#[test]
fn invalid_rates_are_rejected_before_any_generation() {
    let toml = r#"
        [host]
        name = "human"
        birth_rate = 1.2
    "#;
    assert!(SimulationConfig::from_toml_str(toml).is_err());

    let mut params = params_from("[host]\nname = \"human\"\n");
    params.host = PopulationRates { death_rate: f64::NAN, ..params.host };
    let dir = tempfile::tempdir().unwrap();
    assert!(Simulation::with_parameters(params, quiet_output(dir.path())).is_err());

    let mut params = params_from("[host]\nname = \"human\"\n[[dependents]]\nname = \"crop\"\n");
    params.update_mode = UpdateMode::Panmictic;
    assert!(Simulation::with_parameters(params, quiet_output(dir.path())).is_err());
}
