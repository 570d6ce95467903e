use crate::dynamics::StepReport;
use crate::population_state::PopulationState;
use anyhow::{Context, Result};
use diffusion_common::{
    dump_path, frame_path, write_atomic, LatticeDump, OutputConfig, SimulationConfig, SimulationParameters, Snapshot,
};
use diffusion_visualizer::{render_scaled, PngEncoder};
use log::{debug, info, trace, warn};
use rand::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Drives a whole run: owns the host and dependent lattices, advances them one generation at a
/// time and persists what each generation looked like.
pub struct Simulation {
    params: SimulationParameters,
    output: OutputConfig,
    /// Host first, then dependents in configuration order.
    populations: Vec<PopulationState>,
    /// Single stream for seeding and the sequential update strategies.
    rng: StdRng,
    /// Number of generations applied so far.
    generation: u32,
    recorded_snapshots: Vec<Snapshot>,
    encoder: PngEncoder,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Self::with_parameters(config.get_sim_params(), config.output)
    }

    /// Validates `params`, then seeds every population from one generator, host first.
    pub fn with_parameters(params: SimulationParameters, output: OutputConfig) -> Result<Self> {
        params.validate().context("Invalid simulation parameters")?;
        if output.pixel_scale == 0 {
            anyhow::bail!("pixel_scale must be positive.");
        }
        if output.compression > 9 {
            anyhow::bail!("compression must be between 0 and 9, got {}.", output.compression);
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut populations = PopulationState::from_params(&params)?;
        for population in &mut populations {
            population
                .lattice
                .seed(&params.seeding, params.genome_length, &mut rng);
            info!(
                "Seeded '{}' with {} genomes on a {}x{} lattice.",
                population.name,
                population.total_population(),
                params.width,
                params.width
            );
        }

        let encoder = PngEncoder::new(output.compression);
        Ok(Self {
            params,
            output,
            populations,
            rng,
            generation: 0,
            recorded_snapshots: Vec::new(),
            encoder,
        })
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn populations(&self) -> &[PopulationState] {
        &self.populations
    }

    pub fn population(&self, name: &str) -> Option<&PopulationState> {
        self.populations.iter().find(|p| p.name == name)
    }

    pub fn population_totals(&self) -> Vec<(String, usize)> {
        self.populations
            .iter()
            .map(|p| (p.name.clone(), p.total_population()))
            .collect()
    }

    pub fn get_recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }

    fn output_dir(&self) -> &Path {
        Path::new(&self.output.directory)
    }

    /// Advances every population by one generation: the host first, then each dependent
    /// against the updated host. Reports come back in the same order.
    pub fn step(&mut self) -> Result<Vec<StepReport>> {
        let seed = self.params.seed;
        let generation = self.generation;
        let (host, dependents) = self
            .populations
            .split_first_mut()
            .context("Simulation has no populations.")?;

        let mut reports = Vec::with_capacity(1 + dependents.len());
        reports.push(host.step(None, &mut self.rng, seed, generation)?);
        for dependent in dependents.iter_mut() {
            let report = dependent
                .step(Some(&host.lattice), &mut self.rng, seed, generation)
                .with_context(|| format!("Generation {} failed for '{}'", generation + 1, dependent.name))?;
            reports.push(report);
        }

        for (population, report) in self.populations.iter().zip(&reports) {
            debug!("Generation {} '{}': {:?}", generation + 1, population.name, report);
        }
        self.generation += 1;
        Ok(reports)
    }

    /// Records the population totals of the current generation and writes its dumps and frames.
    pub fn record_snapshot(&mut self) -> Result<()> {
        let snapshot = Snapshot {
            generation: self.generation,
            populations: self.population_totals(),
        };

        for (name, total) in &snapshot.populations {
            let previous = self
                .recorded_snapshots
                .last()
                .and_then(|s| s.total(name))
                .unwrap_or(0);
            if *total == 0 && previous > 0 {
                warn!("Population '{}' died out at generation {}.", name, snapshot.generation);
            }
        }

        fs::create_dir_all(self.output_dir())
            .with_context(|| format!("Failed to create output directory '{}'", self.output.directory))?;
        if self.output.save_cells {
            self.write_dumps()?;
        }
        self.write_frames()?;

        let totals = snapshot
            .populations
            .iter()
            .map(|(name, total)| format!("{}: {}", name, total))
            .collect::<Vec<_>>()
            .join(" | ");
        info!("Generation {:04} | {}", snapshot.generation, totals);
        self.recorded_snapshots.push(snapshot);
        Ok(())
    }

    fn write_dumps(&self) -> Result<()> {
        let dir = self.output_dir();
        let format = self.output.format;
        for population in &self.populations {
            let dump = LatticeDump::from_lattice(
                &population.name,
                self.generation,
                self.params.genome_length,
                &population.lattice,
            );
            let path = dump_path(dir, &population.name, self.generation, format);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create '{}'", parent.display()))?;
            }
            write_atomic(&path, &dump.to_bytes(format)?)?;
            trace!("Wrote {}", path.display());
        }
        Ok(())
    }

    fn write_frames(&self) -> Result<()> {
        let dir = self.output_dir();
        let jobs: Vec<_> = self
            .populations
            .iter()
            .flat_map(|p| self.output.render_policies.iter().map(move |&policy| (p, policy)))
            .collect();
        jobs.par_iter().try_for_each(|&(population, policy)| -> Result<()> {
            let grid = render_scaled(&population.lattice, policy, self.output.pixel_scale);
            let path = frame_path(dir, &population.name, policy, self.generation);
            self.encoder
                .write_file(&path, &grid)
                .with_context(|| format!("Failed to write frame '{}'", path.display()))?;
            trace!("Wrote {}", path.display());
            Ok(())
        })
    }

    /// Writes the end-of-run artifacts: the resolved parameters and, if enabled, the
    /// per-generation population history. Returns the files written.
    pub fn finish(&self) -> Result<Vec<PathBuf>> {
        let dir = self.output_dir();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory '{}'", self.output.directory))?;
        let mut written = Vec::new();

        let params_path = dir.join("parameters.json");
        write_atomic(&params_path, &serde_json::to_vec_pretty(&self.params)?)?;
        info!("Run parameters saved to {}", params_path.display());
        written.push(params_path);

        if self.output.save_population_csv {
            let csv_path = dir.join("population.csv");
            write_atomic(&csv_path, &self.population_csv()?)?;
            info!(
                "Population history ({} generations) saved to {}",
                self.recorded_snapshots.len(),
                csv_path.display()
            );
            written.push(csv_path);
        } else {
            info!("Skipping population history as per config.");
        }
        Ok(written)
    }

    fn population_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = vec!["generation".to_string()];
        header.extend(self.populations.iter().map(|p| p.name.clone()));
        writer.write_record(&header)?;
        for snapshot in &self.recorded_snapshots {
            let mut record = vec![snapshot.generation.to_string()];
            record.extend(snapshot.populations.iter().map(|(_, total)| total.to_string()));
            writer.write_record(&record)?;
        }
        writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush population history: {}", e.error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diffusion_common::{
        DependentParams, DumpFormat, Lattice, PopulationRates, RenderPolicy, Seeding, UpdateMode, VisitOrder,
    };

    fn params() -> SimulationParameters {
        let rates = PopulationRates {
            birth_rate: 1.0,
            death_rate: 0.5,
            migration_rate: 0.1,
            mutation_rate: 0.02,
        };
        SimulationParameters {
            width: 12,
            capacity: 4,
            genome_length: 8,
            seed: 1234,
            generations: 3,
            seeding: Seeding::Disk { radius: 3.0 },
            update_mode: UpdateMode::Asynchronous,
            visit_order: VisitOrder::Shuffled,
            host_name: "human".into(),
            host: rates,
            dependents: vec![DependentParams {
                name: "crop".into(),
                rates,
                transmission_sensitivity: 1.0,
            }],
        }
    }

    fn output_in(dir: &Path) -> OutputConfig {
        OutputConfig {
            directory: dir.to_string_lossy().into_owned(),
            ..OutputConfig::default()
        }
    }

    #[test]
    fn invalid_parameters_stop_construction() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = params();
        p.host.migration_rate = -0.1;
        assert!(Simulation::with_parameters(p, output_in(dir.path())).is_err());
        let mut p = params();
        p.update_mode = UpdateMode::Panmictic;
        assert!(Simulation::with_parameters(p, output_in(dir.path())).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn output_settings_are_checked_like_loaded_configs() {
        let dir = tempfile::tempdir().unwrap();
        let too_strong = OutputConfig {
            compression: 10,
            ..output_in(dir.path())
        };
        let err = Simulation::with_parameters(params(), too_strong).err().unwrap();
        assert!(err.to_string().contains("compression"), "{}", err);

        let flat = OutputConfig {
            pixel_scale: 0,
            ..output_in(dir.path())
        };
        assert!(Simulation::with_parameters(params(), flat).is_err());

        let best = OutputConfig {
            compression: 9,
            ..output_in(dir.path())
        };
        assert!(Simulation::with_parameters(params(), best).is_ok());
    }

    #[test]
    fn seeding_fills_every_population() {
        let dir = tempfile::tempdir().unwrap();
        let sim = Simulation::with_parameters(params(), output_in(dir.path())).unwrap();
        // 25 cells lie strictly within distance 3 of (6, 6), 4 genomes each.
        assert_eq!(sim.population_totals(), vec![("human".into(), 100), ("crop".into(), 100)]);
        assert_ne!(sim.population("human").unwrap().lattice, sim.population("crop").unwrap().lattice);
    }

    #[test]
    fn snapshots_write_dumps_and_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut sim = Simulation::with_parameters(params(), output_in(dir.path())).unwrap();
        sim.record_snapshot().unwrap();
        sim.step().unwrap();
        sim.record_snapshot().unwrap();

        for name in ["human", "crop"] {
            let bytes = fs::read(dump_path(dir.path(), name, 1, DumpFormat::Json)).unwrap();
            let restored = LatticeDump::from_bytes(DumpFormat::Json, &bytes).unwrap().into_lattice().unwrap();
            assert_eq!(&restored, &sim.population(name).unwrap().lattice);
            for policy in [RenderPolicy::Genotype, RenderPolicy::Density] {
                let frame = image::open(frame_path(dir.path(), name, policy, 1)).unwrap();
                assert_eq!((frame.width(), frame.height()), (12, 12));
            }
        }
        let generations: Vec<u32> = sim.get_recorded_snapshots().iter().map(|s| s.generation).collect();
        assert_eq!(generations, vec![0, 1]);
    }

    #[test]
    fn finish_writes_parameters_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputConfig {
            save_cells: false,
            render_policies: Vec::new(),
            ..output_in(dir.path())
        };
        let mut sim = Simulation::with_parameters(params(), output).unwrap();
        sim.record_snapshot().unwrap();
        for _ in 0..2 {
            sim.step().unwrap();
            sim.record_snapshot().unwrap();
        }
        let written = sim.finish().unwrap();
        assert_eq!(written.len(), 2);

        let params_back: SimulationParameters =
            serde_json::from_slice(&fs::read(dir.path().join("parameters.json")).unwrap()).unwrap();
        assert_eq!(params_back, *sim.params());

        let mut reader = csv::Reader::from_path(dir.path().join("population.csv")).unwrap();
        let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(header, ["generation", "human", "crop"]);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][1], "100");
        let final_human: usize = rows[2][1].parse().unwrap();
        assert_eq!(final_human, sim.population("human").unwrap().total_population());
        assert!(!dir.path().join("human_cells").exists());
    }

    #[test]
    fn same_seed_same_run() {
        let run = |mode: UpdateMode| {
            let dir = tempfile::tempdir().unwrap();
            let mut p = params();
            p.update_mode = mode;
            let mut sim = Simulation::with_parameters(p, output_in(dir.path())).unwrap();
            for _ in 0..4 {
                sim.step().unwrap();
            }
            sim.populations().iter().map(|p| p.lattice.clone()).collect::<Vec<Lattice>>()
        };
        for mode in [UpdateMode::Asynchronous, UpdateMode::Synchronous] {
            assert_eq!(run(mode), run(mode));
        }
    }
}
