use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::lattice::Seeding;
use crate::sim_params::{DependentParams, PopulationRates, SimulationParameters, UpdateMode, VisitOrder};
use std::path::Path;

// Lattice geometry and initial layout
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LatticeConfig {
    #[serde(default = "default_width")]
    pub width: usize,
    /// Maximum number of genomes per cell (K).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub seeding: SeedingKind,
    /// Only used by disk seeding.
    #[serde(default = "default_seed_radius")]
    pub seed_radius: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeedingKind {
    #[default]
    Disk,
    Square,
}

// Run length, randomness and update strategy
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_generations")]
    pub generations: u32,
    #[serde(default = "default_genome_length")]
    pub genome_length: usize,
    #[serde(default)]
    pub update_mode: UpdateMode,
    #[serde(default)]
    pub visit_order: VisitOrder,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        LatticeConfig {
            width: default_width(),
            capacity: default_capacity(),
            seeding: SeedingKind::default(),
            seed_radius: default_seed_radius(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            seed: default_seed(),
            generations: default_generations(),
            genome_length: default_genome_length(),
            update_mode: UpdateMode::default(),
            visit_order: VisitOrder::default(),
        }
    }
}

// Rates for one population; the transmission sensitivity only matters for dependents
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PopulationConfig {
    pub name: String,
    #[serde(default = "default_birth_rate")]
    pub birth_rate: f64,
    #[serde(default = "default_death_rate")]
    pub death_rate: f64,
    #[serde(default = "default_migration_rate")]
    pub migration_rate: f64,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    #[serde(default = "default_transmission_sensitivity")]
    pub transmission_sensitivity: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    Json,
    Bincode,
    MessagePack,
}

impl DumpFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DumpFormat::Json => "json",
            DumpFormat::Bincode => "bin",
            DumpFormat::MessagePack => "msgpack",
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RenderPolicy {
    /// Consensus genotype color per cell.
    Genotype,
    /// Occupancy color per cell.
    Density,
}

impl RenderPolicy {
    pub fn label(self) -> &'static str {
        match self {
            RenderPolicy::Genotype => "genotype",
            RenderPolicy::Density => "density",
        }
    }
}

// Output settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Write a dump of every lattice each generation.
    #[serde(default = "default_true")]
    pub save_cells: bool,
    #[serde(default = "default_format")]
    pub format: DumpFormat,
    /// PNG frames written per population each generation. Empty disables rendering.
    #[serde(default = "default_render_policies")]
    pub render_policies: Vec<RenderPolicy>,
    /// Each cell becomes a `pixel_scale × pixel_scale` block.
    #[serde(default = "default_pixel_scale")]
    pub pixel_scale: u32,
    /// zlib level 0-9 for PNG frames.
    #[serde(default = "default_compression")]
    pub compression: u32,
    #[serde(default = "default_true")]
    pub save_population_csv: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: default_directory(),
            save_cells: true,
            format: default_format(),
            render_policies: default_render_policies(),
            pixel_scale: default_pixel_scale(),
            compression: default_compression(),
            save_population_csv: true,
        }
    }
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    #[serde(default)]
    pub lattice: LatticeConfig,
    #[serde(default)]
    pub run: RunConfig,
    pub host: PopulationConfig,
    #[serde(default)]
    pub dependents: Vec<PopulationConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads and validates the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.pixel_scale == 0 {
            anyhow::bail!("pixel_scale must be positive.");
        }
        if self.output.compression > 9 {
            anyhow::bail!("compression must be between 0 and 9, got {}.", self.output.compression);
        }
        self.get_sim_params().validate()?;
        Ok(())
    }

    /// Converts the configuration into the immutable parameters used at runtime.
    pub fn get_sim_params(&self) -> SimulationParameters {
        let seeding = match self.lattice.seeding {
            SeedingKind::Disk => Seeding::Disk { radius: self.lattice.seed_radius },
            SeedingKind::Square => Seeding::Square,
        };

        SimulationParameters {
            width: self.lattice.width,
            capacity: self.lattice.capacity,
            genome_length: self.run.genome_length,
            seed: self.run.seed,
            generations: self.run.generations,
            seeding,
            update_mode: self.run.update_mode,
            visit_order: self.run.visit_order,
            host_name: self.host.name.clone(),
            host: self.host.rates(),
            dependents: self
                .dependents
                .iter()
                .map(|d| DependentParams {
                    name: d.name.clone(),
                    rates: d.rates(),
                    transmission_sensitivity: d.transmission_sensitivity,
                })
                .collect(),
        }
    }
}

impl PopulationConfig {
    fn rates(&self) -> PopulationRates {
        PopulationRates {
            birth_rate: self.birth_rate,
            death_rate: self.death_rate,
            migration_rate: self.migration_rate,
            mutation_rate: self.mutation_rate,
        }
    }
}

fn default_width() -> usize { 100 }
fn default_capacity() -> usize { 10 }
fn default_seed_radius() -> f64 { 10.0 }
fn default_seed() -> u64 { 1234 }
fn default_generations() -> u32 { 100 }
fn default_genome_length() -> usize { 8 }
fn default_birth_rate() -> f64 { 1.0 }
fn default_death_rate() -> f64 { 0.5 }
fn default_migration_rate() -> f64 { 0.1 }
fn default_mutation_rate() -> f64 { 0.02 }
fn default_transmission_sensitivity() -> f64 { 1.0 }
fn default_directory() -> String { "out".to_string() }
fn default_format() -> DumpFormat { DumpFormat::Json }
fn default_render_policies() -> Vec<RenderPolicy> { vec![RenderPolicy::Genotype, RenderPolicy::Density] }
fn default_pixel_scale() -> u32 { 1 }
fn default_compression() -> u32 { 6 }
fn default_true() -> bool { true }
