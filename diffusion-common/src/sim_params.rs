use crate::error::ConfigError;
use crate::lattice::Seeding;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Per-generation probabilities for one population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationRates {
    pub birth_rate: f64,
    pub death_rate: f64,
    pub migration_rate: f64,
    pub mutation_rate: f64,
}

impl PopulationRates {
    /// Every trial becomes a no-op.
    pub const FROZEN: PopulationRates = PopulationRates {
        birth_rate: 0.0,
        death_rate: 0.0,
        migration_rate: 0.0,
        mutation_rate: 0.0,
    };

    fn validate(&self, population: &str) -> Result<(), ConfigError> {
        for (field, value) in [
            ("birth_rate", self.birth_rate),
            ("death_rate", self.death_rate),
            ("migration_rate", self.migration_rate),
            ("mutation_rate", self.mutation_rate),
        ] {
            check_unit_interval(population, field, value)?;
        }
        Ok(())
    }
}

/// A population whose migration is gated by the host's genotype similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependentParams {
    pub name: String,
    pub rates: PopulationRates,
    /// 0 lets every transmission through the gate, 1 accepts with probability `1 - divergence`.
    pub transmission_sensitivity: f64,
}

/// How one generation is applied to a lattice.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Cells are updated in visiting order; later cells see earlier migrations.
    #[default]
    Asynchronous,
    /// All cells update against the start-of-generation state, then migrants are delivered.
    Synchronous,
    /// Whole-lattice resampling with replacement; no spatial structure.
    Panmictic,
}

/// Order in which coordinates are visited within a generation.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VisitOrder {
    /// A fresh uniform permutation every generation.
    #[default]
    Shuffled,
    /// Row by row, identical every generation.
    Raster,
}

/// Fully resolved, immutable run parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub width: usize,
    pub capacity: usize,
    pub genome_length: usize,
    pub seed: u64,
    pub generations: u32,
    pub seeding: Seeding,
    pub update_mode: UpdateMode,
    pub visit_order: VisitOrder,
    pub host_name: String,
    pub host: PopulationRates,
    pub dependents: Vec<DependentParams>,
}

impl SimulationParameters {
    /// Rejects anything that would make the first generation ill-defined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 {
            return Err(ConfigError::NotPositive { field: "width" });
        }
        if self.capacity == 0 {
            return Err(ConfigError::NotPositive { field: "capacity" });
        }
        if self.genome_length == 0 {
            return Err(ConfigError::NotPositive { field: "genome_length" });
        }
        if self.generations == 0 {
            return Err(ConfigError::NotPositive { field: "generations" });
        }
        if let Seeding::Disk { radius } = self.seeding {
            // Also catches NaN.
            if !(radius > 0.0) {
                return Err(ConfigError::NotPositive { field: "seed_radius" });
            }
        }

        self.host.validate(&self.host_name)?;
        for dependent in &self.dependents {
            dependent.rates.validate(&dependent.name)?;
            check_unit_interval(
                &dependent.name,
                "transmission_sensitivity",
                dependent.transmission_sensitivity,
            )?;
        }

        if self.update_mode == UpdateMode::Panmictic && !self.dependents.is_empty() {
            return Err(ConfigError::PanmicticWithDependents(self.dependents.len()));
        }

        let mut names = HashSet::new();
        for name in self.population_names() {
            if !names.insert(name) {
                return Err(ConfigError::DuplicatePopulation(name.to_string()));
            }
        }
        Ok(())
    }

    /// Host first, then dependents in configuration order.
    pub fn population_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.host_name.as_str()).chain(self.dependents.iter().map(|d| d.name.as_str()))
    }
}

fn check_unit_interval(population: &str, field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RateOutOfRange {
            population: population.to_string(),
            field,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> PopulationRates {
        PopulationRates {
            birth_rate: 1.0,
            death_rate: 0.5,
            migration_rate: 0.1,
            mutation_rate: 0.02,
        }
    }

    fn params() -> SimulationParameters {
        SimulationParameters {
            width: 20,
            capacity: 10,
            genome_length: 8,
            seed: 1,
            generations: 5,
            seeding: Seeding::Disk { radius: 4.0 },
            update_mode: UpdateMode::Asynchronous,
            visit_order: VisitOrder::Shuffled,
            host_name: "human".into(),
            host: rates(),
            dependents: vec![DependentParams {
                name: "crop".into(),
                rates: rates(),
                transmission_sensitivity: 1.0,
            }],
        }
    }

    #[test]
    fn accepts_well_formed_parameters() {
        assert_eq!(params().validate(), Ok(()));
    }

    #[test]
    fn rejects_rates_outside_unit_interval() {
        let mut p = params();
        p.host.death_rate = 1.5;
        assert_eq!(
            p.validate(),
            Err(ConfigError::RateOutOfRange {
                population: "human".into(),
                field: "death_rate",
                value: 1.5
            })
        );

        let mut p = params();
        p.dependents[0].rates.migration_rate = -0.1;
        assert!(matches!(p.validate(), Err(ConfigError::RateOutOfRange { field: "migration_rate", .. })));

        let mut p = params();
        p.host.birth_rate = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_sensitivity() {
        let mut p = params();
        p.dependents[0].transmission_sensitivity = 2.0;
        assert!(matches!(
            p.validate(),
            Err(ConfigError::RateOutOfRange { field: "transmission_sensitivity", .. })
        ));
    }

    #[test]
    fn rejects_zero_dimensions() {
        let cases: [(fn(&mut SimulationParameters), &'static str); 4] = [
            (|p: &mut SimulationParameters| p.width = 0, "width"),
            (|p: &mut SimulationParameters| p.capacity = 0, "capacity"),
            (|p: &mut SimulationParameters| p.genome_length = 0, "genome_length"),
            (|p: &mut SimulationParameters| p.generations = 0, "generations"),
        ];
        for (mutate, field) in cases {
            let mut p = params();
            mutate(&mut p);
            assert_eq!(p.validate(), Err(ConfigError::NotPositive { field }));
        }
    }

    #[test]
    fn rejects_panmictic_mode_with_dependents() {
        let mut p = params();
        p.update_mode = UpdateMode::Panmictic;
        assert_eq!(p.validate(), Err(ConfigError::PanmicticWithDependents(1)));
        p.dependents.clear();
        assert_eq!(p.validate(), Ok(()));
    }

    #[test]
    fn rejects_duplicate_population_names() {
        let mut p = params();
        p.dependents[0].name = "human".into();
        assert_eq!(p.validate(), Err(ConfigError::DuplicatePopulation("human".into())));
    }
}
