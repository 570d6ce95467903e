use crate::coupling::CrossPopulationCoupling;
use crate::dynamics::{PopulationDynamicsEngine, StepReport, StreamKey};
use diffusion_common::{Lattice, SimulationParameters};
use anyhow::Result;
use rand::Rng;

/// How a population's generation is computed.
#[derive(Debug, Clone)]
pub enum Dynamics {
    /// Free-standing population; also the host for every dependent.
    Host(PopulationDynamicsEngine),
    /// Gated by the host's genotypes.
    Dependent(CrossPopulationCoupling),
}

/// One tracked population: its lattice plus the rules that advance it.
#[derive(Debug, Clone)]
pub struct PopulationState {
    pub name: String,
    /// Position in the run (host 0, dependents from 1); keys the per-cell random streams.
    pub index: u64,
    pub lattice: Lattice,
    pub dynamics: Dynamics,
}

impl PopulationState {
    /// Builds the host followed by every dependent, each on an empty lattice.
    pub fn from_params(params: &SimulationParameters) -> Result<Vec<Self>> {
        let mut populations = Vec::with_capacity(1 + params.dependents.len());
        populations.push(Self {
            name: params.host_name.clone(),
            index: 0,
            lattice: Lattice::new(params.width, params.capacity),
            dynamics: Dynamics::Host(PopulationDynamicsEngine::new(
                params.host,
                params.update_mode,
                params.visit_order,
            )),
        });
        for (i, dependent) in params.dependents.iter().enumerate() {
            let coupling = CrossPopulationCoupling::new(
                dependent,
                params.update_mode,
                params.visit_order,
                params.genome_length,
            )?;
            populations.push(Self {
                name: dependent.name.clone(),
                index: i as u64 + 1,
                lattice: Lattice::new(params.width, params.capacity),
                dynamics: Dynamics::Dependent(coupling),
            });
        }
        Ok(populations)
    }

    pub fn total_population(&self) -> usize {
        self.lattice.total_population()
    }

    /// Advances one generation. Dependents need the host lattice as it stands after the host's
    /// own step; hosts ignore it.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        host: Option<&Lattice>,
        rng: &mut R,
        seed: u64,
        generation: u32,
    ) -> Result<StepReport> {
        let stream = StreamKey {
            seed,
            population: self.index,
            generation: u64::from(generation),
        };
        let report = match &self.dynamics {
            Dynamics::Host(engine) => engine.step(&mut self.lattice, rng, stream),
            Dynamics::Dependent(coupling) => {
                let Some(host) = host else {
                    anyhow::bail!("Dependent population '{}' stepped without a host lattice.", self.name);
                };
                coupling.step(&mut self.lattice, host, rng, stream)?
            }
        };
        Ok(report)
    }
}
