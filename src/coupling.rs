use crate::dynamics::{birth_trial, death_trial, CoordinateOrder, StepReport, StreamKey};
use diffusion_common::{
    Cell, ConfigError, Coord, DependentParams, Diagonal, Genome, GenomeError, Lattice, PopulationRates, UpdateMode,
    VisitOrder,
};
use log::trace;
use rand::prelude::*;
use rayon::prelude::*;

/// Outcome of offering one transmitted copy to a destination cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Accepted,
    DestinationFull,
    /// Nobody of the host population lives at the destination.
    NoHost,
    /// The host genotypes of source and destination were too far apart this time.
    Diverged,
}

/// Transmission gate for one dependent population against a fixed host lattice.
///
/// Host consensus genotypes are computed once, on construction; the host must not change while
/// the gate is in use.
pub struct SimilarityGate<'h> {
    host: &'h Lattice,
    consensus: Vec<Genome>,
    sensitivity: f64,
    genome_length: usize,
}

impl<'h> SimilarityGate<'h> {
    pub fn new(host: &'h Lattice, sensitivity: f64, genome_length: usize) -> Self {
        let consensus = host.cells().par_iter().map(Cell::consensus_genotype).collect();
        Self {
            host,
            consensus,
            sensitivity,
            genome_length,
        }
    }

    /// Fraction of positions where the host consensus genotypes at `from` and `to` differ.
    pub fn divergence(&self, from: Coord, to: Coord) -> Result<f64, GenomeError> {
        let source = &self.consensus[self.host.index_of(from)];
        let target = &self.consensus[self.host.index_of(to)];
        Ok(source.hamming_distance(target)? as f64 / self.genome_length as f64)
    }

    /// Always consumes exactly one uniform draw, then checks, in order: room at `destination`,
    /// a host presence at `to`, and `r <= 1 - divergence` with `r = uniform * sensitivity`.
    pub fn decide<R: Rng + ?Sized>(
        &self,
        destination: &Cell,
        from: Coord,
        to: Coord,
        rng: &mut R,
    ) -> Result<GateDecision, GenomeError> {
        let r = rng.random::<f64>() * self.sensitivity;
        if destination.is_full() {
            return Ok(GateDecision::DestinationFull);
        }
        if self.host.cell(to).is_empty() {
            return Ok(GateDecision::NoHost);
        }
        let p = 1.0 - self.divergence(from, to)?;
        Ok(if r <= p {
            GateDecision::Accepted
        } else {
            GateDecision::Diverged
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CouplingMode {
    Asynchronous,
    Synchronous,
}

/// Dynamics of a population that lives on top of a host population.
///
/// Per cell, the host's local head count sets the number of slots. Each slot may transmit a copy
/// of a random resident to a diagonal neighbor through the [`SimilarityGate`], then runs a birth
/// trial. Once the slots are done, every genome of the cell faces one death trial.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossPopulationCoupling {
    rates: PopulationRates,
    sensitivity: f64,
    genome_length: usize,
    mode: CouplingMode,
    order: VisitOrder,
}

impl CrossPopulationCoupling {
    /// Dependent populations need spatial structure, so the panmictic mode is refused.
    pub fn new(
        params: &DependentParams,
        mode: UpdateMode,
        order: VisitOrder,
        genome_length: usize,
    ) -> Result<Self, ConfigError> {
        let mode = match mode {
            UpdateMode::Asynchronous => CouplingMode::Asynchronous,
            UpdateMode::Synchronous => CouplingMode::Synchronous,
            UpdateMode::Panmictic => return Err(ConfigError::PanmicticWithDependents(1)),
        };
        Ok(Self {
            rates: params.rates,
            sensitivity: params.transmission_sensitivity,
            genome_length,
            mode,
            order,
        })
    }

    pub fn step<R: Rng + ?Sized>(
        &self,
        lattice: &mut Lattice,
        host: &Lattice,
        rng: &mut R,
        stream: StreamKey,
    ) -> Result<StepReport, GenomeError> {
        match self.mode {
            CouplingMode::Asynchronous => self.step_asynchronous(lattice, host, rng),
            CouplingMode::Synchronous => self.step_synchronous(lattice, host, stream),
        }
    }

    fn transmission_trial<R: Rng + ?Sized>(&self, cell: &Cell, rng: &mut R) -> Option<(Diagonal, Genome)> {
        if rng.random::<f64>() >= self.rates.migration_rate {
            return None;
        }
        let copy = cell.pick_random(rng)?.clone();
        Some((Diagonal::sample(rng), copy))
    }

    pub fn step_asynchronous<R: Rng + ?Sized>(
        &self,
        lattice: &mut Lattice,
        host: &Lattice,
        rng: &mut R,
    ) -> Result<StepReport, GenomeError> {
        let gate = SimilarityGate::new(host, self.sensitivity, self.genome_length);
        let mut report = StepReport::default();
        for coord in self.order.visiting_order(lattice, rng) {
            for _ in 0..host.cell(coord).len() {
                if let Some((direction, copy)) = self.transmission_trial(lattice.cell(coord), rng) {
                    let dest = lattice.diagonal_neighbor(coord, direction);
                    match gate.decide(lattice.cell(dest), coord, dest, rng)? {
                        GateDecision::Accepted => deliver(lattice.cell_mut(dest).try_insert(copy), dest, &mut report),
                        decision => reject(decision, coord, dest, &mut report),
                    }
                }
                birth_trial(&self.rates, lattice.cell_mut(coord), rng, &mut report);
            }
            let cell = lattice.cell_mut(coord);
            for _ in 0..cell.len() {
                death_trial(&self.rates, cell, rng, &mut report);
            }
        }
        Ok(report)
    }

    /// Slots run against the start-of-generation lattices; the gate checks room at the
    /// destination as it was then. Accepted copies are delivered afterwards in raster order of
    /// their source, and a copy that no longer fits is dropped as a rejected transmission.
    pub fn step_synchronous(
        &self,
        lattice: &mut Lattice,
        host: &Lattice,
        stream: StreamKey,
    ) -> Result<StepReport, GenomeError> {
        let gate = SimilarityGate::new(host, self.sensitivity, self.genome_length);
        let frozen: &Lattice = lattice;
        let outcomes = (0..frozen.cells().len())
            .into_par_iter()
            .map(|index| -> Result<(Cell, Vec<(Coord, Genome)>, StepReport), GenomeError> {
                let coord = frozen.coord_of(index);
                let mut rng = stream.cell_rng(index);
                let mut cell = frozen.cell(coord).clone();
                let mut outbox = Vec::new();
                let mut report = StepReport::default();
                for _ in 0..host.cell(coord).len() {
                    if let Some((direction, copy)) = self.transmission_trial(&cell, &mut rng) {
                        let dest = frozen.diagonal_neighbor(coord, direction);
                        let destination = if dest == coord { &cell } else { frozen.cell(dest) };
                        match gate.decide(destination, coord, dest, &mut rng)? {
                            GateDecision::Accepted if dest == coord => {
                                deliver(cell.try_insert(copy), dest, &mut report)
                            }
                            GateDecision::Accepted => outbox.push((dest, copy)),
                            decision => reject(decision, coord, dest, &mut report),
                        }
                    }
                    birth_trial(&self.rates, &mut cell, &mut rng, &mut report);
                }
                for _ in 0..cell.len() {
                    death_trial(&self.rates, &mut cell, &mut rng, &mut report);
                }
                Ok((cell, outbox, report))
            })
            .collect::<Result<Vec<_>, GenomeError>>()?;

        let mut report = StepReport::default();
        let mut outboxes = Vec::with_capacity(outcomes.len());
        for (index, (cell, outbox, cell_report)) in outcomes.into_iter().enumerate() {
            let coord = lattice.coord_of(index);
            lattice.replace_cell(coord, cell);
            outboxes.push(outbox);
            report += cell_report;
        }
        for (dest, copy) in outboxes.into_iter().flatten() {
            deliver(lattice.cell_mut(dest).try_insert(copy), dest, &mut report);
        }
        Ok(report)
    }
}

fn deliver(result: Result<(), Genome>, to: Coord, report: &mut StepReport) {
    match result {
        Ok(()) => report.migrations += 1,
        Err(_) => reject(GateDecision::DestinationFull, to, to, report),
    }
}

fn reject(decision: GateDecision, from: Coord, to: Coord, report: &mut StepReport) {
    report.rejected_transmissions += 1;
    trace!(
        "Transmission ({}, {}) -> ({}, {}) refused: {:?}",
        from.x,
        from.y,
        to.x,
        to.y,
        decision
    );
}
