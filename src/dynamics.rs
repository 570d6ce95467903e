use diffusion_common::{Cell, Coord, Diagonal, Genome, Lattice, PopulationRates, UpdateMode, VisitOrder};
use log::trace;
use rand::prelude::*;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// What one generation did to one lattice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub births: u64,
    pub deaths: u64,
    /// Migrants (or transmitted copies) that reached their destination.
    pub migrations: u64,
    /// Host migrants removed from their cell but discarded because the destination was full.
    pub lost_migrants: u64,
    /// Dependent transmissions refused by the similarity gate or by occupancy.
    pub rejected_transmissions: u64,
}

impl AddAssign for StepReport {
    fn add_assign(&mut self, other: Self) {
        self.births += other.births;
        self.deaths += other.deaths;
        self.migrations += other.migrations;
        self.lost_migrants += other.lost_migrants;
        self.rejected_transmissions += other.rejected_transmissions;
    }
}

/// Strategy producing the coordinate visiting order for one generation.
pub trait CoordinateOrder {
    fn visiting_order<R: Rng + ?Sized>(&self, lattice: &Lattice, rng: &mut R) -> Vec<Coord>;
}

impl CoordinateOrder for VisitOrder {
    fn visiting_order<R: Rng + ?Sized>(&self, lattice: &Lattice, rng: &mut R) -> Vec<Coord> {
        let mut coords: Vec<Coord> = lattice.coords().collect();
        match self {
            VisitOrder::Shuffled => coords.shuffle(rng),
            VisitOrder::Raster => {}
        }
        coords
    }
}

/// Identifies an independent random stream for one cell of one population in one generation.
///
/// Used by the synchronous strategies so cells can be processed in any order, on any thread,
/// and still reproduce the same draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamKey {
    pub seed: u64,
    pub population: u64,
    pub generation: u64,
}

impl StreamKey {
    pub fn cell_rng(&self, index: usize) -> StdRng {
        let mut key = [0u8; 32];
        let words = [self.seed, self.population, self.generation, index as u64];
        for (chunk, word) in key.chunks_exact_mut(8).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        StdRng::from_seed(key)
    }
}

/// Migration trial for one host slot: with probability `migration_rate` a random resident
/// leaves toward a random diagonal.
pub(crate) fn emigration_trial<R: Rng + ?Sized>(
    rates: &PopulationRates,
    cell: &mut Cell,
    rng: &mut R,
) -> Option<(Diagonal, Genome)> {
    if rng.random::<f64>() >= rates.migration_rate {
        return None;
    }
    let migrant = cell.take_random(rng)?;
    Some((Diagonal::sample(rng), migrant))
}

pub(crate) fn birth_trial<R: Rng + ?Sized>(
    rates: &PopulationRates,
    cell: &mut Cell,
    rng: &mut R,
    report: &mut StepReport,
) {
    if rng.random::<f64>() < rates.birth_rate && cell.breed(rates.mutation_rate, rng) {
        report.births += 1;
    }
}

pub(crate) fn death_trial<R: Rng + ?Sized>(
    rates: &PopulationRates,
    cell: &mut Cell,
    rng: &mut R,
    report: &mut StepReport,
) {
    if rng.random::<f64>() < rates.death_rate && cell.take_random(rng).is_some() {
        report.deaths += 1;
    }
}

fn record_delivery(result: Result<(), Genome>, to: Coord, report: &mut StepReport) {
    match result {
        Ok(()) => report.migrations += 1,
        Err(migrant) => {
            report.lost_migrants += 1;
            trace!("Migrant {} discarded at full cell ({}, {})", migrant, to.x, to.y);
        }
    }
}

/// Applies one generation of migration, birth, death and mutation to a single lattice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationDynamicsEngine {
    rates: PopulationRates,
    mode: UpdateMode,
    order: VisitOrder,
}

impl PopulationDynamicsEngine {
    pub fn new(rates: PopulationRates, mode: UpdateMode, order: VisitOrder) -> Self {
        Self { rates, mode, order }
    }

    /// Runs the selected update strategy. `rng` drives the asynchronous and panmictic
    /// strategies; `stream` seeds the per-cell generators of the synchronous one.
    pub fn step<R: Rng + ?Sized>(&self, lattice: &mut Lattice, rng: &mut R, stream: StreamKey) -> StepReport {
        match self.mode {
            UpdateMode::Asynchronous => self.step_asynchronous(lattice, rng),
            UpdateMode::Synchronous => self.step_synchronous(lattice, stream),
            UpdateMode::Panmictic => self.step_panmictic(lattice, rng),
        }
    }

    /// Cells are processed one after another in visiting order. Each cell runs as many slots as
    /// it held genomes when its turn came; migrants land immediately, so cells visited later in
    /// the sweep see them.
    pub fn step_asynchronous<R: Rng + ?Sized>(&self, lattice: &mut Lattice, rng: &mut R) -> StepReport {
        let mut report = StepReport::default();
        for coord in self.order.visiting_order(lattice, rng) {
            // Work on an owned copy of the cell; nothing else can target it while it is out.
            let mut cell = lattice.replace_cell(coord, Cell::new(lattice.capacity()));
            for _ in 0..cell.len() {
                if let Some((direction, migrant)) = emigration_trial(&self.rates, &mut cell, rng) {
                    let dest = lattice.diagonal_neighbor(coord, direction);
                    let delivered = if dest == coord {
                        cell.try_insert(migrant)
                    } else {
                        lattice.cell_mut(dest).try_insert(migrant)
                    };
                    record_delivery(delivered, dest, &mut report);
                }
                birth_trial(&self.rates, &mut cell, rng, &mut report);
                death_trial(&self.rates, &mut cell, rng, &mut report);
            }
            lattice.replace_cell(coord, cell);
        }
        report
    }

    /// Every cell runs its slots against the start-of-generation lattice, in parallel. Migrants
    /// are collected, then delivered in raster order of their source once all cells are committed;
    /// deliveries into cells that filled up in the meantime are lost.
    pub fn step_synchronous(&self, lattice: &mut Lattice, stream: StreamKey) -> StepReport {
        let frozen: &Lattice = lattice;
        let outcomes: Vec<(Cell, Vec<(Coord, Genome)>, StepReport)> = (0..frozen.cells().len())
            .into_par_iter()
            .map(|index| {
                let coord = frozen.coord_of(index);
                let mut rng = stream.cell_rng(index);
                let mut cell = frozen.cell(coord).clone();
                let mut outbox = Vec::new();
                let mut report = StepReport::default();
                for _ in 0..cell.len() {
                    if let Some((direction, migrant)) = emigration_trial(&self.rates, &mut cell, &mut rng) {
                        let dest = frozen.diagonal_neighbor(coord, direction);
                        if dest == coord {
                            record_delivery(cell.try_insert(migrant), dest, &mut report);
                        } else {
                            outbox.push((dest, migrant));
                        }
                    }
                    birth_trial(&self.rates, &mut cell, &mut rng, &mut report);
                    death_trial(&self.rates, &mut cell, &mut rng, &mut report);
                }
                (cell, outbox, report)
            })
            .collect();

        let mut report = StepReport::default();
        let mut outboxes = Vec::with_capacity(outcomes.len());
        for (index, (cell, outbox, cell_report)) in outcomes.into_iter().enumerate() {
            let coord = lattice.coord_of(index);
            lattice.replace_cell(coord, cell);
            outboxes.push(outbox);
            report += cell_report;
        }
        for (dest, migrant) in outboxes.into_iter().flatten() {
            record_delivery(lattice.cell_mut(dest).try_insert(migrant), dest, &mut report);
        }
        report
    }

    /// Resamples the whole pool with replacement: every occupied cell is refilled with as many
    /// unmutated copies as it held, each drawn uniformly from all genomes on the lattice. Empty
    /// cells stay empty. Rates play no part, and the report stays zero.
    pub fn step_panmictic<R: Rng + ?Sized>(&self, lattice: &mut Lattice, rng: &mut R) -> StepReport {
        let pool: Vec<Genome> = lattice
            .cells()
            .iter()
            .flat_map(|cell| cell.genomes().iter().cloned())
            .collect();
        if pool.is_empty() {
            return StepReport::default();
        }
        let coords: Vec<Coord> = lattice.coords().collect();
        for coord in coords {
            let cell = lattice.cell_mut(coord);
            let occupancy = cell.len();
            if occupancy > 0 {
                cell.seed(occupancy, || pool[rng.random_range(0..pool.len())].clone());
            }
        }
        StepReport::default()
    }
}
