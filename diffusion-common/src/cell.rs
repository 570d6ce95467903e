use crate::genome::{Genome, Rgb, WHITE};
use rand::Rng;

/// Capacity-bounded multiset of genomes at one lattice position.
///
/// Storage order carries no meaning; removals use `swap_remove`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    genomes: Vec<Genome>,
    capacity: usize,
}

impl Cell {
    pub fn new(capacity: usize) -> Self {
        Self {
            genomes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Builds a cell from existing genomes, returning them back if they exceed `capacity`.
    pub fn with_genomes(genomes: Vec<Genome>, capacity: usize) -> Result<Self, Vec<Genome>> {
        if genomes.len() > capacity {
            return Err(genomes);
        }
        Ok(Self { genomes, capacity })
    }

    /// Clears the cell and fills it with `n` genomes from `factory`, never past capacity.
    pub fn seed<F: FnMut() -> Genome>(&mut self, n: usize, mut factory: F) {
        self.genomes.clear();
        self.genomes
            .extend(std::iter::repeat_with(&mut factory).take(n.min(self.capacity)));
    }

    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.genomes.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    /// Inserts `genome` if there is room, otherwise hands it back.
    pub fn try_insert(&mut self, genome: Genome) -> Result<(), Genome> {
        if self.is_full() {
            return Err(genome);
        }
        self.genomes.push(genome);
        Ok(())
    }

    /// Removes and returns a uniformly chosen genome. Consumes no randomness when empty.
    pub fn take_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Genome> {
        if self.genomes.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.genomes.len());
        Some(self.genomes.swap_remove(index))
    }

    /// A uniformly chosen genome, left in place.
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Genome> {
        if self.genomes.is_empty() {
            return None;
        }
        Some(&self.genomes[rng.random_range(0..self.genomes.len())])
    }

    /// Birth: appends a mutated copy of a random resident when the cell is nonempty and has room.
    pub fn breed<R: Rng + ?Sized>(&mut self, mutation_rate: f64, rng: &mut R) -> bool {
        if self.is_full() {
            return false;
        }
        match self.pick_random(rng) {
            Some(parent) => {
                let child = parent.make_child(mutation_rate, rng);
                self.genomes.push(child);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.genomes.clear();
    }

    /// Position-wise majority vote. A bit is set only when strictly more than half of the
    /// genomes carry it, so ties resolve to 0. Empty cells yield the empty genome.
    pub fn consensus_genotype(&self) -> Genome {
        let Some(first) = self.genomes.first() else {
            return Genome::empty();
        };
        let mut ones = vec![0usize; first.len()];
        for genome in &self.genomes {
            for (count, bit) in ones.iter_mut().zip(genome.iter()) {
                *count += usize::from(bit);
            }
        }
        let size = self.genomes.len();
        Genome::from_bits(ones.into_iter().map(|count| 2 * count > size))
    }

    /// Occupancy color: full cells are darkest blue, empty cells white.
    pub fn density_color(&self) -> Rgb {
        if self.capacity == 0 {
            return WHITE;
        }
        let shade = (self.genomes.len() * 255 / self.capacity).min(255) as u8;
        [255 - shade, 255 - shade, 255]
    }

    /// Consensus color, using the opposite polarity to `density_color`: more set bits
    /// render lighter. Empty cells are white.
    pub fn consensus_color(&self) -> Rgb {
        let consensus = self.consensus_genotype();
        if consensus.is_empty() {
            return WHITE;
        }
        let value = (consensus.count_ones() * 255 / consensus.len()).min(255) as u8;
        [value, value, 255]
    }
}
