use crate::error::GenomeError;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An 8-bit RGB triple.
pub type Rgb = [u8; 3];

pub const WHITE: Rgb = [255, 255, 255];

const WORD_BITS: usize = 64;

/// Fixed-length bit vector holding one individual's heritable trait state.
///
/// Bits past `len` in the last word are always zero, so word-wise comparisons
/// and popcounts never see stale data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Genome {
    words: Vec<u64>,
    len: usize,
}

impl Genome {
    /// All-zero genome of `len` bits.
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)],
            len,
        }
    }

    /// The zero-length genome. Stands in for the genotype of an empty cell.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut words = Vec::new();
        let mut len = 0;
        for bit in bits {
            if len % WORD_BITS == 0 {
                words.push(0);
            }
            if bit {
                words[len / WORD_BITS] |= 1u64 << (len % WORD_BITS);
            }
            len += 1;
        }
        Self { words, len }
    }

    /// Seeding policy: the number of set bits is drawn uniformly from `0..=len`,
    /// then that many positions are chosen uniformly without replacement.
    pub fn seed_random<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        let mut genome = Self::zeroed(len);
        let ones = rng.random_range(0..=len);
        for position in index::sample(rng, len, ones).iter() {
            genome.set(position, true);
        }
        genome
    }

    /// Copies this genome, flipping each bit independently with probability `mutation_rate`.
    /// One uniform draw is consumed per bit, in position order.
    pub fn make_child<R: Rng + ?Sized>(&self, mutation_rate: f64, rng: &mut R) -> Self {
        Self::from_bits(self.iter().map(|bit| {
            if rng.random::<f64>() < mutation_rate {
                !bit
            } else {
                bit
            }
        }))
    }

    /// Number of positions at which the two genomes differ.
    pub fn hamming_distance(&self, other: &Genome) -> Result<usize, GenomeError> {
        if self.len != other.len {
            return Err(GenomeError::LengthMismatch {
                left: self.len,
                right: other.len,
            });
        }
        Ok(self
            .words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| (a ^ b).count_ones() as usize)
            .sum())
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Fraction of set bits; 0.0 for the empty genome.
    pub fn bit_density(&self) -> f64 {
        if self.len == 0 {
            0.0
        } else {
            self.count_ones() as f64 / self.len as f64
        }
    }

    /// Single-genome color: darker blue as more bits are set. Empty genomes are white.
    pub fn density_color(&self) -> Rgb {
        if self.len == 0 {
            return WHITE;
        }
        let shade = (255.0 * self.bit_density()).round().clamp(0.0, 255.0) as u8;
        [255 - shade, 255 - shade, 255]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, position: usize) -> Option<bool> {
        (position < self.len).then(|| self.words[position / WORD_BITS] >> (position % WORD_BITS) & 1 == 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.words[i / WORD_BITS] >> (i % WORD_BITS) & 1 == 1)
    }

    fn set(&mut self, position: usize, bit: bool) {
        let mask = 1u64 << (position % WORD_BITS);
        if bit {
            self.words[position / WORD_BITS] |= mask;
        } else {
            self.words[position / WORD_BITS] &= !mask;
        }
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for Genome {
    type Err = GenomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .enumerate()
            .map(|(position, c)| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                found => Err(GenomeError::InvalidBit { position, found }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Genome::from_bits)
    }
}

// Genomes travel as bit strings ("0110...") in every dump format.
impl Serialize for Genome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Genome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = String::deserialize(deserializer)?;
        bits.parse().map_err(serde::de::Error::custom)
    }
}
