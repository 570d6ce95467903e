use crate::cell::Cell;
use crate::config::DumpFormat;
use crate::error::{DumpError, GenomeError};
use crate::genome::Genome;
use crate::lattice::{Coord, Lattice};
use anyhow::{Context, Result};
use serde::{Serialize, Deserialize};

/// Population totals recorded once per generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub generation: u32,
    /// `(population name, total genomes)`, host first.
    pub populations: Vec<(String, usize)>,
}

impl Snapshot {
    pub fn total(&self, population: &str) -> Option<usize> {
        self.populations
            .iter()
            .find(|(name, _)| name == population)
            .map(|&(_, total)| total)
    }
}

/// Serializable dump of one lattice: `cells[x][y]` lists the cell's genomes as bit strings.
/// Reading a dump back yields a lattice identical to the one that was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeDump {
    pub population: String,
    pub generation: u32,
    pub width: usize,
    pub capacity: usize,
    pub genome_length: usize,
    pub cells: Vec<Vec<Vec<Genome>>>,
}

impl LatticeDump {
    pub fn from_lattice(population: &str, generation: u32, genome_length: usize, lattice: &Lattice) -> Self {
        let width = lattice.width();
        let cells = (0..width)
            .map(|x| {
                (0..width)
                    .map(|y| lattice.cell(Coord::new(x, y)).genomes().to_vec())
                    .collect()
            })
            .collect();
        Self {
            population: population.to_string(),
            generation,
            width,
            capacity: lattice.capacity(),
            genome_length,
            cells,
        }
    }

    pub fn to_bytes(&self, format: DumpFormat) -> Result<Vec<u8>> {
        let bytes = match format {
            DumpFormat::Json => serde_json::to_vec(self)?,
            DumpFormat::Bincode => bincode::serialize(self)?,
            DumpFormat::MessagePack => rmp_serde::to_vec(self)?,
        };
        Ok(bytes)
    }

    pub fn from_bytes(format: DumpFormat, bytes: &[u8]) -> Result<Self> {
        let dump = match format {
            DumpFormat::Json => serde_json::from_slice(bytes).context("Failed to parse JSON dump")?,
            DumpFormat::Bincode => bincode::deserialize(bytes).context("Failed to parse bincode dump")?,
            DumpFormat::MessagePack => rmp_serde::from_slice(bytes).context("Failed to parse MessagePack dump")?,
        };
        Ok(dump)
    }

    /// Rebuilds the lattice, checking the shape, capacity and genome lengths against the header.
    pub fn into_lattice(self) -> Result<Lattice, DumpError> {
        let width = self.width;
        if self.cells.len() != width {
            return Err(DumpError::WidthMismatch { declared: width, found: self.cells.len() });
        }
        let mut lattice = Lattice::new(width, self.capacity);
        for (x, row) in self.cells.into_iter().enumerate() {
            if row.len() != width {
                return Err(DumpError::WidthMismatch { declared: width, found: row.len() });
            }
            for (y, genomes) in row.into_iter().enumerate() {
                if let Some(bad) = genomes.iter().find(|g| g.len() != self.genome_length) {
                    return Err(DumpError::Genome {
                        x,
                        y,
                        source: GenomeError::LengthMismatch { left: bad.len(), right: self.genome_length },
                    });
                }
                let cell = Cell::with_genomes(genomes, self.capacity).map_err(|genomes| DumpError::OverCapacity {
                    x,
                    y,
                    size: genomes.len(),
                    capacity: self.capacity,
                })?;
                lattice.replace_cell(Coord::new(x, y), cell);
            }
        }
        Ok(lattice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Seeding;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn dump_restores_the_same_lattice() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut lattice = Lattice::new(12, 6);
        lattice.seed(&Seeding::Disk { radius: 4.0 }, 8, &mut rng);
        let dump = LatticeDump::from_lattice("human", 3, 8, &lattice);
        assert_eq!(dump.cells.len(), 12);
        assert_eq!(dump.cells[6][6].len(), 6);
        assert_eq!(dump.into_lattice().unwrap(), lattice);
    }

    #[test]
    fn every_format_reads_back_what_it_wrote() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut lattice = Lattice::new(6, 3);
        lattice.seed(&Seeding::Square, 5, &mut rng);
        let dump = LatticeDump::from_lattice("lang", 7, 5, &lattice);
        for format in [DumpFormat::Json, DumpFormat::Bincode, DumpFormat::MessagePack] {
            let bytes = dump.to_bytes(format).unwrap();
            assert_eq!(LatticeDump::from_bytes(format, &bytes).unwrap(), dump, "{:?}", format);
        }
    }

    #[test]
    fn json_dump_is_nested_bit_strings() {
        let mut lattice = Lattice::new(1, 2);
        lattice.replace_cell(
            Coord::new(0, 0),
            Cell::with_genomes(vec!["101".parse().unwrap(), "000".parse().unwrap()], 2).unwrap(),
        );
        let json = String::from_utf8(LatticeDump::from_lattice("human", 0, 3, &lattice).to_bytes(DumpFormat::Json).unwrap()).unwrap();
        assert!(json.contains(r#""cells":[[["101","000"]]]"#), "{}", json);
    }

    #[test]
    fn rejects_overfull_cells_and_ragged_rows() {
        let genome: Genome = "01".parse().unwrap();
        let mut dump = LatticeDump {
            population: "crop".into(),
            generation: 0,
            width: 1,
            capacity: 1,
            genome_length: 2,
            cells: vec![vec![vec![genome.clone(), genome.clone()]]],
        };
        assert!(matches!(
            dump.clone().into_lattice(),
            Err(DumpError::OverCapacity { size: 2, capacity: 1, .. })
        ));
        dump.cells = vec![vec![]];
        assert!(matches!(
            dump.clone().into_lattice(),
            Err(DumpError::WidthMismatch { declared: 1, found: 0 })
        ));
        dump.cells = Vec::new();
        assert!(matches!(
            dump.clone().into_lattice(),
            Err(DumpError::WidthMismatch { declared: 1, found: 0 })
        ));
        dump.cells = vec![vec![vec!["011".parse().unwrap()]]];
        assert!(matches!(dump.into_lattice(), Err(DumpError::Genome { x: 0, y: 0, .. })));
    }

    #[test]
    fn replayed_cells_land_at_their_dumped_coordinates() {
        let genome = |bits: &str| -> Genome { bits.parse().unwrap() };
        let dump = LatticeDump {
            population: "human".into(),
            generation: 2,
            width: 2,
            capacity: 2,
            genome_length: 2,
            cells: vec![
                vec![vec![genome("01")], vec![]],
                vec![vec![genome("10"), genome("11")], vec![]],
            ],
        };
        let lattice = dump.into_lattice().unwrap();
        assert_eq!(lattice.width(), 2);
        assert_eq!(lattice.capacity(), 2);
        assert_eq!(lattice.cell(Coord::new(0, 0)).len(), 1);
        assert!(lattice.cell(Coord::new(0, 1)).is_empty());
        assert_eq!(lattice.cell(Coord::new(1, 0)).genomes()[1].to_string(), "11");
        assert_eq!(lattice.total_population(), 3);
    }

    #[test]
    fn snapshot_looks_up_totals_by_name() {
        let snapshot = Snapshot {
            generation: 4,
            populations: vec![("human".into(), 120), ("crop".into(), 40)],
        };
        assert_eq!(snapshot.total("crop"), Some(40));
        assert_eq!(snapshot.total("lang"), None);
    }
}
