pub mod cell;
pub mod config;
pub mod error;
pub mod genome;
pub mod lattice;
pub mod persist;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use cell::Cell;
pub use config::{DumpFormat, LatticeConfig, OutputConfig, PopulationConfig, RenderPolicy, RunConfig, SeedingKind, SimulationConfig};
pub use error::{ConfigError, DumpError, GenomeError};
pub use genome::{Genome, Rgb, WHITE};
pub use lattice::{Coord, Diagonal, Lattice, Seeding};
pub use persist::{dump_path, frame_path, write_atomic};
pub use sim_params::{DependentParams, PopulationRates, SimulationParameters, UpdateMode, VisitOrder};
pub use snapshot::{LatticeDump, Snapshot};
