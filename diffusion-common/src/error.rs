use thiserror::Error;

/// Errors raised by genome construction and comparison.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenomeError {
    #[error("genome length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("invalid bit '{found}' at position {position} (expected '0' or '1')")]
    InvalidBit { position: usize, found: char },
}

/// A simulation parameter that failed validation. Raised before the first generation runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{population}.{field} must be within [0, 1], got {value}")]
    RateOutOfRange {
        population: String,
        field: &'static str,
        value: f64,
    },
    #[error("{field} must be positive")]
    NotPositive { field: &'static str },
    #[error("panmictic update mode supports a single population, but {0} dependent population(s) are configured")]
    PanmicticWithDependents(usize),
    #[error("population name '{0}' is used more than once")]
    DuplicatePopulation(String),
}

/// A serialized lattice whose contents disagree with its own header.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("dump declares width {declared} but holds {found} rows/columns")]
    WidthMismatch { declared: usize, found: usize },
    #[error("cell ({x}, {y}) holds {size} genomes, capacity is {capacity}")]
    OverCapacity {
        x: usize,
        y: usize,
        size: usize,
        capacity: usize,
    },
    #[error("cell ({x}, {y}): {source}")]
    Genome {
        x: usize,
        y: usize,
        #[source]
        source: GenomeError,
    },
}
