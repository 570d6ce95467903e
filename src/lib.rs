pub mod coupling;
pub mod dynamics;
pub mod population_state;
pub mod simulation;

pub use coupling::{CrossPopulationCoupling, GateDecision, SimilarityGate};
pub use dynamics::{CoordinateOrder, PopulationDynamicsEngine, StepReport, StreamKey};
pub use population_state::{Dynamics, PopulationState};
pub use simulation::Simulation;
