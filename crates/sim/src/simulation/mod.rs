//! Simulation engine and population management.
//!
//! - `Population`: every piece of evolving state, including the ancestry
//!   tables, mutation counts and fixations.
//! - `Simulation`: the Wright-Fisher engine that advances a population one
//!   generation at a time.
//! - `SimulationBuilder`: fluent construction over `ModelParams`.
//! - `SampleRecorder`: the buffer a sampling policy fills with individuals
//!   to preserve as ancient samples.

pub mod builder;
pub mod counting;
pub mod engine;
pub mod parameters;
pub mod population;
pub mod recorder;

pub use builder::SimulationBuilder;
pub use engine::Simulation;
pub use parameters::{GeneticValueConfig, ModelParams};
pub use population::{AncientTimepoint, Population, PrunePolicy};
pub use recorder::SampleRecorder;
