//! Commonly used imports for convenience.
//!
//! # Example
//!
//! ```
//! use tsforward_sim::prelude::*;
//!
//! let mut sim = SimulationBuilder::new()
//!     .population_size(20)
//!     .neutral_mutation_rate(0.5)
//!     .seed(3)
//!     .build()
//!     .unwrap();
//! sim.run(5, |_: &Population, _: &mut SampleRecorder| {}).unwrap();
//! assert_eq!(sim.generation(), 5);
//! ```

pub use crate::base::{FitnessValue, Mutation, NumericErrorScope, NumericPolicy};
pub use crate::errors::SimError;
pub use crate::evolution::{Dfe, MutationConfig, RecombinationConfig, Region, Sregion};
pub use crate::genetic_values::{
    Calculator, FitnessMap, GeneticValueCalculator, GeneticValuePipeline, Noise, Optimum,
    ValueKind,
};
pub use crate::genome::{Diploid, DiploidMetadata, Gamete};
pub use crate::simulation::{
    GeneticValueConfig, ModelParams, Population, PrunePolicy, SampleRecorder, Simulation,
    SimulationBuilder,
};
pub use crate::tables::{TableCollection, NULL_NODE};
