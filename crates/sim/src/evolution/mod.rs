//! Evolutionary processes: mutation, recombination and parent sampling.
//!
//! - **Mutation**: Poisson numbers of new mutations in weighted regions
//! - **Recombination**: Poisson crossovers in weighted regions
//! - **Selection**: fitness-proportional Wright-Fisher parent sampling

pub mod mutation;
pub mod recombination;
mod region;
pub mod selection;

pub use mutation::{Dfe, MutationConfig, MutationModel, MutationRegions, Sregion};
pub use recombination::{RecombinationConfig, RecombinationModel, RecombinationRegions};
pub use region::Region;
pub use selection::ParentSampler;
