//! # tsforward-sim
//!
//! Forward-time Wright-Fisher simulation of diploid populations that
//! records the full ancestry of every simulated genome in tables of nodes,
//! edges and mutations.
//!
//! Modules:
//! - `base`: mutations, fitness values, the gamete arena, checked numerics
//! - `genome`: gametes and diploids
//! - `tables`: ancestry tables and the edge index used for counting
//! - `evolution`: mutation, recombination and parent sampling
//! - `genetic_values`: calculators, noise and trait-to-fitness maps
//! - `simulation`: the population and the generation loop

pub mod base;
pub mod errors;
pub mod evolution;
pub mod genetic_values;
pub mod genome;
pub mod prelude;
pub mod simulation;
pub mod tables;

pub use errors::SimError;
