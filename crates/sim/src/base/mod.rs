//! Base types shared by every other module.
//!
//! Mutations, fitness values, the gamete arena and checked numerics.

mod arena;
pub mod fitness;
mod mutation;
pub mod numeric;

pub use arena::{ArenaMark, GameteArena};
pub use fitness::FitnessValue;
pub use mutation::{Mutation, PositionLookup};
pub use numeric::{NumericErrorScope, NumericPolicy};
