//! Genetic values, environmental noise and fitness.
//!
//! Each generation every offspring is evaluated as
//! `g = calculator(i)`, `e = noise(...)`, `w = fitness_map(g, e)`.
//! The three parts are independent capability traits composed by
//! [`GeneticValuePipeline`]; the serde enums [`Calculator`], [`FitnessMap`]
//! and [`Noise`] are the built-in implementations.

pub mod calculators;
pub mod fitness_map;
pub mod noise;
mod pipeline;

pub use calculators::{Calculator, GeneticValueCalculator, LocusModel, MultiLocus, ValueKind};
pub use fitness_map::{FitnessMap, FitnessMapping, Optimum};
pub use noise::{Noise, NoiseModel};
pub use pipeline::GeneticValuePipeline;
