use serde::{Deserialize, Serialize};

use crate::base::FitnessValue;

/// A diploid individual: two indices into the gamete arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diploid {
    pub first: u32,
    pub second: u32,
}

impl Diploid {
    pub fn new(first: u32, second: u32) -> Self {
        Self { first, second }
    }
}

/// Per-individual values produced by the genetic value pipeline plus the
/// individual's place in the genealogy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiploidMetadata {
    /// Genetic value.
    pub g: f64,
    /// Environmental (noise) value.
    pub e: f64,
    /// Fitness.
    pub w: FitnessValue,
    /// Index of the individual in its generation.
    pub label: u32,
    /// Indices of the two parents in the previous generation.
    pub parents: [u32; 2],
    /// Node ids of the two genomes.
    pub nodes: [u32; 2],
}

impl DiploidMetadata {
    /// Metadata of a founder individual.
    pub fn founder(label: u32) -> Self {
        Self {
            g: 0.0,
            e: 0.0,
            w: FitnessValue::NEUTRAL,
            label,
            parents: [label, label],
            nodes: [2 * label, 2 * label + 1],
        }
    }

    /// Metadata of an offspring before its values are evaluated.
    pub fn offspring(label: u32, parents: [u32; 2], nodes: [u32; 2]) -> Self {
        Self {
            g: 0.0,
            e: 0.0,
            w: FitnessValue::NEUTRAL,
            label,
            parents,
            nodes,
        }
    }
}
