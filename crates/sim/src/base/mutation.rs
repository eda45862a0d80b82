//! Mutations and the lookup of occupied positions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single mutation.
///
/// Mutations are immutable once created. The population stores them in a
/// dense arena and refers to them by index ("key") from gametes and from
/// the ancestry mutation records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    position: f64,
    /// One effect size per trait dimension. Neutral mutations store an
    /// empty vector.
    effect_sizes: Vec<f64>,
    dominance: f64,
    /// Generation in which the mutation arose.
    origin: u32,
    /// Label of the region that produced the mutation.
    label: u16,
    neutral: bool,
}

impl Mutation {
    /// A selected mutation with a single effect size.
    pub fn new(position: f64, effect: f64, dominance: f64, origin: u32, label: u16) -> Self {
        Self::multivariate(position, vec![effect], dominance, origin, label)
    }

    /// A selected mutation with one effect size per trait dimension.
    pub fn multivariate(
        position: f64,
        effect_sizes: Vec<f64>,
        dominance: f64,
        origin: u32,
        label: u16,
    ) -> Self {
        Self {
            position,
            effect_sizes,
            dominance,
            origin,
            label,
            neutral: false,
        }
    }

    /// A neutral mutation.
    pub fn neutral(position: f64, origin: u32, label: u16) -> Self {
        Self {
            position,
            effect_sizes: Vec::new(),
            dominance: 0.0,
            origin,
            label,
            neutral: true,
        }
    }

    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Effect size on the first trait dimension (0 for neutral mutations).
    #[inline]
    pub fn effect(&self) -> f64 {
        self.effect_sizes.first().copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn effect_sizes(&self) -> &[f64] {
        &self.effect_sizes
    }

    #[inline]
    pub fn dominance(&self) -> f64 {
        self.dominance
    }

    #[inline]
    pub fn origin(&self) -> u32 {
        self.origin
    }

    #[inline]
    pub fn label(&self) -> u16 {
        self.label
    }

    #[inline]
    pub fn is_neutral(&self) -> bool {
        self.neutral
    }
}

/// Set of positions currently occupied by a mutation in the arena.
///
/// Region models consult it to keep the infinitely-many-sites assumption:
/// a new mutation never lands on an occupied position.
#[derive(Debug, Clone, Default)]
pub struct PositionLookup {
    occupied: HashSet<u64>,
}

impl PositionLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the lookup for an existing arena.
    pub fn from_mutations(mutations: &[Mutation]) -> Self {
        let mut lookup = Self::new();
        for m in mutations {
            lookup.insert(m.position());
        }
        lookup
    }

    fn key(position: f64) -> u64 {
        // -0.0 and 0.0 are the same site
        if position == 0.0 {
            0.0f64.to_bits()
        } else {
            position.to_bits()
        }
    }

    pub fn contains(&self, position: f64) -> bool {
        self.occupied.contains(&Self::key(position))
    }

    /// Returns false if the position was already occupied.
    pub fn insert(&mut self, position: f64) -> bool {
        self.occupied.insert(Self::key(position))
    }

    pub fn remove(&mut self, position: f64) -> bool {
        self.occupied.remove(&Self::key(position))
    }

    pub fn len(&self) -> usize {
        self.occupied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.is_empty()
    }
}
