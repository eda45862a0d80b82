//! Fitness-proportional parent sampling.
//!
//! Wright-Fisher reproduction picks each parent independently, with
//! replacement, with probability `w_i / sum(w)`. Selfing is allowed.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;

use crate::base::FitnessValue;
use crate::errors::SimError;

/// Fitness-weighted index over the parental generation.
#[derive(Debug, Clone)]
pub struct ParentSampler {
    dist: WeightedIndex<f64>,
}

impl ParentSampler {
    /// # Errors
    /// `Numerical` if there are no parents, if the total fitness is zero, or
    /// if it is not finite.
    pub fn new(fitness: &[FitnessValue]) -> Result<Self, SimError> {
        let total: f64 = fitness.iter().map(|w| w.get()).sum();
        if !total.is_finite() {
            return Err(SimError::numerical(
                "parent sampling",
                format!("total fitness is {total}"),
            ));
        }
        if total <= 0.0 {
            return Err(SimError::numerical(
                "parent sampling",
                "total fitness of the parental generation is zero",
            ));
        }
        let dist = WeightedIndex::new(fitness.iter().map(|w| w.get()))
            .map_err(|e| SimError::numerical("parent sampling", e.to_string()))?;
        Ok(Self { dist })
    }

    pub fn total(&self) -> f64 {
        self.dist.total_weight()
    }

    /// One parent index. Lethal individuals are never chosen.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.dist.sample(rng)
    }

    /// Two parent indices for one offspring.
    pub fn sample_pair<R: Rng + ?Sized>(&self, rng: &mut R) -> [usize; 2] {
        [self.sample(rng), self.sample(rng)]
    }
}
