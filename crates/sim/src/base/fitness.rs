use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};

use serde::{Deserialize, Serialize};

use crate::errors::SimError;

/// A non-negative fitness value.
///
/// Wright-Fisher sampling only needs relative weights, so there is no upper
/// bound; negative inputs are clamped to zero. NaN is not a fitness and is
/// rejected by [`FitnessValue::try_new`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct FitnessValue(f64);

impl FitnessValue {
    /// Fitness of an individual that cannot reproduce.
    pub const LETHAL: Self = Self(0.0);

    /// Fitness of an individual carrying no selected mutations.
    pub const NEUTRAL: Self = Self(1.0);

    /// Creates a new FitnessValue, clamping negative input to 0.0.
    pub fn new(value: f64) -> Self {
        Self(value.max(0.0))
    }

    /// Creates a new FitnessValue, failing on NaN or infinite input.
    pub fn try_new(value: f64) -> Result<Self, SimError> {
        if !value.is_finite() {
            return Err(SimError::numerical(
                "fitness",
                format!("fitness must be finite, got {value}"),
            ));
        }
        Ok(Self::new(value))
    }

    /// Returns the inner f64 value.
    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    /// True if this individual contributes no offspring.
    #[inline]
    pub fn is_lethal(self) -> bool {
        self.0 == 0.0
    }
}

impl From<FitnessValue> for f64 {
    fn from(fitness: FitnessValue) -> Self {
        fitness.0
    }
}

impl Default for FitnessValue {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl fmt::Display for FitnessValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for FitnessValue {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Mul for FitnessValue {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self(self.0 * rhs.0)
    }
}

impl Sum for FitnessValue {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::LETHAL, |acc, w| acc + w)
    }
}
