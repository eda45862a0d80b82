//! Environmental noise models.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::errors::SimError;
use crate::genome::DiploidMetadata;
use crate::simulation::Population;

/// Capability of drawing an individual's environmental value.
pub trait NoiseModel: Clone + Send + Sync {
    /// Environmental value of the offspring described by `md`, whose parents
    /// are `parent1` and `parent2`.
    fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        md: &DiploidMetadata,
        parent1: &DiploidMetadata,
        parent2: &DiploidMetadata,
        pop: &Population,
    ) -> Result<f64, SimError>;

    /// True if the model never draws and always returns 0.
    fn is_none(&self) -> bool;

    /// Called once per generation before any evaluation.
    fn update(&mut self, _pop: &Population) -> Result<(), SimError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Noise {
    #[default]
    None,
    Gaussian { mean: f64, sd: f64 },
}

impl Noise {
    pub fn gaussian(mean: f64, sd: f64) -> Result<Self, SimError> {
        let noise = Self::Gaussian { mean, sd };
        noise.validate()?;
        Ok(noise)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        match self {
            Self::None => Ok(()),
            Self::Gaussian { mean, sd } => {
                if !mean.is_finite() || !(sd.is_finite() && *sd >= 0.0) {
                    return Err(SimError::config(format!(
                        "Gaussian noise needs a finite mean and sd >= 0, got mean {mean}, sd {sd}"
                    )));
                }
                Ok(())
            }
        }
    }
}

impl NoiseModel for Noise {
    fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        _md: &DiploidMetadata,
        _parent1: &DiploidMetadata,
        _parent2: &DiploidMetadata,
        _pop: &Population,
    ) -> Result<f64, SimError> {
        match self {
            Self::None => Ok(0.0),
            Self::Gaussian { mean, sd } => {
                let dist = Normal::new(*mean, *sd)
                    .map_err(|e| SimError::config(format!("invalid Gaussian noise: {e}")))?;
                Ok(dist.sample(rng))
            }
        }
    }

    fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}
