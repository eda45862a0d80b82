//! Maps from genetic and environmental values to fitness.

use serde::{Deserialize, Serialize};

use super::calculators::ValueKind;
use crate::base::numeric::checked_exp;
use crate::base::FitnessValue;
use crate::errors::SimError;
use crate::genome::DiploidMetadata;
use crate::simulation::Population;

/// Capability of turning an individual's `g` and `e` into fitness.
pub trait FitnessMapping: Clone + Send + Sync {
    fn fitness(&self, md: &DiploidMetadata) -> Result<FitnessValue, SimError>;

    /// The kind of genetic value this map consumes.
    fn expects(&self) -> ValueKind;

    /// Called once per generation before any evaluation.
    fn update(&mut self, _pop: &Population) -> Result<(), SimError> {
        Ok(())
    }
}

/// One optimum of a moving-optimum model, in force from generation `when`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Optimum {
    pub when: u32,
    pub optimum: f64,
    pub vs: f64,
}

impl Optimum {
    pub fn new(when: u32, optimum: f64, vs: f64) -> Self {
        Self { when, optimum, vs }
    }
}

/// Gaussian stabilizing selection: `exp(-(g + e - opt)^2 / (2 VS))`.
fn gss(md: &DiploidMetadata, optimum: f64, vs: f64) -> Result<FitnessValue, SimError> {
    let dev = md.g + md.e - optimum;
    let w = checked_exp("GSS", -(dev * dev) / (2.0 * vs))?;
    FitnessValue::try_new(w)
}

fn check_optimum(optimum: f64, vs: f64) -> Result<(), SimError> {
    if !optimum.is_finite() {
        return Err(SimError::config(format!("optimum must be finite, got {optimum}")));
    }
    if !(vs.is_finite() && vs > 0.0) {
        return Err(SimError::config(format!("VS must be > 0, got {vs}")));
    }
    Ok(())
}

/// The built-in fitness maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FitnessMap {
    /// `w = g`.
    Identity,
    /// Gaussian stabilizing selection around a fixed optimum.
    Gss { optimum: f64, vs: f64 },
    /// Gaussian stabilizing selection around an optimum that changes at
    /// given generations.
    GssMo {
        optima: Vec<Optimum>,
        #[serde(default)]
        current: usize,
        #[serde(default)]
        last_generation: Option<u32>,
    },
}

impl FitnessMap {
    pub fn gss(optimum: f64, vs: f64) -> Result<Self, SimError> {
        check_optimum(optimum, vs)?;
        Ok(Self::Gss { optimum, vs })
    }

    /// # Errors
    /// `Configuration` if `optima` is empty, does not start at generation
    /// 0, is not strictly increasing in generation, or has a non-positive VS.
    pub fn gss_mo(optima: Vec<Optimum>) -> Result<Self, SimError> {
        let map = Self::GssMo {
            optima,
            current: 0,
            last_generation: None,
        };
        map.validate()?;
        Ok(map)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        match self {
            Self::Identity => Ok(()),
            Self::Gss { optimum, vs } => check_optimum(*optimum, *vs),
            Self::GssMo { optima, current, .. } => {
                let first = optima
                    .first()
                    .ok_or_else(|| SimError::config("moving optimum needs at least one optimum"))?;
                if first.when != 0 {
                    return Err(SimError::config(format!(
                        "first optimum must apply from generation 0, got {}",
                        first.when
                    )));
                }
                if optima.windows(2).any(|w| w[0].when >= w[1].when) {
                    return Err(SimError::config(
                        "optimum generations must be strictly increasing",
                    ));
                }
                for o in optima {
                    check_optimum(o.optimum, o.vs)?;
                }
                if *current >= optima.len() {
                    return Err(SimError::config("moving optimum state out of range"));
                }
                Ok(())
            }
        }
    }

    /// Move a moving-optimum map to `generation`. No-op for other maps.
    ///
    /// # Errors
    /// `InvariantViolation` if `generation` is smaller than the generation
    /// of the previous call.
    pub fn advance_to(&mut self, generation: u32) -> Result<(), SimError> {
        if let Self::GssMo {
            optima,
            current,
            last_generation,
        } = self
        {
            if let Some(last) = *last_generation {
                if generation < last {
                    return Err(SimError::invariant(format!(
                        "moving optimum updated to generation {generation} after {last}"
                    )));
                }
            }
            // last optimum whose start generation has been reached
            *current = optima.partition_point(|o| o.when <= generation).saturating_sub(1);
            *last_generation = Some(generation);
        }
        Ok(())
    }

    /// Optimum and VS currently in force, `None` for the identity map.
    pub fn current_optimum(&self) -> Option<(f64, f64)> {
        match self {
            Self::Identity => None,
            Self::Gss { optimum, vs } => Some((*optimum, *vs)),
            Self::GssMo { optima, current, .. } => optima.get(*current).map(|o| (o.optimum, o.vs)),
        }
    }
}

impl Default for FitnessMap {
    fn default() -> Self {
        Self::Identity
    }
}

impl FitnessMapping for FitnessMap {
    fn fitness(&self, md: &DiploidMetadata) -> Result<FitnessValue, SimError> {
        match self.current_optimum() {
            None => FitnessValue::try_new(md.g),
            Some((optimum, vs)) => gss(md, optimum, vs),
        }
    }

    fn expects(&self) -> ValueKind {
        match self {
            Self::Identity => ValueKind::Fitness,
            Self::Gss { .. } | Self::GssMo { .. } => ValueKind::Trait,
        }
    }

    fn update(&mut self, pop: &Population) -> Result<(), SimError> {
        self.advance_to(pop.generation())
    }
}
