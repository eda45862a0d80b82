//! Model parameters.
//!
//! [`ModelParams`] is the serializable description of one simulation:
//! population size, genome layout, region models, genetic value models,
//! prune and simplification settings and the seed. It can be read from
//! JSON and is checked by [`ModelParams::validate`] before a simulation is
//! built from it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::population::PrunePolicy;
use crate::errors::SimError;
use crate::evolution::{MutationConfig, MutationRegions, RecombinationConfig, RecombinationRegions};
use crate::genetic_values::{Calculator, FitnessMap, GeneticValuePipeline, Noise, ValueKind};

/// Built-in genetic value models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticValueConfig {
    pub calculator: Calculator,
    #[serde(default)]
    pub fitness_map: FitnessMap,
    #[serde(default)]
    pub noise: Noise,
}

impl GeneticValueConfig {
    pub fn pipeline(&self) -> Result<GeneticValuePipeline, SimError> {
        self.calculator.validate()?;
        self.fitness_map.validate()?;
        self.noise.validate()?;
        GeneticValuePipeline::new(
            self.calculator.clone(),
            self.fitness_map.clone(),
            self.noise,
        )
    }
}

impl Default for GeneticValueConfig {
    /// Multiplicative fitness, identity map, no noise.
    fn default() -> Self {
        Self {
            calculator: Calculator::multiplicative(2.0, ValueKind::Fitness),
            fitness_map: FitnessMap::Identity,
            noise: Noise::None,
        }
    }
}

fn default_sequence_length() -> f64 {
    1.0
}

fn default_simplification_interval() -> u32 {
    100
}

fn default_prune() -> Option<PrunePolicy> {
    Some(PrunePolicy::default())
}

/// Complete description of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Number of diploids (N).
    pub population_size: usize,
    #[serde(default = "default_sequence_length")]
    pub sequence_length: f64,
    /// `[beg, end)` of each locus, used by multi-locus calculators.
    #[serde(default)]
    pub locus_boundaries: Vec<(f64, f64)>,
    #[serde(default)]
    pub mutation: MutationConfig,
    #[serde(default)]
    pub recombination: RecombinationConfig,
    #[serde(default)]
    pub genetic_values: GeneticValueConfig,
    /// Prune after every generation with this policy; `None` never prunes.
    #[serde(default = "default_prune")]
    pub prune: Option<PrunePolicy>,
    /// Simplify the tables every this many generations; 0 never simplifies.
    #[serde(default = "default_simplification_interval")]
    pub simplification_interval: u32,
    /// Random seed. Absent means a seed from the operating system.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl ModelParams {
    /// Parameters for a neutral population of `population_size` diploids
    /// with no mutation and no recombination.
    pub fn new(population_size: usize) -> Self {
        Self {
            population_size,
            sequence_length: default_sequence_length(),
            locus_boundaries: Vec::new(),
            mutation: MutationConfig::none(),
            recombination: RecombinationConfig::none(),
            genetic_values: GeneticValueConfig::default(),
            prune: default_prune(),
            simplification_interval: default_simplification_interval(),
            seed: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    /// `Configuration` describing the first invalid parameter.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.population_size == 0 {
            return Err(SimError::config("population size must be > 0"));
        }
        if !(self.sequence_length.is_finite() && self.sequence_length > 0.0) {
            return Err(SimError::config(format!(
                "sequence length must be finite and > 0, got {}",
                self.sequence_length
            )));
        }
        MutationRegions::new(&self.mutation, self.sequence_length)?;
        RecombinationRegions::new(&self.recombination, self.sequence_length)?;
        self.genetic_values.pipeline()?;
        if matches!(self.genetic_values.calculator, Calculator::MultiLocus(_))
            && self.locus_boundaries.is_empty()
        {
            return Err(SimError::config(
                "multi-locus calculator needs locus boundaries",
            ));
        }
        Ok(())
    }
}
