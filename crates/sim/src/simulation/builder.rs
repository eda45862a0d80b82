//! Builder pattern for creating simulations.
//!
//! Provides a fluent API over [`ModelParams`] with the same validation.

use super::{GeneticValueConfig, ModelParams, PrunePolicy, Simulation};
use crate::errors::SimError;
use crate::evolution::{MutationConfig, RecombinationConfig};
use crate::genetic_values::{Calculator, FitnessMap, Noise};

/// Builder for constructing [`Simulation`] instances with a fluent API.
///
/// # Examples
///
/// ```
/// use tsforward_sim::simulation::SimulationBuilder;
///
/// // Neutral population with defaults
/// let sim = SimulationBuilder::new()
///     .population_size(50)
///     .seed(42)
///     .build()
///     .unwrap();
/// assert_eq!(sim.population().size(), 50);
///
/// // Stabilizing selection on an additive trait
/// use tsforward_sim::genetic_values::{Calculator, FitnessMap, Noise, ValueKind};
/// let sim = SimulationBuilder::new()
///     .population_size(50)
///     .neutral_mutation_rate(0.01)
///     .recombination_rate(0.5)
///     .calculator(Calculator::additive(2.0, ValueKind::Trait))
///     .fitness_map(FitnessMap::gss(0.0, 1.0).unwrap())
///     .noise(Noise::gaussian(0.0, 0.1).unwrap())
///     .seed(1)
///     .build()
///     .unwrap();
/// assert_eq!(sim.generation(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimulationBuilder {
    population_size: Option<usize>,
    sequence_length: Option<f64>,
    locus_boundaries: Vec<(f64, f64)>,

    mutation: Option<MutationConfig>,
    recombination: Option<RecombinationConfig>,

    calculator: Option<Calculator>,
    fitness_map: FitnessMap,
    noise: Noise,

    // None keeps the default policy; Some(None) disables pruning
    prune: Option<Option<PrunePolicy>>,
    simplification_interval: Option<u32>,
    seed: Option<u64>,
}

impl SimulationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing parameters.
    pub fn from_params(params: &ModelParams) -> Self {
        Self {
            population_size: Some(params.population_size),
            sequence_length: Some(params.sequence_length),
            locus_boundaries: params.locus_boundaries.clone(),
            mutation: Some(params.mutation.clone()),
            recombination: Some(params.recombination.clone()),
            calculator: Some(params.genetic_values.calculator.clone()),
            fitness_map: params.genetic_values.fitness_map.clone(),
            noise: params.genetic_values.noise,
            prune: Some(params.prune),
            simplification_interval: Some(params.simplification_interval),
            seed: params.seed,
        }
    }

    /// Set the number of diploids (required).
    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = Some(size);
        self
    }

    /// Default: 1.0.
    pub fn sequence_length(mut self, length: f64) -> Self {
        self.sequence_length = Some(length);
        self
    }

    pub fn locus_boundaries(mut self, loci: Vec<(f64, f64)>) -> Self {
        self.locus_boundaries = loci;
        self
    }

    pub fn mutation(mut self, config: MutationConfig) -> Self {
        self.mutation = Some(config);
        self
    }

    /// Neutral mutations uniformly along the whole genome, replacing any
    /// earlier mutation setting. Set the sequence length first.
    pub fn neutral_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation = Some(MutationConfig::neutral(rate, self.length()));
        self
    }

    pub fn recombination(mut self, config: RecombinationConfig) -> Self {
        self.recombination = Some(config);
        self
    }

    /// Uniform recombination along the whole genome. Set the sequence
    /// length first.
    pub fn recombination_rate(mut self, rate: f64) -> Self {
        self.recombination = Some(RecombinationConfig::uniform(rate, self.length()));
        self
    }

    pub fn calculator(mut self, calculator: Calculator) -> Self {
        self.calculator = Some(calculator);
        self
    }

    pub fn fitness_map(mut self, map: FitnessMap) -> Self {
        self.fitness_map = map;
        self
    }

    pub fn noise(mut self, noise: Noise) -> Self {
        self.noise = noise;
        self
    }

    /// `None` disables pruning.
    pub fn prune(mut self, policy: Option<PrunePolicy>) -> Self {
        self.prune = Some(policy);
        self
    }

    /// Generations between simplifications; 0 disables. Default: 100.
    pub fn simplification_interval(mut self, generations: u32) -> Self {
        self.simplification_interval = Some(generations);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn length(&self) -> f64 {
        self.sequence_length.unwrap_or(1.0)
    }

    /// Collect the settings into validated parameters.
    pub fn params(self) -> Result<ModelParams, SimError> {
        let population_size = self
            .population_size
            .ok_or_else(|| SimError::config("population_size is required"))?;
        let mut params = ModelParams::new(population_size);
        params.sequence_length = self.length();
        params.locus_boundaries = self.locus_boundaries;
        if let Some(mutation) = self.mutation {
            params.mutation = mutation;
        }
        if let Some(recombination) = self.recombination {
            params.recombination = recombination;
        }
        if let Some(calculator) = self.calculator {
            params.genetic_values = GeneticValueConfig {
                calculator,
                fitness_map: self.fitness_map,
                noise: self.noise,
            };
        } else {
            params.genetic_values.fitness_map = self.fitness_map;
            params.genetic_values.noise = self.noise;
        }
        if let Some(prune) = self.prune {
            params.prune = prune;
        }
        if let Some(interval) = self.simplification_interval {
            params.simplification_interval = interval;
        }
        params.seed = self.seed;
        params.validate()?;
        Ok(params)
    }

    pub fn build(self) -> Result<Simulation, SimError> {
        Simulation::new(&self.params()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetic_values::ValueKind;

    #[test]
    fn test_builder_requires_population_size() {
        let err = SimulationBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("population_size"));
    }

    #[test]
    fn test_builder_defaults() {
        let params = SimulationBuilder::new().population_size(10).params().unwrap();
        assert_eq!(params, ModelParams::new(10));
    }

    #[test]
    fn test_rates_follow_sequence_length() {
        let params = SimulationBuilder::new()
            .population_size(10)
            .sequence_length(5.0)
            .neutral_mutation_rate(0.1)
            .recombination_rate(0.2)
            .params()
            .unwrap();
        assert_eq!(params.mutation, MutationConfig::neutral(0.1, 5.0));
        assert_eq!(params.recombination, RecombinationConfig::uniform(0.2, 5.0));
    }

    #[test]
    fn test_builder_rejects_bad_composition() {
        let result = SimulationBuilder::new()
            .population_size(10)
            .calculator(Calculator::additive(2.0, ValueKind::Trait))
            .build();
        assert!(matches!(result, Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_prune_can_be_disabled() {
        let params = SimulationBuilder::new()
            .population_size(10)
            .prune(None)
            .params()
            .unwrap();
        assert_eq!(params.prune, None);
    }

    #[test]
    fn test_from_params_round_trip() {
        let mut params = ModelParams::new(20);
        params.mutation = MutationConfig::neutral(0.3, 1.0);
        params.simplification_interval = 25;
        params.seed = Some(9);
        let back = SimulationBuilder::from_params(&params).params().unwrap();
        assert_eq!(back, params);
    }
}
