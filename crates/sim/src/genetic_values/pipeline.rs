use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::calculators::{Calculator, GeneticValueCalculator, ValueKind};
use super::fitness_map::{FitnessMap, FitnessMapping};
use super::noise::{Noise, NoiseModel};
use crate::base::numeric::{self, NumericErrorScope};
use crate::errors::SimError;
use crate::genome::DiploidMetadata;
use crate::simulation::Population;

/// Calculator, noise model and fitness map evaluated together for every
/// offspring of a generation.
///
/// Evaluation order per individual: genetic value `g`, then noise `e`, then
/// fitness `w` from the metadata holding both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticValuePipeline<C = Calculator, F = FitnessMap, N = Noise> {
    calculator: C,
    fitness_map: F,
    noise: N,
}

impl<C, F, N> GeneticValuePipeline<C, F, N>
where
    C: GeneticValueCalculator,
    F: FitnessMapping,
    N: NoiseModel,
{
    /// # Errors
    /// `Configuration` if the parts do not compose: a calculator producing
    /// fitness needs the identity map and no noise, a calculator producing
    /// trait values needs a map that consumes trait values.
    pub fn new(calculator: C, fitness_map: F, noise: N) -> Result<Self, SimError> {
        match (calculator.kind(), fitness_map.expects()) {
            (ValueKind::Fitness, ValueKind::Fitness) => {
                if !noise.is_none() {
                    return Err(SimError::config(
                        "a calculator producing fitness cannot be combined with noise",
                    ));
                }
            }
            (ValueKind::Trait, ValueKind::Trait) => {}
            (ValueKind::Fitness, ValueKind::Trait) => {
                return Err(SimError::config(
                    "a calculator producing fitness needs the identity fitness map",
                ))
            }
            (ValueKind::Trait, ValueKind::Fitness) => {
                return Err(SimError::config(
                    "a calculator producing trait values needs a trait-to-fitness map",
                ))
            }
        }
        Ok(Self {
            calculator,
            fitness_map,
            noise,
        })
    }

    pub fn calculator(&self) -> &C {
        &self.calculator
    }

    pub fn fitness_map(&self) -> &F {
        &self.fitness_map
    }

    pub fn noise(&self) -> &N {
        &self.noise
    }

    /// Checks the calculator against the population it will run on.
    pub fn check(&self, pop: &Population) -> Result<(), SimError> {
        self.calculator.check(pop)
    }

    /// Per-generation update of all three parts. Nothing is modified if any
    /// part fails.
    pub fn update(&mut self, pop: &Population) -> Result<(), SimError> {
        let mut calculator = self.calculator.clone();
        let mut fitness_map = self.fitness_map.clone();
        let mut noise = self.noise.clone();
        calculator.update(pop)?;
        fitness_map.update(pop)?;
        noise.update(pop)?;
        self.calculator = calculator;
        self.fitness_map = fitness_map;
        self.noise = noise;
        Ok(())
    }

    /// Evaluate every individual of the current generation.
    ///
    /// `parents` is the metadata of the previous generation, indexed by the
    /// `parents` field of each offspring. Genetic values are computed in
    /// parallel; noise is drawn sequentially in index order so the result
    /// does not depend on the number of threads. Returns the new metadata
    /// without touching the population.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        pop: &Population,
        parents: &[DiploidMetadata],
        rng: &mut R,
    ) -> Result<Vec<DiploidMetadata>, SimError> {
        let n = pop.size();
        // worker threads follow the caller's numeric policy
        let policy = numeric::current_policy();
        let g: Vec<f64> = (0..n)
            .into_par_iter()
            .map_init(
                || NumericErrorScope::new(policy),
                |_, i| self.calculator.genetic_value(i, pop),
            )
            .collect::<Result<_, _>>()?;

        let mut out = pop.diploid_metadata().to_vec();
        for (md, g) in out.iter_mut().zip(g) {
            md.g = g;
            let p1 = parent_metadata(parents, md.parents[0])?;
            let p2 = parent_metadata(parents, md.parents[1])?;
            md.e = self.noise.sample(rng, md, p1, p2, pop)?;
            md.w = self.fitness_map.fitness(md)?;
        }
        Ok(out)
    }
}

fn parent_metadata(parents: &[DiploidMetadata], index: u32) -> Result<&DiploidMetadata, SimError> {
    parents.get(index as usize).ok_or_else(|| {
        SimError::invariant(format!(
            "parent {index} is outside the previous generation of {}",
            parents.len()
        ))
    })
}

impl Default for GeneticValuePipeline {
    /// Neutral model: multiplicative fitness with no selected mutations
    /// gives every individual `w == 1`.
    fn default() -> Self {
        Self {
            calculator: Calculator::multiplicative(2.0, ValueKind::Fitness),
            fitness_map: FitnessMap::Identity,
            noise: Noise::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Mutation;
    use crate::genetic_values::fitness_map::Optimum;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_composition_rules() {
        let additive_fit = Calculator::additive(2.0, ValueKind::Fitness);
        let additive_trait = Calculator::additive(2.0, ValueKind::Trait);
        assert!(GeneticValuePipeline::new(additive_fit.clone(), FitnessMap::Identity, Noise::None).is_ok());
        assert!(GeneticValuePipeline::new(
            additive_fit.clone(),
            FitnessMap::Identity,
            Noise::gaussian(0.0, 1.0).unwrap()
        )
        .is_err());
        assert!(GeneticValuePipeline::new(
            additive_fit,
            FitnessMap::gss(0.0, 1.0).unwrap(),
            Noise::None
        )
        .is_err());
        assert!(GeneticValuePipeline::new(additive_trait.clone(), FitnessMap::Identity, Noise::None).is_err());
        assert!(GeneticValuePipeline::new(
            additive_trait,
            FitnessMap::gss_mo(vec![Optimum::new(0, 0.0, 1.0)]).unwrap(),
            Noise::gaussian(0.0, 0.1).unwrap()
        )
        .is_ok());
    }

    #[test]
    fn test_evaluate_neutral_population() {
        let pop = Population::new(5, 1.0).unwrap();
        let pipeline: GeneticValuePipeline = GeneticValuePipeline::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let md = pipeline.evaluate(&pop, pop.diploid_metadata(), &mut rng).unwrap();
        assert_eq!(md.len(), 5);
        for m in &md {
            assert_eq!(m.g, 1.0);
            assert_eq!(m.e, 0.0);
            assert_eq!(m.w.get(), 1.0);
        }
    }

    #[test]
    fn test_evaluate_trait_with_gss() {
        let mut pop = Population::new(2, 1.0).unwrap();
        pop.install_for_test(
            vec![Mutation::new(0.5, 0.5, 0.5, 0, 0)],
            vec![vec![0], vec![]],
            &[(0, 0), (1, 1)],
        );
        let pipeline = GeneticValuePipeline::new(
            Calculator::additive(2.0, ValueKind::Trait),
            FitnessMap::gss(1.0, 1.0).unwrap(),
            Noise::None,
        )
        .unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let md = pipeline.evaluate(&pop, pop.diploid_metadata(), &mut rng).unwrap();
        assert_eq!(md[0].g, 1.0);
        assert_eq!(md[0].w.get(), 1.0);
        assert_eq!(md[1].g, 0.0);
        assert!((md[1].w.get() - (-0.5f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_is_thread_count_independent() {
        let pop = Population::new(50, 1.0).unwrap();
        let pipeline = GeneticValuePipeline::new(
            Calculator::additive(2.0, ValueKind::Trait),
            FitnessMap::gss(0.0, 1.0).unwrap(),
            Noise::gaussian(0.0, 1.0).unwrap(),
        )
        .unwrap();
        let run = |threads: usize| {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap();
            pool.install(|| {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(77);
                pipeline.evaluate(&pop, pop.diploid_metadata(), &mut rng).unwrap()
            })
        };
        assert_eq!(run(1), run(4));
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let mut pop = Population::new(2, 1.0).unwrap();
        let mut pipeline = GeneticValuePipeline::new(
            Calculator::additive(2.0, ValueKind::Trait),
            FitnessMap::gss_mo(vec![Optimum::new(0, 0.0, 1.0), Optimum::new(5, 1.0, 1.0)]).unwrap(),
            Noise::None,
        )
        .unwrap();
        pop.set_generation_for_test(6);
        pipeline.update(&pop).unwrap();
        assert_eq!(pipeline.fitness_map().current_optimum(), Some((1.0, 1.0)));
        pop.set_generation_for_test(3);
        let before = pipeline.clone();
        assert!(pipeline.update(&pop).is_err());
        assert_eq!(pipeline, before);
    }
}
