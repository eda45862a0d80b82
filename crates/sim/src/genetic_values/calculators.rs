//! Genetic value calculators.
//!
//! A calculator turns the two gametes of a diploid into a single number.
//! Depending on its [`ValueKind`] that number is either already a fitness
//! (and passes through the identity map) or a trait value that a fitness map
//! such as GSS converts to fitness.

use serde::{Deserialize, Serialize};

use crate::base::numeric::checked_sqrt;
use crate::base::Mutation;
use crate::errors::SimError;
use crate::genome::Gamete;
use crate::simulation::Population;

/// What a calculator's output means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Fitness,
    Trait,
}

/// Capability of computing genetic values.
pub trait GeneticValueCalculator: Clone + Send + Sync {
    /// Genetic value of diploid `index` of the current generation.
    fn genetic_value(&self, index: usize, pop: &Population) -> Result<f64, SimError>;

    fn kind(&self) -> ValueKind;

    /// Called once per generation before any evaluation.
    fn update(&mut self, _pop: &Population) -> Result<(), SimError> {
        Ok(())
    }

    /// Checks that the calculator can be used with `pop`.
    fn check(&self, _pop: &Population) -> Result<(), SimError> {
        Ok(())
    }
}

/// Visit every mutation carried by either key list, in position order.
///
/// `f(key, homozygous)` is called once per mutation; `homozygous` is true
/// when both lists carry it.
fn for_each_site(
    mutations: &[Mutation],
    first: &[u32],
    second: &[u32],
    mut f: impl FnMut(&Mutation, bool) -> Result<(), SimError>,
) -> Result<(), SimError> {
    let get = |k: u32| {
        mutations.get(k as usize).ok_or_else(|| {
            SimError::invariant(format!(
                "gamete refers to mutation {k} but the arena holds {}",
                mutations.len()
            ))
        })
    };

    let (mut i, mut j) = (0, 0);
    while i < first.len() && j < second.len() {
        if first[i] == second[j] {
            f(get(first[i])?, true)?;
            i += 1;
            j += 1;
            continue;
        }
        let (a, b) = (get(first[i])?, get(second[j])?);
        if a.position() < b.position() {
            f(a, false)?;
            i += 1;
        } else {
            f(b, false)?;
            j += 1;
        }
    }
    for &k in &first[i..] {
        f(get(k)?, false)?;
    }
    for &k in &second[j..] {
        f(get(k)?, false)?;
    }
    Ok(())
}

/// Additive sum: `scaling * s` for homozygotes, `h * s` for heterozygotes.
fn additive_sum(mutations: &[Mutation], first: &[u32], second: &[u32], scaling: f64) -> Result<f64, SimError> {
    let mut sum = 0.0;
    for_each_site(mutations, first, second, |m, hom| {
        if !m.is_neutral() {
            sum += if hom {
                scaling * m.effect()
            } else {
                m.dominance() * m.effect()
            };
        }
        Ok(())
    })?;
    Ok(sum)
}

/// Multiplicative product: `1 + scaling * s` for homozygotes, `1 + h * s`
/// for heterozygotes.
fn multiplicative_product(
    mutations: &[Mutation],
    first: &[u32],
    second: &[u32],
    scaling: f64,
) -> Result<f64, SimError> {
    let mut prod = 1.0;
    for_each_site(mutations, first, second, |m, hom| {
        if !m.is_neutral() {
            prod *= if hom {
                1.0 + scaling * m.effect()
            } else {
                1.0 + m.dominance() * m.effect()
            };
        }
        Ok(())
    })?;
    Ok(prod)
}

fn haplotype_sum(mutations: &[Mutation], keys: &[u32]) -> Result<f64, SimError> {
    keys.iter().try_fold(0.0, |acc, &k| {
        mutations
            .get(k as usize)
            .map(|m| acc + m.effect())
            .ok_or_else(|| SimError::invariant(format!("gamete refers to missing mutation {k}")))
    })
}

/// Gene-based recessive value: `sqrt(a * b)` of the two haplotype sums.
fn gbr_value(mutations: &[Mutation], first: &[u32], second: &[u32]) -> Result<f64, SimError> {
    let a = haplotype_sum(mutations, first)?;
    let b = haplotype_sum(mutations, second)?;
    if a < 0.0 || b < 0.0 {
        return Err(SimError::invariant(format!(
            "GBR requires non-negative haplotype sums, got {a} and {b}"
        )));
    }
    if a == 0.0 || b == 0.0 {
        return Ok(0.0);
    }
    checked_sqrt("GBR", a * b)
}

fn fitness_or_trait_additive(sum: f64, kind: ValueKind) -> f64 {
    match kind {
        ValueKind::Fitness => (1.0 + sum).max(0.0),
        ValueKind::Trait => sum,
    }
}

fn fitness_or_trait_multiplicative(prod: f64, kind: ValueKind) -> f64 {
    match kind {
        ValueKind::Fitness => prod.max(0.0),
        ValueKind::Trait => prod - 1.0,
    }
}

/// Per-locus model used by [`MultiLocus`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum LocusModel {
    Additive {
        #[serde(default = "default_scaling")]
        scaling: f64,
    },
    Multiplicative {
        #[serde(default = "default_scaling")]
        scaling: f64,
    },
    Gbr,
}

/// Same model applied to every locus of the population, aggregated over
/// loci.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiLocus {
    #[serde(flatten)]
    pub model: LocusModel,
    pub kind: ValueKind,
}

impl MultiLocus {
    fn locus_value(&self, first: &[u32], second: &[u32], mutations: &[Mutation]) -> Result<f64, SimError> {
        match self.model {
            LocusModel::Additive { scaling } => Ok(fitness_or_trait_additive(
                additive_sum(mutations, first, second, scaling)?,
                self.kind,
            )),
            LocusModel::Multiplicative { scaling } => Ok(fitness_or_trait_multiplicative(
                multiplicative_product(mutations, first, second, scaling)?,
                self.kind,
            )),
            LocusModel::Gbr => gbr_value(mutations, first, second),
        }
    }

    /// Combine per-locus values.
    pub fn aggregate(&self, values: &[f64]) -> f64 {
        match (self.model, self.kind) {
            (LocusModel::Additive { .. }, ValueKind::Trait) => values.iter().sum(),
            (LocusModel::Additive { .. }, ValueKind::Fitness) => {
                (1.0 + values.iter().map(|w| w - 1.0).sum::<f64>()).max(0.0)
            }
            (LocusModel::Multiplicative { .. }, ValueKind::Trait) => {
                values.iter().map(|g| 1.0 + g).product::<f64>() - 1.0
            }
            (LocusModel::Multiplicative { .. }, ValueKind::Fitness) => values.iter().product(),
            (LocusModel::Gbr, _) => values.iter().sum(),
        }
    }
}

fn default_scaling() -> f64 {
    2.0
}

fn default_kind() -> ValueKind {
    ValueKind::Fitness
}

/// The built-in calculators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Calculator {
    Additive {
        #[serde(default = "default_scaling")]
        scaling: f64,
        #[serde(default = "default_kind")]
        kind: ValueKind,
    },
    Multiplicative {
        #[serde(default = "default_scaling")]
        scaling: f64,
        #[serde(default = "default_kind")]
        kind: ValueKind,
    },
    /// Gene-based recessive trait.
    Gbr,
    /// Strict additive effects on several traits; the value is the focal
    /// dimension of the summed effect vector.
    MultivariateAdditive { ndim: usize, focal_trait: usize },
    MultiLocus(MultiLocus),
}

impl Calculator {
    pub fn additive(scaling: f64, kind: ValueKind) -> Self {
        Self::Additive { scaling, kind }
    }

    pub fn multiplicative(scaling: f64, kind: ValueKind) -> Self {
        Self::Multiplicative { scaling, kind }
    }

    pub fn multi_locus(model: LocusModel, kind: ValueKind) -> Self {
        Self::MultiLocus(MultiLocus { model, kind })
    }

    /// Rejects parameters that can never produce a valid value.
    pub fn validate(&self) -> Result<(), SimError> {
        let scaling_ok = |s: f64| {
            if s.is_finite() {
                Ok(())
            } else {
                Err(SimError::config(format!("scaling must be finite, got {s}")))
            }
        };
        match self {
            Self::Additive { scaling, .. } | Self::Multiplicative { scaling, .. } => scaling_ok(*scaling),
            Self::Gbr => Ok(()),
            Self::MultivariateAdditive { ndim, focal_trait } => {
                if *ndim == 0 || focal_trait >= ndim {
                    return Err(SimError::config(format!(
                        "focal trait {focal_trait} out of range for {ndim} dimensions"
                    )));
                }
                Ok(())
            }
            Self::MultiLocus(ml) => match ml.model {
                LocusModel::Additive { scaling } | LocusModel::Multiplicative { scaling } => {
                    scaling_ok(scaling)
                }
                LocusModel::Gbr if ml.kind == ValueKind::Fitness => Err(SimError::config(
                    "GBR produces trait values, not fitness",
                )),
                LocusModel::Gbr => Ok(()),
            },
        }
    }

    fn multivariate_value(
        mutations: &[Mutation],
        first: &[u32],
        second: &[u32],
        ndim: usize,
        focal: usize,
    ) -> Result<f64, SimError> {
        let mut summed = vec![0.0; ndim];
        for_each_site(mutations, first, second, |m, hom| {
            if m.is_neutral() {
                return Ok(());
            }
            let e = m.effect_sizes();
            if e.len() != ndim {
                return Err(SimError::invariant(format!(
                    "mutation at {} has {} effect sizes, expected {ndim}",
                    m.position(),
                    e.len()
                )));
            }
            let copies = if hom { 2.0 } else { 1.0 };
            for (acc, s) in summed.iter_mut().zip(e) {
                *acc += copies * s;
            }
            Ok(())
        })?;
        Ok(summed[focal])
    }

    /// Genetic value of a pair of gametes.
    pub fn compute(&self, first: &Gamete, second: &Gamete, pop: &Population) -> Result<f64, SimError> {
        let mutations = pop.mutations();
        let (a, b) = (first.mutations(), second.mutations());
        match self {
            Self::Additive { scaling, kind } => Ok(fitness_or_trait_additive(
                additive_sum(mutations, a, b, *scaling)?,
                *kind,
            )),
            Self::Multiplicative { scaling, kind } => Ok(fitness_or_trait_multiplicative(
                multiplicative_product(mutations, a, b, *scaling)?,
                *kind,
            )),
            Self::Gbr => gbr_value(mutations, a, b),
            Self::MultivariateAdditive { ndim, focal_trait } => {
                Self::multivariate_value(mutations, a, b, *ndim, *focal_trait)
            }
            Self::MultiLocus(ml) => {
                let mut values = Vec::with_capacity(pop.locus_boundaries().len());
                for &(beg, end) in pop.locus_boundaries() {
                    values.push(ml.locus_value(
                        first.mutations_in(mutations, beg, end),
                        second.mutations_in(mutations, beg, end),
                        mutations,
                    )?);
                }
                Ok(ml.aggregate(&values))
            }
        }
    }
}

impl GeneticValueCalculator for Calculator {
    fn genetic_value(&self, index: usize, pop: &Population) -> Result<f64, SimError> {
        let d = pop.diploids().get(index).ok_or_else(|| {
            SimError::invariant(format!("no diploid {index} in a population of {}", pop.size()))
        })?;
        let gametes = pop.gametes();
        let (first, second) = match (gametes.get(d.first), gametes.get(d.second)) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(SimError::invariant(format!(
                    "diploid {index} refers to a missing gamete"
                )))
            }
        };
        self.compute(first, second, pop)
    }

    fn kind(&self) -> ValueKind {
        match self {
            Self::Additive { kind, .. } | Self::Multiplicative { kind, .. } => *kind,
            Self::Gbr | Self::MultivariateAdditive { .. } => ValueKind::Trait,
            Self::MultiLocus(ml) => match ml.model {
                LocusModel::Gbr => ValueKind::Trait,
                _ => ml.kind,
            },
        }
    }

    fn check(&self, pop: &Population) -> Result<(), SimError> {
        self.validate()?;
        if matches!(self, Self::MultiLocus(_)) && pop.locus_boundaries().is_empty() {
            return Err(SimError::config(
                "multi-locus calculator needs locus boundaries",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Vec<Mutation> {
        vec![
            Mutation::new(0.1, 0.5, 0.25, 0, 0),
            Mutation::new(0.2, -0.25, 0.5, 0, 0),
            Mutation::neutral(0.3, 0, 0),
            Mutation::new(0.6, 0.1, 1.0, 0, 0),
        ]
    }

    #[test]
    fn test_for_each_site_detects_homozygotes() {
        let muts = arena();
        let mut seen = Vec::new();
        for_each_site(&muts, &[0, 1, 3], &[1, 2], |m, hom| {
            seen.push((m.position(), hom));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(0.1, false), (0.2, true), (0.3, false), (0.6, false)]);
    }

    #[test]
    fn test_additive_sum() {
        let muts = arena();
        // het 0: 0.25 * 0.5, hom 1: 2 * -0.25
        let sum = additive_sum(&muts, &[0, 1], &[1], 2.0).unwrap();
        assert!((sum - (0.125 - 0.5)).abs() < 1e-12);
        assert_eq!(fitness_or_trait_additive(sum, ValueKind::Trait), sum);
        assert!((fitness_or_trait_additive(sum, ValueKind::Fitness) - 0.625).abs() < 1e-12);
        assert_eq!(fitness_or_trait_additive(-3.0, ValueKind::Fitness), 0.0);
    }

    #[test]
    fn test_multiplicative_product() {
        let muts = arena();
        let prod = multiplicative_product(&muts, &[0, 1], &[1], 2.0).unwrap();
        assert!((prod - 1.125 * 0.5).abs() < 1e-12);
        assert!((fitness_or_trait_multiplicative(prod, ValueKind::Trait) - (prod - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_gbr_value() {
        let muts = vec![
            Mutation::new(0.1, 4.0, 1.0, 0, 0),
            Mutation::new(0.2, 9.0, 1.0, 0, 0),
            Mutation::new(0.3, -1.0, 1.0, 0, 0),
        ];
        assert_eq!(gbr_value(&muts, &[0], &[1]).unwrap(), 6.0);
        assert_eq!(gbr_value(&muts, &[], &[]).unwrap(), 0.0);
        assert_eq!(gbr_value(&muts, &[0], &[]).unwrap(), 0.0);
        let err = gbr_value(&muts, &[2], &[1]).unwrap_err();
        assert!(matches!(err, SimError::InvariantViolation(_)));
    }

    #[test]
    fn test_multivariate_strict_additive() {
        let muts = vec![
            Mutation::multivariate(0.1, vec![1.0, -1.0], 0.5, 0, 0),
            Mutation::multivariate(0.2, vec![0.5, 2.0], 0.5, 0, 0),
        ];
        let g = Calculator::multivariate_value(&muts, &[0, 1], &[1], 2, 1).unwrap();
        assert_eq!(g, -1.0 + 4.0);
        let bad = vec![Mutation::new(0.1, 1.0, 0.5, 0, 0)];
        assert!(Calculator::multivariate_value(&bad, &[0], &[], 2, 0).is_err());
    }

    #[test]
    fn test_multi_locus_aggregation() {
        let add_fit = MultiLocus {
            model: LocusModel::Additive { scaling: 2.0 },
            kind: ValueKind::Fitness,
        };
        assert!((add_fit.aggregate(&[0.9, 1.2]) - 1.1).abs() < 1e-12);
        assert_eq!(add_fit.aggregate(&[0.1, 0.1]), 0.0);

        let add_trait = MultiLocus {
            kind: ValueKind::Trait,
            ..add_fit
        };
        assert!((add_trait.aggregate(&[0.5, -0.25]) - 0.25).abs() < 1e-12);

        let mult_fit = MultiLocus {
            model: LocusModel::Multiplicative { scaling: 2.0 },
            kind: ValueKind::Fitness,
        };
        assert!((mult_fit.aggregate(&[0.5, 0.5]) - 0.25).abs() < 1e-12);

        let mult_trait = MultiLocus {
            kind: ValueKind::Trait,
            ..mult_fit
        };
        assert!((mult_trait.aggregate(&[1.0, 1.0]) - 3.0).abs() < 1e-12);

        let gbr = MultiLocus {
            model: LocusModel::Gbr,
            kind: ValueKind::Trait,
        };
        assert_eq!(gbr.aggregate(&[6.0, 1.0]), 7.0);
    }

    #[test]
    fn test_validate() {
        assert!(Calculator::MultivariateAdditive { ndim: 2, focal_trait: 2 }
            .validate()
            .is_err());
        assert!(Calculator::multi_locus(LocusModel::Gbr, ValueKind::Fitness)
            .validate()
            .is_err());
        assert!(Calculator::additive(f64::NAN, ValueKind::Trait).validate().is_err());
        assert!(Calculator::additive(2.0, ValueKind::Trait).validate().is_ok());
    }

    #[test]
    fn test_kind() {
        assert_eq!(Calculator::Gbr.kind(), ValueKind::Trait);
        assert_eq!(
            Calculator::multiplicative(2.0, ValueKind::Fitness).kind(),
            ValueKind::Fitness
        );
    }

    #[test]
    fn test_serde_defaults() {
        let c: Calculator = serde_json::from_str(r#"{"type": "additive"}"#).unwrap();
        assert_eq!(c, Calculator::additive(2.0, ValueKind::Fitness));
        let c: Calculator =
            serde_json::from_str(r#"{"type": "multi_locus", "model": "gbr", "kind": "trait"}"#).unwrap();
        assert_eq!(c, Calculator::multi_locus(LocusModel::Gbr, ValueKind::Trait));
    }
}
