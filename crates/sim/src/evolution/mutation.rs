//! Mutation region models.
//!
//! A [`MutationModel`] produces the new mutations carried by one offspring
//! gamete. [`MutationRegions`] is the built-in model: Poisson numbers of
//! neutral and selected mutations placed in weighted regions, with effect
//! sizes drawn from a distribution of fitness effects ([`Dfe`]).

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, Exp, Gamma, Normal, Poisson, StandardNormal, Uniform};
use serde::{Deserialize, Serialize};

use super::region::{Region, RegionPicker};
use crate::base::{Mutation, PositionLookup};
use crate::errors::SimError;

/// Attempts to find an unoccupied position before giving up.
const MAX_POSITION_DRAWS: usize = 1_000;

/// Source of new mutations for a single offspring gamete.
pub trait MutationModel {
    /// Draw the new mutations of one gamete born in `generation`.
    ///
    /// Positions are unique with respect to `lookup` and to each other, and
    /// are inserted into `lookup`. The result is sorted by position.
    fn sample_new_mutations<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        generation: u32,
        lookup: &mut PositionLookup,
    ) -> Result<Vec<Mutation>, SimError>;
}

/// Distribution of effect sizes for selected mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Dfe {
    /// Every mutation has the same effect.
    Constant { value: f64 },
    /// Exponential with the given mean. A negative mean gives negative
    /// effects.
    Exponential { mean: f64 },
    /// Normal with mean zero.
    Gaussian { sd: f64 },
    /// Gamma with the given mean and shape. A negative mean gives negative
    /// effects.
    Gamma { mean: f64, shape: f64 },
    /// Uniform on `[lo, hi)`.
    Uniform { lo: f64, hi: f64 },
    /// Correlated effects on several traits.
    MultivariateGaussian {
        means: Vec<f64>,
        covariance: Vec<Vec<f64>>,
    },
}

/// A region producing selected mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sregion {
    #[serde(flatten)]
    pub region: Region,
    pub dfe: Dfe,
    /// Dominance of the mutations.
    #[serde(default = "default_dominance")]
    pub dominance: f64,
    /// Drawn effects are divided by this value.
    #[serde(default = "default_scaling")]
    pub scaling: f64,
}

fn default_dominance() -> f64 {
    1.0
}

fn default_scaling() -> f64 {
    1.0
}

impl Sregion {
    pub fn new(region: Region, dfe: Dfe, dominance: f64) -> Self {
        Self {
            region,
            dfe,
            dominance,
            scaling: 1.0,
        }
    }

    pub fn with_scaling(mut self, scaling: f64) -> Self {
        self.scaling = scaling;
        self
    }
}

/// Serializable description of the mutation process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Expected number of neutral mutations per gamete per generation.
    pub neutral_rate: f64,
    /// Expected number of selected mutations per gamete per generation.
    pub selected_rate: f64,
    #[serde(default)]
    pub neutral_regions: Vec<Region>,
    #[serde(default)]
    pub selected_regions: Vec<Sregion>,
}

impl MutationConfig {
    /// No mutation at all.
    pub fn none() -> Self {
        Self {
            neutral_rate: 0.0,
            selected_rate: 0.0,
            neutral_regions: Vec::new(),
            selected_regions: Vec::new(),
        }
    }

    /// Neutral mutations only, uniformly over `[0, sequence_length)`.
    pub fn neutral(rate: f64, sequence_length: f64) -> Self {
        Self {
            neutral_rate: rate,
            neutral_regions: vec![Region::span(0.0, sequence_length)],
            ..Self::none()
        }
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self::none()
    }
}

/// Prepared sampler for one [`Dfe`].
#[derive(Debug, Clone)]
enum EffectSampler {
    Constant(f64),
    Exponential { dist: Exp<f64>, sign: f64 },
    Gaussian(Normal<f64>),
    Gamma { dist: Gamma<f64>, sign: f64 },
    Uniform(Uniform<f64>),
    MultivariateGaussian {
        means: DVector<f64>,
        /// Lower Cholesky factor of the covariance matrix.
        factor: DMatrix<f64>,
    },
}

fn cfg_err(what: &str, e: impl std::fmt::Display) -> SimError {
    SimError::config(format!("invalid {what}: {e}"))
}

impl EffectSampler {
    fn new(dfe: &Dfe) -> Result<Self, SimError> {
        match dfe {
            Dfe::Constant { value } => {
                if !value.is_finite() {
                    return Err(SimError::config("constant effect must be finite"));
                }
                Ok(Self::Constant(*value))
            }
            Dfe::Exponential { mean } => {
                if !(mean.is_finite() && *mean != 0.0) {
                    return Err(SimError::config(format!(
                        "exponential mean must be finite and non-zero, got {mean}"
                    )));
                }
                let dist = Exp::new(1.0 / mean.abs()).map_err(|e| cfg_err("exponential DFE", e))?;
                Ok(Self::Exponential {
                    dist,
                    sign: mean.signum(),
                })
            }
            Dfe::Gaussian { sd } => {
                if !(sd.is_finite() && *sd > 0.0) {
                    return Err(SimError::config(format!("Gaussian sd must be > 0, got {sd}")));
                }
                let dist = Normal::new(0.0, *sd).map_err(|e| cfg_err("Gaussian DFE", e))?;
                Ok(Self::Gaussian(dist))
            }
            Dfe::Gamma { mean, shape } => {
                if !(mean.is_finite() && *mean != 0.0) || !(shape.is_finite() && *shape > 0.0) {
                    return Err(SimError::config(format!(
                        "gamma DFE needs a non-zero mean and a positive shape, got mean {mean}, shape {shape}"
                    )));
                }
                let dist = Gamma::new(*shape, mean.abs() / shape)
                    .map_err(|e| cfg_err("gamma DFE", e))?;
                Ok(Self::Gamma {
                    dist,
                    sign: mean.signum(),
                })
            }
            Dfe::Uniform { lo, hi } => {
                if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                    return Err(SimError::config(format!(
                        "uniform DFE needs lo < hi, got [{lo}, {hi})"
                    )));
                }
                let dist = Uniform::new(*lo, *hi).map_err(|e| cfg_err("uniform DFE", e))?;
                Ok(Self::Uniform(dist))
            }
            Dfe::MultivariateGaussian { means, covariance } => {
                let factor = cholesky(covariance, means.len())?;
                Ok(Self::MultivariateGaussian {
                    means: DVector::from_column_slice(means),
                    factor,
                })
            }
        }
    }

    fn ndim(&self) -> usize {
        match self {
            Self::MultivariateGaussian { means, .. } => means.len(),
            _ => 1,
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        match self {
            Self::Constant(v) => vec![*v],
            Self::Exponential { dist, sign } => vec![sign * dist.sample(rng)],
            Self::Gaussian(dist) => vec![dist.sample(rng)],
            Self::Gamma { dist, sign } => vec![sign * dist.sample(rng)],
            Self::Uniform(dist) => vec![dist.sample(rng)],
            Self::MultivariateGaussian { means, factor } => {
                let z = DVector::from_iterator(
                    means.len(),
                    (0..means.len()).map(|_| StandardNormal.sample(rng)),
                );
                (factor * z + means).as_slice().to_vec()
            }
        }
    }
}

/// Lower Cholesky factor of a symmetric positive-definite matrix.
fn cholesky(rows: &[Vec<f64>], n: usize) -> Result<DMatrix<f64>, SimError> {
    if n == 0 {
        return Err(SimError::config("multivariate DFE needs at least one dimension"));
    }
    if rows.len() != n || rows.iter().any(|r| r.len() != n) {
        return Err(SimError::config(format!(
            "covariance matrix must be {n} x {n}"
        )));
    }
    let a = DMatrix::from_fn(n, n, |i, j| rows[i][j]);
    if a.iter().any(|x| !x.is_finite()) {
        return Err(SimError::config("covariance matrix must be finite"));
    }
    // the decomposition only reads the lower triangle
    if (0..n).any(|i| (0..i).any(|j| (a[(i, j)] - a[(j, i)]).abs() > 1e-12)) {
        return Err(SimError::config("covariance matrix must be symmetric"));
    }
    Cholesky::new(a)
        .map(|c| c.l())
        .ok_or_else(|| SimError::config("covariance matrix must be positive definite"))
}

/// The built-in [`MutationModel`].
#[derive(Debug, Clone)]
pub struct MutationRegions {
    neutral_rate: Option<Poisson<f64>>,
    selected_rate: Option<Poisson<f64>>,
    neutral: Vec<Region>,
    selected: Vec<Sregion>,
    samplers: Vec<EffectSampler>,
    neutral_picker: RegionPicker,
    selected_picker: RegionPicker,
}

fn poisson(rate: f64, what: &str, has_regions: bool) -> Result<Option<Poisson<f64>>, SimError> {
    if !(rate.is_finite() && rate >= 0.0) {
        return Err(SimError::config(format!("{what} rate must be >= 0, got {rate}")));
    }
    if rate == 0.0 {
        return Ok(None);
    }
    if !has_regions {
        return Err(SimError::config(format!(
            "{what} rate is {rate} but there are no {what} regions"
        )));
    }
    Poisson::new(rate)
        .map(Some)
        .map_err(|e| cfg_err(&format!("{what} rate"), e))
}

impl MutationRegions {
    /// Validate a configuration and prepare its samplers.
    ///
    /// # Errors
    /// `Configuration` for negative rates, a positive rate without regions,
    /// empty or inverted regions, non-positive weights or invalid DFE
    /// parameters.
    pub fn new(config: &MutationConfig, sequence_length: f64) -> Result<Self, SimError> {
        let neutral_refs: Vec<&Region> = config.neutral_regions.iter().collect();
        let selected_refs: Vec<&Region> =
            config.selected_regions.iter().map(|s| &s.region).collect();
        let neutral_picker = RegionPicker::new(&neutral_refs, sequence_length)?;
        let selected_picker = RegionPicker::new(&selected_refs, sequence_length)?;

        let mut samplers = Vec::with_capacity(config.selected_regions.len());
        for s in &config.selected_regions {
            if !(s.scaling.is_finite() && s.scaling != 0.0) {
                return Err(SimError::config(format!(
                    "region scaling must be finite and non-zero, got {}",
                    s.scaling
                )));
            }
            if !s.dominance.is_finite() {
                return Err(SimError::config("dominance must be finite"));
            }
            samplers.push(EffectSampler::new(&s.dfe)?);
        }

        Ok(Self {
            neutral_rate: poisson(config.neutral_rate, "neutral", !neutral_picker.is_empty())?,
            selected_rate: poisson(config.selected_rate, "selected", !selected_picker.is_empty())?,
            neutral: config.neutral_regions.clone(),
            selected: config.selected_regions.clone(),
            samplers,
            neutral_picker,
            selected_picker,
        })
    }

    /// Largest number of trait dimensions produced by any selected region.
    pub fn ndim(&self) -> usize {
        self.samplers.iter().map(|s| s.ndim()).max().unwrap_or(1)
    }

    fn draw_count<R: Rng + ?Sized>(dist: &Option<Poisson<f64>>, rng: &mut R) -> usize {
        dist.as_ref().map_or(0, |d| d.sample(rng) as usize)
    }

    fn unique_position<R: Rng + ?Sized>(
        region: &Region,
        rng: &mut R,
        lookup: &mut PositionLookup,
    ) -> Result<f64, SimError> {
        for _ in 0..MAX_POSITION_DRAWS {
            let pos = region.sample_position(rng);
            if lookup.insert(pos) {
                return Ok(pos);
            }
        }
        Err(SimError::invariant(format!(
            "no free mutation position found in [{}, {})",
            region.beg, region.end
        )))
    }
}

impl MutationModel for MutationRegions {
    fn sample_new_mutations<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        generation: u32,
        lookup: &mut PositionLookup,
    ) -> Result<Vec<Mutation>, SimError> {
        let n_neutral = Self::draw_count(&self.neutral_rate, rng);
        let n_selected = Self::draw_count(&self.selected_rate, rng);
        let mut out = Vec::with_capacity(n_neutral + n_selected);

        if let Err(e) = self.fill(rng, generation, lookup, n_neutral, n_selected, &mut out) {
            // release the positions claimed before the failure
            for m in &out {
                lookup.remove(m.position());
            }
            return Err(e);
        }

        out.sort_by(|a, b| a.position().total_cmp(&b.position()));
        Ok(out)
    }
}

impl MutationRegions {
    fn fill<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        generation: u32,
        lookup: &mut PositionLookup,
        n_neutral: usize,
        n_selected: usize,
        out: &mut Vec<Mutation>,
    ) -> Result<(), SimError> {
        for _ in 0..n_neutral {
            if let Some(i) = self.neutral_picker.pick(rng) {
                let region = &self.neutral[i];
                let pos = Self::unique_position(region, rng, lookup)?;
                out.push(Mutation::neutral(pos, generation, region.label));
            }
        }
        for _ in 0..n_selected {
            if let Some(i) = self.selected_picker.pick(rng) {
                let sregion = &self.selected[i];
                let pos = Self::unique_position(&sregion.region, rng, lookup)?;
                let effects: Vec<f64> = self.samplers[i]
                    .sample(rng)
                    .into_iter()
                    .map(|s| s / sregion.scaling)
                    .collect();
                out.push(Mutation::multivariate(
                    pos,
                    effects,
                    sregion.dominance,
                    generation,
                    sregion.region.label,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(42)
    }

    fn selected(dfe: Dfe) -> MutationConfig {
        MutationConfig {
            neutral_rate: 0.0,
            selected_rate: 5.0,
            neutral_regions: vec![],
            selected_regions: vec![Sregion::new(Region::span(0.0, 1.0), dfe, 0.5)],
        }
    }

    #[test]
    fn test_negative_rate_rejected() {
        let mut cfg = MutationConfig::neutral(1.0, 1.0);
        cfg.neutral_rate = -1.0;
        assert!(matches!(
            MutationRegions::new(&cfg, 1.0),
            Err(SimError::Configuration(_))
        ));
    }

    #[test]
    fn test_rate_without_regions_rejected() {
        let cfg = MutationConfig {
            neutral_rate: 1.0,
            ..MutationConfig::none()
        };
        assert!(MutationRegions::new(&cfg, 1.0).is_err());
    }

    #[test]
    fn test_invalid_dfe_rejected() {
        assert!(MutationRegions::new(&selected(Dfe::Gaussian { sd: 0.0 }), 1.0).is_err());
        assert!(MutationRegions::new(&selected(Dfe::Exponential { mean: 0.0 }), 1.0).is_err());
        assert!(MutationRegions::new(
            &selected(Dfe::Gamma {
                mean: 0.1,
                shape: -1.0
            }),
            1.0
        )
        .is_err());
        assert!(MutationRegions::new(&selected(Dfe::Uniform { lo: 1.0, hi: 0.0 }), 1.0).is_err());
        assert!(MutationRegions::new(
            &selected(Dfe::MultivariateGaussian {
                means: vec![0.0, 0.0],
                covariance: vec![vec![1.0, 2.0], vec![2.0, 1.0]],
            }),
            1.0
        )
        .is_err());
    }

    #[test]
    fn test_zero_rates_produce_nothing() {
        let model = MutationRegions::new(&MutationConfig::none(), 1.0).unwrap();
        let mut lookup = PositionLookup::new();
        let muts = model.sample_new_mutations(&mut rng(), 1, &mut lookup).unwrap();
        assert!(muts.is_empty());
    }

    #[test]
    fn test_new_mutations_sorted_unique_and_recorded() {
        let model = MutationRegions::new(&MutationConfig::neutral(20.0, 1.0), 1.0).unwrap();
        let mut lookup = PositionLookup::new();
        let mut r = rng();
        let first = model.sample_new_mutations(&mut r, 3, &mut lookup).unwrap();
        assert!(!first.is_empty());
        assert!(first.windows(2).all(|w| w[0].position() < w[1].position()));
        assert_eq!(lookup.len(), first.len());
        for m in &first {
            assert!(m.is_neutral());
            assert_eq!(m.origin(), 3);
            assert!(lookup.contains(m.position()));
        }
        let second = model.sample_new_mutations(&mut r, 3, &mut lookup).unwrap();
        assert_eq!(lookup.len(), first.len() + second.len());
    }

    #[test]
    fn test_constant_effect_is_scaled() {
        let mut cfg = selected(Dfe::Constant { value: -0.2 });
        cfg.selected_regions[0].scaling = 2.0;
        let model = MutationRegions::new(&cfg, 1.0).unwrap();
        let mut lookup = PositionLookup::new();
        let muts = model.sample_new_mutations(&mut rng(), 0, &mut lookup).unwrap();
        for m in &muts {
            assert_eq!(m.effect(), -0.1);
            assert_eq!(m.dominance(), 0.5);
        }
    }

    #[test]
    fn test_exponential_sign_follows_mean() {
        let model = MutationRegions::new(&selected(Dfe::Exponential { mean: -0.05 }), 1.0).unwrap();
        let mut lookup = PositionLookup::new();
        let mut r = rng();
        for _ in 0..20 {
            for m in model.sample_new_mutations(&mut r, 0, &mut lookup).unwrap() {
                assert!(m.effect() <= 0.0);
            }
        }
    }

    #[test]
    fn test_multivariate_dimension() {
        let cfg = selected(Dfe::MultivariateGaussian {
            means: vec![0.0, 1.0, -1.0],
            covariance: vec![
                vec![1.0, 0.5, 0.0],
                vec![0.5, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
        });
        let model = MutationRegions::new(&cfg, 1.0).unwrap();
        assert_eq!(model.ndim(), 3);
        let mut lookup = PositionLookup::new();
        let muts = model.sample_new_mutations(&mut rng(), 0, &mut lookup).unwrap();
        for m in &muts {
            assert_eq!(m.effect_sizes().len(), 3);
        }
    }

    #[test]
    fn test_cholesky_reconstructs_matrix() {
        let rows = vec![vec![4.0, 2.0], vec![2.0, 3.0]];
        let l = cholesky(&rows, 2).unwrap();
        assert_eq!(l[(0, 1)], 0.0);
        let back = &l * l.transpose();
        for i in 0..2 {
            for j in 0..2 {
                assert!((back[(i, j)] - rows[i][j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_cholesky_rejects_bad_covariance() {
        let asymmetric = vec![vec![1.0, 0.5], vec![0.0, 1.0]];
        assert!(cholesky(&asymmetric, 2).is_err());
        let not_finite = vec![vec![f64::NAN, 0.0], vec![0.0, 1.0]];
        assert!(cholesky(&not_finite, 2).is_err());
        assert!(cholesky(&[vec![1.0]], 2).is_err());
        assert!(cholesky(&[], 0).is_err());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "neutral_rate": 0.5,
            "selected_rate": 0.1,
            "neutral_regions": [{"beg": 0.0, "end": 1.0}],
            "selected_regions": [
                {"beg": 0.0, "end": 0.5, "dfe": {"type": "gamma", "mean": -0.01, "shape": 0.3}, "dominance": 0.25}
            ]
        }"#;
        let cfg: MutationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.selected_regions[0].scaling, 1.0);
        assert!(cfg.neutral_regions[0].coupled);
        assert!(MutationRegions::new(&cfg, 1.0).is_ok());
    }
}
