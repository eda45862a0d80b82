//! Recombination region models.
//!
//! A [`RecombinationModel`] returns the crossover positions for one
//! meiosis. The offspring gamete copies `[0, b0)` from the starting parental
//! gamete, `[b0, b1)` from the other one, and so on.

use rand::Rng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};

use super::region::{Region, RegionPicker};
use crate::errors::SimError;

/// Source of crossover positions.
pub trait RecombinationModel {
    /// Sorted, deduplicated breakpoints strictly inside the genome.
    fn breakpoints<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64>;
}

/// Serializable description of the recombination process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecombinationConfig {
    /// Expected number of crossovers per meiosis.
    pub rate: f64,
    #[serde(default)]
    pub regions: Vec<Region>,
}

impl RecombinationConfig {
    pub fn none() -> Self {
        Self {
            rate: 0.0,
            regions: Vec::new(),
        }
    }

    /// Crossovers uniformly over `[0, sequence_length)`.
    pub fn uniform(rate: f64, sequence_length: f64) -> Self {
        Self {
            rate,
            regions: vec![Region::span(0.0, sequence_length)],
        }
    }
}

impl Default for RecombinationConfig {
    fn default() -> Self {
        Self::none()
    }
}

/// The built-in [`RecombinationModel`].
#[derive(Debug, Clone)]
pub struct RecombinationRegions {
    rate: Option<Poisson<f64>>,
    regions: Vec<Region>,
    picker: RegionPicker,
}

impl RecombinationRegions {
    /// # Errors
    /// `Configuration` for a negative rate, a positive rate without regions,
    /// or any invalid region.
    pub fn new(config: &RecombinationConfig, sequence_length: f64) -> Result<Self, SimError> {
        let refs: Vec<&Region> = config.regions.iter().collect();
        let picker = RegionPicker::new(&refs, sequence_length)?;
        let rate = config.rate;
        if !(rate.is_finite() && rate >= 0.0) {
            return Err(SimError::config(format!(
                "recombination rate must be >= 0, got {rate}"
            )));
        }
        let rate = if rate == 0.0 {
            None
        } else {
            if picker.is_empty() {
                return Err(SimError::config(format!(
                    "recombination rate is {rate} but there are no recombination regions"
                )));
            }
            Some(Poisson::new(rate).map_err(|e| {
                SimError::config(format!("invalid recombination rate: {e}"))
            })?)
        };
        Ok(Self {
            rate,
            regions: config.regions.clone(),
            picker,
        })
    }
}

impl RecombinationModel for RecombinationRegions {
    fn breakpoints<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let Some(dist) = &self.rate else {
            return Vec::new();
        };
        let n = dist.sample(rng) as usize;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            if let Some(i) = self.picker.pick(rng) {
                let x = self.regions[i].sample_position(rng);
                // a breakpoint at 0 does not split anything
                if x > 0.0 {
                    out.push(x);
                }
            }
        }
        out.sort_by(f64::total_cmp);
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_zero_rate_gives_no_breakpoints() {
        let model = RecombinationRegions::new(&RecombinationConfig::none(), 1.0).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        assert!(model.breakpoints(&mut rng).is_empty());
    }

    #[test]
    fn test_invalid_config() {
        let mut cfg = RecombinationConfig::uniform(1.0, 1.0);
        cfg.rate = -0.5;
        assert!(RecombinationRegions::new(&cfg, 1.0).is_err());

        let cfg = RecombinationConfig {
            rate: 1.0,
            regions: vec![],
        };
        assert!(RecombinationRegions::new(&cfg, 1.0).is_err());

        let cfg = RecombinationConfig {
            rate: 1.0,
            regions: vec![Region::span(0.8, 0.2)],
        };
        assert!(RecombinationRegions::new(&cfg, 1.0).is_err());
    }

    #[test]
    fn test_breakpoints_sorted_in_region() {
        let cfg = RecombinationConfig {
            rate: 10.0,
            regions: vec![Region::span(0.2, 0.4)],
        };
        let model = RecombinationRegions::new(&cfg, 1.0).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let mut total = 0;
        for _ in 0..100 {
            let bps = model.breakpoints(&mut rng);
            assert!(bps.windows(2).all(|w| w[0] < w[1]));
            assert!(bps.iter().all(|&x| (0.2..0.4).contains(&x)));
            total += bps.len();
        }
        let mean = total as f64 / 100.0;
        assert!((mean - 10.0).abs() < 1.5, "mean = {mean}");
    }
}
