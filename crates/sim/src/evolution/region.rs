//! Genomic intervals with sampling weights.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::SimError;

/// Half-open interval `[beg, end)` of the genome.
///
/// When `coupled` is true the sampling weight of the region is
/// `weight * (end - beg)`, so longer regions receive proportionally more
/// events. Otherwise `weight` is used as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub beg: f64,
    pub end: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_coupled")]
    pub coupled: bool,
    #[serde(default)]
    pub label: u16,
}

fn default_weight() -> f64 {
    1.0
}

fn default_coupled() -> bool {
    true
}

impl Region {
    pub fn new(beg: f64, end: f64, weight: f64, coupled: bool, label: u16) -> Self {
        Self {
            beg,
            end,
            weight,
            coupled,
            label,
        }
    }

    /// Region `[beg, end)` with unit weight coupled to its length.
    pub fn span(beg: f64, end: f64) -> Self {
        Self::new(beg, end, 1.0, true, 0)
    }

    /// Checks the interval against the genome length and the weight.
    pub fn validate(&self, sequence_length: f64) -> Result<(), SimError> {
        if !(self.beg.is_finite() && self.end.is_finite()) {
            return Err(SimError::config(format!(
                "region [{}, {}) has non-finite bounds",
                self.beg, self.end
            )));
        }
        if self.beg < 0.0 || self.end > sequence_length {
            return Err(SimError::config(format!(
                "region [{}, {}) lies outside [0, {sequence_length})",
                self.beg, self.end
            )));
        }
        if self.beg >= self.end {
            return Err(SimError::config(format!(
                "region [{}, {}) is empty or inverted",
                self.beg, self.end
            )));
        }
        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Err(SimError::config(format!(
                "region weight must be > 0, got {}",
                self.weight
            )));
        }
        Ok(())
    }

    /// Sampling weight of the region.
    pub fn effective_weight(&self) -> f64 {
        if self.coupled {
            self.weight * (self.end - self.beg)
        } else {
            self.weight
        }
    }

    /// Uniform position in `[beg, end)`.
    pub fn sample_position<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let pos = rng.random_range(self.beg..self.end);
        // rounding can land exactly on `end` for very narrow regions
        if pos >= self.end {
            self.beg
        } else {
            pos
        }
    }
}

/// Picks regions with probability proportional to their effective weight.
#[derive(Debug, Clone)]
pub(crate) struct RegionPicker {
    dist: Option<WeightedIndex<f64>>,
}

impl RegionPicker {
    pub(crate) fn new(regions: &[&Region], sequence_length: f64) -> Result<Self, SimError> {
        for r in regions {
            r.validate(sequence_length)?;
        }
        if regions.is_empty() {
            return Ok(Self { dist: None });
        }
        let weights: Vec<f64> = regions.iter().map(|r| r.effective_weight()).collect();
        let dist = WeightedIndex::new(weights)
            .map_err(|e| SimError::config(format!("invalid region weights: {e}")))?;
        Ok(Self { dist: Some(dist) })
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.dist.is_none()
    }

    /// Index of the chosen region, `None` if there are no regions.
    pub(crate) fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        self.dist.as_ref().map(|d| d.sample(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_validate_rejects_inverted_and_outside() {
        assert!(Region::span(0.5, 0.2).validate(1.0).is_err());
        assert!(Region::span(0.5, 0.5).validate(1.0).is_err());
        assert!(Region::span(-0.1, 0.5).validate(1.0).is_err());
        assert!(Region::span(0.0, 1.5).validate(1.0).is_err());
        assert!(Region::new(0.0, 1.0, 0.0, true, 0).validate(1.0).is_err());
        assert!(Region::span(0.0, 1.0).validate(1.0).is_ok());
    }

    #[test]
    fn test_effective_weight() {
        assert_eq!(Region::new(0.0, 0.5, 2.0, true, 0).effective_weight(), 1.0);
        assert_eq!(Region::new(0.0, 0.5, 2.0, false, 0).effective_weight(), 2.0);
    }

    #[test]
    fn test_sample_position_in_bounds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let r = Region::span(0.25, 0.5);
        for _ in 0..1000 {
            let x = r.sample_position(&mut rng);
            assert!((0.25..0.5).contains(&x));
        }
    }

    #[test]
    fn test_picker_follows_weights() {
        let a = Region::new(0.0, 0.5, 1.0, false, 0);
        let b = Region::new(0.5, 1.0, 3.0, false, 1);
        let picker = RegionPicker::new(&[&a, &b], 1.0).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let n = 20_000;
        let hits = (0..n).filter(|_| picker.pick(&mut rng) == Some(1)).count();
        let freq = hits as f64 / n as f64;
        assert!((freq - 0.75).abs() < 0.02, "freq = {freq}");
    }

    #[test]
    fn test_empty_picker() {
        let picker = RegionPicker::new(&[], 1.0).unwrap();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        assert!(picker.is_empty());
        assert_eq!(picker.pick(&mut rng), None);
    }
}
