//! Collection of individuals to preserve as ancient samples.

use ndarray::{ArrayBase, Data, Dimension};

use crate::errors::SimError;

/// Individual indices (not node ids) chosen for preservation during one
/// generation.
///
/// The simulation hands a fresh recorder to the sampling policy every
/// generation, then maps the indices to node ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleRecorder {
    samples: Vec<u32>,
}

impl SampleRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one index. Duplicates are allowed.
    pub fn add(&mut self, index: u32) {
        self.samples.push(index);
    }

    /// Replace the buffer with the contents of a one-dimensional array.
    ///
    /// # Errors
    /// `InputValidation` if the array is not one-dimensional or is empty.
    /// The buffer is left unchanged.
    pub fn assign<S, D>(&mut self, indices: &ArrayBase<S, D>) -> Result<(), SimError>
    where
        S: Data<Elem = u32>,
        D: Dimension,
    {
        if indices.ndim() != 1 {
            return Err(SimError::input(format!(
                "preserved sample list must have ndim == 1, got {}",
                indices.ndim()
            )));
        }
        if indices.is_empty() {
            return Err(SimError::input("empty list of samples to preserve"));
        }
        self.samples.clear();
        self.samples.extend(indices.iter().copied());
        Ok(())
    }

    pub fn samples(&self) -> &[u32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Validated indices in first-occurrence order without duplicates.
    ///
    /// # Errors
    /// `InputValidation` if any index is `>= population_size`.
    pub(crate) fn unique_indices(&self, population_size: usize) -> Result<Vec<u32>, SimError> {
        let mut seen = vec![false; population_size];
        let mut out = Vec::with_capacity(self.samples.len());
        for &i in &self.samples {
            let slot = seen.get_mut(i as usize).ok_or_else(|| {
                SimError::input(format!(
                    "sample index {i} out of range for a population of {population_size}"
                ))
            })?;
            if !*slot {
                *slot = true;
                out.push(i);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array1};

    #[test]
    fn test_add_and_clear() {
        let mut r = SampleRecorder::new();
        r.add(3);
        r.add(3);
        r.add(1);
        assert_eq!(r.samples(), &[3, 3, 1]);
        assert_eq!(r.len(), 3);
        r.clear();
        assert!(r.is_empty());
    }

    #[test]
    fn test_assign_replaces_buffer() {
        let mut r = SampleRecorder::new();
        r.add(9);
        r.assign(&arr1(&[0u32, 2, 4])).unwrap();
        assert_eq!(r.samples(), &[0, 2, 4]);
    }

    #[test]
    fn test_assign_rejects_empty() {
        let mut r = SampleRecorder::new();
        r.add(1);
        let err = r.assign(&Array1::<u32>::zeros(0)).unwrap_err();
        assert!(err.to_string().contains("empty list of samples to preserve"));
        assert_eq!(r.samples(), &[1]);
    }

    #[test]
    fn test_assign_rejects_two_dimensions() {
        let mut r = SampleRecorder::new();
        let err = r.assign(&arr2(&[[0u32, 1], [2, 3]])).unwrap_err();
        assert!(matches!(err, SimError::InputValidation(_)));
        assert!(err.to_string().contains("ndim == 1"));
        assert!(r.is_empty());
    }

    #[test]
    fn test_unique_indices() {
        let mut r = SampleRecorder::new();
        for i in [4, 1, 4, 0, 1] {
            r.add(i);
        }
        assert_eq!(r.unique_indices(5).unwrap(), vec![4, 1, 0]);
        assert!(r.unique_indices(4).is_err());
    }
}
