use serde::{Deserialize, Serialize};

use crate::base::Mutation;

/// One haploid genome.
///
/// Holds the keys of the mutations it carries, sorted by position, and the
/// number of diploid genome copies currently pointing at it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gamete {
    /// Reference count.
    pub(crate) n: u32,
    mutations: Vec<u32>,
}

impl Gamete {
    /// Create a gamete with no references yet.
    pub fn new(mutations: Vec<u32>) -> Self {
        Self { n: 0, mutations }
    }

    /// Number of diploid genome copies referring to this gamete.
    #[inline]
    pub fn count(&self) -> u32 {
        self.n
    }

    /// Mutation keys, sorted by position.
    #[inline]
    pub fn mutations(&self) -> &[u32] {
        &self.mutations
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Keys of the mutations whose position lies in `[begin, end)`.
    ///
    /// Relies on the position ordering of the key list.
    pub fn mutations_in(&self, mutations: &[Mutation], begin: f64, end: f64) -> &[u32] {
        let lo = self
            .mutations
            .partition_point(|&k| mutations[k as usize].position() < begin);
        let hi = self
            .mutations
            .partition_point(|&k| mutations[k as usize].position() < end);
        &self.mutations[lo..hi]
    }

    pub(crate) fn clear(&mut self) {
        self.n = 0;
        self.mutations.clear();
    }

    pub(crate) fn set_mutations(&mut self, mutations: Vec<u32>) {
        self.mutations = mutations;
    }

    /// Rewrite keys after the arena was compacted. `remap[old]` is the new
    /// key, or `None` for removed mutations.
    pub(crate) fn remap(&mut self, remap: &[Option<u32>]) {
        self.mutations.retain_mut(|k| match remap[*k as usize] {
            Some(new) => {
                *k = new;
                true
            }
            None => false,
        });
    }
}
