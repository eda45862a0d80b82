use serde::{Deserialize, Serialize};

use crate::errors::SimError;
use crate::genome::{Diploid, Gamete};

/// Arena of gametes with reference counts and slot recycling.
///
/// Diploids refer to gametes by index. Slots whose reference count drops to
/// zero go onto a free list and are reused by later allocations instead of
/// growing the arena.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameteArena {
    gametes: Vec<Gamete>,
    /// Slots with `n == 0`, popped from the back.
    free: Vec<u32>,
    /// Previous contents of slots recycled since the last mark.
    #[serde(skip)]
    evicted: Vec<(u32, Gamete)>,
}

/// Arena state captured at the start of a generation.
#[derive(Debug, Clone)]
pub struct ArenaMark {
    len: usize,
    free: Vec<u32>,
    counts: Vec<u32>,
}

impl GameteArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena holding a single empty gamete referenced by `copies` genomes.
    pub fn with_empty_gamete(copies: u32) -> Self {
        let mut g = Gamete::new(Vec::new());
        g.n = copies;
        Self {
            gametes: vec![g],
            free: Vec::new(),
            evicted: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.gametes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.gametes.is_empty()
    }

    #[inline]
    pub fn get(&self, index: u32) -> Option<&Gamete> {
        self.gametes.get(index as usize)
    }

    #[inline]
    pub fn as_slice(&self) -> &[Gamete] {
        &self.gametes
    }

    /// Number of recyclable slots.
    pub fn free_slots(&self) -> usize {
        self.free.len()
    }

    /// Stores a new gamete and returns its index.
    ///
    /// The new gamete starts with `n == 0`; counts are set by
    /// [`GameteArena::rebuild_refcounts`] once the generation is installed.
    pub fn alloc(&mut self, mutations: Vec<u32>) -> u32 {
        match self.free.pop() {
            Some(slot) => {
                let old = std::mem::replace(&mut self.gametes[slot as usize], Gamete::new(mutations));
                self.evicted.push((slot, old));
                slot
            }
            None => {
                self.gametes.push(Gamete::new(mutations));
                (self.gametes.len() - 1) as u32
            }
        }
    }

    pub fn mark(&mut self) -> ArenaMark {
        self.evicted.clear();
        ArenaMark {
            len: self.gametes.len(),
            free: self.free.clone(),
            counts: self.gametes.iter().map(|g| g.n).collect(),
        }
    }

    /// Undo every allocation and recount made since `mark`.
    pub fn rollback(&mut self, mark: ArenaMark) {
        self.gametes.truncate(mark.len);
        while let Some((slot, old)) = self.evicted.pop() {
            if (slot as usize) < self.gametes.len() {
                self.gametes[slot as usize] = old;
            }
        }
        for (g, &n) in self.gametes.iter_mut().zip(&mark.counts) {
            g.n = n;
        }
        self.free = mark.free;
    }

    /// Recompute `n` for every gamete from the diploids and rebuild the free
    /// list. Unreferenced slots are emptied.
    pub fn rebuild_refcounts(&mut self, diploids: &[Diploid]) -> Result<(), SimError> {
        self.recount(diploids)?;
        self.free.clear();
        for (i, g) in self.gametes.iter_mut().enumerate().rev() {
            if g.n == 0 {
                g.clear();
                self.free.push(i as u32);
            }
        }
        self.evicted.clear();
        Ok(())
    }

    /// Recompute `n` for every gamete from the diploids. Unlike
    /// [`GameteArena::rebuild_refcounts`] no slot is emptied or freed, so
    /// the change can still be undone by [`GameteArena::rollback`].
    pub fn recount(&mut self, diploids: &[Diploid]) -> Result<(), SimError> {
        let len = self.gametes.len();
        for d in diploids {
            if d.first as usize >= len || d.second as usize >= len {
                return Err(SimError::invariant(format!(
                    "diploid refers to gamete ({}, {}) but the arena holds {len}",
                    d.first, d.second
                )));
            }
        }

        for g in &mut self.gametes {
            g.n = 0;
        }
        for d in diploids {
            self.gametes[d.first as usize].n += 1;
            self.gametes[d.second as usize].n += 1;
        }
        Ok(())
    }

    /// Rewrites mutation keys in every gamete after the mutation arena was
    /// compacted.
    pub(crate) fn remap_mutations(&mut self, remap: &[Option<u32>]) {
        for g in &mut self.gametes {
            g.remap(remap);
        }
    }

    pub(crate) fn iter_live(&self) -> impl Iterator<Item = &Gamete> {
        self.gametes.iter().filter(|g| g.n > 0)
    }
}
