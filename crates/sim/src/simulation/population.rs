//! The simulated population.
//!
//! A [`Population`] owns every piece of state that evolves: the mutation
//! arena, the gamete arena, the diploids with their metadata, mutation
//! counts, fixations and the ancestry tables.

use serde::{Deserialize, Serialize};

use crate::base::{GameteArena, Mutation, PositionLookup};
use crate::errors::SimError;
use crate::genome::{Diploid, DiploidMetadata};
use crate::tables::TableCollection;

/// What [`Population::prune`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrunePolicy {
    /// Remove mutations carried by no current genome and no preserved node.
    #[serde(default = "yes")]
    pub remove_extinct: bool,
    /// Also move fixed selected mutations to the fixation list. Fixed
    /// neutral mutations are always moved.
    #[serde(default)]
    pub prune_selected: bool,
}

fn yes() -> bool {
    true
}

impl Default for PrunePolicy {
    fn default() -> Self {
        Self {
            remove_extinct: true,
            prune_selected: false,
        }
    }
}

/// Preserved samples that share one node time.
#[derive(Debug, Clone, PartialEq)]
pub struct AncientTimepoint {
    pub time: f64,
    /// Two node ids per preserved individual.
    pub nodes: Vec<u32>,
    pub metadata: Vec<DiploidMetadata>,
}

/// A Wright-Fisher population of diploids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Population {
    pub(crate) generation: u32,
    sequence_length: f64,
    locus_boundaries: Vec<(f64, f64)>,
    pub(crate) mutations: Vec<Mutation>,
    pub(crate) gametes: GameteArena,
    pub(crate) diploids: Vec<Diploid>,
    pub(crate) diploid_metadata: Vec<DiploidMetadata>,
    pub(crate) mcounts: Vec<u32>,
    pub(crate) mcounts_from_preserved_nodes: Vec<u32>,
    pub(crate) fixations: Vec<Mutation>,
    pub(crate) fixation_times: Vec<u32>,
    pub(crate) tables: TableCollection,
    pub(crate) ancient_sample_metadata: Vec<DiploidMetadata>,
    #[serde(skip)]
    pub(crate) lookup: PositionLookup,
}

impl Population {
    /// `n` founders on a genome of length `sequence_length`.
    ///
    /// Every founder carries the same empty gamete twice; founder `i` owns
    /// nodes `2i` and `2i + 1` at time 0.
    pub fn new(n: usize, sequence_length: f64) -> Result<Self, SimError> {
        Self::with_loci(n, sequence_length, Vec::new())
    }

    /// Like [`Population::new`] with locus boundaries for multi-locus
    /// calculators. Loci must be non-empty, sorted, non-overlapping and
    /// inside the genome.
    pub fn with_loci(
        n: usize,
        sequence_length: f64,
        locus_boundaries: Vec<(f64, f64)>,
    ) -> Result<Self, SimError> {
        if n == 0 {
            return Err(SimError::config("population size must be > 0"));
        }
        let copies = u32::try_from(2 * n)
            .map_err(|_| SimError::config(format!("population size {n} is too large")))?;
        let mut tables = TableCollection::new(sequence_length)?;
        check_loci(&locus_boundaries, sequence_length)?;

        for _ in 0..copies {
            tables.add_node(0.0, 0);
        }
        let diploids = vec![Diploid::new(0, 0); n];
        let diploid_metadata = (0..n as u32).map(DiploidMetadata::founder).collect();

        Ok(Self {
            generation: 0,
            sequence_length,
            locus_boundaries,
            mutations: Vec::new(),
            gametes: GameteArena::with_empty_gamete(copies),
            diploids,
            diploid_metadata,
            mcounts: Vec::new(),
            mcounts_from_preserved_nodes: Vec::new(),
            fixations: Vec::new(),
            fixation_times: Vec::new(),
            tables,
            ancient_sample_metadata: Vec::new(),
            lookup: PositionLookup::new(),
        })
    }

    /// Get the current generation number.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of diploids (N).
    pub fn size(&self) -> usize {
        self.diploids.len()
    }

    pub fn sequence_length(&self) -> f64 {
        self.sequence_length
    }

    pub fn locus_boundaries(&self) -> &[(f64, f64)] {
        &self.locus_boundaries
    }

    /// The mutation arena, including extinct mutations not yet pruned.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn gametes(&self) -> &GameteArena {
        &self.gametes
    }

    pub fn diploids(&self) -> &[Diploid] {
        &self.diploids
    }

    pub fn diploid_metadata(&self) -> &[DiploidMetadata] {
        &self.diploid_metadata
    }

    /// Copies of each mutation among the 2N current genomes.
    pub fn mcounts(&self) -> &[u32] {
        &self.mcounts
    }

    /// Copies of each mutation among the preserved nodes.
    pub fn mcounts_from_preserved_nodes(&self) -> &[u32] {
        &self.mcounts_from_preserved_nodes
    }

    pub fn fixations(&self) -> &[Mutation] {
        &self.fixations
    }

    /// Generation at which each entry of [`Population::fixations`] was
    /// recorded.
    pub fn fixation_times(&self) -> &[u32] {
        &self.fixation_times
    }

    pub fn tables(&self) -> &TableCollection {
        &self.tables
    }

    /// Metadata of every preserved individual, in the order preserved.
    pub fn ancient_sample_metadata(&self) -> &[DiploidMetadata] {
        &self.ancient_sample_metadata
    }

    pub fn position_lookup(&self) -> &PositionLookup {
        &self.lookup
    }

    /// Preserved samples grouped by node time, oldest first.
    pub fn sample_timepoints(&self) -> Vec<AncientTimepoint> {
        let nodes = self.tables.nodes();
        let mut out: Vec<AncientTimepoint> = Vec::new();
        for md in &self.ancient_sample_metadata {
            let time = nodes
                .get(md.nodes[0] as usize)
                .map_or(f64::NAN, |n| n.time);
            match out.last_mut() {
                Some(tp) if tp.time == time => {
                    tp.nodes.extend_from_slice(&md.nodes);
                    tp.metadata.push(*md);
                }
                _ => out.push(AncientTimepoint {
                    time,
                    nodes: md.nodes.to_vec(),
                    metadata: vec![*md],
                }),
            }
        }
        out
    }

    /// Recount every mutation. See [`crate::simulation::counting`].
    pub fn count_mutations(&mut self) -> Result<(), SimError> {
        super::counting::count_mutations(self)
    }

    /// Simplify the tables with respect to the current generation and the
    /// preserved samples.
    ///
    /// The current generation's genomes become nodes `0..2N` in diploid
    /// order, so afterwards `diploid_metadata[i].nodes == [2i, 2i + 1]`.
    /// Preserved nodes and ancient sample metadata are remapped; mutation
    /// records no sample inherits are dropped. Counts are left as they are.
    pub fn simplify(&mut self) -> Result<(), SimError> {
        let samples: Vec<u32> = self
            .diploid_metadata
            .iter()
            .flat_map(|md| md.nodes)
            .collect();
        let positions: Vec<f64> = self.mutations.iter().map(|m| m.position()).collect();
        let node_map = self.tables.simplify(&samples, &positions)?;

        let remap = |nodes: &mut [u32; 2]| {
            for u in nodes.iter_mut() {
                *u = node_map[*u as usize];
            }
        };
        for md in self
            .diploid_metadata
            .iter_mut()
            .chain(self.ancient_sample_metadata.iter_mut())
        {
            remap(&mut md.nodes);
        }
        Ok(())
    }

    /// Remove extinct mutations and move fixed ones to the fixation list.
    ///
    /// Must follow a counting pass. Surviving mutations keep their relative
    /// order; gametes, mutation records, counts and the position lookup are
    /// rewritten to the new keys.
    ///
    /// # Errors
    /// `InvariantViolation` if the counts do not match the arena.
    pub fn prune(&mut self, policy: PrunePolicy) -> Result<(), SimError> {
        let n = self.mutations.len();
        if self.mcounts.len() != n || self.mcounts_from_preserved_nodes.len() != n {
            return Err(SimError::invariant(format!(
                "{} mutations but {} counts and {} preserved-node counts",
                n,
                self.mcounts.len(),
                self.mcounts_from_preserved_nodes.len()
            )));
        }

        let twice_n = 2 * self.size() as u32;
        let n_preserved = self.tables.preserved_nodes().len() as u32;
        let mut remap = Vec::with_capacity(n);
        let mut next = 0u32;
        let mut removed = 0usize;

        for i in 0..n {
            let m = &self.mutations[i];
            let current = self.mcounts[i];
            let ancient = self.mcounts_from_preserved_nodes[i];

            let extinct = current == 0 && ancient == 0;
            let fixed = current == twice_n
                && (n_preserved == 0 || ancient == n_preserved)
                && (m.is_neutral() || policy.prune_selected);

            if fixed {
                self.fixations.push(m.clone());
                self.fixation_times.push(self.generation);
            }
            if fixed || (extinct && policy.remove_extinct) {
                self.lookup.remove(m.position());
                remap.push(None);
                removed += 1;
            } else {
                remap.push(Some(next));
                next += 1;
            }
        }

        if removed == 0 {
            return Ok(());
        }

        let keep = |i: &usize| remap[*i].is_some();
        self.mutations = std::mem::take(&mut self.mutations)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep(i))
            .map(|(_, m)| m)
            .collect();
        self.mcounts = (0..n).filter(keep).map(|i| self.mcounts[i]).collect();
        self.mcounts_from_preserved_nodes = (0..n)
            .filter(keep)
            .map(|i| self.mcounts_from_preserved_nodes[i])
            .collect();
        self.gametes.remap_mutations(&remap);
        self.tables.remap_mutation_keys(&remap);
        Ok(())
    }

    /// Encode the population as an opaque checkpoint.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SimError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a checkpoint written by [`Population::to_bytes`]. The edge
    /// index is left stale and the position lookup is rebuilt.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SimError> {
        let mut pop: Self = bincode::deserialize(bytes)?;
        if pop.diploids.len() != pop.diploid_metadata.len() {
            return Err(SimError::invariant(format!(
                "checkpoint holds {} diploids but {} metadata rows",
                pop.diploids.len(),
                pop.diploid_metadata.len()
            )));
        }
        pop.gametes.rebuild_refcounts(&pop.diploids)?;
        pop.lookup = PositionLookup::from_mutations(&pop.mutations);
        pop.tables.invalidate_index();
        Ok(pop)
    }

    #[cfg(test)]
    pub(crate) fn set_generation_for_test(&mut self, generation: u32) {
        self.generation = generation;
    }

    /// Replace the genetic state without touching the tables.
    #[cfg(test)]
    pub(crate) fn install_for_test(
        &mut self,
        mutations: Vec<Mutation>,
        gametes: Vec<Vec<u32>>,
        diploids: &[(u32, u32)],
    ) {
        let mut arena = GameteArena::new();
        for keys in gametes {
            arena.alloc(keys);
        }
        self.diploids = diploids.iter().map(|&(a, b)| Diploid::new(a, b)).collect();
        self.diploid_metadata = (0..self.diploids.len() as u32)
            .map(DiploidMetadata::founder)
            .collect();
        arena.rebuild_refcounts(&self.diploids).unwrap();
        self.gametes = arena;
        self.lookup = PositionLookup::from_mutations(&mutations);
        self.mutations = mutations;
    }
}

fn check_loci(loci: &[(f64, f64)], sequence_length: f64) -> Result<(), SimError> {
    let mut prev_end = 0.0;
    for &(beg, end) in loci {
        if !(beg.is_finite() && end.is_finite() && beg < end) {
            return Err(SimError::config(format!("locus [{beg}, {end}) is empty or inverted")));
        }
        if beg < prev_end || end > sequence_length {
            return Err(SimError::config(format!(
                "locus [{beg}, {end}) overlaps its predecessor or leaves [0, {sequence_length})"
            )));
        }
        prev_end = end;
    }
    Ok(())
}
