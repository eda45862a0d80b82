//! Ancestry tables: nodes, edges, mutation records and preserved nodes.
//!
//! Node times run forward: founders live at time 0 and an offspring born
//! while the population is at generation `t` gets time `t + 1`. All tables
//! are append-only during a generation; [`TableCollection::rollback`] undoes
//! the rows added since a [`TableMark`].

mod index;
mod simplify;

use serde::{Deserialize, Serialize};

use crate::errors::SimError;

pub use index::EdgeIndex;

/// Sentinel for "no node".
pub const NULL_NODE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub time: f64,
    pub deme: u32,
}

/// Inheritance of the genome interval `[left, right)` by `child` from
/// `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub left: f64,
    pub right: f64,
    pub parent: u32,
    pub child: u32,
}

/// A mutation (by arena key) arising on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub node: u32,
    pub key: u32,
}

/// Table sizes captured at the start of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMark {
    nodes: usize,
    edges: usize,
    mutations: usize,
    preserved: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCollection {
    genome_length: f64,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    mutations: Vec<MutationRecord>,
    preserved_nodes: Vec<u32>,
    #[serde(skip)]
    index: EdgeIndex,
    #[serde(skip)]
    index_is_valid: bool,
}

impl TableCollection {
    pub fn new(genome_length: f64) -> Result<Self, SimError> {
        if !(genome_length.is_finite() && genome_length > 0.0) {
            return Err(SimError::config(format!(
                "genome length must be finite and > 0, got {genome_length}"
            )));
        }
        Ok(Self {
            genome_length,
            nodes: Vec::new(),
            edges: Vec::new(),
            mutations: Vec::new(),
            preserved_nodes: Vec::new(),
            index: EdgeIndex::default(),
            index_is_valid: false,
        })
    }

    #[inline]
    pub fn genome_length(&self) -> f64 {
        self.genome_length
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn mutations(&self) -> &[MutationRecord] {
        &self.mutations
    }

    pub fn preserved_nodes(&self) -> &[u32] {
        &self.preserved_nodes
    }

    pub fn has_preserved_samples(&self) -> bool {
        !self.preserved_nodes.is_empty()
    }

    /// True while the edge index matches the current edges and preserved
    /// nodes.
    pub fn index_is_valid(&self) -> bool {
        self.index_is_valid
    }

    pub fn add_node(&mut self, time: f64, deme: u32) -> u32 {
        self.nodes.push(Node { time, deme });
        (self.nodes.len() - 1) as u32
    }

    pub fn add_edge(&mut self, left: f64, right: f64, parent: u32, child: u32) -> Result<u32, SimError> {
        if !(0.0 <= left && left < right && right <= self.genome_length) {
            return Err(SimError::invariant(format!(
                "edge interval [{left}, {right}) outside [0, {})",
                self.genome_length
            )));
        }
        let n = self.nodes.len();
        if parent as usize >= n || child as usize >= n {
            return Err(SimError::invariant(format!(
                "edge {parent} -> {child} refers to a missing node ({n} nodes)"
            )));
        }
        if self.nodes[parent as usize].time >= self.nodes[child as usize].time {
            return Err(SimError::invariant(format!(
                "parent node {parent} is not older than child node {child}"
            )));
        }
        self.edges.push(Edge {
            left,
            right,
            parent,
            child,
        });
        self.index_is_valid = false;
        Ok((self.edges.len() - 1) as u32)
    }

    pub fn add_mutation(&mut self, node: u32, key: u32) -> Result<(), SimError> {
        if node as usize >= self.nodes.len() {
            return Err(SimError::invariant(format!(
                "mutation record refers to missing node {node}"
            )));
        }
        self.mutations.push(MutationRecord { node, key });
        Ok(())
    }

    /// Append nodes to the preserved set.
    pub fn preserve_nodes(&mut self, nodes: &[u32]) -> Result<(), SimError> {
        if let Some(&bad) = nodes.iter().find(|&&n| n as usize >= self.nodes.len()) {
            return Err(SimError::input(format!("cannot preserve missing node {bad}")));
        }
        if nodes.is_empty() {
            return Ok(());
        }
        self.preserved_nodes.extend_from_slice(nodes);
        self.index_is_valid = false;
        Ok(())
    }

    /// Rebuild the edge index if it is stale and return it.
    pub fn build_index(&mut self) -> &EdgeIndex {
        if !self.index_is_valid {
            self.index = EdgeIndex::build(&self.nodes, &self.edges);
            self.index_is_valid = true;
        }
        &self.index
    }

    /// Count, for every mutation key, the `samples` inheriting it, using the
    /// edge index (rebuilt first if stale).
    ///
    /// `positions[key]` is the position of mutation `key` and `counts` is
    /// added to.
    pub fn count_mutations(
        &mut self,
        samples: &[u32],
        positions: &[f64],
        counts: &mut [u32],
    ) -> Result<(), SimError> {
        self.build_index();
        self.index.count_mutations(
            self.genome_length,
            &self.nodes,
            &self.edges,
            &self.mutations,
            samples,
            positions,
            counts,
        )
    }

    /// The edge index, if it is current.
    pub fn index(&self) -> Option<&EdgeIndex> {
        self.index_is_valid.then_some(&self.index)
    }

    pub(crate) fn invalidate_index(&mut self) {
        self.index_is_valid = false;
    }

    pub fn mark(&self) -> TableMark {
        TableMark {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            mutations: self.mutations.len(),
            preserved: self.preserved_nodes.len(),
        }
    }

    /// Drop every row added since `mark`. The edge index is left stale.
    pub fn rollback(&mut self, mark: TableMark) {
        self.nodes.truncate(mark.nodes);
        self.edges.truncate(mark.edges);
        self.mutations.truncate(mark.mutations);
        self.preserved_nodes.truncate(mark.preserved);
        self.index_is_valid = false;
    }

    /// Reduce the tables to the ancestry of `samples`, which become output
    /// nodes `0..` in order of first appearance. Preserved nodes are kept as
    /// samples after them. Returns the map from old to new node ids,
    /// [`NULL_NODE`] for removed nodes.
    ///
    /// `positions[key]` is the position of mutation `key`. Mutation records
    /// no sample inherits are dropped.
    pub fn simplify(&mut self, samples: &[u32], positions: &[f64]) -> Result<Vec<u32>, SimError> {
        let mut all = Vec::with_capacity(samples.len() + self.preserved_nodes.len());
        all.extend_from_slice(samples);
        all.extend_from_slice(&self.preserved_nodes);
        let out = simplify::simplify(self, &all, positions)?;

        let preserved = self
            .preserved_nodes
            .iter()
            .map(|&u| out.node_map[u as usize])
            .collect();
        self.nodes = out.nodes;
        self.edges = out.edges;
        self.mutations = out.mutations;
        self.preserved_nodes = preserved;
        self.index_is_valid = false;
        Ok(out.node_map)
    }

    /// Rewrite mutation keys after the mutation arena was compacted. Records
    /// of removed mutations are dropped.
    pub(crate) fn remap_mutation_keys(&mut self, remap: &[Option<u32>]) {
        self.mutations.retain_mut(|r| match remap.get(r.key as usize).copied().flatten() {
            Some(new) => {
                r.key = new;
                true
            }
            None => false,
        });
    }
}
