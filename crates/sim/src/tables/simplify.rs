//! Simplification: reduce the tables to the ancestry of a set of samples.
//!
//! Parents are visited youngest first. Each node carries the segments of
//! genome through which it is ancestral to the samples, labelled with the
//! output node that represents it. A node is kept where two or more
//! segments overlap (a coalescence) or where it is a sample; elsewhere its
//! segments pass straight through to its parent. Mutation records move to
//! the output node ancestral to the samples at the mutation's position and
//! are dropped where no sample inherits them.

use super::{Edge, MutationRecord, Node, TableCollection, NULL_NODE};
use crate::errors::SimError;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    left: f64,
    right: f64,
    node: u32,
}

/// Output of one simplification.
pub(super) struct Simplified {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub mutations: Vec<MutationRecord>,
    /// Input node id to output node id, [`NULL_NODE`] where removed.
    pub node_map: Vec<u32>,
}

struct Simplifier<'a> {
    input: &'a TableCollection,
    ancestry: Vec<Vec<Segment>>,
    node_map: Vec<u32>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    buffer: Vec<Edge>,
}

impl<'a> Simplifier<'a> {
    fn new(input: &'a TableCollection, samples: &[u32]) -> Result<Self, SimError> {
        let n = input.nodes.len();
        let mut s = Self {
            input,
            ancestry: vec![Vec::new(); n],
            node_map: vec![NULL_NODE; n],
            nodes: Vec::with_capacity(samples.len()),
            edges: Vec::new(),
            buffer: Vec::new(),
        };
        for &u in samples {
            if u as usize >= n {
                return Err(SimError::invariant(format!(
                    "simplification sample {u} does not exist ({n} nodes)"
                )));
            }
            if s.node_map[u as usize] != NULL_NODE {
                continue;
            }
            let id = s.record_node(u);
            s.ancestry[u as usize].push(Segment {
                left: 0.0,
                right: input.genome_length,
                node: id,
            });
        }
        Ok(s)
    }

    fn record_node(&mut self, input_id: u32) -> u32 {
        let id = self.nodes.len() as u32;
        self.nodes.push(self.input.nodes[input_id as usize]);
        self.node_map[input_id as usize] = id;
        id
    }

    fn process_parent(&mut self, parent: u32, edge_ids: &[u32]) {
        let mut overlaps = Vec::new();
        for &e in edge_ids {
            let edge = &self.input.edges[e as usize];
            for seg in &self.ancestry[edge.child as usize] {
                if seg.right > edge.left && edge.right > seg.left {
                    overlaps.push(Segment {
                        left: seg.left.max(edge.left),
                        right: seg.right.min(edge.right),
                        node: seg.node,
                    });
                }
            }
        }
        self.merge(parent, overlaps);
    }

    fn merge(&mut self, parent: u32, overlaps: Vec<Segment>) {
        let mut output = self.node_map[parent as usize];
        let is_sample = output != NULL_NODE;
        let genome_length = self.input.genome_length;
        let mut ancestry = Vec::new();
        let mut prev_right = 0.0;

        for (left, right, active) in overlapping_segments(overlaps) {
            let node = if let [only] = active.as_slice() {
                if is_sample {
                    self.buffer.push(Edge {
                        left,
                        right,
                        parent: output,
                        child: only.node,
                    });
                    output
                } else {
                    only.node
                }
            } else {
                if output == NULL_NODE {
                    output = self.record_node(parent);
                }
                for seg in &active {
                    self.buffer.push(Edge {
                        left,
                        right,
                        parent: output,
                        child: seg.node,
                    });
                }
                output
            };
            if is_sample && left != prev_right {
                ancestry.push(Segment {
                    left: prev_right,
                    right: left,
                    node: output,
                });
            }
            ancestry.push(Segment { left, right, node });
            prev_right = right;
        }
        if is_sample && prev_right != genome_length {
            ancestry.push(Segment {
                left: prev_right,
                right: genome_length,
                node: output,
            });
        }

        self.ancestry[parent as usize] = ancestry;
        if output != NULL_NODE {
            self.flush_edges();
        }
    }

    /// Move the buffered edges of one output parent to the edge table,
    /// joining abutting intervals of the same child.
    fn flush_edges(&mut self) {
        self.buffer
            .sort_by(|a, b| a.child.cmp(&b.child).then(a.left.total_cmp(&b.left)));
        let mut iter = self.buffer.drain(..);
        let Some(mut current) = iter.next() else {
            return;
        };
        for e in iter {
            if e.child == current.child && e.left == current.right {
                current.right = e.right;
            } else {
                self.edges.push(current);
                current = e;
            }
        }
        self.edges.push(current);
    }

    fn finish(self, positions: &[f64]) -> Result<Simplified, SimError> {
        let mut mutations = Vec::with_capacity(self.input.mutations.len());
        for r in &self.input.mutations {
            let x = *positions.get(r.key as usize).ok_or_else(|| {
                SimError::invariant(format!(
                    "mutation record refers to key {} but only {} positions were given",
                    r.key,
                    positions.len()
                ))
            })?;
            let segments = &self.ancestry[r.node as usize];
            let i = segments.partition_point(|s| s.right <= x);
            if let Some(seg) = segments.get(i).filter(|s| s.left <= x) {
                mutations.push(MutationRecord {
                    node: seg.node,
                    key: r.key,
                });
            }
        }
        Ok(Simplified {
            nodes: self.nodes,
            edges: self.edges,
            mutations,
            node_map: self.node_map,
        })
    }
}

/// Split `segments` into maximal intervals over which the set of
/// overlapping segments does not change.
fn overlapping_segments(mut segments: Vec<Segment>) -> Vec<(f64, f64, Vec<Segment>)> {
    segments.sort_by(|a, b| a.left.total_cmp(&b.left));
    let n = segments.len();
    let mut out = Vec::new();
    let Some(first) = segments.first() else {
        return out;
    };

    let min_right = |active: &[Segment]| {
        active
            .iter()
            .map(|s| s.right)
            .fold(f64::INFINITY, f64::min)
    };

    let mut active: Vec<Segment> = Vec::new();
    let mut right = first.left;
    let mut j = 0;
    while j < n {
        let mut left = right;
        active.retain(|s| s.right > left);
        if active.is_empty() {
            left = segments[j].left;
        }
        while j < n && segments[j].left == left {
            active.push(segments[j]);
            j += 1;
        }
        right = min_right(&active);
        if j < n {
            right = right.min(segments[j].left);
        }
        out.push((left, right, active.clone()));
    }
    loop {
        let left = right;
        active.retain(|s| s.right > left);
        if active.is_empty() {
            break;
        }
        right = min_right(&active);
        out.push((left, right, active.clone()));
    }
    out
}

/// Simplify `tables` with respect to `samples`, which become output nodes
/// `0..` in order of first appearance.
pub(super) fn simplify(
    tables: &TableCollection,
    samples: &[u32],
    positions: &[f64],
) -> Result<Simplified, SimError> {
    let mut simplifier = Simplifier::new(tables, samples)?;

    let time = |u: u32| tables.nodes[u as usize].time;
    let mut order: Vec<u32> = (0..tables.edges.len() as u32).collect();
    order.sort_by(|&a, &b| {
        let (ea, eb) = (&tables.edges[a as usize], &tables.edges[b as usize]);
        time(eb.parent)
            .total_cmp(&time(ea.parent))
            .then(ea.parent.cmp(&eb.parent))
            .then(ea.child.cmp(&eb.child))
            .then(ea.left.total_cmp(&eb.left))
    });

    let mut start = 0;
    while start < order.len() {
        let parent = tables.edges[order[start] as usize].parent;
        let mut end = start + 1;
        while end < order.len() && tables.edges[order[end] as usize].parent == parent {
            end += 1;
        }
        simplifier.process_parent(parent, &order[start..end]);
        start = end;
    }

    simplifier.finish(positions)
}
