use super::{Edge, MutationRecord, Node, NULL_NODE};
use crate::errors::SimError;

/// Edge traversal orders for a left-to-right sweep along the genome.
///
/// `insertion` holds edge ids sorted by `(left, youngest parent first)`,
/// `removal` by `(right, oldest parent first)`.
#[derive(Debug, Clone, Default)]
pub struct EdgeIndex {
    insertion: Vec<u32>,
    removal: Vec<u32>,
}

impl EdgeIndex {
    pub fn build(nodes: &[Node], edges: &[Edge]) -> Self {
        let parent_time = |e: &Edge| nodes[e.parent as usize].time;

        let mut insertion: Vec<u32> = (0..edges.len() as u32).collect();
        insertion.sort_by(|&a, &b| {
            let (ea, eb) = (&edges[a as usize], &edges[b as usize]);
            ea.left
                .total_cmp(&eb.left)
                .then_with(|| parent_time(eb).total_cmp(&parent_time(ea)))
                .then_with(|| a.cmp(&b))
        });

        let mut removal: Vec<u32> = (0..edges.len() as u32).collect();
        removal.sort_by(|&a, &b| {
            let (ea, eb) = (&edges[a as usize], &edges[b as usize]);
            ea.right
                .total_cmp(&eb.right)
                .then_with(|| parent_time(ea).total_cmp(&parent_time(eb)))
                .then_with(|| b.cmp(&a))
        });

        Self { insertion, removal }
    }

    pub fn insertion_order(&self) -> &[u32] {
        &self.insertion
    }

    pub fn removal_order(&self) -> &[u32] {
        &self.removal
    }

    pub fn len(&self) -> usize {
        self.insertion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion.is_empty()
    }

    /// Sweep the genome and add, for every mutation record, the number of
    /// `samples` below the record's node at the mutation's position.
    ///
    /// `positions[key]` is the position of mutation `key`; `counts` must
    /// have the same length. Duplicate samples are counted once.
    #[allow(clippy::too_many_arguments)]
    pub fn count_mutations(
        &self,
        genome_length: f64,
        nodes: &[Node],
        edges: &[Edge],
        records: &[MutationRecord],
        samples: &[u32],
        positions: &[f64],
        counts: &mut [u32],
    ) -> Result<(), SimError> {
        if self.insertion.len() != edges.len() {
            return Err(SimError::invariant(format!(
                "edge index covers {} edges but the table holds {}",
                self.insertion.len(),
                edges.len()
            )));
        }
        if positions.len() != counts.len() {
            return Err(SimError::invariant(format!(
                "{} mutation positions for {} counts",
                positions.len(),
                counts.len()
            )));
        }

        let mut below = vec![0u32; nodes.len()];
        for &s in samples {
            let s = s as usize;
            if s >= nodes.len() {
                return Err(SimError::invariant(format!("sample node {s} does not exist")));
            }
            below[s] = 1;
        }

        let mut order: Vec<&MutationRecord> = Vec::with_capacity(records.len());
        for r in records {
            if r.key as usize >= positions.len() || r.node as usize >= nodes.len() {
                return Err(SimError::invariant(format!(
                    "mutation record ({}, {}) out of range",
                    r.node, r.key
                )));
            }
            order.push(r);
        }
        order.sort_by(|a, b| positions[a.key as usize].total_cmp(&positions[b.key as usize]));

        let mut parent = vec![NULL_NODE; nodes.len()];
        let mut j = 0;
        let mut k = 0;
        let mut m = 0;
        let mut x = 0.0;
        let n_edges = edges.len();

        while j < n_edges || x < genome_length {
            while k < n_edges && edges[self.removal[k] as usize].right == x {
                let e = &edges[self.removal[k] as usize];
                let c = below[e.child as usize];
                let mut u = e.parent;
                while u != NULL_NODE {
                    below[u as usize] -= c;
                    u = parent[u as usize];
                }
                parent[e.child as usize] = NULL_NODE;
                k += 1;
            }
            while j < n_edges && edges[self.insertion[j] as usize].left == x {
                let e = &edges[self.insertion[j] as usize];
                parent[e.child as usize] = e.parent;
                let c = below[e.child as usize];
                let mut u = e.parent;
                while u != NULL_NODE {
                    below[u as usize] += c;
                    u = parent[u as usize];
                }
                j += 1;
            }

            let mut right = genome_length;
            if j < n_edges {
                right = right.min(edges[self.insertion[j] as usize].left);
            }
            if k < n_edges {
                right = right.min(edges[self.removal[k] as usize].right);
            }

            while m < order.len() && positions[order[m].key as usize] < right {
                let r = order[m];
                if positions[r.key as usize] >= x {
                    counts[r.key as usize] += below[r.node as usize];
                }
                m += 1;
            }

            if right <= x {
                // every remaining edge starts at or before x; nothing left to visit
                break;
            }
            x = right;
        }
        Ok(())
    }
}
