//! Mutation counting.
//!
//! Two algorithms produce `mcounts`, the number of current genomes carrying
//! each mutation:
//!
//! - **indexed genealogy counting** sweeps the edge table once with the
//!   current generation's nodes as samples. Used while no node is preserved.
//! - **direct traversal** adds each live gamete's reference count to every
//!   mutation it carries. Used once preserved nodes exist, because they keep
//!   ancient lineages in the genealogy.
//!
//! The choice depends only on whether preserved nodes exist. Whether the
//! edge index is current is a separate question: a stale index is rebuilt
//! before any sweep.

use tracing::trace;

use super::Population;
use crate::errors::SimError;

/// Recompute `mcounts` and `mcounts_from_preserved_nodes`.
///
/// Both vectors end up with one entry per mutation in the arena. On error
/// the population is unchanged.
pub fn count_mutations(pop: &mut Population) -> Result<(), SimError> {
    let n = pop.mutations.len();
    let positions: Vec<f64> = pop.mutations.iter().map(|m| m.position()).collect();
    let mut mcounts = vec![0u32; n];
    let mut preserved = vec![0u32; n];

    if pop.tables.has_preserved_samples() {
        trace!(mutations = n, "counting by direct traversal");
        count_direct(pop, &mut mcounts)?;
        let samples = pop.tables.preserved_nodes().to_vec();
        pop.tables
            .count_mutations(&samples, &positions, &mut preserved)?;
    } else {
        trace!(mutations = n, "counting with the edge index");
        let samples: Vec<u32> = pop
            .diploid_metadata
            .iter()
            .flat_map(|md| md.nodes)
            .collect();
        pop.tables.count_mutations(&samples, &positions, &mut mcounts)?;
    }

    pop.mcounts = mcounts;
    pop.mcounts_from_preserved_nodes = preserved;
    Ok(())
}

/// Counts by walking every live gamete.
pub fn count_direct(pop: &Population, counts: &mut [u32]) -> Result<(), SimError> {
    for g in pop.gametes.iter_live() {
        for &k in g.mutations() {
            let slot = counts.get_mut(k as usize).ok_or_else(|| {
                SimError::invariant(format!(
                    "gamete refers to mutation {k} but the arena holds {}",
                    pop.mutations.len()
                ))
            })?;
            *slot += g.count();
        }
    }
    Ok(())
}

/// Counts by sweeping the genealogy with the current generation as samples.
/// Valid whatever the preserved-node state.
pub fn count_indexed(pop: &mut Population, counts: &mut [u32]) -> Result<(), SimError> {
    let positions: Vec<f64> = pop.mutations.iter().map(|m| m.position()).collect();
    let samples: Vec<u32> = pop
        .diploid_metadata
        .iter()
        .flat_map(|md| md.nodes)
        .collect();
    pop.tables.count_mutations(&samples, &positions, counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Mutation;

    /// Two founders' genomes 0 and 1; generation 1 has one diploid with
    /// nodes 4 and 5. Node 4 inherits all of genome 0, node 5 recombines
    /// between genome 0 and 1 at 0.5.
    fn small_population() -> Population {
        let mut pop = Population::new(2, 1.0).unwrap();
        let a = pop.tables.add_node(1.0, 0);
        let b = pop.tables.add_node(1.0, 0);
        pop.tables.add_edge(0.0, 1.0, 0, a).unwrap();
        pop.tables.add_edge(0.0, 0.5, 0, b).unwrap();
        pop.tables.add_edge(0.5, 1.0, 1, b).unwrap();

        pop.mutations = vec![
            Mutation::neutral(0.25, 0, 0),
            Mutation::neutral(0.75, 0, 0),
            Mutation::neutral(0.6, 0, 0),
        ];
        pop.tables.add_mutation(0, 0).unwrap();
        pop.tables.add_mutation(1, 1).unwrap();
        pop.tables.add_mutation(0, 2).unwrap();

        // gametes matching the genealogy: node 4 = [0, 2], node 5 = [0, 1]
        let g4 = pop.gametes.alloc(vec![0, 2]);
        let g5 = pop.gametes.alloc(vec![0, 1]);
        pop.diploids = vec![crate::genome::Diploid::new(g4, g5)];
        let mut md = pop.diploid_metadata[0];
        md.nodes = [a, b];
        pop.diploid_metadata = vec![md];
        let diploids = pop.diploids.clone();
        pop.gametes.rebuild_refcounts(&diploids).unwrap();
        pop
    }

    #[test]
    fn test_indexed_and_direct_agree() {
        let mut pop = small_population();
        let mut direct = vec![0; 3];
        let mut indexed = vec![0; 3];
        count_direct(&pop, &mut direct).unwrap();
        count_indexed(&mut pop, &mut indexed).unwrap();
        assert_eq!(direct, vec![2, 1, 1]);
        assert_eq!(direct, indexed);
    }

    #[test]
    fn test_count_resizes_and_is_idempotent() {
        let mut pop = small_population();
        pop.mcounts = vec![9; 10];
        pop.count_mutations().unwrap();
        assert_eq!(pop.mcounts(), &[2, 1, 1]);
        assert_eq!(pop.mcounts_from_preserved_nodes(), &[0, 0, 0]);
        pop.count_mutations().unwrap();
        assert_eq!(pop.mcounts(), &[2, 1, 1]);
    }

    #[test]
    fn test_preserved_nodes_switch_to_direct_counting() {
        let mut pop = small_population();
        pop.count_mutations().unwrap();
        assert!(pop.tables.index_is_valid());

        pop.tables.preserve_nodes(&[4]).unwrap();
        assert!(!pop.tables.index_is_valid());
        pop.count_mutations().unwrap();
        assert_eq!(pop.mcounts(), &[2, 1, 1]);
        // node 4 carries mutations 0 and 2
        assert_eq!(pop.mcounts_from_preserved_nodes(), &[1, 0, 1]);
        assert!(pop.tables.index_is_valid());
    }

    #[test]
    fn test_counts_survive_simplification() {
        let mut pop = small_population();
        pop.tables.preserve_nodes(&[4]).unwrap();
        pop.ancient_sample_metadata.push(pop.diploid_metadata[0]);
        pop.count_mutations().unwrap();
        let mcounts = pop.mcounts().to_vec();
        let preserved = pop.mcounts_from_preserved_nodes().to_vec();

        pop.simplify().unwrap();
        assert_eq!(pop.diploid_metadata()[0].nodes, [0, 1]);
        assert_eq!(pop.ancient_sample_metadata()[0].nodes, [0, 1]);
        assert_eq!(pop.tables().preserved_nodes(), &[0]);
        assert!(pop.tables().nodes().len() < 6);

        pop.count_mutations().unwrap();
        assert_eq!(pop.mcounts(), mcounts.as_slice());
        assert_eq!(pop.mcounts_from_preserved_nodes(), preserved.as_slice());

        let mut indexed = vec![0; 3];
        count_indexed(&mut pop, &mut indexed).unwrap();
        assert_eq!(indexed, mcounts);
    }

    #[test]
    fn test_dangling_gamete_key_is_an_error() {
        let mut pop = small_population();
        pop.mutations.truncate(1);
        let before = pop.mcounts().to_vec();
        pop.tables.preserve_nodes(&[4]).unwrap();
        assert!(pop.count_mutations().is_err());
        assert_eq!(pop.mcounts(), before.as_slice());
    }
}
