//! Simulation engine.
//!
//! One generation of [`Simulation::step_with`]:
//!
//! 1. build the parent sampler from the current fitness values
//! 2. for every offspring, sample two parents and build one gamete from
//!    each, recording nodes, edges and new mutations in the tables
//! 3. install the offspring, advance the generation, update and evaluate
//!    the genetic value pipeline
//! 4. recount gametes and let the sampling policy pick individuals to
//!    preserve
//! 5. rebuild gamete reference counts and, every `simplification_interval`
//!    generations, simplify the tables
//! 6. count mutations
//! 7. prune, if configured
//!
//! A failure in steps 1-4 restores the population, the pipeline and the
//! random number generator to their state before the call.
//!
//! The policy sees the new generation with gamete counts already current
//! and one mutation count per mutation; counts of this generation's new
//! mutations are zero until step 6.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug, info, warn};

use super::{ModelParams, Population, PrunePolicy, SampleRecorder};
use crate::base::{ArenaMark, Mutation, NumericErrorScope};
use crate::errors::SimError;
use crate::evolution::{
    MutationModel, MutationRegions, ParentSampler, RecombinationModel, RecombinationRegions,
};
use crate::genetic_values::{
    Calculator, FitnessMap, FitnessMapping, GeneticValueCalculator, GeneticValuePipeline, Noise,
    NoiseModel,
};
use crate::genome::{Diploid, DiploidMetadata};
use crate::tables::TableMark;

/// State needed to undo a generation that failed before it was committed.
struct StepMark<C, F, N> {
    generation: u32,
    n_mutations: usize,
    diploids: Vec<Diploid>,
    metadata: Vec<DiploidMetadata>,
    n_ancient: usize,
    arena: ArenaMark,
    tables: TableMark,
    pipeline: GeneticValuePipeline<C, F, N>,
    rng: Xoshiro256PlusPlus,
}

/// A single simulation replicate.
#[derive(Debug)]
pub struct Simulation<C = Calculator, F = FitnessMap, N = Noise> {
    population: Population,
    mutation: MutationRegions,
    recombination: RecombinationRegions,
    pipeline: GeneticValuePipeline<C, F, N>,
    prune: Option<PrunePolicy>,
    simplification_interval: u32,
    /// Random number generator (Xoshiro256++)
    rng: Xoshiro256PlusPlus,
}

impl Simulation {
    /// Build a simulation with the built-in genetic value models from
    /// `params`.
    pub fn new(params: &ModelParams) -> Result<Self, SimError> {
        params.validate()?;
        let pipeline = params.genetic_values.pipeline()?;
        Self::with_pipeline(params, pipeline)
    }

    /// Resume from a population checkpoint and an RNG state.
    pub fn from_checkpoint(
        params: &ModelParams,
        population: &[u8],
        rng_state: &[u8],
    ) -> Result<Self, SimError> {
        params.validate()?;
        let population = Population::from_bytes(population)?;
        if population.size() != params.population_size {
            return Err(SimError::config(format!(
                "checkpoint holds {} diploids but the parameters ask for {}",
                population.size(),
                params.population_size
            )));
        }
        let mut sim = Self::with_pipeline(params, params.genetic_values.pipeline()?)?;
        sim.population = population;
        sim.set_rng_from_bytes(rng_state)?;
        // bring time-dependent models to the checkpoint's generation
        sim.pipeline.update(&sim.population)?;
        Ok(sim)
    }
}

impl<C, F, N> Simulation<C, F, N>
where
    C: GeneticValueCalculator,
    F: FitnessMapping,
    N: NoiseModel,
{
    /// Build a simulation with a custom pipeline. The genetic value section
    /// of `params` is ignored.
    pub fn with_pipeline(
        params: &ModelParams,
        pipeline: GeneticValuePipeline<C, F, N>,
    ) -> Result<Self, SimError> {
        let population = Population::with_loci(
            params.population_size,
            params.sequence_length,
            params.locus_boundaries.clone(),
        )?;
        let mutation = MutationRegions::new(&params.mutation, params.sequence_length)?;
        let recombination =
            RecombinationRegions::new(&params.recombination, params.sequence_length)?;
        pipeline.check(&population)?;

        let rng = match params.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_os_rng(),
        };

        Ok(Self {
            population,
            mutation,
            recombination,
            pipeline,
            prune: params.prune,
            simplification_interval: params.simplification_interval,
            rng,
        })
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn pipeline(&self) -> &GeneticValuePipeline<C, F, N> {
        &self.pipeline
    }

    pub fn generation(&self) -> u32 {
        self.population.generation()
    }

    /// Get the current RNG state for checkpointing.
    pub fn rng_state_bytes(&self) -> Result<Vec<u8>, SimError> {
        Ok(bincode::serialize(&self.rng)?)
    }

    /// Restore an RNG state written by [`Simulation::rng_state_bytes`].
    pub fn set_rng_from_bytes(&mut self, bytes: &[u8]) -> Result<(), SimError> {
        self.rng = bincode::deserialize(bytes)?;
        Ok(())
    }

    /// Advance one generation without preserving samples.
    pub fn step(&mut self) -> Result<(), SimError> {
        self.step_with(|_: &Population, _: &mut SampleRecorder| {})
    }

    /// Advance one generation. `policy` is called once, after the offspring
    /// are evaluated, to choose individuals to preserve.
    pub fn step_with<P>(&mut self, mut policy: P) -> Result<(), SimError>
    where
        P: FnMut(&Population, &mut SampleRecorder),
    {
        let mark = self.mark();
        if let Err(e) = self.advance(&mark, &mut policy) {
            warn!(
                generation = mark.generation,
                error = %e,
                "generation failed, restoring previous state"
            );
            self.rollback(mark);
            return Err(e);
        }
        self.commit()
    }

    /// Run `generations` generations, calling `policy` every generation.
    pub fn run<P>(&mut self, generations: u32, mut policy: P) -> Result<(), SimError>
    where
        P: FnMut(&Population, &mut SampleRecorder),
    {
        let _numeric = NumericErrorScope::strict();
        info!(
            start = self.generation(),
            generations,
            population_size = self.population.size(),
            "starting simulation run"
        );
        for _ in 0..generations {
            self.step_with(&mut policy)?;
        }
        info!(
            generation = self.generation(),
            mutations = self.population.mutations().len(),
            fixations = self.population.fixations().len(),
            "simulation run finished"
        );
        Ok(())
    }

    fn mark(&mut self) -> StepMark<C, F, N> {
        let pop = &mut self.population;
        StepMark {
            generation: pop.generation,
            n_mutations: pop.mutations.len(),
            diploids: pop.diploids.clone(),
            metadata: pop.diploid_metadata.clone(),
            n_ancient: pop.ancient_sample_metadata.len(),
            arena: pop.gametes.mark(),
            tables: pop.tables.mark(),
            pipeline: self.pipeline.clone(),
            rng: self.rng.clone(),
        }
    }

    fn rollback(&mut self, mark: StepMark<C, F, N>) {
        let pop = &mut self.population;
        for m in &pop.mutations[mark.n_mutations.min(pop.mutations.len())..] {
            pop.lookup.remove(m.position());
        }
        pop.mutations.truncate(mark.n_mutations);
        pop.mcounts.truncate(mark.n_mutations);
        pop.mcounts_from_preserved_nodes.truncate(mark.n_mutations);
        pop.generation = mark.generation;
        pop.diploids = mark.diploids;
        pop.diploid_metadata = mark.metadata;
        pop.ancient_sample_metadata.truncate(mark.n_ancient);
        pop.gametes.rollback(mark.arena);
        pop.tables.rollback(mark.tables);
        self.pipeline = mark.pipeline;
        self.rng = mark.rng;
    }

    /// Steps 1-4. Leaves the population in a state that `rollback` can undo.
    fn advance<P>(&mut self, mark: &StepMark<C, F, N>, policy: &mut P) -> Result<(), SimError>
    where
        P: FnMut(&Population, &mut SampleRecorder),
    {
        let fitness: Vec<_> = self.population.diploid_metadata.iter().map(|m| m.w).collect();
        let sampler = ParentSampler::new(&fitness)?;

        let n = self.population.size();
        let birth = mark.generation + 1;
        let mut offspring = Vec::with_capacity(n);
        let mut offspring_md = Vec::with_capacity(n);
        for i in 0..n {
            let parents = sampler.sample_pair(&mut self.rng);
            let mut gametes = [0u32; 2];
            let mut nodes = [0u32; 2];
            for (k, &p) in parents.iter().enumerate() {
                let (g, node) = self.inherit(p, birth)?;
                gametes[k] = g;
                nodes[k] = node;
            }
            offspring.push(Diploid::new(gametes[0], gametes[1]));
            offspring_md.push(DiploidMetadata::offspring(
                i as u32,
                [parents[0] as u32, parents[1] as u32],
                nodes,
            ));
        }

        let pop = &mut self.population;
        pop.diploids = offspring;
        pop.diploid_metadata = offspring_md;
        pop.generation = birth;

        self.pipeline.update(&self.population)?;
        let evaluated = self
            .pipeline
            .evaluate(&self.population, &mark.metadata, &mut self.rng)?;
        self.population.diploid_metadata = evaluated;

        let pop = &mut self.population;
        pop.gametes.recount(&pop.diploids)?;
        let n_mutations = pop.mutations.len();
        pop.mcounts.resize(n_mutations, 0);
        pop.mcounts_from_preserved_nodes.resize(n_mutations, 0);

        let mut recorder = SampleRecorder::new();
        policy(&self.population, &mut recorder);
        self.preserve(&recorder)
    }

    /// Build one gamete transmitted by `parent`, with its node, edges and
    /// new mutations. Returns the gamete index and the node id.
    fn inherit(&mut self, parent: usize, birth: u32) -> Result<(u32, u32), SimError> {
        let pop = &mut self.population;
        let d = pop.diploids[parent];
        let md = pop.diploid_metadata[parent];
        let ((g0, n0), (g1, n1)) = if self.rng.random_bool(0.5) {
            ((d.second, md.nodes[1]), (d.first, md.nodes[0]))
        } else {
            ((d.first, md.nodes[0]), (d.second, md.nodes[1]))
        };

        let breakpoints = self.recombination.breakpoints(&mut self.rng);
        let new_mutations =
            self.mutation
                .sample_new_mutations(&mut self.rng, birth, &mut pop.lookup)?;

        // rollback truncates the mutation table, so new keys go in first
        let first_key = pop.mutations.len() as u32;
        let n_new = new_mutations.len();
        pop.mutations.extend(new_mutations);

        let node = pop.tables.add_node(f64::from(birth), 0);
        let length = pop.sequence_length();

        let mut start = 0.0;
        let mut from_first = true;
        for &end in breakpoints.iter().chain(std::iter::once(&length)) {
            let parent_node = if from_first { n0 } else { n1 };
            pop.tables.add_edge(start, end, parent_node, node)?;
            start = end;
            from_first = !from_first;
        }

        for k in 0..n_new as u32 {
            pop.tables.add_mutation(node, first_key + k)?;
        }

        if breakpoints.is_empty() && n_new == 0 {
            return Ok((g0, node));
        }

        let keys = {
            let mutations = &pop.mutations;
            let (a, b) = match (pop.gametes.get(g0), pop.gametes.get(g1)) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(SimError::invariant(format!(
                        "parent {parent} refers to a missing gamete"
                    )))
                }
            };
            let mut inherited = Vec::with_capacity(a.len().max(b.len()) + n_new);
            let mut start = 0.0;
            let mut from_first = true;
            for &end in breakpoints.iter().chain(std::iter::once(&length)) {
                let src = if from_first { a } else { b };
                inherited.extend_from_slice(src.mutations_in(mutations, start, end));
                start = end;
                from_first = !from_first;
            }
            merge_new(mutations, &inherited, first_key)
        };
        let g = pop.gametes.alloc(keys);
        Ok((g, node))
    }

    fn preserve(&mut self, recorder: &SampleRecorder) -> Result<(), SimError> {
        if recorder.is_empty() {
            return Ok(());
        }
        let pop = &mut self.population;
        let indices = recorder.unique_indices(pop.size())?;
        let mut nodes = Vec::with_capacity(2 * indices.len());
        let mut metadata = Vec::with_capacity(indices.len());
        for &i in &indices {
            let md = pop.diploid_metadata[i as usize];
            nodes.extend_from_slice(&md.nodes);
            metadata.push(md);
        }
        pop.tables.preserve_nodes(&nodes)?;
        pop.ancient_sample_metadata.extend(metadata);
        debug!(
            generation = pop.generation,
            individuals = indices.len(),
            "preserved ancient samples"
        );
        Ok(())
    }

    /// Steps 5-7.
    fn commit(&mut self) -> Result<(), SimError> {
        let pop = &mut self.population;
        pop.gametes.rebuild_refcounts(&pop.diploids)?;
        let interval = self.simplification_interval;
        if interval > 0 && pop.generation % interval == 0 {
            let (nodes, edges) = (pop.tables.nodes().len(), pop.tables.edges().len());
            pop.simplify()?;
            debug!(
                generation = pop.generation,
                nodes_before = nodes,
                edges_before = edges,
                nodes = pop.tables.nodes().len(),
                edges = pop.tables.edges().len(),
                "simplified tables"
            );
        }
        pop.count_mutations()?;
        if let Some(policy) = self.prune {
            pop.prune(policy)?;
        }
        debug!(
            generation = pop.generation,
            population_size = pop.size(),
            mutations = pop.mutations.len(),
            gametes = pop.gametes.len(),
            nodes = pop.tables.nodes().len(),
            edges = pop.tables.edges().len(),
            "generation complete"
        );
        Ok(())
    }
}

/// Merge inherited keys (sorted by position) with the keys `first_key..`,
/// which are this generation's new mutations sorted by position.
fn merge_new(mutations: &[Mutation], inherited: &[u32], first_key: u32) -> Vec<u32> {
    let new_keys = first_key..mutations.len() as u32;
    let mut out = Vec::with_capacity(inherited.len() + new_keys.len());
    let mut i = 0;
    for k in new_keys {
        let position = mutations[k as usize].position();
        while i < inherited.len() && mutations[inherited[i] as usize].position() < position {
            out.push(inherited[i]);
            i += 1;
        }
        out.push(k);
    }
    out.extend_from_slice(&inherited[i..]);
    out
}
