//! Integration tests for checkpoint and resume.

use std::fs;

use tsforward_sim::evolution::{Dfe, MutationConfig, RecombinationConfig, Region, Sregion};
use tsforward_sim::genetic_values::{Calculator, FitnessMap, Noise, Optimum, ValueKind};
use tsforward_sim::simulation::{ModelParams, Population, SampleRecorder, Simulation};
use tsforward_sim::SimError;

fn no_samples(_: &Population, _: &mut SampleRecorder) {}

fn every_third_generation(pop: &Population, r: &mut SampleRecorder) {
    if pop.generation() % 3 == 0 {
        r.add(1);
        r.add(pop.generation() % 30);
    }
}

fn selected_params() -> ModelParams {
    let mut params = ModelParams::new(30);
    params.mutation = MutationConfig {
        neutral_rate: 0.5,
        selected_rate: 0.2,
        neutral_regions: vec![Region::span(0.0, 1.0)],
        selected_regions: vec![Sregion::new(
            Region::span(0.0, 1.0),
            Dfe::Gaussian { sd: 0.1 },
            1.0,
        )],
    };
    params.recombination = RecombinationConfig::uniform(1.0, 1.0);
    params.genetic_values.calculator = Calculator::additive(2.0, ValueKind::Trait);
    params.genetic_values.fitness_map = FitnessMap::gss_mo(vec![
        Optimum::new(0, 0.0, 1.0),
        Optimum::new(15, 0.5, 1.0),
    ])
    .unwrap();
    params.genetic_values.noise = Noise::gaussian(0.0, 0.05).unwrap();
    params.seed = Some(42);
    params
}

fn assert_same_state(a: &Population, b: &Population) {
    assert_eq!(a.generation(), b.generation());
    assert_eq!(a.mutations(), b.mutations());
    assert_eq!(a.mcounts(), b.mcounts());
    assert_eq!(a.fixations(), b.fixations());
    assert_eq!(a.fixation_times(), b.fixation_times());
    assert_eq!(a.diploid_metadata(), b.diploid_metadata());
    assert_eq!(a.tables().nodes(), b.tables().nodes());
    assert_eq!(a.tables().edges(), b.tables().edges());
    assert_eq!(a.tables().mutations(), b.tables().mutations());
    assert_eq!(a.tables().preserved_nodes(), b.tables().preserved_nodes());
    assert_eq!(a.ancient_sample_metadata(), b.ancient_sample_metadata());
    assert_eq!(a.mcounts_from_preserved_nodes(), b.mcounts_from_preserved_nodes());
}

#[test]
fn test_checkpoint_and_resume() {
    let params = selected_params();
    let dir = tempfile::tempdir().unwrap();
    let pop_path = dir.path().join("population.bin");
    let rng_path = dir.path().join("rng.bin");

    let mut sim = Simulation::new(&params).unwrap();
    sim.run(10, no_samples).unwrap();
    fs::write(&pop_path, sim.population().to_bytes().unwrap()).unwrap();
    fs::write(&rng_path, sim.rng_state_bytes().unwrap()).unwrap();
    sim.run(10, no_samples).unwrap();

    let pop_bytes = fs::read(&pop_path).unwrap();
    let rng_bytes = fs::read(&rng_path).unwrap();
    let mut resumed = Simulation::from_checkpoint(&params, &pop_bytes, &rng_bytes).unwrap();
    assert_eq!(resumed.generation(), 10);
    resumed.run(10, no_samples).unwrap();

    assert_eq!(resumed.generation(), 20);
    assert_same_state(sim.population(), resumed.population());
    assert_eq!(
        resumed.pipeline().fitness_map().current_optimum(),
        Some((0.5, 1.0))
    );
}

#[test]
fn test_checkpoint_and_resume_with_ancient_samples() {
    let mut params = selected_params();
    params.simplification_interval = 7;

    let mut sim = Simulation::new(&params).unwrap();
    sim.run(10, every_third_generation).unwrap();
    assert!(sim.population().tables().has_preserved_samples());
    let pop_bytes = sim.population().to_bytes().unwrap();
    let rng_bytes = sim.rng_state_bytes().unwrap();
    sim.run(12, every_third_generation).unwrap();

    let mut resumed = Simulation::from_checkpoint(&params, &pop_bytes, &rng_bytes).unwrap();
    assert_eq!(
        resumed.population().ancient_sample_metadata().len(),
        6
    );
    resumed.run(12, every_third_generation).unwrap();

    assert_eq!(resumed.generation(), 22);
    assert_same_state(sim.population(), resumed.population());
    assert_eq!(
        sim.population().sample_timepoints().len(),
        resumed.population().sample_timepoints().len()
    );
    assert_eq!(resumed.population().ancient_sample_metadata().len(), 14);
}

#[test]
fn test_checkpoint_rebuilds_lookup_and_index_state() {
    let params = selected_params();
    let mut sim = Simulation::new(&params).unwrap();
    sim.run(5, no_samples).unwrap();

    let pop = Population::from_bytes(&sim.population().to_bytes().unwrap()).unwrap();
    assert_eq!(pop.position_lookup().len(), pop.mutations().len());
    for m in pop.mutations() {
        assert!(pop.position_lookup().contains(m.position()));
    }
    assert!(!pop.tables().index_is_valid());
}

#[test]
fn test_resume_rejects_mismatched_population_size() {
    let params = selected_params();
    let sim = Simulation::new(&params).unwrap();
    let pop = sim.population().to_bytes().unwrap();
    let rng = sim.rng_state_bytes().unwrap();

    let mut other = params.clone();
    other.population_size = 31;
    assert!(matches!(
        Simulation::from_checkpoint(&other, &pop, &rng),
        Err(SimError::Configuration(_))
    ));
}

#[test]
fn test_corrupt_checkpoint_is_an_error() {
    let params = selected_params();
    let sim = Simulation::new(&params).unwrap();
    let rng = sim.rng_state_bytes().unwrap();
    assert!(matches!(
        Simulation::from_checkpoint(&params, &[1, 2, 3], &rng),
        Err(SimError::Checkpoint(_))
    ));
}
