//! Time a run and compare the two counting algorithms on the result.
//!
//! Usage: `cargo run --release --example profile_run [params.json] [generations]`

use std::env;
use std::time::Instant;

use tsforward_sim::evolution::{MutationConfig, RecombinationConfig};
use tsforward_sim::simulation::counting::{count_direct, count_indexed};
use tsforward_sim::simulation::{ModelParams, Population, SampleRecorder, Simulation};

fn main() -> Result<(), tsforward_sim::SimError> {
    let mut args = env::args().skip(1);
    let params = match args.next() {
        Some(path) => ModelParams::from_json_file(path)?,
        None => {
            let mut params = ModelParams::new(1000);
            params.mutation = MutationConfig::neutral(1.0, 1.0);
            params.recombination = RecombinationConfig::uniform(1.0, 1.0);
            params.seed = Some(42);
            params
        }
    };
    let generations: u32 = args.next().and_then(|g| g.parse().ok()).unwrap_or(200);

    println!(
        "Running N = {} for {} generations...",
        params.population_size, generations
    );
    let mut sim = Simulation::new(&params)?;
    let start = Instant::now();
    sim.run(generations, |_: &Population, _: &mut SampleRecorder| {})?;
    println!("Run: {:?}", start.elapsed());

    let pop = sim.population();
    println!(
        "{} segregating mutations, {} fixations, {} nodes, {} edges",
        pop.mutations().len(),
        pop.fixations().len(),
        pop.tables().nodes().len(),
        pop.tables().edges().len()
    );

    let n = pop.mutations().len();
    let start = Instant::now();
    let mut direct = vec![0; n];
    count_direct(pop, &mut direct)?;
    println!("Direct traversal: {:?}", start.elapsed());

    let mut indexed_pop = pop.clone();
    let start = Instant::now();
    let mut indexed = vec![0; n];
    count_indexed(&mut indexed_pop, &mut indexed)?;
    println!("Indexed sweep: {:?}", start.elapsed());

    if direct == indexed {
        println!("Counts agree");
    } else {
        println!("Counts DIFFER");
    }
    Ok(())
}
