use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tsforward_sim::simulation::counting::{count_direct, count_indexed};
use tsforward_sim::simulation::{Population, SampleRecorder, SimulationBuilder};

fn evolved(pop_size: usize) -> Population {
    let mut sim = SimulationBuilder::new()
        .population_size(pop_size)
        .neutral_mutation_rate(2.0)
        .recombination_rate(1.0)
        .seed(7)
        .build()
        .unwrap();
    sim.run(50, |_: &Population, _: &mut SampleRecorder| {})
        .unwrap();
    sim.population().clone()
}

fn bench_counting(c: &mut Criterion) {
    let mut group = c.benchmark_group("mutation_counting");

    for pop_size in [100, 500] {
        let pop = evolved(pop_size);
        let n = pop.mutations().len();

        group.bench_with_input(BenchmarkId::new("direct", pop_size), &pop, |b, pop| {
            b.iter(|| {
                let mut counts = vec![0; n];
                count_direct(pop, &mut counts).unwrap();
                black_box(counts)
            })
        });

        group.bench_with_input(BenchmarkId::new("indexed", pop_size), &pop, |b, pop| {
            b.iter_batched(
                || pop.clone(),
                |mut pop| {
                    let mut counts = vec![0; n];
                    count_indexed(&mut pop, &mut counts).unwrap();
                    black_box(counts)
                },
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_counting);
criterion_main!(benches);
