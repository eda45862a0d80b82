use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tsforward_sim::genetic_values::{Calculator, FitnessMap, Noise, ValueKind};
use tsforward_sim::simulation::{Population, SampleRecorder, SimulationBuilder};

fn neutral(pop_size: usize) -> SimulationBuilder {
    SimulationBuilder::new()
        .population_size(pop_size)
        .neutral_mutation_rate(0.5)
        .recombination_rate(0.5)
        .seed(42)
}

fn bench_simulation_init(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_init");

    group.bench_function("default_init", |b| {
        b.iter(|| black_box(neutral(black_box(500)).build().unwrap()))
    });

    group.finish();
}

fn bench_simulation_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_step");

    for pop_size in [100, 1000] {
        group.throughput(Throughput::Elements(pop_size as u64));
        group.bench_with_input(
            BenchmarkId::new("step_neutral", pop_size),
            &pop_size,
            |b, &pop_size| {
                b.iter_batched(
                    || {
                        let mut sim = neutral(pop_size).build().unwrap();
                        sim.run(10, |_: &Population, _: &mut SampleRecorder| {})
                            .unwrap();
                        sim
                    },
                    |mut sim| {
                        sim.step().unwrap();
                        black_box(sim)
                    },
                    criterion::BatchSize::LargeInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_simulation_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_run");
    let pop_size = 200;
    let generations = 20u32;

    group.throughput(Throughput::Elements(pop_size as u64 * u64::from(generations)));

    group.bench_function(BenchmarkId::new("gss_trait", generations), |b| {
        b.iter(|| {
            let mut sim = neutral(pop_size)
                .calculator(Calculator::additive(2.0, ValueKind::Trait))
                .fitness_map(FitnessMap::gss(0.0, 1.0).unwrap())
                .noise(Noise::gaussian(0.0, 0.1).unwrap())
                .build()
                .unwrap();
            sim.run(generations, |_: &Population, _: &mut SampleRecorder| {})
                .unwrap();
            black_box(sim)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_simulation_init,
    bench_simulation_step,
    bench_simulation_run
);
criterion_main!(benches);
