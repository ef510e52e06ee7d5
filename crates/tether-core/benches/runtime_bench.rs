//! # Runtime Benchmarks
//!
//! Performance benchmarks for sampling, random walks and the startup pass.
//!
//! Run with: `cargo bench -p tether-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::hint::black_box;
use std::sync::Arc;
use tempfile::TempDir;
use tether_core::{
    GraphDatabase, Module, NodeId, RandomRelationshipSelector, RelationshipSelector,
    ReservoirSampler, Runtime, RuntimeConfig, TetherError, Transaction,
};

/// Module that does nothing but exist.
struct NoopModule {
    id: String,
}

impl Module for NoopModule {
    fn id(&self) -> &str {
        &self.id
    }

    fn initialize(&self, _tx: &mut Transaction<'_>) -> Result<(), TetherError> {
        Ok(())
    }
}

fn open_database(temp: &TempDir, name: &str) -> Arc<GraphDatabase> {
    Arc::new(GraphDatabase::open(temp.path().join(name)).expect("open db"))
}

/// Create a hub with `size - 1` spokes.
fn create_star_graph(db: &GraphDatabase, size: usize) -> NodeId {
    db.in_transaction(|tx| {
        let hub = tx.create_node(["Hub"])?;
        for _ in 1..size {
            let spoke = tx.create_node(["Spoke"])?;
            tx.create_relationship(hub, spoke, "LINKS")?;
        }
        Ok(hub)
    })
    .expect("star graph")
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_reservoir_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("reservoir_sampling");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| {
                let mut sampler = ReservoirSampler::new(16);
                for i in 0..size {
                    sampler.sample(i, &mut rng);
                }
                black_box(sampler.into_samples())
            });
        });
    }

    group.finish();
}

fn bench_relationship_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("relationship_selection");
    let temp = tempfile::tempdir().expect("temp dir");

    for size in [10usize, 100, 1000].iter() {
        let db = open_database(&temp, &format!("star_{size}.redb"));
        let hub = create_star_graph(&db, *size);
        let selector: RandomRelationshipSelector = RandomRelationshipSelector::default();
        let mut rng = StdRng::seed_from_u64(11);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let tx = db.begin().expect("begin");
            b.iter(|| black_box(selector.select_with_rng(&tx, hub, &mut rng).expect("select")));
        });
    }

    group.finish();
}

fn bench_walk(c: &mut Criterion) {
    let temp = tempfile::tempdir().expect("temp dir");
    let db = open_database(&temp, "walk.redb");
    let hub = create_star_graph(&db, 100);
    let selector: RandomRelationshipSelector = RandomRelationshipSelector::default();

    c.bench_function("walk_100_steps", |b| {
        let tx = db.begin().expect("begin");
        b.iter(|| black_box(selector.walk(&tx, hub, 100).expect("walk")));
    });
}

fn bench_startup_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("startup_pass");
    group.sample_size(20);

    for modules in [1, 10, 50].iter() {
        let temp = tempfile::tempdir().expect("temp dir");
        let db = open_database(&temp, "startup.redb");

        group.bench_with_input(BenchmarkId::from_parameter(modules), modules, |b, &modules| {
            b.iter(|| {
                let runtime =
                    Runtime::new(Arc::clone(&db), RuntimeConfig::default()).expect("runtime");
                for i in 0..modules {
                    runtime
                        .register_module(Arc::new(NoopModule {
                            id: format!("module_{i}"),
                        }))
                        .expect("register");
                }
                black_box(runtime.start().expect("start"))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_reservoir_sampling,
    bench_relationship_selection,
    bench_walk,
    bench_startup_pass
);
criterion_main!(benches);
