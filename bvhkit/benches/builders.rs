use bvhkit::{BoundingBox, BuilderKind, BvhConfig};
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkId, Criterion,
};
use glam::{vec3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SIZES: [usize; 3] = [1_000, 10_000, 100_000];

fn random_cubes(len: usize) -> Vec<BoundingBox> {
    let mut rng = StdRng::seed_from_u64(len as u64);

    (0..len)
        .map(|_| {
            let center = vec3(
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
            );

            BoundingBox::new(center - Vec3::splat(0.5), center + 0.5)
        })
        .collect()
}

fn benchmark_builders(c: &mut Criterion) {
    let mut group = c.benchmark_group("builders");

    group.sample_size(10);

    for &size in &SIZES {
        let primitives = random_cubes(size);

        for kind in BuilderKind::all() {
            let config = BvhConfig {
                validate: false,
                ..BvhConfig::new(kind)
            };

            group.bench_with_input(
                BenchmarkId::new(kind.name(), size),
                &primitives,
                |b, primitives| {
                    b.iter(|| config.build(black_box(primitives)));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, benchmark_builders);
criterion_main!(benches);
