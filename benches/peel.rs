use criterion::*;
use geo::Rect;
use rand::rngs::StdRng;
use rand::SeedableRng;

const BBOX: [f64; 2] = [1024., 1024.];

#[path = "utils/random.rs"]
mod random;
use convex_layers::{ConvexHull, Peeler, Problem};
use random::*;

fn hull_build(c: &mut Criterion) {
    let bbox: Rect<f64> = Rect::new([0., 0.], BBOX);
    let mut group = c.benchmark_group("hull build");
    for size in [256usize, 1024, 4096] {
        let points = uniform_points(&mut StdRng::seed_from_u64(1), size, bbox);
        group.bench_with_input(BenchmarkId::from_parameter(size), &points, |b, points| {
            b.iter(|| ConvexHull::build(points.iter().copied()).len())
        });
    }
    group.finish();
}

fn peel_solve(c: &mut Criterion) {
    let bbox: Rect<f64> = Rect::new([0., 0.], BBOX);
    let mut group = c.benchmark_group("peel");
    group.sample_size(20);
    for size in [256usize, 1024] {
        let points = uniform_points(&mut StdRng::seed_from_u64(2), size, bbox);
        let problem = Problem::new("bench", points);
        group.bench_with_input(BenchmarkId::from_parameter(size), &problem, |b, problem| {
            b.iter(|| Peeler::with_seed(0).solve(problem).unwrap().len())
        });
    }
    group.finish();
}

criterion_group!(benches, hull_build, peel_solve);
criterion_main!(benches);
