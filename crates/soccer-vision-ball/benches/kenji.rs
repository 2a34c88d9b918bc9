use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::Point2;

use soccer_vision_ball::{find_best_circle_fit, kenji_fit, GridFitParams, KenjiParams, PartialSide};

fn ring(cx: f32, cy: f32, r: f32, samples: usize) -> Vec<Point2<i32>> {
    let mut points: Vec<Point2<i32>> = (0..samples)
        .map(|i| {
            let a = std::f32::consts::TAU * i as f32 / samples as f32;
            Point2::new((cx + r * a.cos()).round() as i32, (cy + r * a.sin()).round() as i32)
        })
        .collect();
    points.dedup();
    points
}

fn bench_circle_fits(c: &mut Criterion) {
    let points = ring(32.0, 32.0, 22.0, 120);
    let params = KenjiParams::default();
    c.bench_function("kenji_fit_64x64", |b| {
        b.iter(|| black_box(kenji_fit(black_box(&points), 64, 64, &params)))
    });

    let small = ring(10.0, 10.0, 8.0, 48);
    let grid = GridFitParams {
        max_radius: 9.0,
        min_radius_proportion: 0.7,
        error: 1.0,
        min_consensus: 20,
        step: 2.0,
        partial: PartialSide::None,
    };
    c.bench_function("best_circle_fit_20x20", |b| {
        b.iter(|| black_box(find_best_circle_fit(black_box(&small), 20, 20, &grid)))
    });
}

criterion_group!(benches, bench_circle_fits);
criterion_main!(benches);
