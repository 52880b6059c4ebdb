//! Benchmarks for index rendering and PNG encoding.
//!
//! Run with: cargo bench --package renderer --bench render_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use raster_common::{IndexResult, IndexStats};
use renderer::{create_png, render_index, render_legend, Palette};

/// Index field with a smooth vegetation pattern, noise and a few no-data holes.
fn generate_index_field(width: usize, height: usize) -> IndexResult {
    let mut rng = rand::thread_rng();
    let mut values = Vec::with_capacity(width * height);

    for y in 0..height {
        for x in 0..width {
            if rng.gen_ratio(1, 50) {
                values.push(f32::NAN);
                continue;
            }
            let base = ((x as f32 / width as f32) * std::f32::consts::PI * 3.0).sin() * 0.4
                + (y as f32 / height as f32) * 0.3;
            let noise: f32 = rng.gen_range(-0.1..0.1);
            values.push((base + noise).clamp(-1.0, 1.0));
        }
    }

    IndexResult {
        values,
        width,
        height,
        stats: IndexStats::default(),
    }
}

fn bench_render_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_index");

    for size in [256usize, 512, 1024] {
        let field = generate_index_field(size, size);
        group.throughput(Throughput::Elements((size * size) as u64));

        for palette in [Palette::RdYlGn, Palette::Grayscale] {
            group.bench_with_input(
                BenchmarkId::new(palette.name(), format!("{}x{}", size, size)),
                &field,
                |b, field| b.iter(|| render_index(black_box(field), palette)),
            );
        }
    }

    group.finish();
}

fn bench_render_legend(c: &mut Criterion) {
    c.bench_function("render_legend_512x24", |b| {
        b.iter(|| render_legend(black_box(Palette::Viridis), 512, 24))
    });
}

fn bench_create_png(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_png");

    for size in [256usize, 1024] {
        let raster = render_index(&generate_index_field(size, size), Palette::RdYlGn);
        group.throughput(Throughput::Bytes(raster.pixels.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("rgba", format!("{}x{}", size, size)),
            &raster,
            |b, raster| b.iter(|| create_png(black_box(&raster.pixels), raster.width, raster.height)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_render_index, bench_render_legend, bench_create_png);
criterion_main!(benches);
