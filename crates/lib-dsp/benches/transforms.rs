//! Centered-transform performance benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lib_dsp::fft::TransformKernel;
use ndarray::Array3;
use num_complex::Complex64;

fn bench_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("transforms");

    // Per-cell band/grid pairs at the sizes a scan actually uses
    for &(n_omega, n_fft) in [(512usize, 1024usize), (2048, 4096), (2048, 8192)].iter() {
        let sw: Vec<Complex64> = (0..n_omega)
            .map(|k| Complex64::new((k as f64 * 0.013).sin(), (k as f64 * 0.007).cos()))
            .collect();
        let mut kernel = TransformKernel::new();
        let et = kernel.ift_row(&sw, n_omega, n_fft).unwrap();

        group.bench_with_input(
            BenchmarkId::new("ift_row", format!("{n_omega}x{n_fft}")),
            &sw,
            |b, sw| {
                let mut kernel = TransformKernel::new();
                b.iter(|| kernel.ift_row(black_box(sw), n_omega, n_fft).unwrap());
            },
        );

        group.bench_with_input(
            BenchmarkId::new("ft_row", format!("{n_omega}x{n_fft}")),
            &et,
            |b, et| {
                let mut kernel = TransformKernel::new();
                b.iter(|| kernel.ft_row(black_box(et), n_omega, n_fft).unwrap());
            },
        );
    }

    // Whole 14x14 bundle, one frequency axis per cell
    let (n_omega, n_fft) = (512usize, 1024usize);
    let field = Array3::from_shape_fn((14, 14, n_omega), |(r, c, k)| {
        Complex64::new(
            ((r * 14 + c) as f64 * 0.05 + k as f64 * 0.013).sin(),
            (k as f64 * 0.007).cos(),
        )
    });
    group.bench_with_input(
        BenchmarkId::new("ift_bundle", format!("14x14x{n_omega}")),
        &field,
        |b, field| {
            let mut kernel = TransformKernel::new();
            b.iter(|| kernel.ift(black_box(field), n_omega, n_fft).unwrap());
        },
    );

    group.finish();
}

criterion_group!(benches, bench_transforms);
criterion_main!(benches);
