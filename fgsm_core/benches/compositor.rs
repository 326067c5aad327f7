//! Compositor throughput per region on the model input size.
//!
//! Run with: cargo bench --bench compositor

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use selective_fgsm::{apply_noise_to_regions, sign_noise, ImageTensor, Region, INPUT_SIZE};

fn bench_regions(c: &mut Criterion) {
    let image = ImageTensor::from_shape_fn(INPUT_SIZE, INPUT_SIZE, |ch, h, w| {
        ((ch + h * 3 + w * 7) % 255) as f32 / 255.0
    });
    let gradient = ImageTensor::from_shape_fn(INPUT_SIZE, INPUT_SIZE, |ch, h, w| {
        (ch as f32 - 1.0) * ((h + w) % 5) as f32 - 2.0
    });
    let noise = sign_noise(&gradient, 0.1);

    let mut group = c.benchmark_group("apply_noise_to_regions");
    for region in Region::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(region), &region, |b, region| {
            b.iter(|| black_box(apply_noise_to_regions(&image, &noise, *region)));
        });
    }
    group.finish();
}

fn bench_sign(c: &mut Criterion) {
    let gradient = ImageTensor::from_shape_fn(INPUT_SIZE, INPUT_SIZE, |ch, h, w| {
        (h as f32 - w as f32) * (ch as f32 + 0.5)
    });
    c.bench_function("sign_noise_224", |b| {
        b.iter(|| black_box(sign_noise(&gradient, 0.1)));
    });
}

criterion_group!(benches, bench_regions, bench_sign);
criterion_main!(benches);
