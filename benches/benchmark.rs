use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rsense_calc::processing::agreement::kappa;
use rsense_calc::processing::indices::VegetationIndex;
use rsense_calc::processing::texture::{glcm_features, GlcmParams};

/// Benchmark the masked NDVI calculation over a synthetic scene
fn benchmark_ndvi_calculation(c: &mut Criterion) {
    let size = (1024, 1024);
    // Simulated NIR and RED reflectance; every 97th pixel has a zero denominator
    let nir = Array2::from_shape_fn(size, |(r, c)| {
        let i = r * size.1 + c;
        if i % 97 == 0 { 0.0 } else { 0.5 + (i % 100) as f64 / 1000.0 }
    });
    let red = Array2::from_shape_fn(size, |(r, c)| {
        let i = r * size.1 + c;
        if i % 97 == 0 { 0.0 } else { 0.25 + (i % 50) as f64 / 1000.0 }
    });

    c.bench_function("ndvi_masked_1024", |b| {
        b.iter(|| VegetationIndex::Ndvi.compute_array(black_box(&[nir.view(), red.view()])))
    });
}

/// Benchmark GLCM construction and feature extraction at 256 gray levels
fn benchmark_glcm_features(c: &mut Criterion) {
    let image = Array2::from_shape_fn((256, 256), |(r, c)| ((r * 31 + c * 17) % 256) as u16);
    let params = GlcmParams {
        distances: vec![1, 2],
        angles: vec![0.0, std::f64::consts::FRAC_PI_4, std::f64::consts::FRAC_PI_2],
        levels: 256,
    };

    c.bench_function("glcm_features_256", |b| {
        b.iter(|| glcm_features(black_box(image.view()), black_box(&params)))
    });
}

fn benchmark_kappa(c: &mut Criterion) {
    let truth = Array2::from_shape_fn((1024, 1024), |(r, c)| ((r / 64 + c / 64) % 6) as i64);
    let prediction = Array2::from_shape_fn((1024, 1024), |(r, c)| ((r / 60 + c / 64) % 6) as i64);

    c.bench_function("kappa_1024", |b| {
        b.iter(|| kappa(black_box(truth.view()), black_box(prediction.view())))
    });
}

criterion_group!(benches, benchmark_ndvi_calculation, benchmark_glcm_features, benchmark_kappa);
criterion_main!(benches);
