mod common;

use common::*;

fn options(ray_termination: bool) -> RenderOptions {
    RenderOptions::builder()
        .resolution(RESOLUTION)
        .early_ray_termination(ray_termination)
        .build_unchecked()
}

fn bench(algorithm: CompositingAlgorithm, n_channels: usize, ert: bool, use_light: bool) -> impl FnOnce(&mut Criterion) {
    BenchOptions {
        render_options: options(ert),
        algorithm,
        n_channels,
        use_light,
    }
    .get_benchmark()
}

fn render_independent(c: &mut Criterion) {
    bench(CompositingAlgorithm::IndependentTransparency, 2, false, false)(c)
}

fn render_independent_ert(c: &mut Criterion) {
    bench(CompositingAlgorithm::IndependentTransparency, 2, true, false)(c)
}

fn render_combined(c: &mut Criterion) {
    bench(CompositingAlgorithm::CombinedTransparency, 2, false, false)(c)
}

fn render_combined_ert(c: &mut Criterion) {
    bench(CompositingAlgorithm::CombinedTransparency, 2, true, false)(c)
}

fn render_mip(c: &mut Criterion) {
    bench(CompositingAlgorithm::MaximumIntensity, 2, false, false)(c)
}

fn render_lit(c: &mut Criterion) {
    bench(CompositingAlgorithm::IndependentTransparency, 1, true, true)(c)
}

fn compile_kernels(c: &mut Criterion) {
    use raycast3d::{kernel, ProgramKey};

    c.bench_function("Compile | all algorithms | 4 ch", |b| {
        b.iter(|| {
            for algorithm in CompositingAlgorithm::ALL {
                let key = ProgramKey {
                    use_light: vec![true, false, true, false],
                    algorithm,
                };
                kernel::compile(&kernel::generate(&key)).unwrap();
            }
        })
    });
}

criterion_group! {
    name = algorithms;
    config = Criterion::default().significance_level(0.1).sample_size(10);
    targets = render_independent, render_independent_ert, render_combined, render_combined_ert, render_mip
}

criterion_group! {
    name = lighting;
    config = Criterion::default().significance_level(0.1).sample_size(10);
    targets = render_lit
}

criterion_group!(compiler, compile_kernels);

criterion_main!(algorithms, lighting, compiler);
