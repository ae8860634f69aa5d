pub use criterion::{criterion_group, criterion_main, Criterion};
pub use nalgebra::{vector, Vector3};
pub use raycast3d::{
    ChannelProperty, CompositingAlgorithm, CpuDevice, MemoryVolume, RenderOptions, Renderer3D,
    RenderingState,
};

pub const RESOLUTION: (usize, usize) = (256, 256);

/// Rotations applied between frames, axis and angle.
pub const DEFAULT_ROTATIONS: [(Vector3<f32>, f32); 3] = [
    (vector![0.0, 1.0, 0.0], 0.3),
    (vector![1.0, 0.0, 0.0], -0.2),
    (vector![1.0, 1.0, 0.0], 0.5),
];

/// 128^3 volume, channel 0 a sphere, channel 1 a ramp along the diagonal.
pub fn get_volume(n_channels: usize) -> MemoryVolume {
    let n = 128;
    MemoryVolume::from_fn(vector![n, n, n], vector![1.0, 1.0, 1.0], n_channels, 1, move |c, p, _| {
        let h = n as f32 / 2.0;
        match c {
            0 => {
                let d = ((p.x as f32 - h).powi(2) + (p.y as f32 - h).powi(2) + (p.z as f32 - h).powi(2)).sqrt();
                (255.0 - d * 4.0).max(0.0)
            }
            _ => (p.x + p.y + p.z) as f32 / 3.0 * 2.0,
        }
    })
}

pub struct BenchOptions {
    pub render_options: RenderOptions,
    pub algorithm: CompositingAlgorithm,
    pub n_channels: usize,
    pub use_light: bool,
}

impl BenchOptions {
    pub fn bench_name(&self) -> String {
        let (w, h) = self.render_options.resolution;
        format!(
            "Render | {} | {} ch | {w}x{h} | ert {} | light {}",
            self.algorithm.name(),
            self.n_channels,
            self.render_options.ray_termination,
            self.use_light
        )
    }

    pub fn get_benchmark(self) -> impl FnOnce(&mut Criterion) {
        move |c: &mut Criterion| {
            let volume = get_volume(self.n_channels);
            let device = CpuDevice::default();
            let mut renderer = Renderer3D::new(volume, device, self.render_options).unwrap();

            let mut state: RenderingState = renderer.rendering_state().clone();
            state.set_algorithm(self.algorithm);
            for ch in 0..self.n_channels {
                let light = if self.use_light { 1.0 } else { 0.0 };
                state
                    .set_channel_property(ch, ChannelProperty::UseLight, light)
                    .unwrap();
            }
            // warm up: kernel rebuild and volume upload
            renderer.render(&state).unwrap();

            let mut rotations = DEFAULT_ROTATIONS.iter().cycle();
            c.bench_function(&self.bench_name(), |b| {
                b.iter_batched(
                    || {
                        // Setup
                        let (axis, angle) = rotations.next().unwrap();
                        state.transform_mut().rotate(*axis, *angle).unwrap();
                        state.clone()
                    },
                    |s| {
                        // measured part
                        renderer.render(&s).unwrap()
                    },
                    criterion::BatchSize::PerIteration,
                );
            });
        }
    }
}
