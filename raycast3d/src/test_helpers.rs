//! Module with helper functions
//! Saves repetition in unit and integration tests

use nalgebra::{point, vector, Vector3};

use crate::{
    color::{self, Rgb8},
    device::{CpuDevice, Uniforms},
    render::{RenderOptions, Renderer3D},
    settings::RenderingSettings,
    state::{CompositingAlgorithm, RenderingState},
    transform::CombinedTransform,
    volume::{Cropping, Lut, MemoryVolume, VolumeFrame, VolumeSource},
};

/// Value of bright voxels in fixture volumes.
pub const BRIGHT: f32 = 255.0;

/// 8x8x8 volume, unit spacing, every channel has a bright cube `[2;6)^3`
/// in an empty surrounding.
pub fn cube_volume(n_channels: usize) -> MemoryVolume {
    MemoryVolume::from_fn(
        vector![8, 8, 8],
        vector![1.0, 1.0, 1.0],
        n_channels,
        1,
        |_, p, _| {
            let inside = |v: usize| (2..6).contains(&v);
            if inside(p.x) && inside(p.y) && inside(p.z) {
                BRIGHT
            } else {
                0.0
            }
        },
    )
}

pub fn cube_frame(n_channels: usize) -> VolumeFrame {
    VolumeFrame::from_source(&cube_volume(n_channels), 0).unwrap()
}

/// 64x64x32 volume with anisotropic spacing and two timepoints.
///
/// Channel 0 is a bright slab `z in [8;24)`, channel 1 a ramp along x.
/// Timepoint 1 is timepoint 0 at half intensity.
pub fn two_channel_volume() -> MemoryVolume {
    MemoryVolume::from_fn(
        vector![64, 64, 32],
        vector![1.0, 1.0, 2.0],
        2,
        2,
        |c, p, t| {
            let v = match c {
                0 if (8..24).contains(&p.z) => BRIGHT,
                0 => 0.0,
                _ => p.x as f32 * 4.0,
            };
            if t == 1 {
                v / 2.0
            } else {
                v
            }
        },
    )
    .with_lut(0, Lut::from_color(0.0, BRIGHT, [255, 0, 0]))
    .with_lut(1, Lut::from_color(0.0, BRIGHT, [0, 255, 0]))
}

/// Settings mapping `<0;255>` linearly to colour and opacity, whole volume
/// visible.
pub fn linear_settings(size: Vector3<usize>, spacing: Vector3<f32>, color: Rgb8) -> RenderingSettings {
    let cropping = Cropping::for_volume(size, spacing);
    RenderingSettings::builder()
        .intensity(0.0, BRIGHT, 1.0)
        .alpha(0.0, BRIGHT, 1.0)
        .color(color)
        .bounding_box(point![0.0, 0.0, 0.0], size.map(|v| v as f32))
        .near_far(cropping.near, cropping.far)
        .build()
        .unwrap()
}

/// State with [`linear_settings`] on every channel of `volume`.
pub fn linear_state<V: VolumeSource>(volume: &V, target: (usize, usize)) -> RenderingState {
    let transform = CombinedTransform::for_volume(volume.size(), volume.spacing(), target).unwrap();
    let channels = (0..volume.n_channels())
        .map(|_| linear_settings(volume.size(), volume.spacing(), color::WHITE))
        .collect();
    RenderingState::new(
        channels,
        color::BLACK,
        CompositingAlgorithm::IndependentTransparency,
        transform,
        0,
    )
}

/// Uniforms for [`cube_volume`] rendered into `target`.
pub fn uniforms_for(n_channels: usize, target: (usize, usize)) -> Uniforms {
    let state = linear_state(&cube_volume(n_channels), target);
    Uniforms::new(&state, &RenderOptions::new(target, true))
}

/// Uniforms for an 8x8 target: white channels, black background, light
/// towards -z, termination 0.99.
pub fn uniforms(n_channels: usize) -> Uniforms {
    uniforms_for(n_channels, (8, 8))
}

pub fn single_channel_renderer(target: (usize, usize)) -> Renderer3D<MemoryVolume, CpuDevice> {
    Renderer3D::new(
        cube_volume(1),
        CpuDevice::new(2),
        RenderOptions::new(target, true),
    )
    .unwrap()
}
