//! Compute device abstraction.
//!
//! A device compiles kernel sources, holds the current volume frame and
//! uniforms, and fills an output raster by running a compiled program once
//! per pixel.

mod cpu;

pub use cpu::CpuDevice;

use nalgebra::Vector3;

use crate::{
    color::{self, RGB},
    common::BoundBox,
    error::Result,
    raster::Raster,
    render::RenderOptions,
    settings::{Lighting, TransferFunction},
    state::RenderingState,
    transform::CombinedTransform,
    volume::VolumeFrame,
};

/// Program execution backend.
pub trait Device {
    /// Compiled form of a kernel source.
    type Program;

    /// Compile kernel `source`. Fails with [`crate::RenderError::Compile`].
    fn compile(&mut self, source: &str) -> Result<Self::Program>;

    /// Replace the volume data.
    fn upload_volume(&mut self, frame: VolumeFrame) -> Result<()>;

    /// Replace the uniforms used by the next launch.
    fn upload_uniforms(&mut self, uniforms: &Uniforms) -> Result<()>;

    /// Run `program` for every pixel of a `width` x `height` raster.
    fn launch(&mut self, program: &Self::Program, width: usize, height: usize) -> Result<()>;

    /// Result of the last launch.
    fn read_back(&mut self) -> Result<Raster>;
}

/// Per channel values a kernel reads, copied from [`crate::RenderingSettings`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelUniforms {
    pub intensity: TransferFunction,
    pub alpha: TransferFunction,
    pub color: RGB,
    pub weight: f32,
    pub light: Lighting,
    pub bounding_box: BoundBox,
    pub near: f32,
    pub far: f32,
    pub enabled: bool,
}

impl ChannelUniforms {
    /// Channel takes part in ray casting.
    pub fn is_active(&self) -> bool {
        self.enabled && self.near < self.far
    }
}

/// Everything a launch reads besides the volume and the program.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniforms {
    pub channels: Vec<ChannelUniforms>,
    pub background: RGB,
    /// Unit vector towards the viewer, untransformed world frame.
    pub light_dir: Vector3<f32>,
    pub termination: f32,
    pub transform: CombinedTransform,
    /// Sample distance as a multiple of the smallest voxel spacing.
    pub sample_step: f32,
}

impl Uniforms {
    pub fn new(state: &RenderingState, options: &RenderOptions) -> Uniforms {
        let channels = state
            .channels()
            .iter()
            .enumerate()
            .map(|(c, s)| ChannelUniforms {
                intensity: *s.intensity(),
                alpha: *s.alpha(),
                color: color::from_rgb8(s.color()),
                weight: s.weight(),
                light: *s.light(),
                bounding_box: *s.bounding_box(),
                near: s.near(),
                far: s.far(),
                enabled: state.is_channel_enabled(c),
            })
            .collect();
        Uniforms {
            channels,
            background: color::from_rgb8(state.background()),
            light_dir: -state.transform().view_direction(),
            termination: options.termination(),
            transform: state.transform().clone(),
            sample_step: options.sample_step,
        }
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }
}
