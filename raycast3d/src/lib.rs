//! Multi channel volume raycaster.
//!
//! A [`Renderer3D`] turns [`RenderingState`] snapshots of a
//! [`VolumeSource`] into RGB rasters. Compositing runs as a generated
//! kernel on a [`Device`]; the kernel is rebuilt only when the compositing
//! algorithm or a channel's light flag changes.
//!
//! ```
//! use raycast3d::{
//!     common::ValueRange, CompositingAlgorithm, CpuDevice, MemoryVolume, RenderOptions,
//!     Renderer3D,
//! };
//! use nalgebra::vector;
//!
//! let volume = MemoryVolume::from_fn(vector![16, 16, 16], vector![1.0, 1.0, 1.0], 1, 1, |_, p, _| {
//!     (p.x * 16) as f32
//! });
//! let options = RenderOptions::new((32, 32), true);
//! let mut renderer = Renderer3D::new(volume, CpuDevice::new(2), options).unwrap();
//!
//! let mut state = renderer.rendering_state().clone();
//! state.set_algorithm(CompositingAlgorithm::MaximumIntensity);
//! let raster = renderer.render(&state).unwrap();
//! assert_eq!(raster.width(), 32);
//!
//! let range = ValueRange::from_samples(raster.as_bytes().iter().map(|&b| b as f32));
//! assert_eq!(range.bounds_or((1.0, 1.0)).0, 0.0);
//! ```

pub mod color;
pub mod common;
pub mod defaults;
pub mod device;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod raster;
pub mod render;
pub mod settings;
pub mod state;
pub mod test_helpers;
pub mod transform;
pub mod volume;

pub use device::{CpuDevice, Device, Uniforms};
pub use engine::RaycastEngine;
pub use error::{CompileError, ConfigError, RenderError, Result};
pub use raster::Raster;
pub use render::{RenderOptions, Renderer3D, RendererFront, SharedRenderer};
pub use settings::{ChannelProperty, Lighting, RenderingSettings, TransferFunction};
pub use state::{CompositingAlgorithm, ProgramKey, RenderingState};
pub use transform::CombinedTransform;
pub use volume::{Cropping, Lut, MemoryVolume, VolumeFrame, VolumeSource};
