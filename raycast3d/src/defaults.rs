/*
    raycast3d
    Default values
*/

//! # Default values
//!
//! Initial channel settings derived from a volume's look-up tables,
//! and the renderer's fixed constants.

use crate::color::{self, Rgb8};

pub const INTENSITY_GAMMA: f32 = 1.0;
pub const ALPHA_GAMMA: f32 = 2.0;
pub const WEIGHT: f32 = 1.0;

/// Channel colour when a channel has no look-up table.
pub const CHANNEL_COLOR: Rgb8 = color::WHITE;
pub const BACKGROUND: Rgb8 = color::BLACK;

pub const LIGHT_K_OBJECT: f32 = 1.0;
pub const LIGHT_K_DIFFUSE: f32 = 0.0;
pub const LIGHT_K_SPECULAR: f32 = 0.0;
pub const LIGHT_SHININESS: f32 = 0.0;

/// Display range used for a channel without look-up table and without data.
pub const DISPLAY_RANGE: (f32, f32) = (0.0, 255.0);

// Render options
pub const RENDER_WIDTH: usize = 512;
pub const RENDER_HEIGHT: usize = 512;
/// Ray stops once accumulated opacity exceeds this.
pub const TERMINATION_THRESHOLD: f32 = 0.99;
/// Multiplier of the smallest voxel spacing.
pub const SAMPLE_STEP: f32 = 1.0;
