use crate::{defaults, error::ConfigError};

/// Rendering quality knobs, independent of what is rendered.
///
/// Thread count belongs to the device, see [`crate::CpuDevice::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Initial target size, changed later with `set_target_size`
    pub resolution: (usize, usize),
    /// Stop a ray once accumulated opacity exceeds `termination_threshold`
    pub ray_termination: bool,
    pub termination_threshold: f32,
    /// Sample distance as a multiple of the smallest voxel spacing
    pub sample_step: f32,
}

impl RenderOptions {
    pub fn new(resolution: (usize, usize), ray_termination: bool) -> RenderOptions {
        RenderOptions {
            resolution,
            ray_termination,
            ..Default::default()
        }
    }

    pub fn builder() -> RenderOptionsBuilder {
        RenderOptionsBuilder::default()
    }

    /// Termination uniform passed to kernels.
    ///
    /// Opacity never exceeds 1, so a disabled termination is anything above.
    pub fn termination(&self) -> f32 {
        if self.ray_termination {
            self.termination_threshold
        } else {
            f32::INFINITY
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = self.resolution;
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidTargetSize { width, height });
        }
        if !self.sample_step.is_finite() || self.sample_step <= 0.0 {
            return Err(ConfigError::Options("sample step must be positive"));
        }
        if !(0.0..=1.0).contains(&self.termination_threshold) {
            return Err(ConfigError::Options(
                "termination threshold must be in <0;1>",
            ));
        }
        Ok(())
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            resolution: (defaults::RENDER_WIDTH, defaults::RENDER_HEIGHT),
            ray_termination: true,
            termination_threshold: defaults::TERMINATION_THRESHOLD,
            sample_step: defaults::SAMPLE_STEP,
        }
    }
}

#[derive(Default)]
pub struct RenderOptionsBuilder {
    resolution: Option<(usize, usize)>,
    ray_termination: Option<bool>,
    termination_threshold: Option<f32>,
    sample_step: Option<f32>,
}

impl RenderOptionsBuilder {
    pub fn resolution(mut self, resolution: (usize, usize)) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn early_ray_termination(mut self, enabled: bool) -> Self {
        self.ray_termination = Some(enabled);
        self
    }

    pub fn termination_threshold(mut self, threshold: f32) -> Self {
        self.termination_threshold = Some(threshold);
        self
    }

    pub fn sample_step(mut self, step: f32) -> Self {
        self.sample_step = Some(step);
        self
    }

    /// Missing values are taken from [`RenderOptions::default`].
    pub fn build(self) -> Result<RenderOptions, ConfigError> {
        let opts = self.build_unchecked();
        opts.validate()?;
        Ok(opts)
    }

    pub fn build_unchecked(self) -> RenderOptions {
        let d = RenderOptions::default();
        RenderOptions {
            resolution: self.resolution.unwrap_or(d.resolution),
            ray_termination: self.ray_termination.unwrap_or(d.ray_termination),
            termination_threshold: self
                .termination_threshold
                .unwrap_or(d.termination_threshold),
            sample_step: self.sample_step.unwrap_or(d.sample_step),
        }
    }
}
