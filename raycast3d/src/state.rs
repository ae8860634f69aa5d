//! Complete description of one rendered frame.

use crate::{
    color::Rgb8,
    error::ConfigError,
    settings::{ChannelProperty, RenderingSettings},
    transform::CombinedTransform,
};

/// Rule for combining samples along a ray.
///
/// Closed set, every variant needs a structurally different kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompositingAlgorithm {
    /// Every channel accumulates its own opacity.
    #[default]
    IndependentTransparency,
    /// All channels share one accumulated opacity.
    CombinedTransparency,
    /// Maximum transfer mapped intensity per channel.
    MaximumIntensity,
}

impl CompositingAlgorithm {
    pub const ALL: [CompositingAlgorithm; 3] = [
        CompositingAlgorithm::IndependentTransparency,
        CompositingAlgorithm::CombinedTransparency,
        CompositingAlgorithm::MaximumIntensity,
    ];

    /// Name used in kernel sources.
    pub fn name(&self) -> &'static str {
        match self {
            CompositingAlgorithm::IndependentTransparency => "independent_transparency",
            CompositingAlgorithm::CombinedTransparency => "combined_transparency",
            CompositingAlgorithm::MaximumIntensity => "maximum_intensity",
        }
    }
}

/// Everything that determines the shape of the kernel.
///
/// Two states with equal keys render with the same compiled program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub use_light: Vec<bool>,
    pub algorithm: CompositingAlgorithm,
}

impl ProgramKey {
    pub fn n_channels(&self) -> usize {
        self.use_light.len()
    }
}

/// Per channel settings plus global frame parameters.
///
/// Channel count is fixed at construction. Updating from another state
/// copies values, the two states never share data.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderingState {
    channels: Vec<RenderingSettings>,
    enabled: Vec<bool>,
    background: Rgb8,
    algorithm: CompositingAlgorithm,
    transform: CombinedTransform,
    timepoint: usize,
}

impl RenderingState {
    /// New state, all channels enabled.
    pub fn new(
        channels: Vec<RenderingSettings>,
        background: Rgb8,
        algorithm: CompositingAlgorithm,
        transform: CombinedTransform,
        timepoint: usize,
    ) -> Self {
        let enabled = vec![true; channels.len()];
        Self {
            channels,
            enabled,
            background,
            algorithm,
            transform,
            timepoint,
        }
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[RenderingSettings] {
        &self.channels
    }

    pub fn channel(&self, channel: usize) -> Result<&RenderingSettings, ConfigError> {
        self.channels
            .get(channel)
            .ok_or(ConfigError::NoSuchChannel(channel))
    }

    pub fn set_channel(
        &mut self,
        channel: usize,
        settings: RenderingSettings,
    ) -> Result<(), ConfigError> {
        let slot = self
            .channels
            .get_mut(channel)
            .ok_or(ConfigError::NoSuchChannel(channel))?;
        *slot = settings;
        Ok(())
    }

    pub fn channel_property(
        &self,
        channel: usize,
        property: ChannelProperty,
    ) -> Result<f32, ConfigError> {
        Ok(self.channel(channel)?.property(property))
    }

    /// Replace a single property. Invalid values leave the state untouched.
    pub fn set_channel_property(
        &mut self,
        channel: usize,
        property: ChannelProperty,
        value: f32,
    ) -> Result<(), ConfigError> {
        let updated = self.channel(channel)?.with_property(property, value)?;
        self.set_channel(channel, updated)
    }

    pub fn is_channel_enabled(&self, channel: usize) -> bool {
        self.enabled.get(channel).copied().unwrap_or(false)
    }

    pub fn set_channel_enabled(&mut self, channel: usize, enabled: bool) -> Result<(), ConfigError> {
        let slot = self
            .enabled
            .get_mut(channel)
            .ok_or(ConfigError::NoSuchChannel(channel))?;
        *slot = enabled;
        Ok(())
    }

    pub fn enabled_channels(&self) -> &[bool] {
        &self.enabled
    }

    /// Channels that can contribute: enabled with a non empty depth interval.
    pub fn active_channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels
            .iter()
            .enumerate()
            .filter(|(c, s)| self.enabled[*c] && !s.is_clipped_away())
            .map(|(c, _)| c)
    }

    pub fn use_lights(&self) -> Vec<bool> {
        self.channels.iter().map(|s| s.use_light()).collect()
    }

    pub fn algorithm(&self) -> CompositingAlgorithm {
        self.algorithm
    }

    pub fn set_algorithm(&mut self, algorithm: CompositingAlgorithm) {
        self.algorithm = algorithm;
    }

    pub fn background(&self) -> Rgb8 {
        self.background
    }

    pub fn set_background(&mut self, background: Rgb8) {
        self.background = background;
    }

    pub fn transform(&self) -> &CombinedTransform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut CombinedTransform {
        &mut self.transform
    }

    pub fn timepoint(&self) -> usize {
        self.timepoint
    }

    pub fn set_timepoint(&mut self, timepoint: usize) {
        self.timepoint = timepoint;
    }

    pub fn program_key(&self) -> ProgramKey {
        ProgramKey {
            use_light: self.use_lights(),
            algorithm: self.algorithm,
        }
    }

    /// Rendering `next` after `self` needs a different kernel.
    pub fn needs_rebuild(&self, next: &RenderingState) -> bool {
        self.algorithm != next.algorithm
            || self
                .channels
                .iter()
                .map(|s| s.use_light())
                .ne(next.channels.iter().map(|s| s.use_light()))
    }

    /// Copy every field of `other` into `self`.
    ///
    /// Fails without modifying `self` when channel counts differ.
    pub fn set_from(&mut self, other: &RenderingState) -> Result<(), ConfigError> {
        if other.n_channels() != self.n_channels() {
            return Err(ConfigError::ChannelCountMismatch {
                expected: self.n_channels(),
                got: other.n_channels(),
            });
        }
        self.channels.clone_from_slice(&other.channels);
        self.enabled.clone_from_slice(&other.enabled);
        self.background = other.background;
        self.algorithm = other.algorithm;
        self.transform.clone_from(&other.transform);
        self.timepoint = other.timepoint;
        Ok(())
    }
}
