use log::{debug, info};
use nalgebra::{point, Vector3};

use crate::{
    color::Rgb8,
    defaults,
    device::{Device, Uniforms},
    engine::RaycastEngine,
    error::{ConfigError, Result},
    raster::Raster,
    render::RenderOptions,
    settings::{Lighting, RenderingSettings},
    state::{CompositingAlgorithm, RenderingState},
    transform::CombinedTransform,
    volume::{Cropping, Lut, VolumeFrame, VolumeSource},
};

/// Renders [`RenderingState`] snapshots of one volume.
///
/// Owns the persistent state. Every render copies the requested snapshot
/// into it, so callers may keep and reuse snapshots freely.
pub struct Renderer3D<V, D>
where
    V: VolumeSource,
    D: Device,
{
    volume: V,
    engine: RaycastEngine<D>,
    state: RenderingState,
    options: RenderOptions,
    target: (usize, usize),
    cropping: Cropping,
    uploaded_timepoint: Option<usize>,
    rebuilds: usize,
}

impl<V, D> Renderer3D<V, D>
where
    V: VolumeSource,
    D: Device,
{
    /// Renderer with near / far covering the whole volume.
    pub fn new(volume: V, device: D, options: RenderOptions) -> Result<Self> {
        let cropping = Cropping::for_volume(volume.size(), volume.spacing());
        Self::with_cropping(volume, device, options, cropping)
    }

    /// Renderer with near / far supplied by the caller.
    pub fn with_cropping(
        volume: V,
        device: D,
        options: RenderOptions,
        cropping: Cropping,
    ) -> Result<Self> {
        let (width, height) = options.resolution;
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidTargetSize { width, height }.into());
        }
        let transform =
            CombinedTransform::for_volume(volume.size(), volume.spacing(), options.resolution)?;

        let n_channels = volume.n_channels();
        let mut channels = Vec::with_capacity(n_channels);
        for c in 0..n_channels {
            channels.push(default_settings(&volume, c, &cropping)?);
        }

        let state = RenderingState::new(
            channels,
            defaults::BACKGROUND,
            CompositingAlgorithm::default(),
            transform,
            0,
        );

        let mut engine = RaycastEngine::new(device);
        engine.prepare(&state.program_key(), false)?;
        info!(
            "Renderer ready: {n_channels} channel(s), {:?} voxels, {width}x{height}",
            volume.size()
        );

        Ok(Self {
            volume,
            engine,
            state,
            options,
            target: (width, height),
            cropping,
            uploaded_timepoint: None,
            rebuilds: 1,
        })
    }

    /// Current persistent state. Clone it to obtain a snapshot.
    pub fn rendering_state(&self) -> &RenderingState {
        &self.state
    }

    pub fn volume(&self) -> &V {
        &self.volume
    }

    pub fn n_channels(&self) -> usize {
        self.state.n_channels()
    }

    pub fn target_width(&self) -> usize {
        self.target.0
    }

    pub fn target_height(&self) -> usize {
        self.target.1
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn engine(&self) -> &RaycastEngine<D> {
        &self.engine
    }

    /// Number of kernel rebuilds, including the initial one.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    pub fn render(&mut self, next: &RenderingState) -> Result<Raster> {
        self.render_with(next, false)
    }

    /// Render `next`, rebuilding the kernel when its shape changed or when
    /// `force_rebuild` is set.
    ///
    /// On error the rendering state is left as it was. A kernel compiled or
    /// a frame uploaded before the failure stays cached.
    pub fn render_with(&mut self, next: &RenderingState, force_rebuild: bool) -> Result<Raster> {
        if next.n_channels() != self.n_channels() {
            return Err(ConfigError::ChannelCountMismatch {
                expected: self.n_channels(),
                got: next.n_channels(),
            }
            .into());
        }
        let available = self.volume.n_timepoints();
        if next.timepoint() >= available {
            return Err(ConfigError::NoSuchTimepoint {
                timepoint: next.timepoint(),
                available,
            }
            .into());
        }

        let key = next.program_key();
        if force_rebuild || self.state.needs_rebuild(next) {
            info!(
                "Rebuilding kernel: {} (forced: {force_rebuild})",
                key.algorithm.name()
            );
            self.engine.prepare(&key, force_rebuild)?;
            self.rebuilds += 1;
        }

        if self.uploaded_timepoint != Some(next.timepoint()) {
            let frame = VolumeFrame::from_source(&self.volume, next.timepoint())?;
            self.engine.upload_volume(frame)?;
            self.uploaded_timepoint = Some(next.timepoint());
        }

        // output spacing follows the target, not the snapshot
        let mut staged = self.state.clone();
        staged.set_from(next)?;
        staged
            .transform_mut()
            .set_output_spacing(self.state.transform().output_spacing())?;

        let uniforms = Uniforms::new(&staged, &self.options);
        let start = std::time::Instant::now();
        let raster = self.engine.render(&key, &uniforms, self.target)?;
        debug!(
            "Rendered {}x{} in {:?}",
            self.target.0,
            self.target.1,
            start.elapsed()
        );
        self.state = staged;
        Ok(raster)
    }

    /// Change the output raster size, keeping the physical field of view.
    pub fn set_target_size(&mut self, width: usize, height: usize) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidTargetSize { width, height }.into());
        }
        let size = self.volume.size();
        self.state
            .transform_mut()
            .adjust_output_spacing(size, (width, height))?;
        self.target = (width, height);
        debug!("Target size {width}x{height}");
        Ok(())
    }

    /// Restore display defaults of every channel in `state` and the
    /// default algorithm. Bounding box, clipping, transform and timepoint
    /// are kept.
    pub fn reset_rendering_settings(&self, state: &mut RenderingState) -> Result<()> {
        for c in 0..state.n_channels().min(self.volume.n_channels()) {
            let current = state.channel(c)?;
            let (min, max) = display_range(&self.volume, c, state.timepoint());
            let reset = current
                .to_builder()
                .intensity(min, max, defaults::INTENSITY_GAMMA)
                .alpha(min, max, defaults::ALPHA_GAMMA)
                .weight(defaults::WEIGHT)
                .color(channel_color(self.volume.lut(c).as_ref()))
                .use_light(false)
                .light(Lighting::default())
                .build()?;
            state.set_channel(c, reset)?;
        }
        state.set_algorithm(CompositingAlgorithm::default());
        Ok(())
    }

    /// Near / far interval new channels start with.
    pub fn cropping(&self) -> Cropping {
        self.cropping
    }
}

/// Colour of the brightest LUT entry, white without a LUT.
fn channel_color(lut: Option<&Lut>) -> Rgb8 {
    lut.map(Lut::color_at_max).unwrap_or(defaults::CHANNEL_COLOR)
}

/// LUT display range, falling back to the data range of `timepoint`.
///
/// A constant channel has no usable data range, a step at its only value
/// would make every voxel opaque. It gets [`defaults::DISPLAY_RANGE`].
fn display_range<V: VolumeSource>(volume: &V, channel: usize, timepoint: usize) -> (f32, f32) {
    if let Some(lut) = volume.lut(channel) {
        if lut.min <= lut.max {
            return (lut.min, lut.max);
        }
    }
    match VolumeFrame::from_source(volume, timepoint) {
        Ok(frame) => match frame.display_range(channel).bounds_or(defaults::DISPLAY_RANGE) {
            (low, high) if low < high => (low, high),
            _ => defaults::DISPLAY_RANGE,
        },
        Err(_) => defaults::DISPLAY_RANGE,
    }
}

fn default_settings<V: VolumeSource>(
    volume: &V,
    channel: usize,
    cropping: &Cropping,
) -> std::result::Result<RenderingSettings, ConfigError> {
    let (min, max) = display_range(volume, channel, 0);
    let size: Vector3<f32> = volume.size().map(|v| v as f32);
    RenderingSettings::builder()
        .intensity(min, max, defaults::INTENSITY_GAMMA)
        .alpha(min, max, defaults::ALPHA_GAMMA)
        .weight(defaults::WEIGHT)
        .color(channel_color(volume.lut(channel).as_ref()))
        .use_light(false)
        .light(Lighting::default())
        .bounding_box(point![0.0, 0.0, 0.0], size)
        .near_far(cropping.near, cropping.far)
        .build()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        color,
        device::CpuDevice,
        settings::ChannelProperty,
        test_helpers::{cube_volume, single_channel_renderer},
        volume::MemoryVolume,
    };

    #[test]
    fn initial_state_from_volume() {
        let volume = cube_volume(2).with_lut(1, Lut::from_color(10.0, 200.0, [0, 255, 0]));
        let r = Renderer3D::new(volume, CpuDevice::new(1), RenderOptions::new((16, 8), true))
            .unwrap();
        let s = r.rendering_state();
        assert_eq!(s.n_channels(), 2);
        assert_eq!(s.channel(0).unwrap().color(), color::WHITE);
        assert_eq!(s.channel(1).unwrap().color(), [0, 255, 0]);
        assert_eq!(s.channel(1).unwrap().intensity().min(), 10.0);
        // no LUT: data range
        assert_eq!(s.channel(0).unwrap().intensity().max(), 255.0);
        assert_eq!(s.channel(0).unwrap().alpha().gamma(), 2.0);
        assert_eq!((r.target_width(), r.target_height()), (16, 8));
        assert_eq!(r.rebuild_count(), 1);
        assert_eq!(r.engine().compile_count(), 1);
    }

    #[test]
    fn rejects_mismatched_snapshot() {
        let mut r = single_channel_renderer((8, 8));
        let other = Renderer3D::new(cube_volume(2), CpuDevice::new(1), RenderOptions::new((8, 8), true))
            .unwrap();
        let before = r.rendering_state().clone();
        assert!(r.render(other.rendering_state()).is_err());
        assert_eq!(r.rendering_state(), &before);
    }

    #[test]
    fn rejects_missing_timepoint() {
        let mut r = single_channel_renderer((8, 8));
        let mut s = r.rendering_state().clone();
        s.set_timepoint(1);
        assert!(r.render(&s).is_err());
    }

    #[test]
    fn resize_keeps_fov() {
        let mut r = single_channel_renderer((8, 8));
        r.set_target_size(16, 4).unwrap();
        let spacing = r.rendering_state().transform().output_spacing();
        assert_eq!(spacing, nalgebra::vector![0.5, 2.0, 1.0]);
        let snapshot = r.rendering_state().clone();
        let raster = r.render(&snapshot).unwrap();
        assert_eq!((raster.width(), raster.height()), (16, 4));

        assert!(r.set_target_size(0, 4).is_err());
        assert_eq!(r.target_width(), 16);
    }

    #[test]
    fn reset_restores_defaults() {
        let r = single_channel_renderer((8, 8));
        let mut s = r.rendering_state().clone();
        s.set_channel_property(0, ChannelProperty::Weight, 3.0).unwrap();
        s.set_channel_property(0, ChannelProperty::UseLight, 1.0).unwrap();
        s.set_channel_property(0, ChannelProperty::Near, 1.0).unwrap();
        s.set_algorithm(CompositingAlgorithm::MaximumIntensity);

        r.reset_rendering_settings(&mut s).unwrap();
        let c = s.channel(0).unwrap();
        assert_eq!(c.weight(), 1.0);
        assert!(!c.use_light());
        assert_eq!(c.near(), 1.0);
        assert_eq!(s.algorithm(), CompositingAlgorithm::IndependentTransparency);
    }

    #[test]
    fn constant_volume_display_range() {
        let volume = MemoryVolume::from_fn(
            nalgebra::vector![2, 2, 2],
            nalgebra::vector![1.0, 1.0, 1.0],
            1,
            1,
            |_, _, _| 7.0,
        );
        let r = Renderer3D::new(volume, CpuDevice::new(1), RenderOptions::new((4, 4), true))
            .unwrap();
        let s = r.rendering_state().channel(0).unwrap();
        let (tf, alpha) = (s.intensity(), s.alpha());
        assert_eq!((tf.min(), tf.max()), defaults::DISPLAY_RANGE);
        assert_eq!((alpha.min(), alpha.max()), defaults::DISPLAY_RANGE);
    }

    #[test]
    fn empty_channel_stays_transparent() {
        // channel 1 is all zeros and has no LUT
        let volume = MemoryVolume::from_fn(
            nalgebra::vector![8, 8, 8],
            nalgebra::vector![1.0, 1.0, 1.0],
            2,
            1,
            |c, p, _| {
                let inside = |v: usize| (2..6).contains(&v);
                if c == 0 && inside(p.x) && inside(p.y) && inside(p.z) {
                    255.0
                } else {
                    0.0
                }
            },
        )
        .with_lut(0, Lut::from_color(0.0, 255.0, [255, 0, 0]));
        let mut r = Renderer3D::new(volume, CpuDevice::new(2), RenderOptions::new((8, 8), true))
            .unwrap();

        for algorithm in CompositingAlgorithm::ALL {
            let mut s = r.rendering_state().clone();
            s.set_algorithm(algorithm);
            let raster = r.render(&s).unwrap();
            assert_eq!(raster.pixel(0, 0), Some(color::BLACK), "{algorithm:?}");
            let [red, green, blue] = raster.pixel(4, 4).unwrap();
            assert!(red > 0, "{algorithm:?}");
            assert_eq!((green, blue), (0, 0), "{algorithm:?}");
        }
    }
}
