//! Input volume.
//!
//! Loading and calibration live outside this crate, the renderer only sees
//! the [`VolumeSource`] interface. [`VolumeFrame`] is the single timepoint
//! copy uploaded to a device, [`MemoryVolume`] a plain in-memory source.

use nalgebra::{point, vector, Point3, Vector3};

use crate::{
    color::{self, Rgb8},
    common::{BoundBox, ValueRange},
    error::ConfigError,
};

/// Multi channel, time varying volume with calibrated voxel spacing.
pub trait VolumeSource {
    /// Voxel counts along x, y, z.
    fn size(&self) -> Vector3<usize>;

    /// World units per voxel.
    fn spacing(&self) -> Vector3<f32>;

    fn n_channels(&self) -> usize;

    fn n_timepoints(&self) -> usize;

    /// Display look-up table of a channel, if it has one.
    fn lut(&self, channel: usize) -> Option<Lut>;

    /// Raw intensity of one voxel. Coordinates are in range.
    fn value(&self, channel: usize, x: usize, y: usize, z: usize, timepoint: usize) -> f32;
}

/// Display look-up table: intensity range and colour ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut {
    pub min: f32,
    pub max: f32,
    entries: Vec<Rgb8>,
}

impl Lut {
    pub const MAP_SIZE: usize = 256;

    /// Table from explicit entries, lowest intensity first.
    /// An empty table degenerates to a single white entry.
    pub fn new(min: f32, max: f32, mut entries: Vec<Rgb8>) -> Lut {
        if entries.is_empty() {
            entries.push(color::WHITE);
        }
        Lut { min, max, entries }
    }

    /// Linear ramp from black to `color`.
    pub fn from_color(min: f32, max: f32, color: Rgb8) -> Lut {
        let last = (Self::MAP_SIZE - 1) as f32;
        let entries = (0..Self::MAP_SIZE)
            .map(|i| {
                let f = i as f32 / last;
                color::clamp_rgb8(
                    color[0] as f32 * f,
                    color[1] as f32 * f,
                    color[2] as f32 * f,
                )
            })
            .collect();
        Lut { min, max, entries }
    }

    pub fn grays(min: f32, max: f32) -> Lut {
        Self::from_color(min, max, color::WHITE)
    }

    pub fn map_size(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, index: usize) -> Option<Rgb8> {
        self.entries.get(index).copied()
    }

    /// Colour of the highest intensity entry.
    pub fn color_at_max(&self) -> Rgb8 {
        self.entries.last().copied().unwrap_or(color::WHITE)
    }
}

/// Near / far clip distances supplied by the cropping collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cropping {
    pub near: f32,
    pub far: f32,
}

impl Cropping {
    /// Interval centred on the volume centre, long as the world space
    /// diagonal, so the volume is never clipped by a rotation.
    pub fn for_volume(size: Vector3<usize>, spacing: Vector3<f32>) -> Cropping {
        let extent = size.map(|v| v as f32).component_mul(&spacing);
        let half = extent.norm() / 2.0;
        let center = extent.z / 2.0;
        Cropping {
            near: center - half,
            far: center + half,
        }
    }
}

/// One timepoint of a volume, all channels, as uploaded to a device.
///
/// Voxel `(i, j, k)` is centred at `(i + 0.5, j + 0.5, k + 0.5)`, so the
/// data covers `[0, size]` on every axis.
#[derive(Clone)]
pub struct VolumeFrame {
    size: Vector3<usize>,
    spacing: Vector3<f32>,
    timepoint: usize,
    channels: Vec<Vec<f32>>,
}

impl std::fmt::Debug for VolumeFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeFrame")
            .field("size", &self.size)
            .field("spacing", &self.spacing)
            .field("timepoint", &self.timepoint)
            .field("channels", &self.channels.len())
            .finish()
    }
}

impl VolumeFrame {
    /// Copy `timepoint` out of `source`.
    pub fn from_source<V>(source: &V, timepoint: usize) -> Result<VolumeFrame, ConfigError>
    where
        V: VolumeSource + ?Sized,
    {
        let available = source.n_timepoints();
        if timepoint >= available {
            return Err(ConfigError::NoSuchTimepoint {
                timepoint,
                available,
            });
        }
        let size = source.size();
        let channels = (0..source.n_channels())
            .map(|c| {
                let mut data = Vec::with_capacity(size.x * size.y * size.z);
                for z in 0..size.z {
                    for y in 0..size.y {
                        for x in 0..size.x {
                            data.push(source.value(c, x, y, z, timepoint));
                        }
                    }
                }
                data
            })
            .collect();
        Ok(VolumeFrame {
            size,
            spacing: source.spacing(),
            timepoint,
            channels,
        })
    }

    pub fn size(&self) -> Vector3<usize> {
        self.size
    }

    pub fn spacing(&self) -> Vector3<f32> {
        self.spacing
    }

    pub fn timepoint(&self) -> usize {
        self.timepoint
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn bound_box(&self) -> BoundBox {
        BoundBox::from_position_dims(point![0.0, 0.0, 0.0], self.size.map(|v| v as f32))
    }

    /// Range of values of one channel.
    pub fn display_range(&self, channel: usize) -> ValueRange {
        match self.channels.get(channel) {
            Some(data) => ValueRange::from_samples(data.iter().copied()),
            None => ValueRange::empty(),
        }
    }

    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.size.x + z * self.size.x * self.size.y
    }

    /// Voxel value, coordinates clamped to the volume.
    fn voxel(&self, data: &[f32], x: isize, y: isize, z: isize) -> f32 {
        let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;
        let index = self.index(
            clamp(x, self.size.x),
            clamp(y, self.size.y),
            clamp(z, self.size.z),
        );
        data[index]
    }

    /// Trilinear interpolation at voxel coordinates `pos`, clamped to edge.
    pub fn sample_at(&self, channel: usize, pos: Point3<f32>) -> f32 {
        let data = &self.channels[channel];
        if data.is_empty() {
            return 0.0;
        }

        let u = pos - vector![0.5, 0.5, 0.5];
        let base = u.map(f32::floor);
        let t = u - base;

        let x = base.x as isize;
        let y = base.y as isize;
        let z = base.z as isize;

        // c[zyx]
        let c000 = self.voxel(data, x, y, z);
        let c001 = self.voxel(data, x + 1, y, z);
        let c010 = self.voxel(data, x, y + 1, z);
        let c011 = self.voxel(data, x + 1, y + 1, z);
        let c100 = self.voxel(data, x, y, z + 1);
        let c101 = self.voxel(data, x + 1, y, z + 1);
        let c110 = self.voxel(data, x, y + 1, z + 1);
        let c111 = self.voxel(data, x + 1, y + 1, z + 1);

        // x lines
        let c00 = c000 * (1.0 - t.x) + c001 * t.x;
        let c01 = c010 * (1.0 - t.x) + c011 * t.x;
        let c10 = c100 * (1.0 - t.x) + c101 * t.x;
        let c11 = c110 * (1.0 - t.x) + c111 * t.x;

        // y plane
        let c0 = c00 * (1.0 - t.y) + c01 * t.y;
        let c1 = c10 * (1.0 - t.y) + c11 * t.y;

        c0 * (1.0 - t.z) + c1 * t.z
    }

    /// Central difference gradient, one voxel apart, in intensity per world unit.
    pub fn gradient_at(&self, channel: usize, pos: Point3<f32>) -> Vector3<f32> {
        let dx = vector![1.0, 0.0, 0.0];
        let dy = vector![0.0, 1.0, 0.0];
        let dz = vector![0.0, 0.0, 1.0];
        let g = vector![
            self.sample_at(channel, pos + dx) - self.sample_at(channel, pos - dx),
            self.sample_at(channel, pos + dy) - self.sample_at(channel, pos - dy),
            self.sample_at(channel, pos + dz) - self.sample_at(channel, pos - dz)
        ];
        g.component_div(&(self.spacing * 2.0))
    }
}

/// Volume held in memory, `f32` samples.
#[derive(Debug, Clone)]
pub struct MemoryVolume {
    size: Vector3<usize>,
    spacing: Vector3<f32>,
    n_channels: usize,
    n_timepoints: usize,
    luts: Vec<Option<Lut>>,
    // [timepoint][channel], x fastest
    data: Vec<Vec<f32>>,
}

impl MemoryVolume {
    /// Zero filled volume.
    pub fn new(
        size: Vector3<usize>,
        spacing: Vector3<f32>,
        n_channels: usize,
        n_timepoints: usize,
    ) -> MemoryVolume {
        let elements = size.x * size.y * size.z;
        MemoryVolume {
            size,
            spacing,
            n_channels,
            n_timepoints,
            luts: vec![None; n_channels],
            data: vec![vec![0.0; elements]; n_channels * n_timepoints],
        }
    }

    /// Volume with every voxel computed by `f(channel, position, timepoint)`.
    pub fn from_fn<F>(
        size: Vector3<usize>,
        spacing: Vector3<f32>,
        n_channels: usize,
        n_timepoints: usize,
        f: F,
    ) -> MemoryVolume
    where
        F: Fn(usize, Point3<usize>, usize) -> f32,
    {
        let mut volume = Self::new(size, spacing, n_channels, n_timepoints);
        for t in 0..n_timepoints {
            for c in 0..n_channels {
                for z in 0..size.z {
                    for y in 0..size.y {
                        for x in 0..size.x {
                            volume.set(c, x, y, z, t, f(c, point![x, y, z], t));
                        }
                    }
                }
            }
        }
        volume
    }

    pub fn with_lut(mut self, channel: usize, lut: Lut) -> MemoryVolume {
        if let Some(slot) = self.luts.get_mut(channel) {
            *slot = Some(lut);
        }
        self
    }

    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.size.x + z * self.size.x * self.size.y
    }

    pub fn set(&mut self, channel: usize, x: usize, y: usize, z: usize, timepoint: usize, v: f32) {
        let index = self.index(x, y, z);
        self.data[timepoint * self.n_channels + channel][index] = v;
    }
}

impl VolumeSource for MemoryVolume {
    fn size(&self) -> Vector3<usize> {
        self.size
    }

    fn spacing(&self) -> Vector3<f32> {
        self.spacing
    }

    fn n_channels(&self) -> usize {
        self.n_channels
    }

    fn n_timepoints(&self) -> usize {
        self.n_timepoints
    }

    fn lut(&self, channel: usize) -> Option<Lut> {
        self.luts.get(channel).cloned().flatten()
    }

    fn value(&self, channel: usize, x: usize, y: usize, z: usize, timepoint: usize) -> f32 {
        self.data[timepoint * self.n_channels + channel][self.index(x, y, z)]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ramp_volume() -> MemoryVolume {
        // value = x + 10 y + 100 z
        MemoryVolume::from_fn(vector![4, 4, 4], vector![1.0, 1.0, 2.0], 1, 2, |_, p, t| {
            (p.x + 10 * p.y + 100 * p.z) as f32 + 1000.0 * t as f32
        })
    }

    #[test]
    fn frame_copies_timepoint() {
        let vol = ramp_volume();
        let frame = VolumeFrame::from_source(&vol, 1).unwrap();
        assert_eq!(frame.timepoint(), 1);
        assert_eq!(frame.sample_at(0, point![0.5, 0.5, 0.5]), 1000.0);
        assert!(VolumeFrame::from_source(&vol, 2).is_err());
    }

    #[test]
    fn sample_at_voxel_centres() {
        let frame = VolumeFrame::from_source(&ramp_volume(), 0).unwrap();
        assert_eq!(frame.sample_at(0, point![2.5, 1.5, 3.5]), 312.0);
        // clamp to edge
        assert_eq!(frame.sample_at(0, point![0.0, 0.0, 0.0]), 0.0);
        assert_eq!(frame.sample_at(0, point![9.0, 0.5, 0.5]), 3.0);
    }

    #[test]
    fn trilinear_between_voxels() {
        let frame = VolumeFrame::from_source(&ramp_volume(), 0).unwrap();
        let v = frame.sample_at(0, point![1.0, 1.0, 1.0]);
        assert!((v - 55.5).abs() < 1e-4);
    }

    #[test]
    fn gradient_in_world_units() {
        let frame = VolumeFrame::from_source(&ramp_volume(), 0).unwrap();
        let g = frame.gradient_at(0, point![2.0, 2.0, 2.0]);
        // z spacing is 2
        assert!((g - vector![1.0, 10.0, 50.0]).norm() < 1e-3);
    }

    #[test]
    fn lut_colors() {
        let lut = Lut::from_color(0.0, 100.0, [255, 0, 0]);
        assert_eq!(lut.map_size(), 256);
        assert_eq!(lut.entry(0), Some([0, 0, 0]));
        assert_eq!(lut.color_at_max(), [255, 0, 0]);
        assert_eq!(Lut::new(0.0, 1.0, vec![]).color_at_max(), color::WHITE);
    }

    #[test]
    fn default_cropping_covers_diagonal() {
        let c = Cropping::for_volume(vector![3, 4, 0], vector![1.0, 1.0, 1.0]);
        assert_eq!(c.near, -2.5);
        assert_eq!(c.far, 2.5);
    }

    #[test]
    fn display_range() {
        let frame = VolumeFrame::from_source(&ramp_volume(), 0).unwrap();
        let r = frame.display_range(0);
        assert_eq!((r.low, r.high), (0.0, 333.0));
        assert!(frame.display_range(3).is_empty());
    }
}
