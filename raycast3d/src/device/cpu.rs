use log::{debug, trace};
use nalgebra::{Matrix4, Point3, Vector3};

use super::{ChannelUniforms, Device, Uniforms};
use crate::{
    color::{self, RGB},
    common::{BoundBox, Ray},
    error::{ConfigError, RenderError, Result},
    kernel::{self, Flow, Machine, Program, Samples},
    raster::Raster,
    volume::VolumeFrame,
};

/// Device running kernels on the host, pixel rows split between threads.
pub struct CpuDevice {
    workers: usize,
    frame: Option<VolumeFrame>,
    uniforms: Option<Uniforms>,
    output: Raster,
}

impl CpuDevice {
    pub fn new(workers: usize) -> CpuDevice {
        CpuDevice {
            workers: workers.max(1),
            frame: None,
            uniforms: None,
            output: Raster::new(0, 0),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn frame(&self) -> Option<&VolumeFrame> {
        self.frame.as_ref()
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        CpuDevice::new(
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        )
    }
}

impl Device for CpuDevice {
    type Program = Program;

    fn compile(&mut self, source: &str) -> Result<Program> {
        Ok(kernel::compile(source)?)
    }

    fn upload_volume(&mut self, frame: VolumeFrame) -> Result<()> {
        debug!(
            "Uploading timepoint {} ({} channels, {:?} voxels)",
            frame.timepoint(),
            frame.n_channels(),
            frame.size()
        );
        self.frame = Some(frame);
        Ok(())
    }

    fn upload_uniforms(&mut self, uniforms: &Uniforms) -> Result<()> {
        match &mut self.uniforms {
            Some(current) => current.clone_from(uniforms),
            None => self.uniforms = Some(uniforms.clone()),
        }
        Ok(())
    }

    fn launch(&mut self, program: &Program, width: usize, height: usize) -> Result<()> {
        let CpuDevice {
            workers,
            frame,
            uniforms,
            output,
        } = self;
        let frame = frame
            .as_ref()
            .ok_or_else(|| RenderError::Device("no volume uploaded".into()))?;
        let uniforms = uniforms
            .as_ref()
            .ok_or_else(|| RenderError::Device("no uniforms uploaded".into()))?;

        for got in [uniforms.n_channels(), frame.n_channels()] {
            if got != program.n_channels() {
                return Err(ConfigError::ChannelCountMismatch {
                    expected: program.n_channels(),
                    got,
                }
                .into());
            }
        }

        if !(uniforms.sample_step.is_finite() && uniforms.sample_step > 0.0) {
            return Err(ConfigError::Options("sample step must be positive").into());
        }

        output.resize(width, height);
        if width == 0 || height == 0 {
            return Ok(());
        }

        let tracer = Tracer::new(frame, uniforms);
        let rows_per_band = (height + *workers - 1) / *workers;
        trace!("Launch {width}x{height}, {rows_per_band} rows per band");

        crossbeam::scope(|s| {
            let tracer = &tracer;
            for (band, chunk) in output
                .as_bytes_mut()
                .chunks_mut(rows_per_band * width * 3)
                .enumerate()
            {
                s.spawn(move |_| {
                    let mut machine = Machine::new(program, uniforms);
                    let first_row = band * rows_per_band;
                    for (i, pixel) in chunk.chunks_exact_mut(3).enumerate() {
                        let x = i % width;
                        let y = first_row + i / width;
                        let rgb = tracer.trace(&mut machine, x, y);
                        pixel.copy_from_slice(&color::to_rgb8(&rgb));
                    }
                });
            }
        })
        .map_err(|_| RenderError::Device("render worker panicked".into()))
    }

    fn read_back(&mut self) -> Result<Raster> {
        Ok(self.output.clone())
    }
}

/// Launch wide constants shared by all pixels.
struct Tracer<'a> {
    frame: &'a VolumeFrame,
    uniforms: &'a Uniforms,
    inverse: Matrix4<f32>,
    step: f32,
    /// Per channel box, clipped to the volume. `None` for inactive channels.
    boxes: Vec<Option<BoundBox>>,
}

impl<'a> Tracer<'a> {
    fn new(frame: &'a VolumeFrame, uniforms: &'a Uniforms) -> Self {
        let volume_box = frame.bound_box();
        let boxes = uniforms
            .channels
            .iter()
            .map(|ch| {
                if ch.is_active() {
                    ch.bounding_box.intersection(&volume_box)
                } else {
                    None
                }
            })
            .collect();
        let spacing = uniforms.transform.input_spacing();
        Tracer {
            frame,
            uniforms,
            inverse: uniforms.transform.inverse(),
            step: spacing.min() * uniforms.sample_step,
            boxes,
        }
    }

    /// Depth interval of channel `c` along `ray`.
    fn interval(&self, c: usize, ch: &ChannelUniforms, ray: &Ray) -> Option<(f32, f32)> {
        let (t0, t1) = self.boxes[c].as_ref()?.intersect(ray)?;
        let lo = t0.max(ch.near);
        let hi = t1.min(ch.far);
        (lo < hi).then_some((lo, hi))
    }

    fn trace(&self, machine: &mut Machine<'_>, x: usize, y: usize) -> RGB {
        let ray = self.uniforms.transform.ray(&self.inverse, x, y);

        let intervals: Vec<_> = self
            .uniforms
            .channels
            .iter()
            .enumerate()
            .map(|(c, ch)| self.interval(c, ch, &ray))
            .collect();
        let span = intervals
            .iter()
            .flatten()
            .fold(None, |acc: Option<(f32, f32)>, &(lo, hi)| match acc {
                None => Some((lo, hi)),
                Some((a, b)) => Some((a.min(lo), b.max(hi))),
            });
        let Some((t0, t1)) = span else {
            return self.uniforms.background;
        };

        machine.begin();
        let mut samples = RaySamples {
            frame: self.frame,
            intervals: &intervals,
            pos: ray.origin,
            t: t0,
        };
        let mut k = 0;
        loop {
            let t = t0 + (k as f32 + 0.5) * self.step;
            if t >= t1 {
                break;
            }
            samples.t = t;
            samples.pos = ray.point_from_t(t);
            if machine.step(&mut samples) == Flow::Break {
                break;
            }
            k += 1;
        }
        machine.finish()
    }
}

/// Sample inputs at the current ray position.
struct RaySamples<'a> {
    frame: &'a VolumeFrame,
    intervals: &'a [Option<(f32, f32)>],
    pos: Point3<f32>,
    t: f32,
}

impl Samples for RaySamples<'_> {
    fn sample(&mut self, channel: usize) -> f32 {
        self.frame.sample_at(channel, self.pos)
    }

    fn gradient(&mut self, channel: usize) -> Vector3<f32> {
        self.frame.gradient_at(channel, self.pos)
    }

    fn visible(&self, channel: usize) -> bool {
        matches!(self.intervals[channel], Some((lo, hi)) if lo <= self.t && self.t < hi)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        kernel::generate,
        state::{CompositingAlgorithm, ProgramKey},
        test_helpers::{cube_frame, uniforms_for},
    };

    fn render(device: &mut CpuDevice, algorithm: CompositingAlgorithm, uniforms: &Uniforms) -> Raster {
        let key = ProgramKey {
            use_light: vec![false; uniforms.n_channels()],
            algorithm,
        };
        let program = device.compile(&generate(&key)).unwrap();
        device.upload_uniforms(uniforms).unwrap();
        device.launch(&program, 8, 8).unwrap();
        device.read_back().unwrap()
    }

    #[test]
    fn thread_count() {
        assert_eq!(CpuDevice::new(0).workers(), 1);
        assert_eq!(CpuDevice::new(3).workers(), 3);
        assert!(CpuDevice::default().workers() >= 1);
    }

    #[test]
    fn launch_needs_volume() {
        let mut device = CpuDevice::new(2);
        let program = device
            .compile("kernel k channels 0; init {} sample {} finish { let out = background(); }")
            .unwrap();
        assert!(matches!(
            device.launch(&program, 4, 4),
            Err(RenderError::Device(_))
        ));
    }

    #[test]
    fn compile_error_surfaces() {
        let mut device = CpuDevice::new(1);
        let err = device.compile("kernel k channels 1; init {").unwrap_err();
        assert!(matches!(err, RenderError::Compile(_)));
    }

    #[test]
    fn worker_count_does_not_change_image() {
        let u = uniforms_for(1, (8, 8));
        let mut a = CpuDevice::new(1);
        let mut b = CpuDevice::new(3);
        a.upload_volume(cube_frame(1)).unwrap();
        b.upload_volume(cube_frame(1)).unwrap();
        let ra = render(&mut a, CompositingAlgorithm::MaximumIntensity, &u);
        let rb = render(&mut b, CompositingAlgorithm::MaximumIntensity, &u);
        assert_eq!(ra, rb);
        // cube is centred and bright, edges are empty
        assert_eq!(ra.pixel(4, 4), Some([255, 255, 255]));
        assert_eq!(ra.pixel(0, 0), Some([0, 0, 0]));
    }

    #[test]
    fn channel_count_checked() {
        let mut device = CpuDevice::new(1);
        device.upload_volume(cube_frame(2)).unwrap();
        device.upload_uniforms(&uniforms_for(2, (8, 8))).unwrap();
        let program = device
            .compile(&generate(&ProgramKey {
                use_light: vec![false],
                algorithm: CompositingAlgorithm::MaximumIntensity,
            }))
            .unwrap();
        assert!(matches!(
            device.launch(&program, 8, 8),
            Err(RenderError::Configuration(ConfigError::ChannelCountMismatch { .. }))
        ));
    }

    #[test]
    fn inactive_channels_give_background() {
        let mut u = uniforms_for(1, (8, 8));
        u.background = color::new(0.0, 0.0, 1.0);
        u.channels[0].enabled = false;
        let mut device = CpuDevice::new(2);
        device.upload_volume(cube_frame(1)).unwrap();
        let r = render(&mut device, CompositingAlgorithm::IndependentTransparency, &u);
        assert!(r.pixels().all(|p| p == [0, 0, 255]));

        u.channels[0].enabled = true;
        u.channels[0].near = 5.0;
        u.channels[0].far = 5.0;
        let r = render(&mut device, CompositingAlgorithm::IndependentTransparency, &u);
        assert!(r.pixels().all(|p| p == [0, 0, 255]));
    }
}
