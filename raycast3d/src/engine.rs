//! Compiled program cache in front of a [`Device`].

use std::collections::HashMap;

use log::{debug, info};

use crate::{
    device::{Device, Uniforms},
    error::{RenderError, Result},
    kernel,
    raster::Raster,
    state::ProgramKey,
    volume::VolumeFrame,
};

/// Compiles generated kernels on demand and runs them.
///
/// Programs are cached by [`ProgramKey`], switching back to a kernel
/// shape seen before does not compile again.
pub struct RaycastEngine<D: Device> {
    device: D,
    programs: HashMap<ProgramKey, D::Program>,
    compiled: usize,
}

impl<D: Device> RaycastEngine<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            programs: HashMap::new(),
            compiled: 0,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Number of sources handed to the device compiler so far.
    pub fn compile_count(&self) -> usize {
        self.compiled
    }

    pub fn is_prepared(&self, key: &ProgramKey) -> bool {
        self.programs.contains_key(key)
    }

    /// Compile arbitrary kernel source.
    pub fn compile(&mut self, source: &str) -> Result<D::Program> {
        self.compiled += 1;
        self.device.compile(source)
    }

    /// Make the program for `key` available, compiling it when it is not
    /// cached or when `force` is set.
    pub fn prepare(&mut self, key: &ProgramKey, force: bool) -> Result<()> {
        if !force && self.programs.contains_key(key) {
            debug!("Reusing cached {} kernel", key.algorithm.name());
            return Ok(());
        }
        let source = kernel::generate(key);
        let program = self.compile(&source)?;
        info!(
            "Compiled {} kernel for {} channel(s), light {:?}",
            key.algorithm.name(),
            key.n_channels(),
            key.use_light
        );
        self.programs.insert(key.clone(), program);
        Ok(())
    }

    pub fn upload_volume(&mut self, frame: VolumeFrame) -> Result<()> {
        self.device.upload_volume(frame)
    }

    /// Render with the prepared program for `key`.
    pub fn render(&mut self, key: &ProgramKey, uniforms: &Uniforms, size: (usize, usize)) -> Result<Raster> {
        let program = self
            .programs
            .get(key)
            .ok_or_else(|| RenderError::Device("program was not prepared".into()))?;
        self.device.upload_uniforms(uniforms)?;
        self.device.launch(program, size.0, size.1)?;
        self.device.read_back()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        device::CpuDevice,
        state::CompositingAlgorithm,
        test_helpers::{cube_frame, uniforms_for},
    };

    fn key(algorithm: CompositingAlgorithm) -> ProgramKey {
        ProgramKey {
            use_light: vec![false],
            algorithm,
        }
    }

    #[test]
    fn cache_by_key() {
        let mut engine = RaycastEngine::new(CpuDevice::new(1));
        let mip = key(CompositingAlgorithm::MaximumIntensity);
        let ind = key(CompositingAlgorithm::IndependentTransparency);

        engine.prepare(&mip, false).unwrap();
        engine.prepare(&mip, false).unwrap();
        assert_eq!(engine.compile_count(), 1);

        engine.prepare(&ind, false).unwrap();
        engine.prepare(&mip, false).unwrap();
        assert_eq!(engine.compile_count(), 2);

        engine.prepare(&mip, true).unwrap();
        assert_eq!(engine.compile_count(), 3);
    }

    #[test]
    fn render_needs_prepared_program() {
        let mut engine = RaycastEngine::new(CpuDevice::new(1));
        engine.upload_volume(cube_frame(1)).unwrap();
        let u = uniforms_for(1, (8, 8));
        let mip = key(CompositingAlgorithm::MaximumIntensity);

        assert!(engine.render(&mip, &u, (8, 8)).is_err());
        engine.prepare(&mip, false).unwrap();
        let r = engine.render(&mip, &u, (8, 8)).unwrap();
        assert_eq!((r.width(), r.height()), (8, 8));
    }
}
