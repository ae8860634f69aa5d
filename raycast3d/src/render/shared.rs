use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use super::Renderer3D;
use crate::{
    device::Device, error::Result, raster::Raster, state::RenderingState, volume::VolumeSource,
};

/// Renderer usable from several threads.
///
/// A render holds the lock for the whole "rebuild if needed, copy state,
/// launch" sequence, so concurrent calls never observe a half updated state.
pub struct SharedRenderer<V, D>
where
    V: VolumeSource,
    D: Device,
{
    inner: Arc<Mutex<Renderer3D<V, D>>>,
}

impl<V, D> Clone for SharedRenderer<V, D>
where
    V: VolumeSource,
    D: Device,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, D> SharedRenderer<V, D>
where
    V: VolumeSource,
    D: Device,
{
    pub fn new(renderer: Renderer3D<V, D>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(renderer)),
        }
    }

    pub fn render(&self, state: &RenderingState, force_rebuild: bool) -> Result<Raster> {
        self.inner.lock().render_with(state, force_rebuild)
    }

    pub fn set_target_size(&self, width: usize, height: usize) -> Result<()> {
        self.inner.lock().set_target_size(width, height)
    }

    /// Snapshot of the persistent state.
    pub fn rendering_state(&self) -> RenderingState {
        self.inner.lock().rendering_state().clone()
    }

    /// Exclusive access for anything else.
    pub fn lock(&self) -> MutexGuard<'_, Renderer3D<V, D>> {
        self.inner.lock()
    }
}
