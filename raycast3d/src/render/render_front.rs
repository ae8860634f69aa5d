use std::thread::JoinHandle;

use crossbeam::channel::{Receiver, Sender};
use log::{info, warn};

use super::Renderer3D;
use crate::{
    device::Device,
    error::{RenderError, Result},
    raster::Raster,
    state::RenderingState,
    volume::VolumeSource,
};

/// Messages to renderer
///
/// Messages queue up and are handled in order, one at a time.
pub enum RendererMessage {
    /// Render a snapshot, answered with the raster (or the error)
    Render {
        state: Box<RenderingState>,
        force_rebuild: bool,
    },
    /// Change target size, not answered
    Resize { width: usize, height: usize },
    /// Shut down, thread will get ready to be joined
    ShutDown,
}

/// Communicating with a renderer running in its own thread
///
/// Every `Render` request gets exactly one answer, in request order.
/// At most 100 requests and 100 answers are buffered, beyond that
/// [`RendererFront::request`] blocks until answers are received.
pub struct RendererFront {
    handle: Option<JoinHandle<()>>,
    sender: Sender<RendererMessage>,
    // `None` after `finish`
    receiver: Option<Receiver<Result<Raster>>>,
}

impl RendererFront {
    /// Move `renderer` into a new thread and start listening.
    pub fn start<V, D>(mut renderer: Renderer3D<V, D>) -> Self
    where
        V: VolumeSource + Send + 'static,
        D: Device + Send + 'static,
        D::Program: Send,
    {
        let (sender, requests) = crossbeam::channel::bounded::<RendererMessage>(100); // main -> renderer
        let (results, receiver) = crossbeam::channel::bounded(100); // renderer -> main

        let handle = std::thread::spawn(move || {
            info!("Renderer thread started");
            // Master loop
            while let Ok(msg) = requests.recv() {
                match msg {
                    RendererMessage::Render {
                        state,
                        force_rebuild,
                    } => {
                        let raster = renderer.render_with(&state, force_rebuild);
                        if results.send(raster).is_err() {
                            break;
                        }
                    }
                    RendererMessage::Resize { width, height } => {
                        if let Err(e) = renderer.set_target_size(width, height) {
                            warn!("Resize to {width}x{height} rejected: {e}");
                        }
                    }
                    RendererMessage::ShutDown => break,
                }
            }
            info!("Renderer thread finished");
        });

        Self {
            handle: Some(handle),
            sender,
            receiver: Some(receiver),
        }
    }

    /// Getter for sender
    /// Returned struct can be used to send commands to renderer
    pub fn get_sender(&self) -> Sender<RendererMessage> {
        self.sender.clone()
    }

    /// Send message to renderer
    pub fn send_message(&self, msg: RendererMessage) -> Result<()> {
        self.sender
            .send(msg)
            .map_err(|_| RenderError::Device("renderer thread is not running".into()))
    }

    /// Queue a render of `state`.
    pub fn request(&self, state: &RenderingState, force_rebuild: bool) -> Result<()> {
        self.send_message(RendererMessage::Render {
            state: Box::new(state.clone()),
            force_rebuild,
        })
    }

    pub fn resize(&self, width: usize, height: usize) -> Result<()> {
        self.send_message(RendererMessage::Resize { width, height })
    }

    /// Receive the answer to the oldest pending request
    ///
    /// Blocking call
    pub fn receive(&self) -> Result<Raster> {
        self.receiver
            .as_ref()
            .and_then(|r| r.recv().ok())
            .ok_or_else(|| RenderError::Device("renderer thread is not running".into()))?
    }

    /// Non blocking variant of [`RendererFront::receive`]
    pub fn try_receive(&self) -> Option<Result<Raster>> {
        self.receiver.as_ref()?.try_recv().ok()
    }

    /// Shut the renderer down and join its thread
    ///
    /// Unreceived answers are dropped. Call is blocking until the request
    /// being rendered is finished and the thread is joined.
    pub fn finish(&mut self) {
        if let Some(handle) = self.handle.take() {
            // a worker blocked on a full answer queue wakes up with an error
            self.receiver = None;
            // thread may already be gone
            let _ = self.sender.send(RendererMessage::ShutDown);
            if handle.join().is_err() {
                warn!("Renderer thread panicked");
            }
        }
    }
}

impl Drop for RendererFront {
    fn drop(&mut self) {
        self.finish();
    }
}
