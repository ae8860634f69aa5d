mod render_front;
mod render_options;
mod renderer;
mod shared;

pub use render_front::{RendererFront, RendererMessage};
pub use render_options::{RenderOptions, RenderOptionsBuilder};
pub use renderer::Renderer3D;
pub use shared::SharedRenderer;
