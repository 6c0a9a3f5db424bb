//! Editor overlay bridge.
//!
//! Wraps a 3D render pipeline with an egui overlay: the inner pipeline's
//! offscreen color becomes a UI texture hosted in a scene-view panel, UI
//! draws on top of the swapchain with `LoadOp=LOAD`, and input capture is
//! routed back so the 3D camera keeps the mouse while the scene viewport is
//! hovered.

mod overlay_pass;
mod pipeline;
mod shell;

pub use overlay_pass::OverlayPass;
pub use pipeline::{EditorOverlayPipeline, UiCallback};
pub use shell::{EguiShell, EguiShellHandle};
