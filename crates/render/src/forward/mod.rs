//! Forward raster pipeline: offscreen scene render + blit to swapchain.

mod blit_pass;
mod forward_pass;
mod pipeline;
mod scene_view;
mod uniform;

pub use blit_pass::{PresentBlitPass, PresentBlitResources};
pub use forward_pass::{DrawItem, ForwardPass, ForwardPassResources};
pub use pipeline::{ForwardPipeline, MAX_RENDERABLES};
pub use scene_view::{
    CameraMatrices, ForwardRenderable, ForwardSceneView, ForwardSceneViewBuilder,
};
pub use uniform::{ObjectUniform, pack_mat4_row_major};
