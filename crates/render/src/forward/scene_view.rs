//! CPU-side scene description consumed by the forward pipeline.

use glam::{Mat4, Vec4};

use rtr_resources::MeshHandle;

use crate::error::RenderResult;

/// Camera matrices for one frame.
#[derive(Clone, Copy, Debug)]
pub struct CameraMatrices {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix (GL-style; the pipeline applies the Vulkan Y
    /// flip).
    pub proj: Mat4,
}

impl Default for CameraMatrices {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

/// One drawable: a mesh handle plus its per-object transforms and color.
#[derive(Clone, Copy, Debug)]
pub struct ForwardRenderable {
    /// Mesh to draw.
    pub mesh: MeshHandle,
    /// Object-to-world matrix.
    pub model: Mat4,
    /// Normal matrix (transpose of the inverse of `model`).
    pub normal: Mat4,
    /// Base color written into the per-object uniform.
    pub base_color: Vec4,
}

impl ForwardRenderable {
    /// Builds a renderable from a model matrix, deriving the normal matrix.
    pub fn new(mesh: MeshHandle, model: Mat4, base_color: Vec4) -> Self {
        Self {
            mesh,
            model,
            normal: model.inverse().transpose(),
            base_color,
        }
    }
}

/// Per-frame CPU-side description of the draw work.
#[derive(Clone, Debug, Default)]
pub struct ForwardSceneView {
    /// Camera matrices.
    pub camera: CameraMatrices,
    /// Renderables in draw order.
    pub renderables: Vec<ForwardRenderable>,
}

/// External scene provider contract.
///
/// The scene graph lives outside this crate; whatever owns it implements
/// this trait and the forward pipeline pulls a fresh
/// [`ForwardSceneView`] from it in `prepare_frame`.
pub trait ForwardSceneViewBuilder {
    /// Builds the scene view for the upcoming frame.
    ///
    /// # Errors
    ///
    /// Fails when there is no active scene or camera to describe.
    fn build_scene_view(&mut self) -> RenderResult<ForwardSceneView>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_renderable_derives_normal_matrix() {
        let model = Mat4::from_scale(Vec3::new(2.0, 2.0, 2.0));
        let renderable =
            ForwardRenderable::new(MeshHandle(1), model, Vec4::new(1.0, 1.0, 1.0, 1.0));

        assert_eq!(renderable.normal, model.inverse().transpose());
    }

    #[test]
    fn test_identity_model_keeps_identity_normal() {
        let renderable =
            ForwardRenderable::new(MeshHandle(1), Mat4::IDENTITY, Vec4::splat(1.0));
        assert_eq!(renderable.normal, Mat4::IDENTITY);
    }
}
