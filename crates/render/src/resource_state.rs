//! Explicit image layout tracking.
//!
//! Long-lived images (offscreen color targets, storage images) carry their
//! rest-state layout next to the image itself. A pass that transitions the
//! image borrows a [`TrackedImage`] and writes the new layout back through
//! it, so the next frame's barriers can derive their source scope from the
//! stored layout instead of guessing.

use ash::vk;

use rtr_rhi::image::Image;

/// Borrowed view of an image plus its mutable stored layout.
///
/// Passes receive this, record their transition, and update `layout` in
/// place; the owner's cached layout therefore always describes the image at
/// rest.
pub struct TrackedImage<'a> {
    /// The underlying image.
    pub image: &'a Image,
    /// The owner's stored layout, updated by passes that transition the
    /// image.
    pub layout: &'a mut vk::ImageLayout,
}

/// An image together with its tracked rest-state layout.
///
/// The layout starts as `UNDEFINED`; every image has exactly one tracked
/// layout at rest, and in-pass transitions are written back before the pass
/// returns.
pub struct FrameTrackedImage {
    /// The owned image.
    pub image: Image,
    /// Layout the image is in between passes.
    pub layout: vk::ImageLayout,
}

impl FrameTrackedImage {
    /// Wraps a freshly created image whose layout is still `UNDEFINED`.
    pub fn new(image: Image) -> Self {
        Self {
            image,
            layout: vk::ImageLayout::UNDEFINED,
        }
    }

    /// Borrows the image together with its mutable layout slot.
    pub fn view(&mut self) -> TrackedImage<'_> {
        TrackedImage {
            image: &self.image,
            layout: &mut self.layout,
        }
    }
}

/// Maps a stored rest-state layout to the source scope of the barrier that
/// leaves it.
///
/// Layouts produced by the framework's own passes get a precise scope;
/// anything else (notably `UNDEFINED` on first use) falls back to
/// `TOP_OF_PIPE` with no access.
pub fn barrier_src_for_layout(
    layout: vk::ImageLayout,
) -> (vk::PipelineStageFlags2, vk::AccessFlags2) {
    match layout {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_SAMPLED_READ,
        ),
        vk::ImageLayout::GENERAL => (
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::AccessFlags2::SHADER_STORAGE_WRITE,
        ),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        ),
        _ => (vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_src_for_sampled_layout() {
        let (stage, access) = barrier_src_for_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(stage, vk::PipelineStageFlags2::FRAGMENT_SHADER);
        assert_eq!(access, vk::AccessFlags2::SHADER_SAMPLED_READ);
    }

    #[test]
    fn test_barrier_src_for_general_layout() {
        let (stage, access) = barrier_src_for_layout(vk::ImageLayout::GENERAL);
        assert_eq!(stage, vk::PipelineStageFlags2::COMPUTE_SHADER);
        assert_eq!(access, vk::AccessFlags2::SHADER_STORAGE_WRITE);
    }

    #[test]
    fn test_barrier_src_for_color_attachment_layout() {
        let (stage, access) = barrier_src_for_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn test_barrier_src_for_undefined_layout() {
        let (stage, access) = barrier_src_for_layout(vk::ImageLayout::UNDEFINED);
        assert_eq!(stage, vk::PipelineStageFlags2::TOP_OF_PIPE);
        assert_eq!(access, vk::AccessFlags2::NONE);
    }
}
