//! Offscreen color observation for editors and overlays.

use ash::vk;

/// Observation handle exposing a pipeline's per-frame offscreen color.
///
/// The editor overlay samples this view as a UI texture; it is only usable
/// once the producing pipeline has rendered at least once and left the image
/// in a sampleable layout.
#[derive(Clone, Copy, Debug)]
pub struct FrameColorSourceView {
    /// View over the offscreen color image.
    pub image_view: vk::ImageView,
    /// Layout the image is in at rest.
    pub layout: vk::ImageLayout,
    /// Extent of the offscreen image.
    pub extent: vk::Extent2D,
}

impl Default for FrameColorSourceView {
    fn default() -> Self {
        Self {
            image_view: vk::ImageView::null(),
            layout: vk::ImageLayout::UNDEFINED,
            extent: vk::Extent2D {
                width: 0,
                height: 0,
            },
        }
    }
}

impl FrameColorSourceView {
    /// Returns true when the view can actually be sampled: non-null view,
    /// known layout, and non-degenerate extent.
    pub fn valid(&self) -> bool {
        self.image_view != vk::ImageView::null()
            && self.layout != vk::ImageLayout::UNDEFINED
            && self.extent.width > 0
            && self.extent.height > 0
    }
}

/// Implemented by pipelines that can expose their offscreen color per frame
/// slot.
pub trait FrameColorSource {
    /// Returns the color view for the given frame slot; an invalid view
    /// means nothing has been rendered for that slot yet.
    fn frame_color_source_view(&self, frame_index: u32) -> FrameColorSourceView;
}

/// Implemented by pipelines whose scene render target can be decoupled from
/// the swapchain extent (e.g. when the editor hosts the scene in a panel).
pub trait SceneViewportSink {
    /// Requests a scene render target extent; zero dimensions are ignored.
    fn set_scene_viewport_extent(&mut self, width: u32, height: u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_default_view_is_invalid() {
        assert!(!FrameColorSourceView::default().valid());
    }

    #[test]
    fn test_view_requires_all_fields() {
        let mut view = FrameColorSourceView {
            image_view: vk::ImageView::from_raw(1),
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
        };
        assert!(view.valid());

        view.layout = vk::ImageLayout::UNDEFINED;
        assert!(!view.valid());

        view.layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
        view.extent.height = 0;
        assert!(!view.valid());
    }
}
