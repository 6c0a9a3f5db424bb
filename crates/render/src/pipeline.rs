//! Render pipeline contract and runtime bundle.
//!
//! A [`RenderPipeline`] composes render passes into one frame of GPU work.
//! The [`Renderer`](crate::Renderer) binds exactly one pipeline, forwards it
//! every observed [`SwapchainState`](crate::SwapchainState) change, and
//! calls `render` once per acquired frame.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;

use rtr_rhi::FRAMES_IN_FLIGHT;
use rtr_rhi::buffer::{Buffer, BufferUsage};
use rtr_rhi::device::Device;
use rtr_rhi::image::Image;

use crate::color_source::{FrameColorSource, SceneViewportSink};
use crate::error::{RenderError, RenderResult};
use crate::frame_context::FrameContext;
use crate::frame_scheduler::SwapchainState;

/// Immutable per-process handle bundle handed to every pipeline at
/// construction.
///
/// Built once by the renderer; all handles live for the process lifetime.
#[derive(Clone)]
pub struct PipelineRuntime {
    /// The logical device.
    pub device: Arc<Device>,
    /// The window the swapchain presents to.
    pub window: Arc<winit::window::Window>,
    /// Swapchain image count at construction time.
    pub image_count: u32,
    /// Swapchain color format at construction time.
    pub color_format: vk::Format,
    /// Selected depth attachment format.
    pub depth_format: vk::Format,
    /// Root directory of the compiled SPIR-V shaders.
    pub shader_root: PathBuf,
}

impl PipelineRuntime {
    /// Resolves a shader file name against the shader root.
    ///
    /// # Errors
    ///
    /// Fails with [`RenderError::ShaderRootUnset`] when no shader root was
    /// configured (explicitly, via `RTR_SHADER_ROOT`, or at compile time).
    pub fn shader_path(&self, filename: &str) -> RenderResult<PathBuf> {
        if self.shader_root.as_os_str().is_empty() {
            return Err(RenderError::ShaderRootUnset);
        }
        Ok(self.shader_root.join(filename))
    }

    /// Builds one host-visible, persistently mapped uniform buffer per
    /// frame slot.
    pub fn make_per_frame_uniform_buffers(&self, size: vk::DeviceSize) -> RenderResult<Vec<Buffer>> {
        (0..FRAMES_IN_FLIGHT)
            .map(|_| {
                Buffer::new(self.device.clone(), BufferUsage::Uniform, size)
                    .map_err(RenderError::Rhi)
            })
            .collect()
    }

    /// Builds one depth image per frame slot at the given extent.
    pub fn make_per_frame_depth_images(
        device: &Arc<Device>,
        extent: vk::Extent2D,
        depth_format: vk::Format,
    ) -> RenderResult<Vec<Image>> {
        (0..FRAMES_IN_FLIGHT)
            .map(|_| {
                Image::create_depth(device.clone(), extent.width, extent.height, depth_format)
                    .map_err(RenderError::Rhi)
            })
            .collect()
    }
}

/// Resolves the shader root directory.
///
/// Precedence: explicit path, then the `RTR_SHADER_ROOT` environment
/// variable, then the compile-time `RTR_DEFAULT_SHADER_OUTPUT_DIR`; an empty
/// result means "unset" and surfaces as an error at shader load time.
pub fn resolve_shader_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit
        && !path.as_os_str().is_empty()
    {
        return path.to_path_buf();
    }
    if let Ok(env_root) = std::env::var("RTR_SHADER_ROOT")
        && !env_root.is_empty()
    {
        return PathBuf::from(env_root);
    }
    if let Some(default_dir) = option_env!("RTR_DEFAULT_SHADER_OUTPUT_DIR") {
        return PathBuf::from(default_dir);
    }
    PathBuf::new()
}

/// Component-wise difference between two consecutive swapchain states.
///
/// Pipelines use this to decide which sub-resources to rebuild after a
/// swapchain recreation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapchainChangeSummary {
    /// The swapchain extent changed.
    pub extent_changed: bool,
    /// The number of swapchain images changed.
    pub image_count_changed: bool,
    /// The swapchain color format changed.
    pub color_format_changed: bool,
    /// The depth attachment format changed.
    pub depth_format_changed: bool,
}

impl SwapchainChangeSummary {
    /// Scene render targets depend on extent and depth format.
    pub fn extent_or_depth_changed(&self) -> bool {
        self.extent_changed || self.depth_format_changed
    }

    /// Graphics pipelines depend on color and depth formats.
    pub fn color_or_depth_changed(&self) -> bool {
        self.color_format_changed || self.depth_format_changed
    }

    /// Any component changed.
    pub fn any(&self) -> bool {
        self.extent_changed
            || self.image_count_changed
            || self.color_format_changed
            || self.depth_format_changed
    }
}

/// Caches the last observed swapchain state and derives change summaries.
///
/// Each pipeline owns one tracker and runs every reported state through
/// [`apply`](Self::apply); applying the same state twice yields an all-false
/// summary.
#[derive(Debug)]
pub struct SwapchainTracker {
    extent: vk::Extent2D,
    image_count: u32,
    color_format: vk::Format,
    depth_format: vk::Format,
}

impl SwapchainTracker {
    /// Seeds the tracker from the construction-time runtime; the extent is
    /// unknown until the first state report.
    pub fn new(runtime: &PipelineRuntime) -> Self {
        Self {
            extent: vk::Extent2D {
                width: 0,
                height: 0,
            },
            image_count: runtime.image_count,
            color_format: runtime.color_format,
            depth_format: runtime.depth_format,
        }
    }

    /// Computes the change summary against the cached state, then updates
    /// the cache.
    pub fn apply(&mut self, state: &SwapchainState) -> SwapchainChangeSummary {
        let summary = SwapchainChangeSummary {
            extent_changed: self.extent.width != state.extent.width
                || self.extent.height != state.extent.height,
            image_count_changed: self.image_count != state.image_count,
            color_format_changed: self.color_format != state.color_format,
            depth_format_changed: self.depth_format != state.depth_format,
        };

        self.extent = state.extent;
        self.image_count = state.image_count;
        self.color_format = state.color_format;
        self.depth_format = state.depth_format;

        summary
    }

    /// The last observed swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// The last observed color format.
    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    /// The last observed depth format.
    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// True when the last observed extent has non-zero area.
    #[inline]
    pub fn has_valid_extent(&self) -> bool {
        self.extent.width > 0 && self.extent.height > 0
    }
}

/// A render pipeline composes render passes into one frame of GPU work.
///
/// Implementations must be re-entrant for `FRAMES_IN_FLIGHT` frames: each
/// frame slot touches only its own uniform buffers, descriptor sets and
/// offscreen resources, and assumes nothing about the other slots.
pub trait RenderPipeline {
    /// Records all passes for the current frame.
    ///
    /// The swapchain image must be left in `COLOR_ATTACHMENT_OPTIMAL`; the
    /// renderer appends the final transition to `PRESENT_SRC` afterwards.
    fn render(&mut self, ctx: &mut FrameContext) -> RenderResult<()>;

    /// Per-frame CPU-side preparation, called outside command recording.
    fn prepare_frame(&mut self) -> RenderResult<()> {
        Ok(())
    }

    /// Window resize notification (the swapchain itself recreates at the
    /// next present boundary).
    fn on_resize(&mut self, _width: u32, _height: u32) {}

    /// Reports a new swapchain state after recreation (and once at bind
    /// time).
    fn on_swapchain_state_changed(&mut self, state: &SwapchainState);

    /// The pipeline's offscreen color output, when it exposes one.
    fn color_source(&self) -> Option<&dyn FrameColorSource> {
        None
    }

    /// The pipeline's scene viewport sink, when the scene target can be
    /// decoupled from the swapchain extent.
    fn viewport_sink(&mut self) -> Option<&mut dyn SceneViewportSink> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(width: u32, height: u32, generation: u64) -> SwapchainState {
        SwapchainState {
            generation,
            extent: vk::Extent2D { width, height },
            image_count: 3,
            color_format: vk::Format::B8G8R8A8_SRGB,
            depth_format: vk::Format::D32_SFLOAT,
        }
    }

    fn tracker() -> SwapchainTracker {
        SwapchainTracker {
            extent: vk::Extent2D {
                width: 0,
                height: 0,
            },
            image_count: 3,
            color_format: vk::Format::B8G8R8A8_SRGB,
            depth_format: vk::Format::D32_SFLOAT,
        }
    }

    #[test]
    fn test_first_apply_reports_extent_change_only() {
        let mut tracker = tracker();
        let summary = tracker.apply(&state(1280, 720, 1));

        assert!(summary.extent_changed);
        assert!(!summary.image_count_changed);
        assert!(!summary.color_format_changed);
        assert!(!summary.depth_format_changed);
    }

    #[test]
    fn test_repeated_apply_is_all_false() {
        let mut tracker = tracker();
        let _ = tracker.apply(&state(1280, 720, 1));
        let summary = tracker.apply(&state(1280, 720, 1));

        assert_eq!(summary, SwapchainChangeSummary::default());
        assert!(!summary.any());
    }

    #[test]
    fn test_apply_detects_component_changes() {
        let mut tracker = tracker();
        let _ = tracker.apply(&state(1280, 720, 1));

        let mut next = state(640, 480, 2);
        next.depth_format = vk::Format::D24_UNORM_S8_UINT;
        let summary = tracker.apply(&next);

        assert!(summary.extent_changed);
        assert!(summary.depth_format_changed);
        assert!(!summary.color_format_changed);
        assert!(summary.extent_or_depth_changed());
        assert!(summary.color_or_depth_changed());
    }

    #[test]
    fn test_change_summary_helpers() {
        let summary = SwapchainChangeSummary {
            color_format_changed: true,
            ..Default::default()
        };
        assert!(summary.color_or_depth_changed());
        assert!(!summary.extent_or_depth_changed());
        assert!(summary.any());
    }

    #[test]
    fn test_resolve_shader_root_prefers_explicit() {
        let explicit = PathBuf::from("/opt/shaders");
        assert_eq!(resolve_shader_root(Some(&explicit)), explicit);
    }
}
