//! Dynamic rendering helpers (Vulkan 1.3).
//!
//! This module provides utilities for setting up dynamic rendering without
//! traditional VkRenderPass objects.
//!
//! # Overview
//!
//! - [`ColorAttachment`] - Configuration for a color attachment
//! - [`DepthAttachment`] - Configuration for a depth attachment
//! - [`RenderingConfig`] - Complete rendering configuration
//!
//! # Example
//!
//! ```no_run
//! use ash::vk;
//! use rtr_rhi::rendering::{ColorAttachment, DepthAttachment, RenderingConfig};
//! use rtr_rhi::command::CommandBuffer;
//!
//! # fn example(color_view: vk::ImageView, depth_view: vk::ImageView, cmd: &CommandBuffer) {
//! let config = RenderingConfig::new(800, 600)
//!     .with_color_attachment(
//!         ColorAttachment::new(color_view).with_clear_color([0.0, 0.0, 0.0, 1.0]),
//!     )
//!     .with_depth_attachment(DepthAttachment::new(depth_view).store());
//!
//! let bundle = config.build();
//! cmd.begin_rendering(&bundle.info());
//! // ... draw commands ...
//! cmd.end_rendering();
//! # }
//! ```

use ash::vk;

/// Configuration for a color attachment in dynamic rendering.
///
/// # Default Values
///
/// - `layout`: `COLOR_ATTACHMENT_OPTIMAL`
/// - `load_op`: `CLEAR`
/// - `store_op`: `STORE`
/// - `clear_value`: Black (0.0, 0.0, 0.0, 1.0)
#[derive(Clone)]
pub struct ColorAttachment {
    /// The image view to render to.
    pub image_view: vk::ImageView,
    /// The image layout during rendering.
    pub layout: vk::ImageLayout,
    /// How to load the attachment contents at the start of rendering.
    pub load_op: vk::AttachmentLoadOp,
    /// How to store the attachment contents at the end of rendering.
    pub store_op: vk::AttachmentStoreOp,
    /// Clear value when load_op is CLEAR.
    pub clear_value: vk::ClearColorValue,
}

impl ColorAttachment {
    /// Creates a new color attachment with default settings.
    #[inline]
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }
    }

    /// Sets the clear color as RGBA float values.
    #[inline]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_value = vk::ClearColorValue { float32: color };
        self
    }

    /// Configures this attachment to load existing contents.
    ///
    /// Sets `load_op` to `LOAD`, which preserves existing image contents;
    /// used by the overlay pass to draw UI over the blit result.
    #[inline]
    pub fn load(mut self) -> Self {
        self.load_op = vk::AttachmentLoadOp::LOAD;
        self
    }

    /// Converts this attachment to a `VkRenderingAttachmentInfo`.
    #[inline]
    pub fn to_rendering_attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(vk::ClearValue {
                color: self.clear_value,
            })
    }
}

impl std::fmt::Debug for ColorAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // ClearColorValue is a union, so we format the float32 variant
        let clear_color = unsafe { self.clear_value.float32 };
        f.debug_struct("ColorAttachment")
            .field("image_view", &self.image_view)
            .field("layout", &self.layout)
            .field("load_op", &self.load_op)
            .field("store_op", &self.store_op)
            .field("clear_value", &clear_color)
            .finish()
    }
}

/// Configuration for a depth attachment in dynamic rendering.
///
/// # Default Values
///
/// - `layout`: `DEPTH_ATTACHMENT_OPTIMAL`
/// - `load_op`: `CLEAR`
/// - `store_op`: `DONT_CARE`
/// - `clear_value`: depth=1.0, stencil=0
#[derive(Clone, Debug)]
pub struct DepthAttachment {
    /// The image view to render to.
    pub image_view: vk::ImageView,
    /// The image layout during rendering.
    pub layout: vk::ImageLayout,
    /// How to load the attachment contents at the start of rendering.
    pub load_op: vk::AttachmentLoadOp,
    /// How to store the attachment contents at the end of rendering.
    pub store_op: vk::AttachmentStoreOp,
    /// Clear value when load_op is CLEAR.
    pub clear_value: vk::ClearDepthStencilValue,
}

impl DepthAttachment {
    /// Creates a new depth attachment with default settings.
    #[inline]
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            clear_value: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        }
    }

    /// Configures this attachment to store results.
    #[inline]
    pub fn store(mut self) -> Self {
        self.store_op = vk::AttachmentStoreOp::STORE;
        self
    }

    /// Converts this attachment to a `VkRenderingAttachmentInfo`.
    #[inline]
    pub fn to_rendering_attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(vk::ClearValue {
                depth_stencil: self.clear_value,
            })
    }
}

/// Complete rendering configuration for dynamic rendering.
///
/// Holds everything needed to construct a `VkRenderingInfo` for
/// `vkCmdBeginRendering`.
#[derive(Clone, Debug, Default)]
pub struct RenderingConfig {
    /// Color attachments for this rendering operation.
    pub color_attachments: Vec<ColorAttachment>,
    /// Optional depth attachment.
    pub depth_attachment: Option<DepthAttachment>,
    /// Render area (region to render to).
    pub render_area: vk::Rect2D,
}

impl RenderingConfig {
    /// Creates a new rendering configuration with the specified dimensions.
    #[inline]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            color_attachments: Vec::new(),
            depth_attachment: None,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width, height },
            },
        }
    }

    /// Creates a new rendering configuration from an extent.
    #[inline]
    pub fn from_extent(extent: vk::Extent2D) -> Self {
        Self::new(extent.width, extent.height)
    }

    /// Adds a color attachment to this configuration.
    #[inline]
    pub fn with_color_attachment(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    /// Sets the depth attachment for this configuration.
    #[inline]
    pub fn with_depth_attachment(mut self, attachment: DepthAttachment) -> Self {
        self.depth_attachment = Some(attachment);
        self
    }

    /// Returns the render area extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.render_area.extent
    }

    /// Builds the complete rendering info with proper lifetimes.
    ///
    /// The returned bundle owns the attachment info arrays so the
    /// `VkRenderingInfo` it hands out stays valid.
    pub fn build(&self) -> RenderingInfoBundle {
        RenderingInfoBundle::new(self)
    }
}

/// A bundle containing `VkRenderingInfo` and its backing data.
///
/// This struct ensures that the attachment info arrays outlive the
/// `VkRenderingInfo` that references them.
pub struct RenderingInfoBundle {
    color_attachments: Vec<vk::RenderingAttachmentInfo<'static>>,
    depth_attachment: Option<vk::RenderingAttachmentInfo<'static>>,
    render_area: vk::Rect2D,
}

impl RenderingInfoBundle {
    /// Creates a new bundle from a rendering configuration.
    pub fn new(config: &RenderingConfig) -> Self {
        let color_attachments: Vec<vk::RenderingAttachmentInfo> = config
            .color_attachments
            .iter()
            .map(|a| a.to_rendering_attachment_info())
            .collect();

        let depth_attachment = config
            .depth_attachment
            .as_ref()
            .map(|a| a.to_rendering_attachment_info());

        Self {
            color_attachments,
            depth_attachment,
            render_area: config.render_area,
        }
    }

    /// Returns the `VkRenderingInfo` referencing this bundle's data.
    ///
    /// The returned value is valid as long as this bundle exists.
    pub fn info(&self) -> vk::RenderingInfo<'_> {
        let mut info = vk::RenderingInfo::default()
            .render_area(self.render_area)
            .layer_count(1)
            .color_attachments(&self.color_attachments);

        if let Some(ref depth) = self.depth_attachment {
            info = info.depth_attachment(depth);
        }

        info
    }

    /// Returns the render area.
    #[inline]
    pub fn render_area(&self) -> vk::Rect2D {
        self.render_area
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_attachment_defaults() {
        let attachment = ColorAttachment::new(vk::ImageView::null());
        assert_eq!(attachment.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        let clear = unsafe { attachment.clear_value.float32 };
        assert_eq!(clear, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_color_attachment_load_helper() {
        let attachment = ColorAttachment::new(vk::ImageView::null()).load();
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::LOAD);
        // Store op is unchanged so the UI result survives
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
    }

    #[test]
    fn test_depth_attachment_defaults() {
        let attachment = DepthAttachment::new(vk::ImageView::null());
        assert_eq!(attachment.layout, vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(attachment.clear_value.depth, 1.0);
        assert_eq!(attachment.clear_value.stencil, 0);
    }

    #[test]
    fn test_depth_attachment_store_helper() {
        let attachment = DepthAttachment::new(vk::ImageView::null()).store();
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
    }

    #[test]
    fn test_rendering_config_new() {
        let config = RenderingConfig::new(1920, 1080);
        assert_eq!(config.render_area.extent.width, 1920);
        assert_eq!(config.render_area.extent.height, 1080);
        assert!(config.color_attachments.is_empty());
        assert!(config.depth_attachment.is_none());
    }

    #[test]
    fn test_rendering_config_from_extent() {
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let config = RenderingConfig::from_extent(extent);
        assert_eq!(config.extent(), extent);
    }

    #[test]
    fn test_rendering_info_bundle() {
        let config = RenderingConfig::new(1920, 1080)
            .with_color_attachment(
                ColorAttachment::new(vk::ImageView::null()).with_clear_color([0.1, 0.2, 0.3, 1.0]),
            )
            .with_depth_attachment(DepthAttachment::new(vk::ImageView::null()));

        let bundle = config.build();
        let info = bundle.info();

        assert_eq!(info.render_area.extent.width, 1920);
        assert_eq!(info.render_area.extent.height, 1080);
        assert_eq!(info.layer_count, 1);
        assert_eq!(info.color_attachment_count, 1);
    }
}
