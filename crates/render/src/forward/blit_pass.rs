//! Blit of the offscreen color target to the swapchain image.
//!
//! The forward pipeline renders at the scene viewport extent and blits into
//! the swapchain rather than rendering to it directly; this keeps the scene
//! target decoupled from the window size, which the editor overlay relies
//! on.

use ash::vk;

use rtr_rhi::barrier::image_barrier;

use crate::error::{RenderError, RenderResult};
use crate::frame_context::FrameContext;
use crate::render_pass::{RenderPass, ResourceDependency};
use crate::resource_state::TrackedImage;

/// Per-execution resources of the blit pass.
pub struct PresentBlitResources<'a> {
    /// Offscreen color produced by the forward pass, tracked layout
    /// included.
    pub src_color: TrackedImage<'a>,
    /// Extent of the offscreen color image.
    pub src_extent: vk::Extent2D,
}

/// Blits the offscreen color into the swapchain image.
///
/// Afterwards the swapchain image is in `COLOR_ATTACHMENT_OPTIMAL` (so the
/// renderer's final transition to `PRESENT_SRC` and any overlay pass with
/// `LoadOp=LOAD` are valid) and the offscreen image is in
/// `SHADER_READ_ONLY_OPTIMAL` (so the editor may sample it).
pub struct PresentBlitPass {
    dependencies: [ResourceDependency; 2],
}

impl PresentBlitPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self {
            dependencies: [
                ResourceDependency::read("forward.color"),
                ResourceDependency::write("swapchain"),
            ],
        }
    }
}

impl Default for PresentBlitPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for PresentBlitPass {
    type Resources<'a> = PresentBlitResources<'a>;

    fn name(&self) -> &'static str {
        "present_blit"
    }

    fn dependencies(&self) -> &[ResourceDependency] {
        &self.dependencies
    }

    fn validate(&self, resources: &Self::Resources<'_>) -> RenderResult<()> {
        if resources.src_extent.width == 0 || resources.src_extent.height == 0 {
            return Err(RenderError::InvalidPassResources {
                pass: "present_blit",
                reason: "source extent is zero",
            });
        }
        Ok(())
    }

    fn record(
        &mut self,
        ctx: &mut FrameContext,
        resources: Self::Resources<'_>,
    ) -> RenderResult<()> {
        let cmd = ctx.cmd();
        let src_color = resources.src_color;
        let dst_extent = ctx.render_extent();

        let offscreen_to_src = image_barrier(
            src_color.image.handle(),
            vk::ImageAspectFlags::COLOR,
            *src_color.layout,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_READ,
        );

        let swapchain_to_dst = image_barrier(
            ctx.swapchain_image(),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::PipelineStageFlags2::TOP_OF_PIPE,
            vk::AccessFlags2::NONE,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
        );

        cmd.pipeline_barrier2(&[offscreen_to_src, swapchain_to_dst]);

        let subresource = vk::ImageSubresourceLayers::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .mip_level(0)
            .base_array_layer(0)
            .layer_count(1);

        let blit = vk::ImageBlit2::default()
            .src_subresource(subresource)
            .src_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: resources.src_extent.width as i32,
                    y: resources.src_extent.height as i32,
                    z: 1,
                },
            ])
            .dst_subresource(subresource)
            .dst_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: dst_extent.width as i32,
                    y: dst_extent.height as i32,
                    z: 1,
                },
            ]);

        let regions = [blit];
        let blit_info = vk::BlitImageInfo2::default()
            .src_image(src_color.image.handle())
            .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .dst_image(ctx.swapchain_image())
            .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .filter(vk::Filter::LINEAR)
            .regions(&regions);

        cmd.blit_image2(&blit_info);

        let swapchain_to_color = image_barrier(
            ctx.swapchain_image(),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        );

        let offscreen_to_sampled = image_barrier(
            src_color.image.handle(),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_READ,
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_SAMPLED_READ,
        );

        cmd.pipeline_barrier2(&[swapchain_to_color, offscreen_to_sampled]);

        *src_color.layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blit_pass_declares_dependencies() {
        let pass = PresentBlitPass::new();
        assert_eq!(pass.name(), "present_blit");
        assert_eq!(pass.dependencies().len(), 2);
    }
}
