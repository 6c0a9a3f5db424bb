//! Fullscreen present pass sampling the shadertoy storage image.

use ash::vk;

use rtr_rhi::barrier::image_barrier;
use rtr_rhi::image::Image;
use rtr_rhi::rendering::{ColorAttachment, DepthAttachment, RenderingConfig};

use crate::error::{RenderError, RenderResult};
use crate::frame_context::FrameContext;
use crate::render_pass::{RenderPass, ResourceDependency};
use crate::resource_state::{TrackedImage, barrier_src_for_layout};

/// Per-execution resources of the present pass.
pub struct PresentImagePassResources<'a> {
    /// Present graphics pipeline to bind.
    pub pipeline: vk::Pipeline,
    /// Layout matching `pipeline`; carries the compute set layout at
    /// index 0 and the present set layout at index 1.
    pub pipeline_layout: vk::PipelineLayout,
    /// Storage image written by the compute pass, tracked layout included.
    pub offscreen: TrackedImage<'a>,
    /// Depth target for this frame slot.
    pub depth: &'a Image,
    /// Present descriptor set (binding 0 = combined image sampler), bound
    /// at set index 1.
    pub present_set: vk::DescriptorSet,
}

/// Draws a fullscreen triangle sampling the offscreen image onto the
/// swapchain.
///
/// Transitions the offscreen image `GENERAL -> SHADER_READ_ONLY_OPTIMAL`,
/// clears the swapchain and depth attachments, and issues a 3-vertex draw
/// whose positions are generated in the vertex shader.
pub struct PresentImagePass {
    dependencies: [ResourceDependency; 2],
}

impl PresentImagePass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self {
            dependencies: [
                ResourceDependency::read("shadertoy.offscreen"),
                ResourceDependency::write("swapchain"),
            ],
        }
    }
}

impl Default for PresentImagePass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for PresentImagePass {
    type Resources<'a> = PresentImagePassResources<'a>;

    fn name(&self) -> &'static str {
        "shadertoy_present"
    }

    fn dependencies(&self) -> &[ResourceDependency] {
        &self.dependencies
    }

    fn validate(&self, resources: &Self::Resources<'_>) -> RenderResult<()> {
        if resources.offscreen.image.width() == 0 || resources.offscreen.image.height() == 0 {
            return Err(RenderError::InvalidPassResources {
                pass: "shadertoy_present",
                reason: "offscreen image has zero extent",
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
        let offscreen = resources.offscreen;
        let extent = ctx.render_extent();

        let (src_stage, src_access) = barrier_src_for_layout(*offscreen.layout);
        let to_sampled = image_barrier(
            offscreen.image.handle(),
            vk::ImageAspectFlags::COLOR,
            *offscreen.layout,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            src_stage,
            src_access,
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_SAMPLED_READ,
        );
        cmd.pipeline_barrier2(&[to_sampled]);
        *offscreen.layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;

        let to_color = image_barrier(
            ctx.swapchain_image(),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::PipelineStageFlags2::TOP_OF_PIPE,
            vk::AccessFlags2::NONE,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        );

        let to_depth = image_barrier(
            resources.depth.handle(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            vk::PipelineStageFlags2::TOP_OF_PIPE,
            vk::AccessFlags2::NONE,
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        );

        cmd.pipeline_barrier2(&[to_color, to_depth]);

        let rendering = RenderingConfig::from_extent(extent)
            .with_color_attachment(ColorAttachment::new(ctx.swapchain_image_view()))
            .with_depth_attachment(DepthAttachment::new(resources.depth.view()).store())
            .build();

        cmd.begin_rendering(&rendering.info());
        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, resources.pipeline);
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            resources.pipeline_layout,
            1,
            &[resources.present_set],
            &[],
        );
        cmd.set_viewport_scissor(extent);

        // Fullscreen triangle generated from gl_VertexIndex
        cmd.draw(3, 1, 0, 0);
        cmd.end_rendering();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_declares_dependencies() {
        let pass = PresentImagePass::new();
        assert_eq!(pass.name(), "shadertoy_present");
        assert_eq!(pass.dependencies().len(), 2);
    }
}
