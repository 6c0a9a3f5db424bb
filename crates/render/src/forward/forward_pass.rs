//! Forward geometry pass: renders the scene view into the offscreen color
//! target.

use std::sync::Arc;

use ash::vk;

use rtr_resources::Mesh;
use rtr_rhi::barrier::image_barrier;
use rtr_rhi::image::Image;
use rtr_rhi::rendering::{ColorAttachment, DepthAttachment, RenderingConfig};

use crate::error::{RenderError, RenderResult};
use crate::frame_context::FrameContext;
use crate::render_pass::{RenderPass, ResourceDependency};
use crate::resource_state::TrackedImage;

/// One draw call: a GPU mesh plus its per-object descriptor set.
pub struct DrawItem {
    /// Mesh to draw.
    pub mesh: Arc<Mesh>,
    /// Per-object set (binding 0 = object uniform), bound at set index 0.
    pub per_object_set: vk::DescriptorSet,
}

/// Per-execution resources of the forward pass.
pub struct ForwardPassResources<'a> {
    /// Graphics pipeline to bind (rebuilt on format changes, hence passed
    /// per execution).
    pub pipeline: vk::Pipeline,
    /// Layout matching `pipeline`.
    pub pipeline_layout: vk::PipelineLayout,
    /// Offscreen color target with its tracked layout.
    pub color: TrackedImage<'a>,
    /// Depth target for this frame slot.
    pub depth: &'a Image,
    /// Scene render extent (may differ from the swapchain extent).
    pub extent: vk::Extent2D,
    /// Draw items for this frame.
    pub draw_items: Vec<DrawItem>,
}

/// Renders the cached scene view into the offscreen color image.
///
/// On entry the color image is transitioned to `COLOR_ATTACHMENT_OPTIMAL`
/// with a source scope derived from its stored layout (`TOP_OF_PIPE` on the
/// very first use, `ALL_COMMANDS` afterwards); the depth image is cleared
/// every frame and never preserved across frames.
pub struct ForwardPass {
    dependencies: [ResourceDependency; 3],
}

impl ForwardPass {
    /// Creates the pass.
    pub fn new() -> Self {
        Self {
            dependencies: [
                ResourceDependency::read("forward.per_object"),
                ResourceDependency::read_write("forward.color"),
                ResourceDependency::read_write("forward.depth"),
            ],
        }
    }
}

impl Default for ForwardPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for ForwardPass {
    type Resources<'a> = ForwardPassResources<'a>;

    fn name(&self) -> &'static str {
        "forward_main"
    }

    fn dependencies(&self) -> &[ResourceDependency] {
        &self.dependencies
    }

    fn validate(&self, resources: &Self::Resources<'_>) -> RenderResult<()> {
        if resources.extent.width == 0 || resources.extent.height == 0 {
            return Err(RenderError::InvalidPassResources {
                pass: "forward_main",
                reason: "render extent is zero",
            });
        }
        if resources.pipeline == vk::Pipeline::null() {
            return Err(RenderError::InvalidPassResources {
                pass: "forward_main",
                reason: "graphics pipeline is null",
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
        let color = resources.color;

        // The stored layout decides how much prior work the transition must
        // wait for: nothing on first use, everything afterwards (the editor
        // may have sampled the image last frame).
        let (src_stage, src_access) = if *color.layout == vk::ImageLayout::UNDEFINED {
            (vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE)
        } else {
            (
                vk::PipelineStageFlags2::ALL_COMMANDS,
                vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE,
            )
        };

        let to_color = image_barrier(
            color.image.handle(),
            vk::ImageAspectFlags::COLOR,
            *color.layout,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            src_stage,
            src_access,
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
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        );

        cmd.pipeline_barrier2(&[to_color, to_depth]);

        let rendering = RenderingConfig::from_extent(resources.extent)
            .with_color_attachment(
                ColorAttachment::new(color.image.view()).with_clear_color([0.0, 0.0, 0.0, 1.0]),
            )
            .with_depth_attachment(DepthAttachment::new(resources.depth.view()).store())
            .build();

        cmd.begin_rendering(&rendering.info());
        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, resources.pipeline);
        cmd.set_viewport_scissor(resources.extent);

        for item in &resources.draw_items {
            cmd.bind_vertex_buffers(0, &[item.mesh.vertex_buffer()], &[0]);
            cmd.bind_index_buffer(item.mesh.index_buffer(), 0, vk::IndexType::UINT32);
            cmd.bind_descriptor_sets(
                vk::PipelineBindPoint::GRAPHICS,
                resources.pipeline_layout,
                0,
                &[item.per_object_set],
                &[],
            );
            cmd.draw_indexed(item.mesh.index_count(), 1, 0, 0, 0);
        }

        cmd.end_rendering();

        *color.layout = vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_pass_declares_dependencies() {
        let pass = ForwardPass::new();
        assert_eq!(pass.name(), "forward_main");

        let names: Vec<&str> = pass.dependencies().iter().map(|d| d.name).collect();
        assert!(names.contains(&"forward.per_object"));
        assert!(names.contains(&"forward.color"));
        assert!(names.contains(&"forward.depth"));
    }
}
