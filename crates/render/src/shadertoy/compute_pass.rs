//! Compute pass writing the shadertoy storage image.

use ash::vk;
use bytemuck::{Pod, Zeroable};

use rtr_core::Timer;
use rtr_rhi::barrier::image_barrier;
use rtr_rhi::buffer::Buffer;

use crate::error::{RenderError, RenderResult};
use crate::frame_context::FrameContext;
use crate::render_pass::{RenderPass, ResourceDependency};
use crate::resource_state::{TrackedImage, barrier_src_for_layout};

/// Workgroup size of the shadertoy compute shader (8x8 threads).
const WORKGROUP_SIZE: u32 = 8;

/// Uniform block feeding the compute shader, rewritten every frame.
///
/// Both fields are padded to vec4 for std140 compatibility:
/// `i_resolution = (width, height, 1, 0)`, `i_time = (seconds, 0, 0, 0)`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ShaderToyUniform {
    /// Render resolution.
    pub i_resolution: [f32; 4],
    /// Seconds since pipeline construction, strictly increasing.
    pub i_time: [f32; 4],
}

impl ShaderToyUniform {
    /// Size of the block in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Number of workgroups needed to cover an extent with 8x8 tiles.
#[inline]
pub fn dispatch_group_counts(extent: vk::Extent2D) -> (u32, u32) {
    (
        extent.width.div_ceil(WORKGROUP_SIZE),
        extent.height.div_ceil(WORKGROUP_SIZE),
    )
}

/// Per-execution resources of the compute pass.
pub struct ComputePassResources<'a> {
    /// Compute pipeline to bind.
    pub pipeline: vk::Pipeline,
    /// Layout matching `pipeline`.
    pub pipeline_layout: vk::PipelineLayout,
    /// This frame slot's uniform buffer.
    pub uniform_buffer: &'a Buffer,
    /// Storage image with its tracked layout.
    pub offscreen: TrackedImage<'a>,
    /// Compute descriptor set (binding 0 = UBO, binding 1 = storage image).
    pub compute_set: vk::DescriptorSet,
}

/// Writes the time-varying image via a compute dispatch.
///
/// The offscreen image is transitioned to `GENERAL` with a source scope
/// derived from its stored layout, then dispatched over in 8x8 tiles.
pub struct ComputePass {
    timer: Timer,
    dependencies: [ResourceDependency; 2],
}

impl ComputePass {
    /// Creates the pass; `i_time` counts from this moment.
    pub fn new() -> Self {
        Self {
            timer: Timer::new(),
            dependencies: [
                ResourceDependency::read("shadertoy.uniform"),
                ResourceDependency::write("shadertoy.offscreen"),
            ],
        }
    }
}

impl Default for ComputePass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for ComputePass {
    type Resources<'a> = ComputePassResources<'a>;

    fn name(&self) -> &'static str {
        "shadertoy_compute"
    }

    fn dependencies(&self) -> &[ResourceDependency] {
        &self.dependencies
    }

    fn validate(&self, resources: &Self::Resources<'_>) -> RenderResult<()> {
        if resources.offscreen.image.width() == 0 || resources.offscreen.image.height() == 0 {
            return Err(RenderError::InvalidPassResources {
                pass: "shadertoy_compute",
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
        let extent = resources.offscreen.image.extent();

        let uniform = ShaderToyUniform {
            i_resolution: [extent.width as f32, extent.height as f32, 1.0, 0.0],
            i_time: [self.timer.elapsed_secs(), 0.0, 0.0, 0.0],
        };
        resources
            .uniform_buffer
            .write_data(0, bytemuck::bytes_of(&uniform))?;

        let cmd = ctx.cmd();
        let offscreen = resources.offscreen;

        let (src_stage, src_access) = barrier_src_for_layout(*offscreen.layout);
        let to_general = image_barrier(
            offscreen.image.handle(),
            vk::ImageAspectFlags::COLOR,
            *offscreen.layout,
            vk::ImageLayout::GENERAL,
            src_stage,
            src_access,
            vk::PipelineStageFlags2::COMPUTE_SHADER,
            vk::AccessFlags2::SHADER_STORAGE_WRITE,
        );
        cmd.pipeline_barrier2(&[to_general]);
        *offscreen.layout = vk::ImageLayout::GENERAL;

        cmd.bind_pipeline(vk::PipelineBindPoint::COMPUTE, resources.pipeline);
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::COMPUTE,
            resources.pipeline_layout,
            0,
            &[resources.compute_set],
            &[],
        );

        let (group_count_x, group_count_y) = dispatch_group_counts(extent);
        cmd.dispatch(group_count_x, group_count_y, 1);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_size_and_layout() {
        // 2 x vec4 = 32 bytes
        assert_eq!(ShaderToyUniform::SIZE, 32);

        use std::mem::offset_of;
        assert_eq!(offset_of!(ShaderToyUniform, i_resolution), 0);
        assert_eq!(offset_of!(ShaderToyUniform, i_time), 16);
    }

    #[test]
    fn test_dispatch_shape_covers_extent() {
        // 800x600 needs 100x75 workgroups of 8x8 threads
        let extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        assert_eq!(dispatch_group_counts(extent), (100, 75));
    }

    #[test]
    fn test_dispatch_shape_rounds_up() {
        let extent = vk::Extent2D {
            width: 801,
            height: 599,
        };
        assert_eq!(dispatch_group_counts(extent), (101, 75));

        let one = vk::Extent2D {
            width: 1,
            height: 1,
        };
        assert_eq!(dispatch_group_counts(one), (1, 1));
    }

    #[test]
    fn test_pass_declares_dependencies() {
        let pass = ComputePass::new();
        assert_eq!(pass.name(), "shadertoy_compute");
        assert_eq!(pass.dependencies().len(), 2);
    }
}
