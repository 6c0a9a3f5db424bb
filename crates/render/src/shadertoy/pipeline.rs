//! Shadertoy-style render pipeline.
//!
//! Composes a compute pass writing a per-frame-slot storage image with a
//! fullscreen present pass sampling it onto the swapchain.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use rtr_rhi::FRAMES_IN_FLIGHT;
use rtr_rhi::buffer::Buffer;
use rtr_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, buffer_info, image_info,
    update_descriptor_sets,
};
use rtr_rhi::device::Device;
use rtr_rhi::image::Image;
use rtr_rhi::pipeline::{CompareOp, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use rtr_rhi::sampler::Sampler;
use rtr_rhi::shader::{Shader, ShaderStage};

use crate::color_source::{FrameColorSource, FrameColorSourceView};
use crate::error::{RenderError, RenderResult};
use crate::frame_context::FrameContext;
use crate::frame_scheduler::SwapchainState;
use crate::pipeline::{PipelineRuntime, RenderPipeline, SwapchainTracker};
use crate::render_pass::RenderPass;
use crate::resource_state::FrameTrackedImage;
use crate::scene_targets::SceneTargets;

use super::compute_pass::{ComputePass, ComputePassResources, ShaderToyUniform};
use super::present_pass::{PresentImagePass, PresentImagePassResources};

/// Storage image format candidates, probed in order against
/// `optimalTilingFeatures & (STORAGE_IMAGE | SAMPLED_IMAGE)`.
const OFFSCREEN_FORMAT_CANDIDATES: [vk::Format; 2] = [
    vk::Format::R16G16B16A16_SFLOAT,
    vk::Format::R8G8B8A8_UNORM,
];

/// Per-frame-slot storage image + depth targets.
struct ShaderToyFrameTargets {
    offscreen: Vec<FrameTrackedImage>,
    depth: Vec<Image>,
}

fn create_frame_targets(
    device: &Arc<Device>,
    offscreen_format: vk::Format,
    depth_format: vk::Format,
    extent: vk::Extent2D,
) -> RenderResult<ShaderToyFrameTargets> {
    let offscreen = (0..FRAMES_IN_FLIGHT)
        .map(|_| {
            Image::create_storage(device.clone(), extent.width, extent.height, offscreen_format)
                .map(FrameTrackedImage::new)
                .map_err(RenderError::Rhi)
        })
        .collect::<RenderResult<Vec<_>>>()?;

    let depth = PipelineRuntime::make_per_frame_depth_images(device, extent, depth_format)?;

    Ok(ShaderToyFrameTargets { offscreen, depth })
}

/// Compute + present pipeline driving a shadertoy-style shader.
pub struct ShaderToyPipeline {
    device: Arc<Device>,
    tracker: SwapchainTracker,
    offscreen_format: vk::Format,

    present_vertex_shader: Shader,
    present_fragment_shader: Shader,

    compute_layout: DescriptorSetLayout,
    present_layout: DescriptorSetLayout,
    descriptor_pool: DescriptorPool,
    sampler: Sampler,

    compute_sets: Vec<vk::DescriptorSet>,
    present_sets: Vec<vk::DescriptorSet>,

    compute_pipeline_layout: PipelineLayout,
    present_pipeline_layout: PipelineLayout,
    compute_pipeline: Pipeline,
    present_pipeline: Option<Pipeline>,

    uniform_buffers: Vec<Buffer>,
    scene_targets: SceneTargets<ShaderToyFrameTargets>,

    compute_pass: ComputePass,
    present_pass: PresentImagePass,
}

impl ShaderToyPipeline {
    /// Creates the pipeline: probes the storage format, loads the three
    /// SPIR-V modules, and builds both pipelines plus all per-frame
    /// descriptors.
    ///
    /// # Errors
    ///
    /// Fails when no storage-capable format is supported, the shader root
    /// is unset, or any Vulkan object creation fails.
    pub fn new(runtime: &PipelineRuntime) -> RenderResult<Self> {
        let device = runtime.device.clone();

        let offscreen_format = device
            .find_supported_format(
                &OFFSCREEN_FORMAT_CANDIDATES,
                vk::FormatFeatureFlags::STORAGE_IMAGE | vk::FormatFeatureFlags::SAMPLED_IMAGE,
            )
            .ok_or_else(|| {
                rtr_rhi::RhiError::NoSupportedFormat(format!("{:?}", OFFSCREEN_FORMAT_CANDIDATES))
            })?;
        debug!("Shadertoy offscreen format: {:?}", offscreen_format);

        let compute_shader = Shader::from_spirv_file(
            device.clone(),
            &runtime.shader_path("shadertoy_comp.spv")?,
            ShaderStage::Compute,
            "main",
        )?;
        let present_vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &runtime.shader_path("shadertoy_vert.spv")?,
            ShaderStage::Vertex,
            "main",
        )?;
        let present_fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &runtime.shader_path("shadertoy_frag.spv")?,
            ShaderStage::Fragment,
            "main",
        )?;

        let compute_layout = DescriptorSetLayout::new(
            device.clone(),
            &[
                DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::COMPUTE),
                DescriptorBindingBuilder::storage_image(1, vk::ShaderStageFlags::COMPUTE),
            ],
        )?;
        let present_layout = DescriptorSetLayout::new(
            device.clone(),
            &[DescriptorBindingBuilder::combined_image_sampler(
                0,
                vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;

        let frames = FRAMES_IN_FLIGHT as u32;
        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(frames),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::STORAGE_IMAGE)
                .descriptor_count(frames),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(frames),
        ];
        let descriptor_pool = DescriptorPool::new(device.clone(), frames * 2, &pool_sizes)?;

        let compute_sets = descriptor_pool.allocate_many(&compute_layout, frames)?;
        let present_sets = descriptor_pool.allocate_many(&present_layout, frames)?;

        let sampler = Sampler::linear(device.clone())?;

        let compute_pipeline_layout =
            PipelineLayout::new(device.clone(), &[compute_layout.handle()])?;
        // The present shader samples at set 1; carry the compute set layout
        // at index 0 so the bind index is valid.
        let present_pipeline_layout = PipelineLayout::new(
            device.clone(),
            &[compute_layout.handle(), present_layout.handle()],
        )?;

        let compute_pipeline =
            Pipeline::create_compute(device.clone(), &compute_shader, &compute_pipeline_layout)?;

        let present_pipeline = Self::build_present_pipeline(
            &device,
            &present_vertex_shader,
            &present_fragment_shader,
            &present_pipeline_layout,
            runtime.color_format,
            runtime.depth_format,
        )?;

        let uniform_buffers =
            runtime.make_per_frame_uniform_buffers(ShaderToyUniform::SIZE as vk::DeviceSize)?;

        Ok(Self {
            device,
            tracker: SwapchainTracker::new(runtime),
            offscreen_format,
            present_vertex_shader,
            present_fragment_shader,
            compute_layout,
            present_layout,
            descriptor_pool,
            sampler,
            compute_sets,
            present_sets,
            compute_pipeline_layout,
            present_pipeline_layout,
            compute_pipeline,
            present_pipeline: Some(present_pipeline),
            uniform_buffers,
            scene_targets: SceneTargets::new("shadertoy"),
            compute_pass: ComputePass::new(),
            present_pass: PresentImagePass::new(),
        })
    }

    fn build_present_pipeline(
        device: &Arc<Device>,
        vertex_shader: &Shader,
        fragment_shader: &Shader,
        layout: &PipelineLayout,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RenderResult<Pipeline> {
        // No vertex input: the fullscreen triangle is generated in the
        // vertex shader. The depth attachment is cleared but never tested.
        GraphicsPipelineBuilder::new()
            .vertex_shader(vertex_shader)
            .fragment_shader(fragment_shader)
            .cull_mode(CullMode::None)
            .depth_test_enable(false)
            .depth_write_enable(false)
            .depth_compare_op(CompareOp::Always)
            .color_attachment_format(color_format)
            .depth_attachment_format(depth_format)
            .build(device.clone(), layout)
            .map_err(RenderError::Rhi)
    }

    fn rebuild_present_pipeline(&mut self) -> RenderResult<()> {
        let pipeline = Self::build_present_pipeline(
            &self.device,
            &self.present_vertex_shader,
            &self.present_fragment_shader,
            &self.present_pipeline_layout,
            self.tracker.color_format(),
            self.tracker.depth_format(),
        )?;
        self.present_pipeline = Some(pipeline);
        Ok(())
    }

    /// Rewrites compute and present descriptors for every frame slot
    /// against the current targets.
    ///
    /// Called right after target recreation, while the device is idle.
    fn refresh_descriptors(&self, targets: &ShaderToyFrameTargets) {
        for frame in 0..FRAMES_IN_FLIGHT {
            let uniform_infos = [buffer_info(
                self.uniform_buffers[frame].handle(),
                0,
                ShaderToyUniform::SIZE as vk::DeviceSize,
            )];
            let storage_infos = [image_info(
                vk::Sampler::null(),
                targets.offscreen[frame].image.view(),
                vk::ImageLayout::GENERAL,
            )];
            let sampled_infos = [image_info(
                self.sampler.handle(),
                targets.offscreen[frame].image.view(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )];

            let writes = [
                vk::WriteDescriptorSet::default()
                    .dst_set(self.compute_sets[frame])
                    .dst_binding(0)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&uniform_infos),
                vk::WriteDescriptorSet::default()
                    .dst_set(self.compute_sets[frame])
                    .dst_binding(1)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                    .image_info(&storage_infos),
                vk::WriteDescriptorSet::default()
                    .dst_set(self.present_sets[frame])
                    .dst_binding(0)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&sampled_infos),
            ];
            update_descriptor_sets(&self.device, &writes);
        }
    }
}

impl RenderPipeline for ShaderToyPipeline {
    fn render(&mut self, ctx: &mut FrameContext) -> RenderResult<()> {
        let extent = ctx.render_extent();
        if extent.width == 0 || extent.height == 0 {
            return Ok(());
        }

        let frame = ctx.frame_index() as usize;

        let compute_pipeline = self.compute_pipeline.handle();
        let compute_pipeline_layout = self.compute_pipeline_layout.handle();
        let present_pipeline = self
            .present_pipeline
            .as_ref()
            .ok_or(RenderError::InvalidPassResources {
                pass: "shadertoy_present",
                reason: "present pipeline was not built",
            })?
            .handle();
        let present_pipeline_layout = self.present_pipeline_layout.handle();
        let compute_set = self.compute_sets[frame];
        let present_set = self.present_sets[frame];

        let device = self.device.clone();
        let offscreen_format = self.offscreen_format;
        let depth_format = self.tracker.depth_format();
        self.scene_targets.ensure(&device, extent, |desired| {
            create_frame_targets(&device, offscreen_format, depth_format, desired)
        })?;

        if self.scene_targets.recreated_this_frame()
            && let Some(targets) = self.scene_targets.get()
        {
            // Fresh images need fresh descriptor bindings in every slot
            self.refresh_descriptors(targets);
        }

        let targets =
            self.scene_targets
                .get_mut()
                .ok_or(RenderError::InvalidPassResources {
                    pass: "shadertoy_compute",
                    reason: "scene targets are not initialized",
                })?;
        let ShaderToyFrameTargets { offscreen, depth } = targets;

        self.compute_pass.execute(
            ctx,
            ComputePassResources {
                pipeline: compute_pipeline,
                pipeline_layout: compute_pipeline_layout,
                uniform_buffer: &self.uniform_buffers[frame],
                offscreen: offscreen[frame].view(),
                compute_set,
            },
        )?;

        self.present_pass.execute(
            ctx,
            PresentImagePassResources {
                pipeline: present_pipeline,
                pipeline_layout: present_pipeline_layout,
                offscreen: offscreen[frame].view(),
                depth: &depth[frame],
                present_set,
            },
        )?;

        // Publish this frame's resources under the pass dependency names
        let offscreen_view = offscreen[frame].image.view();
        let uniform_handle = self.uniform_buffers[frame].handle();
        let registry = ctx.registry_mut();
        registry.set_frame_image_view(frame, "shadertoy.offscreen", offscreen_view)?;
        registry.set_frame_buffer(frame, "shadertoy.uniform", uniform_handle)?;

        Ok(())
    }

    fn on_swapchain_state_changed(&mut self, state: &SwapchainState) {
        let summary = self.tracker.apply(state);

        if summary.depth_format_changed {
            self.scene_targets.request_recreate();
        }
        if summary.extent_changed {
            self.scene_targets.on_swapchain_extent_changed();
        }
        if summary.color_or_depth_changed()
            && let Err(e) = self.rebuild_present_pipeline()
        {
            tracing::error!("Failed to rebuild shadertoy present pipeline: {e}");
        }
    }

    fn color_source(&self) -> Option<&dyn FrameColorSource> {
        Some(self)
    }
}

impl FrameColorSource for ShaderToyPipeline {
    fn frame_color_source_view(&self, frame_index: u32) -> FrameColorSourceView {
        let Some(targets) = self.scene_targets.get() else {
            return FrameColorSourceView::default();
        };
        let Some(tracked) = targets.offscreen.get(frame_index as usize) else {
            return FrameColorSourceView::default();
        };

        FrameColorSourceView {
            image_view: tracked.image.view(),
            layout: tracked.layout,
            extent: tracked.image.extent(),
        }
    }
}

impl Drop for ShaderToyPipeline {
    fn drop(&mut self) {
        unsafe {
            let _ = self.descriptor_pool.free(&self.compute_sets);
            let _ = self.descriptor_pool.free(&self.present_sets);
        }
    }
}
