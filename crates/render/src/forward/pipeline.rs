//! Forward render pipeline.
//!
//! Renders the cached scene view into per-frame-slot offscreen color
//! targets, then blits the result into the swapchain image. The offscreen
//! targets follow the scene viewport extent when one is set (editor panel),
//! else the swapchain extent.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use rtr_resources::ResourceManager;
use rtr_rhi::FRAMES_IN_FLIGHT;
use rtr_rhi::buffer::Buffer;
use rtr_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, buffer_info,
    update_descriptor_sets,
};
use rtr_rhi::device::Device;
use rtr_rhi::image::Image;
use rtr_rhi::pipeline::{CullMode, FrontFace, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use rtr_rhi::shader::{Shader, ShaderStage};
use rtr_rhi::vertex::Vertex;

use crate::color_source::{FrameColorSource, FrameColorSourceView, SceneViewportSink};
use crate::error::{RenderError, RenderResult};
use crate::frame_context::FrameContext;
use crate::frame_scheduler::SwapchainState;
use crate::pipeline::{PipelineRuntime, RenderPipeline, SwapchainTracker};
use crate::render_pass::RenderPass;
use crate::resource_state::FrameTrackedImage;
use crate::scene_targets::SceneTargets;

use super::blit_pass::{PresentBlitPass, PresentBlitResources};
use super::forward_pass::{DrawItem, ForwardPass, ForwardPassResources};
use super::scene_view::{ForwardSceneView, ForwardSceneViewBuilder};
use super::uniform::{ObjectUniform, pack_mat4_row_major};

/// Fixed per-frame-slot renderable capacity.
///
/// Uniform buffers and descriptor sets for this many objects are
/// preallocated per frame slot so no descriptor allocation ever happens
/// mid-frame.
pub const MAX_RENDERABLES: usize = 256;

/// Offscreen color + depth targets, one of each per frame slot.
struct ForwardFrameTargets {
    color: Vec<FrameTrackedImage>,
    depth: Vec<Image>,
}

fn create_frame_targets(
    device: &Arc<Device>,
    color_format: vk::Format,
    depth_format: vk::Format,
    extent: vk::Extent2D,
) -> RenderResult<ForwardFrameTargets> {
    let color = (0..FRAMES_IN_FLIGHT)
        .map(|_| {
            Image::create_color_target(device.clone(), extent.width, extent.height, color_format)
                .map(FrameTrackedImage::new)
                .map_err(RenderError::Rhi)
        })
        .collect::<RenderResult<Vec<_>>>()?;

    let depth = PipelineRuntime::make_per_frame_depth_images(device, extent, depth_format)?;

    Ok(ForwardFrameTargets { color, depth })
}

/// Forward raster pipeline: offscreen scene pass + blit to the swapchain.
pub struct ForwardPipeline {
    device: Arc<Device>,
    tracker: SwapchainTracker,

    vertex_shader: Shader,
    fragment_shader: Shader,
    per_object_layout: DescriptorSetLayout,
    descriptor_pool: DescriptorPool,
    pipeline_layout: PipelineLayout,
    pipeline: Option<Pipeline>,

    /// `[frame slot][object slot]` mapped uniform buffers.
    object_uniform_buffers: Vec<Vec<Buffer>>,
    /// `[frame slot][object slot]` descriptor sets, written once at
    /// construction.
    object_sets: Vec<Vec<vk::DescriptorSet>>,

    scene_targets: SceneTargets<ForwardFrameTargets>,
    scene_view: Option<ForwardSceneView>,
    scene_provider: Option<Box<dyn ForwardSceneViewBuilder>>,
    resource_manager: Option<Arc<ResourceManager>>,

    forward_pass: ForwardPass,
    blit_pass: PresentBlitPass,
}

impl ForwardPipeline {
    /// Creates the pipeline: shaders, per-object resources for every frame
    /// slot, and the graphics pipeline.
    ///
    /// # Errors
    ///
    /// Fails when the shader root is unset, a shader is missing, or any
    /// Vulkan object creation fails.
    pub fn new(runtime: &PipelineRuntime) -> RenderResult<Self> {
        let device = runtime.device.clone();

        let vertex_shader = Shader::from_spirv_file(
            device.clone(),
            &runtime.shader_path("forward_vert.spv")?,
            ShaderStage::Vertex,
            "main",
        )?;
        let fragment_shader = Shader::from_spirv_file(
            device.clone(),
            &runtime.shader_path("forward_frag.spv")?,
            ShaderStage::Fragment,
            "main",
        )?;

        let per_object_layout = DescriptorSetLayout::new(
            device.clone(),
            &[DescriptorBindingBuilder::uniform_buffer(
                0,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;

        let set_count = (MAX_RENDERABLES * FRAMES_IN_FLIGHT) as u32;
        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(set_count)];
        let descriptor_pool = DescriptorPool::new(device.clone(), set_count, &pool_sizes)?;

        let (object_uniform_buffers, object_sets) =
            Self::create_per_object_resources(&device, &per_object_layout, &descriptor_pool)?;

        let pipeline_layout = PipelineLayout::new(device.clone(), &[per_object_layout.handle()])?;

        let pipeline = Self::build_graphics_pipeline(
            &device,
            &vertex_shader,
            &fragment_shader,
            &pipeline_layout,
            runtime.color_format,
            runtime.depth_format,
        )?;

        Ok(Self {
            device,
            tracker: SwapchainTracker::new(runtime),
            vertex_shader,
            fragment_shader,
            per_object_layout,
            descriptor_pool,
            pipeline_layout,
            pipeline: Some(pipeline),
            object_uniform_buffers,
            object_sets,
            scene_targets: SceneTargets::new("forward"),
            scene_view: None,
            scene_provider: None,
            resource_manager: None,
            forward_pass: ForwardPass::new(),
            blit_pass: PresentBlitPass::new(),
        })
    }

    /// Binds the resource manager used to resolve mesh handles.
    ///
    /// Must be called before the first `render`.
    pub fn set_resource_manager(&mut self, manager: Arc<ResourceManager>) {
        self.resource_manager = Some(manager);
    }

    /// Binds the external scene provider driving `prepare_frame`.
    pub fn set_scene_provider(&mut self, provider: Box<dyn ForwardSceneViewBuilder>) {
        self.scene_provider = Some(provider);
    }

    /// Replaces the cached scene view directly (bypassing the provider).
    pub fn set_scene_view(&mut self, scene_view: ForwardSceneView) {
        self.scene_view = Some(scene_view);
    }

    fn create_per_object_resources(
        device: &Arc<Device>,
        layout: &DescriptorSetLayout,
        pool: &DescriptorPool,
    ) -> RenderResult<(Vec<Vec<Buffer>>, Vec<Vec<vk::DescriptorSet>>)> {
        let ubo_size = ObjectUniform::SIZE as vk::DeviceSize;

        let mut all_buffers = Vec::with_capacity(FRAMES_IN_FLIGHT);
        let mut all_sets = Vec::with_capacity(FRAMES_IN_FLIGHT);

        for frame in 0..FRAMES_IN_FLIGHT {
            let buffers = (0..MAX_RENDERABLES)
                .map(|_| {
                    Buffer::new(device.clone(), rtr_rhi::buffer::BufferUsage::Uniform, ubo_size)
                        .map_err(RenderError::Rhi)
                })
                .collect::<RenderResult<Vec<_>>>()?;

            let sets = pool.allocate_many(layout, MAX_RENDERABLES as u32)?;

            for (buffer, set) in buffers.iter().zip(sets.iter()) {
                let infos = [buffer_info(buffer.handle(), 0, ubo_size)];
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(*set)
                    .dst_binding(0)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&infos);
                update_descriptor_sets(device, &[write]);
            }

            debug!(
                "Created {} per-object uniform slots for frame slot {}",
                MAX_RENDERABLES, frame
            );

            all_buffers.push(buffers);
            all_sets.push(sets);
        }

        Ok((all_buffers, all_sets))
    }

    fn build_graphics_pipeline(
        device: &Arc<Device>,
        vertex_shader: &Shader,
        fragment_shader: &Shader,
        layout: &PipelineLayout,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RenderResult<Pipeline> {
        GraphicsPipelineBuilder::new()
            .vertex_shader(vertex_shader)
            .fragment_shader(fragment_shader)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .cull_mode(CullMode::None)
            .front_face(FrontFace::CounterClockwise)
            .color_attachment_format(color_format)
            .depth_attachment_format(depth_format)
            .build(device.clone(), layout)
            .map_err(RenderError::Rhi)
    }

    fn rebuild_graphics_pipeline(&mut self) -> RenderResult<()> {
        // Drop the old pipeline only after the replacement exists
        let pipeline = Self::build_graphics_pipeline(
            &self.device,
            &self.vertex_shader,
            &self.fragment_shader,
            &self.pipeline_layout,
            self.tracker.color_format(),
            self.tracker.depth_format(),
        )?;
        self.pipeline = Some(pipeline);
        Ok(())
    }
}

impl RenderPipeline for ForwardPipeline {
    fn prepare_frame(&mut self) -> RenderResult<()> {
        let provider = self
            .scene_provider
            .as_mut()
            .ok_or(RenderError::MissingSceneProvider)?;
        self.scene_view = Some(provider.build_scene_view()?);
        Ok(())
    }

    fn render(&mut self, ctx: &mut FrameContext) -> RenderResult<()> {
        let swapchain_extent = ctx.render_extent();
        if swapchain_extent.width == 0 || swapchain_extent.height == 0 {
            return Ok(());
        }

        let resource_manager = self
            .resource_manager
            .as_ref()
            .ok_or(RenderError::MissingResourceManager)?
            .clone();
        let scene_view = self
            .scene_view
            .as_ref()
            .ok_or(RenderError::MissingSceneView)?;

        if scene_view.renderables.len() > MAX_RENDERABLES {
            return Err(RenderError::RenderableCapacityExceeded {
                count: scene_view.renderables.len(),
                max: MAX_RENDERABLES,
            });
        }

        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or(RenderError::InvalidPassResources {
                pass: "forward_main",
                reason: "graphics pipeline was not built",
            })?
            .handle();
        let pipeline_layout = self.pipeline_layout.handle();

        let frame = ctx.frame_index() as usize;

        // Vulkan clip space has Y pointing down; flip the GL-style
        // projection once here.
        let mut proj = scene_view.camera.proj;
        proj.y_axis.y *= -1.0;

        let mut draw_items = Vec::with_capacity(scene_view.renderables.len());
        for (slot, renderable) in scene_view.renderables.iter().enumerate() {
            let mesh = resource_manager.require_mesh_gpu(renderable.mesh, &self.device)?;

            let ubo = ObjectUniform {
                model: pack_mat4_row_major(renderable.model),
                view: pack_mat4_row_major(scene_view.camera.view),
                proj: pack_mat4_row_major(proj),
                normal: pack_mat4_row_major(renderable.normal),
                base_color: renderable.base_color.to_array(),
            };
            self.object_uniform_buffers[frame][slot].write_data(0, bytemuck::bytes_of(&ubo))?;

            draw_items.push(DrawItem {
                mesh,
                per_object_set: self.object_sets[frame][slot],
            });
        }

        // Scene targets follow the viewport override when set, else the
        // swapchain extent.
        let device = self.device.clone();
        let color_format = self.tracker.color_format();
        let depth_format = self.tracker.depth_format();
        let targets = self
            .scene_targets
            .ensure(&device, swapchain_extent, |extent| {
                create_frame_targets(&device, color_format, depth_format, extent)
            })?;

        let scene_extent = targets.color[frame].image.extent();
        let ForwardFrameTargets { color, depth } = targets;

        self.forward_pass.execute(
            ctx,
            ForwardPassResources {
                pipeline,
                pipeline_layout,
                color: color[frame].view(),
                depth: &depth[frame],
                extent: scene_extent,
                draw_items,
            },
        )?;

        self.blit_pass.execute(
            ctx,
            PresentBlitResources {
                src_color: color[frame].view(),
                src_extent: scene_extent,
            },
        )?;

        // Publish this frame's resources under the pass dependency names
        let color_view = color[frame].image.view();
        let ubo_handle = self.object_uniform_buffers[frame][0].handle();
        let per_object_set = self.object_sets[frame][0];
        let registry = ctx.registry_mut();
        registry.set_frame_image_view(frame, "forward.color", color_view)?;
        registry.set_frame_buffer(frame, "forward.per_object", ubo_handle)?;
        registry.set_frame_descriptor_set(frame, "forward.per_object_set", per_object_set)?;

        Ok(())
    }

    fn on_swapchain_state_changed(&mut self, state: &SwapchainState) {
        let summary = self.tracker.apply(state);

        if summary.color_or_depth_changed()
            && let Err(e) = self.rebuild_graphics_pipeline()
        {
            tracing::error!("Failed to rebuild forward graphics pipeline: {e}");
        }
        if summary.extent_or_depth_changed() {
            self.scene_targets.on_swapchain_extent_changed();
        }
    }

    fn color_source(&self) -> Option<&dyn FrameColorSource> {
        Some(self)
    }

    fn viewport_sink(&mut self) -> Option<&mut dyn SceneViewportSink> {
        Some(self)
    }
}

impl FrameColorSource for ForwardPipeline {
    fn frame_color_source_view(&self, frame_index: u32) -> FrameColorSourceView {
        let Some(targets) = self.scene_targets.get() else {
            return FrameColorSourceView::default();
        };
        let Some(tracked) = targets.color.get(frame_index as usize) else {
            return FrameColorSourceView::default();
        };

        FrameColorSourceView {
            image_view: tracked.image.view(),
            layout: tracked.layout,
            extent: tracked.image.extent(),
        }
    }
}

impl SceneViewportSink for ForwardPipeline {
    fn set_scene_viewport_extent(&mut self, width: u32, height: u32) {
        self.scene_targets.set_viewport_extent(width, height);
    }
}

impl Drop for ForwardPipeline {
    fn drop(&mut self) {
        // Descriptor sets go back before the pool is destroyed
        for sets in &self.object_sets {
            unsafe {
                let _ = self.descriptor_pool.free(sets);
            }
        }
    }
}
