//! egui draw pass on the swapchain image.

use std::sync::Arc;

use ash::vk;
use egui_ash_renderer::{DynamicRendering, Options, Renderer as EguiRenderer};
use tracing::{debug, info};

use rtr_render::render_pass::{ResourceAccess, ResourceDependency};
use rtr_render::{FrameContext, RenderError, RenderResult};
use rtr_rhi::FRAMES_IN_FLIGHT;
use rtr_rhi::command::CommandPool;
use rtr_rhi::device::Device;
use rtr_rhi::rendering::{ColorAttachment, RenderingConfig};

fn egui_error(err: egui_ash_renderer::RendererError) -> RenderError {
    RenderError::Core(rtr_core::Error::Internal(format!("egui renderer: {err}")))
}

/// Records egui draw data onto the swapchain image.
///
/// The color attachment loads the existing contents (`LoadOp=LOAD`) so the
/// UI composites over whatever the wrapped pipeline blitted or rendered
/// underneath; the preceding pass must therefore leave the swapchain image
/// in `COLOR_ATTACHMENT_OPTIMAL`.
pub struct OverlayPass {
    device: Arc<Device>,
    renderer: EguiRenderer,
    upload_pool: CommandPool,
    color_format: vk::Format,
    dependencies: [ResourceDependency; 2],
}

impl OverlayPass {
    /// Creates the pass for the given swapchain color format.
    ///
    /// # Errors
    ///
    /// Fails when the egui renderer or the upload command pool cannot be
    /// created.
    pub fn new(device: Arc<Device>, color_format: vk::Format) -> RenderResult<Self> {
        let renderer = Self::build_renderer(&device, color_format)?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .expect("device was created with a graphics queue");
        let upload_pool = CommandPool::new(device.clone(), graphics_family)?;

        info!("Editor overlay pass created ({:?})", color_format);

        Ok(Self {
            device,
            renderer,
            upload_pool,
            color_format,
            dependencies: [
                ResourceDependency {
                    name: "swapchain",
                    access: ResourceAccess::ReadWrite,
                },
                ResourceDependency {
                    name: "scene.color",
                    access: ResourceAccess::Read,
                },
            ],
        })
    }

    fn build_renderer(device: &Arc<Device>, color_format: vk::Format) -> RenderResult<EguiRenderer> {
        EguiRenderer::with_gpu_allocator(
            device.allocator().clone(),
            device.handle().clone(),
            DynamicRendering {
                color_attachment_format: color_format,
                depth_attachment_format: None,
            },
            Options {
                in_flight_frames: FRAMES_IN_FLIGHT,
                srgb_framebuffer: true,
                ..Default::default()
            },
        )
        .map_err(egui_error)
    }

    /// Declared dependencies (the UI reads the scene texture, composites on
    /// the swapchain).
    pub fn dependencies(&self) -> &[ResourceDependency] {
        &self.dependencies
    }

    /// Reacts to a swapchain recreation: the egui pipeline is rebuilt when
    /// the color format changed.
    pub fn on_swapchain_recreated(
        &mut self,
        _image_count: u32,
        color_format: vk::Format,
        _depth_format: vk::Format,
    ) -> RenderResult<()> {
        if color_format != self.color_format {
            debug!(
                "Overlay color format changed {:?} -> {:?}; rebuilding egui renderer",
                self.color_format, color_format
            );
            self.renderer = Self::build_renderer(&self.device, color_format)?;
            self.color_format = color_format;
        }
        Ok(())
    }

    /// Registers an externally-owned descriptor set (combined image
    /// sampler, binding 0) as a UI texture.
    pub fn add_user_texture(&mut self, descriptor_set: vk::DescriptorSet) -> egui::TextureId {
        self.renderer.add_user_texture(descriptor_set)
    }

    /// Removes a previously registered user texture.
    pub fn remove_user_texture(&mut self, texture_id: egui::TextureId) {
        self.renderer.remove_user_texture(texture_id);
    }

    /// Applies texture deltas and records the UI draw onto the swapchain.
    ///
    /// # Errors
    ///
    /// Fails when texture upload or draw recording fails.
    pub fn record(
        &mut self,
        ctx: &mut FrameContext,
        primitives: &[egui::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        pixels_per_point: f32,
    ) -> RenderResult<()> {
        if !textures_delta.set.is_empty() {
            self.renderer
                .set_textures(
                    self.device.graphics_queue(),
                    self.upload_pool.handle(),
                    textures_delta.set.as_slice(),
                )
                .map_err(egui_error)?;
        }

        let extent = ctx.render_extent();
        let rendering = RenderingConfig::from_extent(extent)
            .with_color_attachment(ColorAttachment::new(ctx.swapchain_image_view()).load())
            .build();

        let cmd = ctx.cmd();
        cmd.begin_rendering(&rendering.info());
        self.renderer
            .cmd_draw(cmd.handle(), extent, pixels_per_point, primitives)
            .map_err(egui_error)?;
        cmd.end_rendering();

        if !textures_delta.free.is_empty() {
            self.renderer
                .free_textures(textures_delta.free.as_slice())
                .map_err(egui_error)?;
        }

        Ok(())
    }
}
