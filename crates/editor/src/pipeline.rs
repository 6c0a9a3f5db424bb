//! Editor overlay pipeline.
//!
//! Wraps an inner [`RenderPipeline`], republishes its offscreen color as an
//! egui texture inside a scene-view panel, and records the UI on top of the
//! swapchain. Scene-panel resizes are routed back to the inner pipeline's
//! viewport sink so the 3D render target follows the panel, not the window.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use rtr_render::color_source::{FrameColorSource, SceneViewportSink};
use rtr_render::pipeline::PipelineRuntime;
use rtr_render::{FrameContext, RenderPipeline, RenderResult, SwapchainState};
use rtr_rhi::FRAMES_IN_FLIGHT;
use rtr_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, image_info,
    update_descriptor_sets,
};
use rtr_rhi::device::Device;
use rtr_rhi::sampler::Sampler;

use crate::overlay_pass::OverlayPass;
use crate::shell::EguiShellHandle;

/// Per-frame-slot scene texture registration.
///
/// Re-registered only when the source view identity or layout changes, so
/// the texture id stays stable across frames with unchanged swapchain
/// state.
#[derive(Default)]
struct SceneTextureEntry {
    image_view: vk::ImageView,
    layout: vk::ImageLayout,
    descriptor_set: Option<vk::DescriptorSet>,
    texture_id: Option<egui::TextureId>,
    size: [f32; 2],
}

/// UI callback type for user panels.
pub type UiCallback = Box<dyn FnMut(&egui::Context)>;

/// Wraps an inner pipeline with the editor UI overlay.
pub struct EditorOverlayPipeline {
    device: Arc<Device>,
    inner: Box<dyn RenderPipeline>,
    shell: EguiShellHandle,
    overlay_pass: OverlayPass,

    scene_sampler: Sampler,
    texture_layout: DescriptorSetLayout,
    texture_pool: DescriptorPool,
    scene_textures: Vec<SceneTextureEntry>,

    user_ui: Option<UiCallback>,
    pending_viewport: Option<(u32, u32)>,
}

impl EditorOverlayPipeline {
    /// Wraps `inner` with the overlay.
    ///
    /// # Errors
    ///
    /// Fails when the egui renderer or the texture descriptor resources
    /// cannot be created.
    pub fn new(
        runtime: &PipelineRuntime,
        inner: Box<dyn RenderPipeline>,
        shell: EguiShellHandle,
    ) -> RenderResult<Self> {
        let device = runtime.device.clone();

        let overlay_pass = OverlayPass::new(device.clone(), runtime.color_format)?;

        let scene_sampler = Sampler::linear(device.clone())?;
        let texture_layout = DescriptorSetLayout::new(
            device.clone(),
            &[DescriptorBindingBuilder::combined_image_sampler(
                0,
                vk::ShaderStageFlags::FRAGMENT,
            )],
        )?;
        let frames = FRAMES_IN_FLIGHT as u32;
        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(frames)];
        let texture_pool = DescriptorPool::new(device.clone(), frames, &pool_sizes)?;

        let scene_textures = (0..FRAMES_IN_FLIGHT)
            .map(|_| SceneTextureEntry::default())
            .collect();

        Ok(Self {
            device,
            inner,
            shell,
            overlay_pass,
            scene_sampler,
            texture_layout,
            texture_pool,
            scene_textures,
            user_ui: None,
            pending_viewport: None,
        })
    }

    /// Installs the user UI callback, run inside every UI pass.
    pub fn set_ui(&mut self, ui: UiCallback) {
        self.user_ui = Some(ui);
    }

    /// Whether the UI wants the mouse (scene viewport hover overrides to
    /// `false`).
    pub fn wants_imgui_capture_mouse(&self) -> bool {
        self.shell.borrow().wants_capture_mouse()
    }

    /// Whether the UI wants the keyboard (scene viewport focus overrides to
    /// `false`).
    pub fn wants_imgui_capture_keyboard(&self) -> bool {
        self.shell.borrow().wants_capture_keyboard()
    }

    /// Releases every registered scene texture (after swapchain or target
    /// recreation).
    fn release_scene_textures(&mut self) {
        for entry in &mut self.scene_textures {
            if let Some(texture_id) = entry.texture_id.take() {
                self.overlay_pass.remove_user_texture(texture_id);
            }
            if let Some(set) = entry.descriptor_set.take() {
                unsafe {
                    let _ = self.texture_pool.free(&[set]);
                }
            }
            entry.image_view = vk::ImageView::null();
            entry.layout = vk::ImageLayout::UNDEFINED;
            entry.size = [0.0, 0.0];
        }
    }

    /// Registers (or refreshes) the scene texture for one frame slot from
    /// the inner pipeline's color source.
    fn refresh_scene_texture(&mut self, frame: usize) -> RenderResult<()> {
        let view = self
            .inner
            .color_source()
            .map(|source| source.frame_color_source_view(frame as u32))
            .unwrap_or_default();

        let entry = &mut self.scene_textures[frame];

        if !view.valid() {
            if let Some(texture_id) = entry.texture_id.take() {
                self.overlay_pass.remove_user_texture(texture_id);
            }
            if let Some(set) = entry.descriptor_set.take() {
                unsafe {
                    let _ = self.texture_pool.free(&[set]);
                }
            }
            return Ok(());
        }

        let identity_changed = entry.texture_id.is_none()
            || entry.image_view != view.image_view
            || entry.layout != view.layout;

        if identity_changed {
            if let Some(texture_id) = entry.texture_id.take() {
                self.overlay_pass.remove_user_texture(texture_id);
            }

            let set = match entry.descriptor_set {
                Some(set) => set,
                None => {
                    let set = self.texture_pool.allocate(&[self.texture_layout.handle()])?[0];
                    entry.descriptor_set = Some(set);
                    set
                }
            };

            let infos = [image_info(
                self.scene_sampler.handle(),
                view.image_view,
                view.layout,
            )];
            let write = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(0)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&infos);
            update_descriptor_sets(&self.device, &[write]);

            entry.texture_id = Some(self.overlay_pass.add_user_texture(set));
            entry.image_view = view.image_view;
            entry.layout = view.layout;
            debug!("Scene texture re-registered for frame slot {}", frame);
        }

        entry.size = [view.extent.width as f32, view.extent.height as f32];
        Ok(())
    }

    /// Draws the scene-view panel; returns (hovered, focused, panel size).
    fn draw_scene_panel(
        ctx: &egui::Context,
        entry: &SceneTextureEntry,
    ) -> (bool, bool, Option<(u32, u32)>) {
        let mut hovered = false;
        let mut focused = false;
        let mut panel_size = None;

        egui::Window::new("Scene")
            .default_size(entry.size)
            .show(ctx, |ui| {
                if let Some(texture_id) = entry.texture_id {
                    let available = ui.available_size();
                    let response = ui.add(
                        egui::Image::new((texture_id, available))
                            .sense(egui::Sense::click_and_drag()),
                    );
                    hovered = response.hovered();
                    focused = response.has_focus() || response.dragged();
                    if available.x >= 1.0 && available.y >= 1.0 {
                        panel_size = Some((available.x as u32, available.y as u32));
                    }
                } else {
                    ui.label("Scene output is not available yet");
                }
            });

        (hovered, focused, panel_size)
    }
}

impl RenderPipeline for EditorOverlayPipeline {
    fn prepare_frame(&mut self) -> RenderResult<()> {
        self.inner.prepare_frame()
    }

    fn render(&mut self, ctx: &mut FrameContext) -> RenderResult<()> {
        // Scene first: the wrapped pipeline renders and leaves the
        // swapchain image in COLOR_ATTACHMENT_OPTIMAL.
        self.inner.render(ctx)?;

        let frame = ctx.frame_index() as usize;
        self.refresh_scene_texture(frame)?;

        // UI pass
        let (primitives, textures_delta, pixels_per_point) = {
            let mut shell = self.shell.borrow_mut();
            shell.begin_pass();

            let (hovered, focused, panel_size) =
                Self::draw_scene_panel(shell.context(), &self.scene_textures[frame]);
            shell.set_scene_viewport_state(hovered, focused);
            if let Some(size) = panel_size {
                self.pending_viewport = Some(size);
            }

            if let Some(user_ui) = self.user_ui.as_mut() {
                user_ui(shell.context());
            }

            shell.end_pass()
        };

        self.overlay_pass
            .record(ctx, &primitives, &textures_delta, pixels_per_point)?;

        // Route the panel size to the inner pipeline so the next frame's
        // scene target matches the viewport.
        if let Some((width, height)) = self.pending_viewport.take()
            && let Some(sink) = self.inner.viewport_sink()
        {
            sink.set_scene_viewport_extent(width, height);
        }

        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.inner.on_resize(width, height);
    }

    fn on_swapchain_state_changed(&mut self, state: &SwapchainState) {
        self.inner.on_swapchain_state_changed(state);
        if let Err(e) = self.overlay_pass.on_swapchain_recreated(
            state.image_count,
            state.color_format,
            state.depth_format,
        ) {
            tracing::error!("Failed to refresh overlay pass after swapchain change: {e}");
        }
        // View identities are stale after recreation
        self.release_scene_textures();
    }

    fn color_source(&self) -> Option<&dyn FrameColorSource> {
        self.inner.color_source()
    }

    fn viewport_sink(&mut self) -> Option<&mut dyn SceneViewportSink> {
        self.inner.viewport_sink()
    }
}

impl Drop for EditorOverlayPipeline {
    fn drop(&mut self) {
        self.release_scene_textures();
    }
}
