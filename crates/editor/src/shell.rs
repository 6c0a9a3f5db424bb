//! Shared egui context and input state.
//!
//! The shell is shared between the event loop (which feeds winit events)
//! and the overlay pipeline (which runs the UI pass), so it lives behind an
//! `Rc<RefCell<_>>` handle. Everything here stays on the single owner
//! thread.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use winit::event::WindowEvent;

/// Shared handle to the [`EguiShell`].
pub type EguiShellHandle = Rc<RefCell<EguiShell>>;

/// egui context plus winit input plumbing and scene-viewport capture flags.
pub struct EguiShell {
    ctx: egui::Context,
    winit_state: egui_winit::State,
    window: Arc<winit::window::Window>,
    scene_hovered: bool,
    scene_focused: bool,
}

impl EguiShell {
    /// Creates the shell for a window and returns the shared handle.
    pub fn new(window: Arc<winit::window::Window>) -> EguiShellHandle {
        let ctx = egui::Context::default();
        let winit_state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window.as_ref(),
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        Rc::new(RefCell::new(Self {
            ctx,
            winit_state,
            window,
            scene_hovered: false,
            scene_focused: false,
        }))
    }

    /// Feeds a winit window event into egui.
    ///
    /// Returns whether egui consumed the event.
    pub fn on_window_event(&mut self, event: &WindowEvent) -> bool {
        self.winit_state
            .on_window_event(self.window.as_ref(), event)
            .consumed
    }

    /// Starts a UI pass from the accumulated input.
    pub fn begin_pass(&mut self) {
        let raw_input = self.winit_state.take_egui_input(self.window.as_ref());
        self.ctx.begin_pass(raw_input);
    }

    /// Ends the UI pass: handles platform output and tessellates.
    ///
    /// Returns the clipped primitives, the texture delta to apply, and the
    /// pixels-per-point factor for this pass.
    pub fn end_pass(&mut self) -> (Vec<egui::ClippedPrimitive>, egui::TexturesDelta, f32) {
        let output = self.ctx.end_pass();
        self.winit_state
            .handle_platform_output(self.window.as_ref(), output.platform_output);

        let pixels_per_point = output.pixels_per_point;
        let primitives = self.ctx.tessellate(output.shapes, pixels_per_point);
        (primitives, output.textures_delta, pixels_per_point)
    }

    /// The egui context, for building UI between `begin_pass` and
    /// `end_pass`.
    #[inline]
    pub fn context(&self) -> &egui::Context {
        &self.ctx
    }

    /// Records whether the scene viewport is hovered/focused this pass.
    pub fn set_scene_viewport_state(&mut self, hovered: bool, focused: bool) {
        self.scene_hovered = hovered;
        self.scene_focused = focused;
    }

    /// Whether the UI wants the mouse.
    ///
    /// While the scene viewport is hovered the answer is `false`: pointer
    /// input belongs to the 3D camera, not the UI hosting it.
    pub fn wants_capture_mouse(&self) -> bool {
        if self.scene_hovered {
            return false;
        }
        self.ctx.wants_pointer_input()
    }

    /// Whether the UI wants the keyboard.
    ///
    /// While the scene viewport is focused the answer is `false`.
    pub fn wants_capture_keyboard(&self) -> bool {
        if self.scene_focused {
            return false;
        }
        self.ctx.wants_keyboard_input()
    }
}
