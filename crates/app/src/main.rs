//! rtr demo - forward pipeline under the editor overlay.
//!
//! Renders a single colored cube through the forward pipeline, wrapped in
//! the egui editor overlay so the scene shows up inside a dockable panel.

use std::sync::Arc;

use anyhow::Result;
use glam::{Mat4, Vec3, Vec4};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use rtr_core::Timer;
use rtr_editor::{EditorOverlayPipeline, EguiShell, EguiShellHandle};
use rtr_platform::Window;
use rtr_render::forward::{CameraMatrices, ForwardRenderable, ForwardSceneView};
use rtr_render::{
    ForwardPipeline, ForwardSceneViewBuilder, RenderPipeline, RenderResult, Renderer,
    ShaderToyPipeline,
};
use rtr_resources::{MeshData, MeshHandle, ResourceManager};

/// Scene provider: one slowly spinning cube under a fixed camera.
struct SpinningCubeScene {
    mesh: MeshHandle,
    timer: Timer,
}

impl SpinningCubeScene {
    fn new(resources: &ResourceManager) -> Self {
        Self {
            mesh: resources.register_mesh(MeshData::cube()),
            timer: Timer::new(),
        }
    }
}

impl ForwardSceneViewBuilder for SpinningCubeScene {
    fn build_scene_view(&mut self) -> RenderResult<ForwardSceneView> {
        let angle = self.timer.elapsed_secs() * 0.5;
        let model = Mat4::from_rotation_y(angle);

        Ok(ForwardSceneView {
            camera: CameraMatrices {
                view: Mat4::look_at_rh(Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, Vec3::Y),
                proj: Mat4::perspective_rh(45.0_f32.to_radians(), 16.0 / 9.0, 0.1, 10.0),
            },
            renderables: vec![ForwardRenderable::new(
                self.mesh,
                model,
                Vec4::new(0.2, 0.7, 0.9, 1.0),
            )],
        })
    }
}

struct App {
    window: Option<Window>,
    renderer: Option<Renderer>,
    shell: Option<EguiShellHandle>,
}

impl App {
    fn new() -> Self {
        Self {
            window: None,
            renderer: None,
            shell: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Window::new(event_loop, 1280, 720, "rtr demo")?;
        let mut renderer = Renderer::new(&window)?;
        let runtime = renderer.pipeline_runtime();

        // `--shadertoy` swaps the 3D scene for the compute-driven one
        let shadertoy = std::env::args().any(|arg| arg == "--shadertoy");
        let inner: Box<dyn RenderPipeline> = if shadertoy {
            Box::new(ShaderToyPipeline::new(&runtime)?)
        } else {
            let resources = Arc::new(ResourceManager::new());
            let scene = SpinningCubeScene::new(&resources);

            let mut forward = ForwardPipeline::new(&runtime)?;
            forward.set_resource_manager(resources);
            forward.set_scene_provider(Box::new(scene));
            Box::new(forward)
        };

        let shell = EguiShell::new(window.inner_arc());
        let mut editor = EditorOverlayPipeline::new(&runtime, inner, shell.clone())?;
        editor.set_ui(Box::new(|ctx| {
            egui::Window::new("Stats").show(ctx, |ui| {
                ui.label("rtr demo");
            });
        }));

        renderer.set_pipeline(Box::new(editor))?;

        info!("Initialization complete, entering main loop");
        self.window = Some(window);
        self.renderer = Some(renderer);
        self.shell = Some(shell);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none()
            && let Err(e) = self.init(event_loop)
        {
            error!("Failed to initialize: {e:?}");
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(shell) = &self.shell {
            // UI gets the event first; camera input would consult
            // wants_capture_mouse/keyboard before acting on the rest
            let _consumed = shell.borrow_mut().on_window_event(&event);
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(window) = self.window.as_mut() {
                    window.resize(size.width, size.height);
                }
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.on_window_resized(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(renderer) = self.renderer.as_mut() {
                    let result = renderer
                        .prepare_frame()
                        .and_then(|_| renderer.draw_frame());
                    if let Err(e) = result {
                        error!("Render error: {e}");
                        event_loop.exit();
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    rtr_core::init_logging();
    info!("Starting rtr demo");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;

    Ok(())
}
