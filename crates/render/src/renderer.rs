//! Top-level renderer.
//!
//! Owns the Vulkan instance/surface/device, the [`FrameScheduler`], and at
//! most one bound [`RenderPipeline`]. Drives the per-frame control flow
//! (acquire, record, transition to present, submit, present) and offers a
//! one-shot compute submission path that is independent of presentation.

use std::path::PathBuf;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::HasDisplayHandle;
use tracing::{error, info};

use rtr_platform::{Surface, Window, get_required_extensions};
use rtr_rhi::barrier::image_barrier;
use rtr_rhi::command::{CommandBuffer, CommandPool};
use rtr_rhi::device::Device;
use rtr_rhi::instance::Instance;
use rtr_rhi::physical_device::select_physical_device;
use rtr_rhi::sync::Fence;
use rtr_rhi::FRAMES_IN_FLIGHT;

use crate::error::{RenderError, RenderResult};
use crate::frame_context::{FrameContext, FrameResourceRegistry};
use crate::frame_scheduler::FrameScheduler;
use crate::pipeline::{PipelineRuntime, RenderPipeline, resolve_shader_root};

/// Handle to a one-shot compute submission.
///
/// The job completes on the GPU independently of the frame loop; dropping
/// the handle waits for completion. The optional completion callback fires
/// exactly once, after the first successful wait.
pub struct ComputeJob {
    device: Arc<Device>,
    pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: Fence,
    on_complete: Option<Box<dyn FnOnce()>>,
    completed: bool,
}

impl ComputeJob {
    fn mark_completed(&mut self) {
        if !self.completed {
            self.completed = true;
            if let Some(callback) = self.on_complete.take() {
                callback();
            }
        }
    }

    /// Polls the job with a zero-timeout wait.
    ///
    /// Returns `true` once the GPU has finished; the completion callback
    /// fires on the first `true`.
    ///
    /// # Errors
    ///
    /// Fails when the fence query itself fails.
    pub fn is_done(&mut self) -> RenderResult<bool> {
        if self.completed {
            return Ok(true);
        }
        if self.fence.wait_with_timeout(0)? {
            self.mark_completed();
            return Ok(true);
        }
        Ok(false)
    }

    /// Waits for the job to complete.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ComputeWaitTimeout`] when `timeout_ns`
    /// elapses first; other wait failures propagate as Vulkan errors.
    pub fn wait(&mut self, timeout_ns: u64) -> RenderResult<()> {
        if self.completed {
            return Ok(());
        }
        if self.fence.wait_with_timeout(timeout_ns)? {
            self.mark_completed();
            return Ok(());
        }
        Err(RenderError::ComputeWaitTimeout)
    }
}

impl Drop for ComputeJob {
    fn drop(&mut self) {
        if !self.completed {
            match self.fence.wait_with_timeout(u64::MAX) {
                Ok(true) => self.mark_completed(),
                Ok(false) => {}
                Err(e) => error!("ComputeJob wait failed during drop: {e}"),
            }
        }
        // The transient buffer is single-use; return it to the pool
        unsafe {
            self.device
                .handle()
                .free_command_buffers(self.pool, &[self.command_buffer]);
        }
    }
}

/// Top-level orchestrator: window surface, device, frame scheduler, and the
/// single bound pipeline.
///
/// Not thread-safe; `draw_frame` and `compute*` must be called from the
/// single owner thread.
pub struct Renderer {
    // Field order is drop order: the pipeline and pools must release their
    // device resources before the scheduler tears down the swapchain, which
    // must go before the surface and instance.
    active_pipeline: Option<Box<dyn RenderPipeline>>,
    registry: FrameResourceRegistry,
    compute_pool: CommandPool,
    scheduler: FrameScheduler,
    surface: Surface,
    device: Arc<Device>,
    instance: Instance,

    window: Arc<winit::window::Window>,
    shader_root: PathBuf,
    last_generation: u64,
}

impl Renderer {
    /// Creates the renderer for a window: instance, surface, device,
    /// scheduler, and the transient compute pool.
    ///
    /// # Errors
    ///
    /// Fails when any Vulkan bootstrap step fails (no Vulkan, no suitable
    /// GPU, swapchain creation failure, ...).
    pub fn new(window: &Window) -> RenderResult<Self> {
        info!(
            "Initializing renderer ({}x{})",
            window.width(),
            window.height()
        );

        let display_handle = window
            .inner()
            .display_handle()
            .map_err(|e| rtr_core::Error::Window(format!("Failed to get display handle: {e}")))?;
        let surface_extensions = get_required_extensions(display_handle.as_raw())?;

        let instance = Instance::new(cfg!(debug_assertions), &surface_extensions)?;
        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .expect("device was created with a graphics queue");
        let compute_pool = CommandPool::new_transient(device.clone(), graphics_family)?;

        let scheduler = FrameScheduler::new(
            &instance,
            device.clone(),
            surface.handle(),
            window.width(),
            window.height(),
        )?;

        let last_generation = scheduler.swapchain_state().generation;

        Ok(Self {
            active_pipeline: None,
            registry: FrameResourceRegistry::new(FRAMES_IN_FLIGHT),
            compute_pool,
            scheduler,
            surface,
            device,
            instance,
            window: window.inner_arc(),
            shader_root: resolve_shader_root(None),
            last_generation,
        })
    }

    /// Builds the immutable handle bundle pipelines are constructed from.
    pub fn pipeline_runtime(&self) -> PipelineRuntime {
        PipelineRuntime {
            device: self.device.clone(),
            window: self.window.clone(),
            image_count: self.scheduler.image_count(),
            color_format: self.scheduler.render_format(),
            depth_format: self.scheduler.depth_format(),
            shader_root: self.shader_root.clone(),
        }
    }

    /// Binds the render pipeline.
    ///
    /// The pipeline immediately observes the current swapchain state.
    /// Binding succeeds at most once per renderer lifetime; any further
    /// call fails with [`RenderError::PipelineAlreadyBound`].
    pub fn set_pipeline(&mut self, mut pipeline: Box<dyn RenderPipeline>) -> RenderResult<()> {
        if self.active_pipeline.is_some() {
            return Err(RenderError::PipelineAlreadyBound);
        }

        pipeline.on_swapchain_state_changed(&self.scheduler.swapchain_state());
        self.active_pipeline = Some(pipeline);
        info!("Render pipeline bound");
        Ok(())
    }

    /// The bound pipeline, if any.
    pub fn pipeline_mut(&mut self) -> Option<&mut (dyn RenderPipeline + 'static)> {
        self.active_pipeline.as_deref_mut()
    }

    /// Runs the bound pipeline's CPU-side frame preparation.
    ///
    /// # Errors
    ///
    /// Fails when no pipeline is bound or preparation fails.
    pub fn prepare_frame(&mut self) -> RenderResult<()> {
        self.active_pipeline
            .as_mut()
            .ok_or(RenderError::NoPipelineBound)?
            .prepare_frame()
    }

    /// Draws one frame.
    ///
    /// Acquires a swapchain image, forwards any new swapchain state to the
    /// pipeline, records the pipeline's passes, appends the single
    /// transition to `PRESENT_SRC`, submits and presents. A skipped frame
    /// (fence-wait failure or out-of-date acquire) returns `Ok(())` without
    /// rendering.
    ///
    /// # Errors
    ///
    /// Fails when no pipeline is bound, or on any fatal Vulkan error.
    pub fn draw_frame(&mut self) -> RenderResult<()> {
        if self.active_pipeline.is_none() {
            return Err(RenderError::NoPipelineBound);
        }

        let Some(ticket) = self.scheduler.begin_frame()? else {
            return Ok(());
        };

        let state = self.scheduler.swapchain_state();
        let pipeline = self
            .active_pipeline
            .as_mut()
            .ok_or(RenderError::NoPipelineBound)?;
        if state.generation != self.last_generation {
            pipeline.on_swapchain_state_changed(&state);
            self.last_generation = state.generation;
        }

        let cmd = CommandBuffer::from_handle(self.device.clone(), ticket.command_buffer);
        cmd.reset()?;
        cmd.begin()?;

        self.registry.clear_frame(ticket.frame_index as usize);
        let mut ctx = FrameContext::new(
            cmd,
            self.scheduler.swapchain_image(ticket.image_index),
            self.scheduler.swapchain_image_view(ticket.image_index),
            state.extent,
            ticket.frame_index,
            &mut self.registry,
        );

        pipeline.render(&mut ctx)?;

        // The pipeline leaves the swapchain image in
        // COLOR_ATTACHMENT_OPTIMAL; this is the single transition to
        // PRESENT_SRC per frame.
        let to_present = image_barrier(
            ctx.swapchain_image(),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            vk::AccessFlags2::NONE,
        );
        ctx.cmd().pipeline_barrier2(&[to_present]);

        ctx.cmd().end()?;
        drop(ctx);

        self.scheduler.submit_and_present(&ticket)
    }

    /// Forwards a window resize to the scheduler and the bound pipeline.
    pub fn on_window_resized(&mut self, width: u32, height: u32) {
        self.scheduler.on_window_resized(width, height);
        if let Some(pipeline) = self.active_pipeline.as_mut() {
            pipeline.on_resize(width, height);
        }
    }

    /// Records and submits one-shot GPU work, waiting inline for
    /// completion.
    ///
    /// Works without a bound pipeline and never touches the swapchain.
    ///
    /// # Errors
    ///
    /// Fails when recording or submission fails.
    pub fn compute<F>(&self, record: F, on_complete: Option<Box<dyn FnOnce()>>) -> RenderResult<()>
    where
        F: FnOnce(&CommandBuffer) -> RenderResult<()>,
    {
        let mut job = self.compute_async(record, on_complete)?;
        job.wait(u64::MAX)
    }

    /// Records and submits one-shot GPU work, returning a [`ComputeJob`]
    /// handle.
    ///
    /// The command buffer comes from a dedicated transient pool so the
    /// per-frame primary pool is never contended; submission still goes to
    /// the graphics-capable queue.
    ///
    /// # Errors
    ///
    /// Fails when recording or submission fails.
    pub fn compute_async<F>(
        &self,
        record: F,
        on_complete: Option<Box<dyn FnOnce()>>,
    ) -> RenderResult<ComputeJob>
    where
        F: FnOnce(&CommandBuffer) -> RenderResult<()>,
    {
        let handle = self.compute_pool.allocate_command_buffer()?;
        let cmd = CommandBuffer::from_handle(self.device.clone(), handle);

        cmd.begin()?;
        record(&cmd)?;
        cmd.end()?;

        let fence = Fence::new(self.device.clone(), false)?;

        let command_buffers = [handle];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe {
            self.device.submit_graphics(&[submit_info], fence.handle())?;
        }

        Ok(ComputeJob {
            device: self.device.clone(),
            pool: self.compute_pool.handle(),
            command_buffer: handle,
            fence,
            on_complete,
            completed: false,
        })
    }

    /// The logical device.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// The frame scheduler.
    #[inline]
    pub fn frame_scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Everything owned below is about to drop; make sure the GPU is
        // done with all of it first. Failures only log - the destructor
        // must not panic.
        if let Err(e) = self.device.wait_idle() {
            error!("Renderer drop: wait_idle failed: {e}");
        }
        info!("Renderer destroyed");
    }
}
