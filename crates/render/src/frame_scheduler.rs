//! Frame scheduling and swapchain ownership.
//!
//! The [`FrameScheduler`] owns the swapchain, the per-frame and per-image
//! synchronization objects, and a `FRAMES_IN_FLIGHT`-sized primary command
//! buffer pool. It hands out [`FrameTicket`]s from
//! [`begin_frame`](FrameScheduler::begin_frame) and retires them in
//! [`submit_and_present`](FrameScheduler::submit_and_present), recreating
//! the swapchain when it goes out of date or the window resizes.
//!
//! # Synchronization layout
//!
//! - Per **frame slot** (`0..N`): a primary command buffer, an
//!   `image_available` binary semaphore, and an `in_flight` fence (created
//!   signaled). The fence is signaled on submit and waited at the start of
//!   that slot's next frame.
//! - Per **swapchain image** (`0..M`): a `render_finished` binary
//!   semaphore. Keeping these per image rather than per frame slot avoids
//!   the semaphore-reuse race when `M > N`.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, warn};

use rtr_rhi::FRAMES_IN_FLIGHT;
use rtr_rhi::command::CommandPool;
use rtr_rhi::device::Device;
use rtr_rhi::instance::Instance;
use rtr_rhi::swapchain::Swapchain;
use rtr_rhi::sync::{Fence, Semaphore};

use crate::error::RenderResult;

/// Depth format candidates, probed in order against
/// `optimalTilingFeatures & DEPTH_STENCIL_ATTACHMENT`.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Immutable snapshot of swapchain identity fields.
///
/// `generation` increases strictly on every successful recreation; two
/// snapshots with equal generation describe identical underlying resources.
#[derive(Clone, Copy, Debug)]
pub struct SwapchainState {
    /// Monotonic recreation counter, starting at 1.
    pub generation: u64,
    /// Swapchain extent.
    pub extent: vk::Extent2D,
    /// Number of swapchain images.
    pub image_count: u32,
    /// Swapchain color format.
    pub color_format: vk::Format,
    /// Selected depth attachment format.
    pub depth_format: vk::Format,
}

/// Handle to one accepted frame.
///
/// Valid only until the matching
/// [`submit_and_present`](FrameScheduler::submit_and_present); the command
/// buffer belongs to the ticket's frame slot.
#[derive(Clone, Copy, Debug)]
pub struct FrameTicket {
    /// Frame slot index in `[0, FRAMES_IN_FLIGHT)`.
    pub frame_index: u32,
    /// Acquired swapchain image index in `[0, image_count)`.
    pub image_index: u32,
    /// The slot's primary command buffer.
    pub command_buffer: vk::CommandBuffer,
}

/// Pure frame-slot cycling state.
///
/// Tracks the current frame slot (cycling mod `FRAMES_IN_FLIGHT`) and the
/// most recently acquired image index.
#[derive(Debug, Default)]
pub struct FrameSlots {
    current_frame: usize,
    image_index: u32,
}

impl FrameSlots {
    /// Creates a tracker at frame slot 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current frame slot index.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// The most recently acquired swapchain image index.
    #[inline]
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    /// Records the acquired image index for the current frame.
    pub fn set_image_index(&mut self, index: u32) {
        self.image_index = index;
    }

    /// Advances to the next frame slot.
    pub fn advance(&mut self) {
        self.current_frame = (self.current_frame + 1) % FRAMES_IN_FLIGHT;
    }
}

/// Per-frame-slot resources.
struct PerFrameResources {
    command_buffer: vk::CommandBuffer,
    image_available: Semaphore,
    in_flight: Fence,
}

/// Per-swapchain-image resources.
struct PerImageResources {
    render_finished: Semaphore,
}

/// Owns swapchain + synchronization and produces frame tickets.
pub struct FrameScheduler {
    device: Arc<Device>,
    swapchain: Swapchain,
    command_pool: CommandPool,

    per_frame: Vec<PerFrameResources>,
    per_image: Vec<PerImageResources>,
    slots: FrameSlots,

    framebuffer_resized: bool,
    surface_size: (u32, u32),
    generation: u64,
    depth_format: vk::Format,
}

impl FrameScheduler {
    /// Creates the scheduler: swapchain, command pool, and all per-frame and
    /// per-image synchronization.
    ///
    /// # Errors
    ///
    /// Fails when the swapchain cannot be created, no depth format
    /// qualifies, or sync-object creation fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let swapchain = Swapchain::new(instance, device.clone(), surface, width, height)?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .expect("device was created with a graphics queue");
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;

        let depth_format = device
            .find_supported_format(
                &DEPTH_FORMAT_CANDIDATES,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
            .ok_or_else(|| {
                rtr_rhi::RhiError::NoSupportedFormat(format!("{:?}", DEPTH_FORMAT_CANDIDATES))
            })?;

        let per_frame = Self::create_per_frame_resources(&device, &command_pool)?;
        let per_image = Self::create_per_image_resources(&device, swapchain.image_count())?;

        info!(
            "FrameScheduler initialized (frames_in_flight={}, image_count={}, depth_format={:?})",
            FRAMES_IN_FLIGHT,
            swapchain.image_count(),
            depth_format
        );

        Ok(Self {
            device,
            swapchain,
            command_pool,
            per_frame,
            per_image,
            slots: FrameSlots::new(),
            framebuffer_resized: false,
            surface_size: (width, height),
            generation: 1,
            depth_format,
        })
    }

    /// Begins a frame: waits for the slot's previous submission, acquires a
    /// swapchain image, and returns the ticket.
    ///
    /// Returns `Ok(None)` when the frame must be skipped: the fence wait
    /// failed (logged), or acquisition reported the swapchain out of date
    /// (in which case the swapchain is recreated here).
    ///
    /// # Errors
    ///
    /// Any acquisition result other than success/suboptimal/out-of-date is
    /// fatal.
    pub fn begin_frame(&mut self) -> RenderResult<Option<FrameTicket>> {
        let frame = &self.per_frame[self.slots.current_frame()];

        if let Err(e) = frame.in_flight.wait(u64::MAX) {
            error!("Failed to wait for in-flight fence: {e}");
            return Ok(None);
        }
        frame.in_flight.reset()?;

        match self.swapchain.acquire_next_image(frame.image_available.handle()) {
            Ok((image_index, _suboptimal)) => {
                self.slots.set_image_index(image_index);
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                info!("Swapchain acquire returned out-of-date; recreating swapchain resources");
                self.device.wait_idle()?;
                self.recreate_swapchain_resources()?;
                return Ok(None);
            }
            Err(e) => {
                error!("Failed to acquire swapchain image: {:?}", e);
                return Err(rtr_rhi::RhiError::VulkanError(e).into());
            }
        }

        Ok(Some(FrameTicket {
            frame_index: self.slots.current_frame() as u32,
            image_index: self.slots.image_index(),
            command_buffer: self.per_frame[self.slots.current_frame()].command_buffer,
        }))
    }

    /// Submits the ticket's command buffer and presents the image.
    ///
    /// The submission waits on `image_available[frame]` at
    /// `COLOR_ATTACHMENT_OUTPUT`, signals `render_finished[image]`, and
    /// fences `in_flight[frame]`. Presentation waits on
    /// `render_finished[image]`. Out-of-date/suboptimal present results and
    /// queued resize requests trigger recreation at this boundary; any
    /// other present failure is fatal. Finally the frame slot advances.
    pub fn submit_and_present(&mut self, ticket: &FrameTicket) -> RenderResult<()> {
        let frame = &self.per_frame[ticket.frame_index as usize];
        let image = &self.per_image[ticket.image_index as usize];

        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [image.render_finished.handle()];
        let command_buffers = [ticket.command_buffer];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .submit_graphics(&[submit_info], frame.in_flight.handle())?;
        }

        let present_result = self.swapchain.present(
            self.device.present_queue(),
            ticket.image_index,
            image.render_finished.handle(),
        );

        let needs_recreation = match present_result {
            Ok(suboptimal) => {
                if suboptimal {
                    warn!("Swapchain suboptimal during presentation; scheduling recreation");
                }
                suboptimal
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                info!("Present returned out-of-date; scheduling swapchain recreation");
                true
            }
            Err(vk::Result::SUBOPTIMAL_KHR) => {
                warn!("Present returned suboptimal; scheduling swapchain recreation");
                true
            }
            Err(e) => {
                error!("Failed to present swapchain image: {:?}", e);
                return Err(rtr_rhi::RhiError::VulkanError(e).into());
            }
        };

        if needs_recreation || self.framebuffer_resized {
            self.framebuffer_resized = false;
            self.device.wait_idle()?;
            self.recreate_swapchain_resources()?;
        }

        self.slots.advance();
        Ok(())
    }

    /// Records a resize request; the actual recreation happens at the next
    /// present boundary.
    pub fn on_window_resized(&mut self, width: u32, height: u32) {
        info!(
            "Window resized to ({width}, {height}); scheduling swapchain recreation"
        );
        self.surface_size = (width, height);
        self.framebuffer_resized = true;
    }

    /// Snapshot of the current swapchain identity.
    pub fn swapchain_state(&self) -> SwapchainState {
        SwapchainState {
            generation: self.generation,
            extent: self.swapchain.extent(),
            image_count: self.swapchain.image_count(),
            color_format: self.swapchain.format(),
            depth_format: self.depth_format,
        }
    }

    /// The current swapchain extent.
    #[inline]
    pub fn render_extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// The swapchain color format.
    #[inline]
    pub fn render_format(&self) -> vk::Format {
        self.swapchain.format()
    }

    /// The selected depth attachment format.
    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.swapchain.image_count()
    }

    /// The current frame slot index.
    #[inline]
    pub fn current_frame_index(&self) -> u32 {
        self.slots.current_frame() as u32
    }

    /// The swapchain image at `index`.
    #[inline]
    pub fn swapchain_image(&self, index: u32) -> vk::Image {
        self.swapchain.image(index as usize)
    }

    /// The swapchain image view at `index`.
    #[inline]
    pub fn swapchain_image_view(&self, index: u32) -> vk::ImageView {
        self.swapchain.image_view(index as usize)
    }

    /// Recreates swapchain, per-image and per-frame resources and bumps the
    /// generation.
    ///
    /// The caller must have waited for the device to go idle.
    fn recreate_swapchain_resources(&mut self) -> RenderResult<()> {
        let old_generation = self.generation;

        let (width, height) = self.surface_size;
        self.swapchain.recreate(width, height)?;

        // Sync objects may still be referenced by retired submissions only
        // before the wait-idle; rebuild them wholesale alongside the images.
        self.per_image = Self::create_per_image_resources(&self.device, self.swapchain.image_count())?;

        let old_frames = std::mem::take(&mut self.per_frame);
        let old_buffers: Vec<vk::CommandBuffer> =
            old_frames.iter().map(|f| f.command_buffer).collect();
        drop(old_frames);
        unsafe {
            self.command_pool.free_command_buffers(&old_buffers);
        }
        self.per_frame = Self::create_per_frame_resources(&self.device, &self.command_pool)?;

        self.generation += 1;
        info!(
            "Swapchain resources recreated (generation {} -> {})",
            old_generation, self.generation
        );
        Ok(())
    }

    fn create_per_frame_resources(
        device: &Arc<Device>,
        command_pool: &CommandPool,
    ) -> RenderResult<Vec<PerFrameResources>> {
        let command_buffers = command_pool.allocate_command_buffers(FRAMES_IN_FLIGHT as u32)?;

        let mut frames = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for (i, command_buffer) in command_buffers.into_iter().enumerate() {
            frames.push(PerFrameResources {
                command_buffer,
                image_available: Semaphore::new(device.clone())?,
                // Signaled so the first wait on this slot does not block
                in_flight: Fence::new(device.clone(), true)?,
            });
            debug!("Created frame slot {}", i);
        }

        Ok(frames)
    }

    fn create_per_image_resources(
        device: &Arc<Device>,
        image_count: u32,
    ) -> RenderResult<Vec<PerImageResources>> {
        let mut images = Vec::with_capacity(image_count as usize);
        for i in 0..image_count {
            images.push(PerImageResources {
                render_finished: Semaphore::new(device.clone())?,
            });
            debug!("Created image slot {}", i);
        }
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_slots_cycle_mod_n() {
        let mut slots = FrameSlots::new();
        assert_eq!(slots.current_frame(), 0);

        for i in 1..=(FRAMES_IN_FLIGHT * 3) {
            slots.advance();
            assert_eq!(slots.current_frame(), i % FRAMES_IN_FLIGHT);
        }
    }

    #[test]
    fn test_frame_slots_record_image_index() {
        let mut slots = FrameSlots::new();
        assert_eq!(slots.image_index(), 0);

        slots.set_image_index(2);
        assert_eq!(slots.image_index(), 2);

        // Advancing the frame slot does not clobber the image index
        slots.advance();
        assert_eq!(slots.image_index(), 2);
    }

    #[test]
    fn test_depth_format_candidate_order() {
        // The highest-precision depth-only format is probed first
        assert_eq!(DEPTH_FORMAT_CANDIDATES[0], vk::Format::D32_SFLOAT);
        assert_eq!(DEPTH_FORMAT_CANDIDATES[1], vk::Format::D32_SFLOAT_S8_UINT);
        assert_eq!(DEPTH_FORMAT_CANDIDATES[2], vk::Format::D24_UNORM_S8_UINT);
    }
}
