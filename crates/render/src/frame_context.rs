//! Per-frame facade and resource registry.
//!
//! [`FrameContext`] is what the renderer hands to the active pipeline for
//! one frame: the recording command buffer, the acquired swapchain image,
//! the render extent, the frame slot index, and a typed registry of
//! symbolically named per-frame resources.

use std::collections::HashMap;

use ash::vk;

use rtr_rhi::FRAMES_IN_FLIGHT;
use rtr_rhi::command::CommandBuffer;

use crate::error::{RenderError, RenderResult};

/// Typed name→handle registry with per-frame and global scopes.
///
/// Names must be unique across scopes: registering a per-frame resource
/// under a name that exists globally (or vice versa) is an error, so a
/// lookup never silently shadows.
struct TypedRegistry<T: Copy> {
    kind: &'static str,
    per_frame: Vec<HashMap<String, T>>,
    global: HashMap<String, T>,
}

impl<T: Copy> TypedRegistry<T> {
    fn new(kind: &'static str, frames: usize) -> Self {
        Self {
            kind,
            per_frame: (0..frames).map(|_| HashMap::new()).collect(),
            global: HashMap::new(),
        }
    }

    fn clear_frame(&mut self, frame: usize) {
        if let Some(map) = self.per_frame.get_mut(frame) {
            map.clear();
        }
    }

    fn set_frame(&mut self, frame: usize, name: &str, value: T) -> RenderResult<()> {
        if self.global.contains_key(name) {
            return Err(RenderError::ResourceConflict {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        self.per_frame[frame].insert(name.to_string(), value);
        Ok(())
    }

    fn set_global(&mut self, name: &str, value: T) -> RenderResult<()> {
        if self.per_frame.iter().any(|map| map.contains_key(name)) {
            return Err(RenderError::ResourceConflict {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        self.global.insert(name.to_string(), value);
        Ok(())
    }

    fn get(&self, frame: usize, name: &str) -> RenderResult<T> {
        if let Some(value) = self.per_frame.get(frame).and_then(|map| map.get(name)) {
            return Ok(*value);
        }
        if let Some(value) = self.global.get(name) {
            return Ok(*value);
        }
        Err(RenderError::ResourceNotFound {
            kind: self.kind,
            name: name.to_string(),
            frame: frame as u32,
        })
    }

    fn has(&self, frame: usize, name: &str) -> bool {
        self.per_frame
            .get(frame)
            .is_some_and(|map| map.contains_key(name))
            || self.global.contains_key(name)
    }
}

/// Per-frame resource registry with typed lookups for buffers, descriptor
/// sets and image views.
///
/// Pipelines publish their per-frame resources here under the symbolic
/// names their passes declare as dependencies; the per-frame scope is
/// cleared by the renderer at the start of every frame.
pub struct FrameResourceRegistry {
    buffers: TypedRegistry<vk::Buffer>,
    descriptor_sets: TypedRegistry<vk::DescriptorSet>,
    image_views: TypedRegistry<vk::ImageView>,
}

impl FrameResourceRegistry {
    /// Creates a registry sized for `frames` frame slots.
    pub fn new(frames: usize) -> Self {
        Self {
            buffers: TypedRegistry::new("buffer", frames),
            descriptor_sets: TypedRegistry::new("descriptor set", frames),
            image_views: TypedRegistry::new("image view", frames),
        }
    }

    /// Clears the per-frame scope of one frame slot.
    pub fn clear_frame(&mut self, frame: usize) {
        self.buffers.clear_frame(frame);
        self.descriptor_sets.clear_frame(frame);
        self.image_views.clear_frame(frame);
    }

    /// Registers a per-frame buffer.
    pub fn set_frame_buffer(
        &mut self,
        frame: usize,
        name: &str,
        buffer: vk::Buffer,
    ) -> RenderResult<()> {
        self.buffers.set_frame(frame, name, buffer)
    }

    /// Registers a global buffer.
    pub fn set_global_buffer(&mut self, name: &str, buffer: vk::Buffer) -> RenderResult<()> {
        self.buffers.set_global(name, buffer)
    }

    /// Looks up a buffer, per-frame scope first, then global.
    pub fn buffer(&self, frame: usize, name: &str) -> RenderResult<vk::Buffer> {
        self.buffers.get(frame, name)
    }

    /// Returns whether a buffer is visible for the frame.
    pub fn has_buffer(&self, frame: usize, name: &str) -> bool {
        self.buffers.has(frame, name)
    }

    /// Registers a per-frame descriptor set.
    pub fn set_frame_descriptor_set(
        &mut self,
        frame: usize,
        name: &str,
        set: vk::DescriptorSet,
    ) -> RenderResult<()> {
        self.descriptor_sets.set_frame(frame, name, set)
    }

    /// Looks up a descriptor set, per-frame scope first, then global.
    pub fn descriptor_set(&self, frame: usize, name: &str) -> RenderResult<vk::DescriptorSet> {
        self.descriptor_sets.get(frame, name)
    }

    /// Registers a per-frame image view.
    pub fn set_frame_image_view(
        &mut self,
        frame: usize,
        name: &str,
        view: vk::ImageView,
    ) -> RenderResult<()> {
        self.image_views.set_frame(frame, name, view)
    }

    /// Looks up an image view, per-frame scope first, then global.
    pub fn image_view(&self, frame: usize, name: &str) -> RenderResult<vk::ImageView> {
        self.image_views.get(frame, name)
    }

    /// Returns whether an image view is visible for the frame.
    pub fn has_image_view(&self, frame: usize, name: &str) -> bool {
        self.image_views.has(frame, name)
    }
}

impl Default for FrameResourceRegistry {
    fn default() -> Self {
        Self::new(FRAMES_IN_FLIGHT)
    }
}

/// Per-frame facade passed into the active pipeline's `render`.
pub struct FrameContext<'a> {
    cmd: CommandBuffer,
    swapchain_image: vk::Image,
    swapchain_image_view: vk::ImageView,
    render_extent: vk::Extent2D,
    frame_index: u32,
    registry: &'a mut FrameResourceRegistry,
}

impl<'a> FrameContext<'a> {
    /// Builds the context for one frame.
    pub fn new(
        cmd: CommandBuffer,
        swapchain_image: vk::Image,
        swapchain_image_view: vk::ImageView,
        render_extent: vk::Extent2D,
        frame_index: u32,
        registry: &'a mut FrameResourceRegistry,
    ) -> Self {
        Self {
            cmd,
            swapchain_image,
            swapchain_image_view,
            render_extent,
            frame_index,
            registry,
        }
    }

    /// The command buffer this frame records into.
    #[inline]
    pub fn cmd(&self) -> &CommandBuffer {
        &self.cmd
    }

    /// The acquired swapchain image.
    #[inline]
    pub fn swapchain_image(&self) -> vk::Image {
        self.swapchain_image
    }

    /// The view over the acquired swapchain image.
    #[inline]
    pub fn swapchain_image_view(&self) -> vk::ImageView {
        self.swapchain_image_view
    }

    /// The swapchain extent for this frame.
    #[inline]
    pub fn render_extent(&self) -> vk::Extent2D {
        self.render_extent
    }

    /// The frame slot index in `[0, FRAMES_IN_FLIGHT)`.
    #[inline]
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// The per-frame resource registry.
    #[inline]
    pub fn registry(&self) -> &FrameResourceRegistry {
        self.registry
    }

    /// The per-frame resource registry, mutable.
    #[inline]
    pub fn registry_mut(&mut self) -> &mut FrameResourceRegistry {
        self.registry
    }

    /// Looks up a buffer visible to this frame.
    pub fn buffer(&self, name: &str) -> RenderResult<vk::Buffer> {
        self.registry.buffer(self.frame_index as usize, name)
    }

    /// Looks up a descriptor set visible to this frame.
    pub fn descriptor_set(&self, name: &str) -> RenderResult<vk::DescriptorSet> {
        self.registry
            .descriptor_set(self.frame_index as usize, name)
    }

    /// Looks up an image view visible to this frame.
    pub fn image_view(&self, name: &str) -> RenderResult<vk::ImageView> {
        self.registry.image_view(self.frame_index as usize, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn test_frame_lookup_prefers_frame_scope() {
        let mut registry = FrameResourceRegistry::new(2);
        registry
            .set_global_buffer("shared", vk::Buffer::from_raw(1))
            .unwrap();
        registry
            .set_frame_buffer(0, "ubo", vk::Buffer::from_raw(2))
            .unwrap();

        assert_eq!(registry.buffer(0, "ubo").unwrap(), vk::Buffer::from_raw(2));
        assert_eq!(
            registry.buffer(1, "shared").unwrap(),
            vk::Buffer::from_raw(1)
        );
        // Frame 1 never registered "ubo"
        assert!(registry.buffer(1, "ubo").is_err());
    }

    #[test]
    fn test_scope_conflicts_are_rejected() {
        let mut registry = FrameResourceRegistry::new(2);
        registry
            .set_global_buffer("name", vk::Buffer::from_raw(1))
            .unwrap();
        assert!(matches!(
            registry.set_frame_buffer(0, "name", vk::Buffer::from_raw(2)),
            Err(RenderError::ResourceConflict { .. })
        ));

        let mut registry = FrameResourceRegistry::new(2);
        registry
            .set_frame_buffer(1, "name", vk::Buffer::from_raw(2))
            .unwrap();
        assert!(matches!(
            registry.set_global_buffer("name", vk::Buffer::from_raw(1)),
            Err(RenderError::ResourceConflict { .. })
        ));
    }

    #[test]
    fn test_clear_frame_only_clears_one_slot() {
        let mut registry = FrameResourceRegistry::new(2);
        registry
            .set_frame_image_view(0, "color", vk::ImageView::from_raw(7))
            .unwrap();
        registry
            .set_frame_image_view(1, "color", vk::ImageView::from_raw(8))
            .unwrap();

        registry.clear_frame(0);

        assert!(!registry.has_image_view(0, "color"));
        assert!(registry.has_image_view(1, "color"));
    }

    #[test]
    fn test_missing_lookup_reports_kind_and_frame() {
        let registry = FrameResourceRegistry::new(2);
        let err = registry.descriptor_set(1, "missing").unwrap_err();
        match err {
            RenderError::ResourceNotFound { kind, name, frame } => {
                assert_eq!(kind, "descriptor set");
                assert_eq!(name, "missing");
                assert_eq!(frame, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_reregistering_after_clear_is_allowed() {
        let mut registry = FrameResourceRegistry::new(2);
        registry
            .set_frame_buffer(0, "ubo", vk::Buffer::from_raw(1))
            .unwrap();
        registry.clear_frame(0);
        assert!(
            registry
                .set_frame_buffer(0, "ubo", vk::Buffer::from_raw(2))
                .is_ok()
        );
    }
}
