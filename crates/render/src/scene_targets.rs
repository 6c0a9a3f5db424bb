//! Scene render-target lifecycle.
//!
//! Pipelines that render offscreen keep their targets (color + depth per
//! frame slot) behind a [`SceneTargets`] controller. The controller decides
//! when targets must be rebuilt - viewport override changed, swapchain
//! extent changed, formats changed - and serializes the rebuild with
//! `device.wait_idle()` so retired images can drop safely through RAII.

use ash::vk;
use tracing::debug;

use rtr_rhi::device::Device;

use crate::error::{RenderError, RenderResult};

fn is_valid_extent(extent: vk::Extent2D) -> bool {
    extent.width > 0 && extent.height > 0
}

/// Pure decision state for the scene target extent.
///
/// Tracks the requested viewport override and the dirty bit; contains no
/// GPU state so the recreate conditions are unit-testable.
#[derive(Debug, Default)]
pub struct ViewportPolicy {
    requested: Option<vk::Extent2D>,
    dirty: bool,
}

impl ViewportPolicy {
    /// Creates a policy with no viewport override.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a scene viewport extent.
    ///
    /// Zero-dimension requests are ignored; re-requesting the current value
    /// does not set the dirty bit. Returns whether the request changed
    /// anything.
    pub fn set_viewport_extent(&mut self, width: u32, height: u32) -> bool {
        let extent = vk::Extent2D { width, height };
        if !is_valid_extent(extent) {
            return false;
        }
        if self.requested == Some(extent) {
            return false;
        }
        self.requested = Some(extent);
        self.dirty = true;
        true
    }

    /// Marks the targets dirty (swapchain extent changed).
    pub fn on_swapchain_extent_changed(&mut self) {
        self.dirty = true;
    }

    /// Marks the targets dirty unconditionally (e.g. format change).
    pub fn request_recreate(&mut self) {
        self.dirty = true;
    }

    /// Returns the viewport override when set, else the fallback.
    pub fn desired_extent(&self, fallback: vk::Extent2D) -> vk::Extent2D {
        self.requested.unwrap_or(fallback)
    }

    /// Returns the dirty bit.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

/// Owner of per-frame scene targets of type `T`.
///
/// `T` typically bundles one offscreen color image and one depth image per
/// frame slot. Targets are created lazily on first
/// [`ensure`](Self::ensure) and rebuilt whenever the policy or the desired
/// extent changes.
pub struct SceneTargets<T> {
    label: &'static str,
    policy: ViewportPolicy,
    extent: vk::Extent2D,
    targets: Option<T>,
    recreated_this_frame: bool,
}

impl<T> SceneTargets<T> {
    /// Creates an empty controller.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            policy: ViewportPolicy::new(),
            extent: vk::Extent2D {
                width: 0,
                height: 0,
            },
            targets: None,
            recreated_this_frame: false,
        }
    }

    /// Requests a scene viewport extent (ignored when a dimension is zero;
    /// idempotent for repeated values).
    pub fn set_viewport_extent(&mut self, width: u32, height: u32) {
        if self.policy.set_viewport_extent(width, height) {
            debug!(
                "[{}] scene viewport extent requested: {}x{}",
                self.label, width, height
            );
        }
    }

    /// Marks the targets dirty after a swapchain extent change.
    pub fn on_swapchain_extent_changed(&mut self) {
        self.policy.on_swapchain_extent_changed();
    }

    /// Marks the targets dirty unconditionally.
    pub fn request_recreate(&mut self) {
        self.policy.request_recreate();
    }

    /// The extent of the current targets (zero before the first `ensure`).
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Current targets, if any.
    pub fn get(&self) -> Option<&T> {
        self.targets.as_ref()
    }

    /// Current targets, mutable, if any.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.targets.as_mut()
    }

    /// Whether the last `ensure` call recreated the targets.
    pub fn recreated_this_frame(&self) -> bool {
        self.recreated_this_frame
    }

    /// Ensures targets exist at the desired extent, rebuilding when needed.
    ///
    /// The desired extent is the viewport override when set, else
    /// `fallback` (the swapchain extent). Rebuilding waits for the device
    /// to go idle, drops the old targets, then invokes `create`.
    ///
    /// # Errors
    ///
    /// Fails when `fallback` is degenerate, on wait-idle failure, or when
    /// `create` fails.
    pub fn ensure<F>(
        &mut self,
        device: &Device,
        fallback: vk::Extent2D,
        create: F,
    ) -> RenderResult<&mut T>
    where
        F: FnOnce(vk::Extent2D) -> RenderResult<T>,
    {
        if !is_valid_extent(fallback) {
            return Err(RenderError::InvalidPassResources {
                pass: self.label,
                reason: "fallback extent is zero",
            });
        }

        self.recreated_this_frame = false;
        let desired = self.policy.desired_extent(fallback);

        let needs_recreate = self.policy.is_dirty()
            || self.targets.is_none()
            || self.extent.width != desired.width
            || self.extent.height != desired.height;

        if needs_recreate {
            // Old targets may still be referenced by in-flight frames
            device.wait_idle().map_err(RenderError::Rhi)?;
            self.targets = None;

            let new_targets = create(desired)?;
            self.targets = Some(new_targets);
            self.extent = desired;
            self.policy.clear_dirty();
            self.recreated_this_frame = true;
            debug!(
                "[{}] scene targets recreated at {}x{}",
                self.label, desired.width, desired.height
            );
        }

        Ok(self.targets.as_mut().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: vk::Extent2D = vk::Extent2D {
        width: 1280,
        height: 720,
    };

    #[test]
    fn test_policy_ignores_zero_dimensions() {
        let mut policy = ViewportPolicy::new();
        assert!(!policy.set_viewport_extent(0, 600));
        assert!(!policy.set_viewport_extent(800, 0));
        assert!(!policy.is_dirty());
        assert_eq!(policy.desired_extent(FALLBACK), FALLBACK);
    }

    #[test]
    fn test_policy_set_is_idempotent() {
        let mut policy = ViewportPolicy::new();
        assert!(policy.set_viewport_extent(800, 600));
        assert!(policy.is_dirty());

        policy.clear_dirty();
        // Same extent again: no dirty flag, no change
        assert!(!policy.set_viewport_extent(800, 600));
        assert!(!policy.is_dirty());
    }

    #[test]
    fn test_policy_override_beats_fallback() {
        let mut policy = ViewportPolicy::new();
        policy.set_viewport_extent(800, 600);
        assert_eq!(
            policy.desired_extent(FALLBACK),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn test_policy_swapchain_change_sets_dirty() {
        let mut policy = ViewportPolicy::new();
        policy.on_swapchain_extent_changed();
        assert!(policy.is_dirty());
    }

    #[test]
    fn test_scene_targets_start_empty() {
        let targets: SceneTargets<Vec<u32>> = SceneTargets::new("test");
        assert!(targets.get().is_none());
        assert_eq!(targets.extent().width, 0);
        assert!(!targets.recreated_this_frame());
    }
}
