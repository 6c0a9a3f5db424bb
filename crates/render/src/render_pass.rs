//! Render pass contract.
//!
//! A render pass is a named unit of GPU work with declared resource
//! dependencies over symbolic names. The dependencies are declarative only:
//! every pass records its own barriers explicitly today, but the
//! declarations give a future scheduler enough information to infer them.

use crate::error::RenderResult;
use crate::frame_context::FrameContext;

/// How a pass accesses a declared resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceAccess {
    /// The pass only reads the resource.
    Read,
    /// The pass only writes the resource.
    Write,
    /// The pass reads and writes the resource.
    ReadWrite,
}

/// A declared dependency of a pass on a symbolically named resource.
#[derive(Clone, Copy, Debug)]
pub struct ResourceDependency {
    /// Symbolic resource name, matching the frame registry keys.
    pub name: &'static str,
    /// Access mode.
    pub access: ResourceAccess,
}

impl ResourceDependency {
    /// Declares a read dependency.
    pub const fn read(name: &'static str) -> Self {
        Self {
            name,
            access: ResourceAccess::Read,
        }
    }

    /// Declares a write dependency.
    pub const fn write(name: &'static str) -> Self {
        Self {
            name,
            access: ResourceAccess::Write,
        }
    }

    /// Declares a read-write dependency.
    pub const fn read_write(name: &'static str) -> Self {
        Self {
            name,
            access: ResourceAccess::ReadWrite,
        }
    }
}

/// A named unit of GPU work.
///
/// `Resources` carries the per-execution inputs (images, descriptor sets,
/// pipeline handles); it borrows tracked layouts, hence the lifetime
/// parameter. [`execute`](Self::execute) validates before recording so a
/// pass never records against incomplete resources.
pub trait RenderPass {
    /// Per-execution resource bundle.
    type Resources<'a>;

    /// Stable pass name for diagnostics.
    fn name(&self) -> &'static str;

    /// Declared resource dependencies.
    fn dependencies(&self) -> &[ResourceDependency];

    /// Validates the resource bundle before any command is recorded.
    fn validate(&self, _resources: &Self::Resources<'_>) -> RenderResult<()> {
        Ok(())
    }

    /// Records the pass into the frame's command buffer.
    fn record(&mut self, ctx: &mut FrameContext, resources: Self::Resources<'_>)
    -> RenderResult<()>;

    /// Validates and records.
    fn execute(
        &mut self,
        ctx: &mut FrameContext,
        resources: Self::Resources<'_>,
    ) -> RenderResult<()> {
        self.validate(&resources)?;
        self.record(ctx, resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_constructors() {
        let read = ResourceDependency::read("offscreen_color");
        assert_eq!(read.name, "offscreen_color");
        assert_eq!(read.access, ResourceAccess::Read);

        let write = ResourceDependency::write("swapchain");
        assert_eq!(write.access, ResourceAccess::Write);

        let rw = ResourceDependency::read_write("depth");
        assert_eq!(rw.access, ResourceAccess::ReadWrite);
    }
}
