//! Render-core error types.

use thiserror::Error;

/// Error type for the render-pipeline runtime.
///
/// Invariant violations (unbound collaborators, capacity overruns, double
/// binding) are fatal: the record path never swallows them, they propagate
/// through the [`Renderer`](crate::Renderer) to the owner. Transient
/// swapchain states (out-of-date/suboptimal) are handled inside the frame
/// scheduler and never surface as errors.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Vulkan/RHI failure
    #[error(transparent)]
    Rhi(#[from] rtr_rhi::RhiError),

    /// Mesh resource failure
    #[error(transparent)]
    Resource(#[from] rtr_resources::ResourceError),

    /// Platform or framework-core failure
    #[error(transparent)]
    Core(#[from] rtr_core::Error),

    /// `draw_frame` was called before `set_pipeline`
    #[error("no render pipeline is bound; call set_pipeline() first")]
    NoPipelineBound,

    /// `set_pipeline` was called while a pipeline is already bound
    #[error("render pipeline is immutable once bound and cannot be replaced")]
    PipelineAlreadyBound,

    /// A pipeline needed its resource manager before `render`
    #[error("resource manager must be bound before render()")]
    MissingResourceManager,

    /// A pipeline needed its scene view before `render`
    #[error("scene view must be set before render()")]
    MissingSceneView,

    /// `prepare_frame` ran without a scene view provider
    #[error("no scene view provider is bound; there is no active scene")]
    MissingSceneProvider,

    /// More renderables were submitted than the preallocated capacity
    #[error("renderable count {count} exceeds preallocated capacity {max}")]
    RenderableCapacityExceeded { count: usize, max: usize },

    /// Shader root was not configured via runtime, RTR_SHADER_ROOT, or the
    /// compile-time default
    #[error("shader root directory is not configured")]
    ShaderRootUnset,

    /// A render pass received incomplete or invalid resources
    #[error("{pass} pass resources are invalid: {reason}")]
    InvalidPassResources {
        pass: &'static str,
        reason: &'static str,
    },

    /// A frame-registry lookup failed
    #[error("{kind} resource not found: '{name}' (frame {frame})")]
    ResourceNotFound {
        kind: &'static str,
        name: String,
        frame: u32,
    },

    /// A frame-registry name collided across scopes
    #[error("{kind} resource name conflict: '{name}'")]
    ResourceConflict { kind: &'static str, name: String },

    /// A `ComputeJob::wait` exceeded its timeout
    #[error("compute job wait timed out")]
    ComputeWaitTimeout,
}

/// Result type alias for render-core operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
