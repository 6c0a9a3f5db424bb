//! Render-pipeline runtime.
//!
//! This crate owns the swapchain-facing frame loop and the pipeline
//! abstraction built on top of it:
//! - [`FrameScheduler`] - frame/image synchronization, swapchain recreation
//! - [`RenderPipeline`] - the pipeline contract plus swapchain-change
//!   tracking
//! - [`FrameContext`] - the per-frame facade handed to render passes
//! - [`ForwardPipeline`] / [`ShaderToyPipeline`] - the built-in pipelines
//! - [`Renderer`] - the top-level orchestrator and one-shot compute path

mod error;

pub mod color_source;
pub mod forward;
pub mod frame_context;
pub mod frame_scheduler;
pub mod pipeline;
pub mod render_pass;
pub mod renderer;
pub mod resource_state;
pub mod scene_targets;
pub mod shadertoy;

pub use color_source::{FrameColorSource, FrameColorSourceView, SceneViewportSink};
pub use error::{RenderError, RenderResult};
pub use forward::{ForwardPipeline, ForwardSceneView, ForwardSceneViewBuilder};
pub use frame_context::{FrameContext, FrameResourceRegistry};
pub use frame_scheduler::{FrameScheduler, FrameTicket, SwapchainState};
pub use pipeline::{PipelineRuntime, RenderPipeline, SwapchainChangeSummary, SwapchainTracker};
pub use render_pass::{RenderPass, ResourceAccess, ResourceDependency};
pub use renderer::{ComputeJob, Renderer};
pub use resource_state::{FrameTrackedImage, TrackedImage};
pub use scene_targets::SceneTargets;
pub use shadertoy::ShaderToyPipeline;

pub use rtr_rhi::FRAMES_IN_FLIGHT;
