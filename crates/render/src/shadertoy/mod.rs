//! Compute + present pipeline in the shadertoy style.

mod compute_pass;
mod pipeline;
mod present_pass;

pub use compute_pass::{ComputePass, ComputePassResources, ShaderToyUniform, dispatch_group_counts};
pub use pipeline::ShaderToyPipeline;
pub use present_pass::{PresentImagePass, PresentImagePassResources};
