//! Platform abstraction layer for the rtr rendering framework.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation
//! - Required instance extension queries

mod window;

pub use window::{Surface, Window, get_required_extensions};

// Re-export winit types that users might need
pub use winit::event::{Event, WindowEvent};
pub use winit::event_loop::EventLoop;
