//! Mesh resource management.
//!
//! This crate owns the CPU-side mesh descriptions and their GPU uploads:
//! - [`MeshData`] - CPU mesh description (plus procedural primitives)
//! - [`Mesh`] - GPU vertex/index buffers
//! - [`ResourceManager`] - handle registry with first-use GPU upload and
//!   caching

mod error;
mod manager;
mod mesh;

pub use error::{ResourceError, ResourceResult};
pub use manager::ResourceManager;
pub use mesh::{Mesh, MeshData, MeshHandle};
