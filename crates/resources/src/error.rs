//! Resource-specific error types.

use thiserror::Error;

/// Resource management error type.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// A mesh handle did not resolve to a registered mesh
    #[error("Invalid mesh handle: {0}")]
    InvalidMeshHandle(u64),

    /// Mesh data failed validation before upload
    #[error("Invalid mesh data: {0}")]
    InvalidMeshData(String),

    /// GPU upload failed
    #[error(transparent)]
    Rhi(#[from] rtr_rhi::RhiError),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = std::result::Result<T, ResourceError>;
