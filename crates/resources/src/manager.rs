//! Resource manager with first-use GPU upload.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use rtr_rhi::device::Device;

use crate::error::{ResourceError, ResourceResult};
use crate::mesh::{Mesh, MeshData, MeshHandle};

/// Registry of CPU mesh data with cached GPU uploads.
///
/// Callers register [`MeshData`] up front and pass [`MeshHandle`]s through
/// the scene description; the render pipeline requests the GPU mesh at
/// record time via [`require_mesh_gpu`](Self::require_mesh_gpu), which
/// performs the upload on first use and returns the cached resource
/// afterwards.
///
/// # Thread Safety
///
/// Interior state is guarded by mutexes so the manager can be shared as
/// `Arc<ResourceManager>`; the renderer still assumes a single owner thread.
pub struct ResourceManager {
    /// Registered CPU mesh descriptions, keyed by handle value.
    mesh_data: Mutex<HashMap<u64, MeshData>>,
    /// Uploaded GPU meshes, keyed by handle value.
    gpu_meshes: Mutex<HashMap<u64, Arc<Mesh>>>,
    /// Next handle value; 0 is reserved as the null handle.
    next_handle: Mutex<u64>,
}

impl ResourceManager {
    /// Creates an empty resource manager.
    pub fn new() -> Self {
        Self {
            mesh_data: Mutex::new(HashMap::new()),
            gpu_meshes: Mutex::new(HashMap::new()),
            next_handle: Mutex::new(1),
        }
    }

    /// Registers CPU mesh data and returns its handle.
    ///
    /// The data is not uploaded until the first
    /// [`require_mesh_gpu`](Self::require_mesh_gpu) call for the handle.
    pub fn register_mesh(&self, data: MeshData) -> MeshHandle {
        let mut next = self.next_handle.lock().unwrap();
        let handle = MeshHandle(*next);
        *next += 1;

        self.mesh_data.lock().unwrap().insert(handle.0, data);
        debug!("Registered mesh data as handle {}", handle.0);
        handle
    }

    /// Returns the GPU mesh for `handle`, uploading it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is invalid/unknown or the upload
    /// fails.
    pub fn require_mesh_gpu(
        &self,
        handle: MeshHandle,
        device: &Arc<Device>,
    ) -> ResourceResult<Arc<Mesh>> {
        if !handle.is_valid() {
            return Err(ResourceError::InvalidMeshHandle(handle.0));
        }

        if let Some(mesh) = self.gpu_meshes.lock().unwrap().get(&handle.0) {
            return Ok(mesh.clone());
        }

        let data = {
            let registry = self.mesh_data.lock().unwrap();
            registry
                .get(&handle.0)
                .cloned()
                .ok_or(ResourceError::InvalidMeshHandle(handle.0))?
        };

        let mesh = Arc::new(Mesh::upload(device.clone(), &data)?);
        self.gpu_meshes
            .lock()
            .unwrap()
            .insert(handle.0, mesh.clone());

        info!("Uploaded mesh for handle {} on first use", handle.0);
        Ok(mesh)
    }

    /// Returns whether a GPU upload has happened for `handle`.
    pub fn is_uploaded(&self, handle: MeshHandle) -> bool {
        self.gpu_meshes.lock().unwrap().contains_key(&handle.0)
    }

    /// Drops all cached GPU meshes.
    ///
    /// The caller must ensure the GPU is idle first (`device.wait_idle()`).
    pub fn clear_gpu_cache(&self) {
        self.gpu_meshes.lock().unwrap().clear();
        debug!("Cleared GPU mesh cache");
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_assigns_distinct_valid_handles() {
        let manager = ResourceManager::new();
        let a = manager.register_mesh(MeshData::triangle());
        let b = manager.register_mesh(MeshData::cube());

        assert!(a.is_valid());
        assert!(b.is_valid());
        assert_ne!(a, b);
    }

    #[test]
    fn test_nothing_uploaded_before_first_use() {
        let manager = ResourceManager::new();
        let handle = manager.register_mesh(MeshData::triangle());
        assert!(!manager.is_uploaded(handle));
    }

    #[test]
    fn test_manager_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ResourceManager>();
    }
}
