//! Integration tests for the mesh resource registry.
//!
//! GPU uploads need a Vulkan device, so these tests cover the CPU-side
//! contract: registration, handle identity, and lazy-upload bookkeeping.

use rtr_resources::{MeshData, MeshHandle, ResourceManager};

#[test]
fn test_register_and_track_meshes() {
    let manager = ResourceManager::new();

    let triangle = manager.register_mesh(MeshData::triangle());
    let cube = manager.register_mesh(MeshData::cube());

    assert!(triangle.is_valid());
    assert!(cube.is_valid());
    assert_ne!(triangle, cube);

    // Nothing touches the GPU until a pipeline asks for the mesh
    assert!(!manager.is_uploaded(triangle));
    assert!(!manager.is_uploaded(cube));
}

#[test]
fn test_null_handle_is_never_uploaded() {
    let manager = ResourceManager::new();
    assert!(!MeshHandle::default().is_valid());
    assert!(!manager.is_uploaded(MeshHandle::default()));
}

#[test]
fn test_primitive_meshes_are_well_formed() {
    for data in [MeshData::triangle(), MeshData::cube()] {
        data.validate().expect("primitive mesh should validate");
        assert!(data.indices.len() % 3 == 0);
        let max_index = *data.indices.iter().max().unwrap();
        assert!((max_index as usize) < data.vertices.len());
    }
}
