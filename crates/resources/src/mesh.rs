//! Mesh data and GPU mesh resources.
//!
//! [`MeshData`] is the CPU-side description a caller registers with the
//! [`ResourceManager`](crate::ResourceManager); [`Mesh`] is the uploaded GPU
//! resource the forward pass draws from.

use std::sync::Arc;

use ash::vk;
use glam::{Vec2, Vec3};
use tracing::debug;

use rtr_rhi::buffer::{Buffer, BufferUsage};
use rtr_rhi::device::Device;
use rtr_rhi::vertex::Vertex;

use crate::error::{ResourceError, ResourceResult};

/// Opaque handle identifying a mesh registered with the resource manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

impl MeshHandle {
    /// Returns true when the handle refers to a registered mesh slot.
    ///
    /// Handle 0 is reserved as the null handle.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

/// CPU-side mesh description: interleaved vertices plus a u32 index list.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    /// Interleaved vertex data.
    pub vertices: Vec<Vertex>,
    /// Triangle-list indices into `vertices`.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Validates the mesh data before upload.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh is empty, the index count is not a
    /// multiple of 3, or an index is out of bounds.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(ResourceError::InvalidMeshData(
                "mesh has no vertices or indices".to_string(),
            ));
        }
        if !self.indices.len().is_multiple_of(3) {
            return Err(ResourceError::InvalidMeshData(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertices.len() as u32;
        if let Some(&bad) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(ResourceError::InvalidMeshData(format!(
                "index {} out of bounds for {} vertices",
                bad, vertex_count
            )));
        }
        Ok(())
    }

    /// A unit triangle in the XY plane, facing -Z.
    pub fn triangle() -> Self {
        let normal = Vec3::new(0.0, 0.0, -1.0);
        Self {
            vertices: vec![
                Vertex::new(Vec3::new(0.0, -0.5, 0.0), Vec2::new(0.5, 0.0), normal),
                Vertex::new(Vec3::new(0.5, 0.5, 0.0), Vec2::new(1.0, 1.0), normal),
                Vertex::new(Vec3::new(-0.5, 0.5, 0.0), Vec2::new(0.0, 1.0), normal),
            ],
            indices: vec![0, 1, 2],
        }
    }

    /// A unit cube centered at the origin with per-face normals.
    pub fn cube() -> Self {
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            // (normal, tangent u, tangent v)
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (face, (normal, u, v)) in faces.iter().enumerate() {
            let origin = *normal * 0.5;
            let corners = [
                origin - *u * 0.5 - *v * 0.5,
                origin + *u * 0.5 - *v * 0.5,
                origin + *u * 0.5 + *v * 0.5,
                origin - *u * 0.5 + *v * 0.5,
            ];
            let uvs = [
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ];
            let base = (face * 4) as u32;
            for (corner, uv) in corners.iter().zip(uvs.iter()) {
                vertices.push(Vertex::new(*corner, *uv, *normal));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self { vertices, indices }
    }
}

/// GPU mesh resource: vertex and index buffers plus the vertex input
/// description the graphics pipeline consumes.
pub struct Mesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl Mesh {
    /// Uploads mesh data to the GPU.
    ///
    /// # Errors
    ///
    /// Returns an error if validation or buffer creation fails.
    pub fn upload(device: Arc<Device>, data: &MeshData) -> ResourceResult<Self> {
        data.validate()?;

        let vertex_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&data.vertices),
        )?;

        let index_buffer = Buffer::new_with_data(
            device,
            BufferUsage::Index,
            bytemuck::cast_slice(&data.indices),
        )?;

        debug!(
            "Uploaded mesh: {} vertices, {} indices",
            data.vertices.len(),
            data.indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
        })
    }

    /// Returns the vertex buffer handle.
    #[inline]
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Returns the index buffer handle (u32 indices).
    #[inline]
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Returns the number of indices to draw.
    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Returns the vertex input state shared by every mesh.
    pub fn vertex_input_state() -> (
        vk::VertexInputBindingDescription,
        [vk::VertexInputAttributeDescription; 3],
    ) {
        (
            Vertex::binding_description(),
            Vertex::attribute_descriptions(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_handle_validity() {
        assert!(!MeshHandle::default().is_valid());
        assert!(!MeshHandle(0).is_valid());
        assert!(MeshHandle(1).is_valid());
    }

    #[test]
    fn test_triangle_mesh_is_valid() {
        let data = MeshData::triangle();
        assert!(data.validate().is_ok());
        assert_eq!(data.vertices.len(), 3);
        assert_eq!(data.indices.len(), 3);
    }

    #[test]
    fn test_cube_mesh_is_valid() {
        let data = MeshData::cube();
        assert!(data.validate().is_ok());
        assert_eq!(data.vertices.len(), 24);
        assert_eq!(data.indices.len(), 36);
    }

    #[test]
    fn test_cube_normals_are_unit_length() {
        let data = MeshData::cube();
        for vertex in &data.vertices {
            assert!((vertex.normal.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_empty_mesh_is_rejected() {
        let data = MeshData::default();
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_non_triangle_index_count_is_rejected() {
        let mut data = MeshData::triangle();
        data.indices.push(0);
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_out_of_bounds_index_is_rejected() {
        let mut data = MeshData::triangle();
        data.indices[0] = 42;
        assert!(data.validate().is_err());
    }
}
