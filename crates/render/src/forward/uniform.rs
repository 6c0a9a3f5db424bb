//! Per-object uniform payload.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Packs a matrix into 16 floats in row-major order.
///
/// The shaders declare their uniform blocks `row_major`, so every matrix is
/// packed this way regardless of glam's column-major storage.
#[inline]
pub fn pack_mat4_row_major(m: Mat4) -> [f32; 16] {
    m.transpose().to_cols_array()
}

/// Per-object uniform block, bound at set 0 binding 0 of the forward
/// pipeline.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes, row-major)
/// - Offset 64: view matrix (64 bytes, row-major)
/// - Offset 128: projection matrix (64 bytes, row-major)
/// - Offset 192: normal matrix (64 bytes, row-major)
/// - Offset 256: base color (16 bytes)
/// - Total size: 272 bytes; every field sits on a 16-byte boundary
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ObjectUniform {
    /// Object-to-world matrix.
    pub model: [f32; 16],
    /// World-to-view matrix.
    pub view: [f32; 16],
    /// View-to-clip matrix (Y already flipped for Vulkan).
    pub proj: [f32; 16],
    /// Normal matrix.
    pub normal: [f32; 16],
    /// Base color.
    pub base_color: [f32; 4],
}

impl ObjectUniform {
    /// Size of the block in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;
    use std::mem::offset_of;

    #[test]
    fn test_object_uniform_size() {
        // 4 matrices (4 * 64) + vec4 (16) = 272 bytes
        assert_eq!(ObjectUniform::SIZE, 272);
    }

    #[test]
    fn test_object_uniform_field_offsets_are_16_aligned() {
        assert_eq!(offset_of!(ObjectUniform, model), 0);
        assert_eq!(offset_of!(ObjectUniform, view), 64);
        assert_eq!(offset_of!(ObjectUniform, proj), 128);
        assert_eq!(offset_of!(ObjectUniform, normal), 192);
        assert_eq!(offset_of!(ObjectUniform, base_color), 256);
    }

    #[test]
    fn test_pack_mat4_row_major_identity() {
        assert_eq!(
            pack_mat4_row_major(Mat4::IDENTITY),
            Mat4::IDENTITY.to_cols_array()
        );
    }

    #[test]
    fn test_pack_mat4_row_major_transposes() {
        // A translation keeps its column in glam's storage; packed row-major
        // the translation lands in the last column of each row instead.
        let m = Mat4::from_cols(
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(5.0, 6.0, 7.0, 1.0),
        );

        let packed = pack_mat4_row_major(m);

        // Row 0 = [1, 0, 0, 5]
        assert_eq!(&packed[0..4], &[1.0, 0.0, 0.0, 5.0]);
        // Row 3 = [0, 0, 0, 1]
        assert_eq!(&packed[12..16], &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_object_uniform_pod_roundtrip() {
        let uniform = ObjectUniform {
            base_color: [0.2, 0.7, 0.9, 1.0],
            ..Default::default()
        };
        let bytes = bytemuck::bytes_of(&uniform);
        assert_eq!(bytes.len(), ObjectUniform::SIZE);

        let back: &ObjectUniform = bytemuck::from_bytes(bytes);
        assert_eq!(back.base_color, [0.2, 0.7, 0.9, 1.0]);
    }
}
