//! Math utilities and types
//!
//! Provides the math types the compiler needs for per-object transform data.
//! All matrices are column-major, which is also the byte order written into
//! the per-object matrix buffers.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Size in bytes of one packed 4x4 float matrix
pub const MAT4_SIZE: usize = 64;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Replace the scale of this transform
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Replace the rotation of this transform
    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Convert to a model matrix (translation * rotation * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

/// Normal matrix for a model matrix, padded to 4x4
///
/// Inverse-transpose of the upper 3x3 block. A singular block (zero scale on
/// some axis) falls back to the plain transpose so the buffer never holds NaNs.
pub fn normal_matrix(model: &Mat4) -> Mat4 {
    let upper: Mat3 = model.fixed_view::<3, 3>(0, 0).clone_owned();
    let normal = upper.try_inverse().unwrap_or(upper).transpose();
    normal.to_homogeneous()
}

/// Raw column-major bytes of a matrix, as uploaded to uniform buffers
pub fn matrix_bytes(matrix: &Mat4) -> &[u8] {
    bytemuck::cast_slice(matrix.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transform_matrix_translation() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let matrix = transform.to_matrix();
        assert_relative_eq!(matrix[(0, 3)], 1.0);
        assert_relative_eq!(matrix[(1, 3)], 2.0);
        assert_relative_eq!(matrix[(2, 3)], 3.0);
    }

    #[test]
    fn test_normal_matrix_undoes_non_uniform_scale() {
        let model = Transform::identity()
            .with_scale(Vec3::new(2.0, 1.0, 1.0))
            .to_matrix();
        let normal = normal_matrix(&model);
        assert_relative_eq!(normal[(0, 0)], 0.5);
        assert_relative_eq!(normal[(1, 1)], 1.0);
        assert_relative_eq!(normal[(3, 3)], 1.0);
        assert_relative_eq!(normal[(0, 3)], 0.0);
    }

    #[test]
    fn test_normal_matrix_singular_is_finite() {
        let model = Transform::identity()
            .with_scale(Vec3::new(0.0, 1.0, 1.0))
            .to_matrix();
        let normal = normal_matrix(&model);
        assert!(normal.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_matrix_bytes_are_column_major() {
        let matrix = Transform::from_position(Vec3::new(7.0, 0.0, 0.0)).to_matrix();
        let bytes = matrix_bytes(&matrix);
        assert_eq!(bytes.len(), MAT4_SIZE);
        // Translation x sits in column 3, row 0 -> element 12
        let x = f32::from_ne_bytes([bytes[48], bytes[49], bytes[50], bytes[51]]);
        assert_relative_eq!(x, 7.0);
    }
}
