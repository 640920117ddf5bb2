//! Math type aliases and small helpers.
//!
//! Stored mesh data uses plain arrays (`[f32; 3]`, `[f32; 16]`) so it stays
//! serializable and `bytemuck`-friendly. Geometry code converts to these
//! nalgebra aliases when it needs vector arithmetic.

pub use nalgebra;

/// 3D vector (f32).
pub type Vec3 = nalgebra::Vector3<f32>;

/// 4x4 matrix (f32).
pub type Mat4 = nalgebra::Matrix4<f32>;

/// Column-major identity matrix as a flat array.
pub const MAT4_IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

/// Convert a `[x, y, z]` array to a [`Vec3`].
#[inline]
pub fn vec3(a: [f32; 3]) -> Vec3 {
    Vec3::new(a[0], a[1], a[2])
}

/// Convert a [`Vec3`] to a `[x, y, z]` array.
#[inline]
pub fn to_array3(v: &Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

/// Convert a column-major flat array to a [`Mat4`].
pub fn mat4_from_cols_array(a: &[f32; 16]) -> Mat4 {
    Mat4::from_column_slice(a)
}

/// Convert a [`Mat4`] to a column-major flat array.
pub fn mat4_to_cols_array(m: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    out.copy_from_slice(m.as_slice());
    out
}
