//! Value types shared by the rasterizer core: vectors, matrices, quaternions and planes.
//!
//! Matrices follow the row-vector convention of the fixed-function API the core mirrors: a point is
//! transformed as `v * M`, and translation lives in the fourth row.

mod matrix44;
mod plane;
mod quaternion;
mod vector2;
mod vector3;
mod vector4;

pub use matrix44::Matrix44;
pub use plane::Plane;
pub use quaternion::Quaternion;
pub use vector2::Vector2;
pub use vector3::Vector3;
pub use vector4::Vector4;

/// Tolerance used by the `approx_eq` helpers.
pub const EPSILON: f32 = 1e-5;

/// Linear interpolation `a + (b - a) * t`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
