//! Muli3D: a CPU-only programmable rasterizer.
//!
//! This crate re-exports the math primitives and the device so applications depend on a single
//! package.

pub use muli3d_core::*;
pub use muli3d_math::{lerp, Matrix44, Plane, Quaternion, Vector2, Vector3, Vector4, EPSILON};
