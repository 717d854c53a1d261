use std::ops::Mul;

use bytemuck::{Pod, Zeroable};

use crate::Vector3;

/// Unit quaternion for rotations, stored as `(x, y, z, w)` with `w` the scalar part.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn from_axis_angle(axis: Vector3, angle: f32) -> Self {
        let axis = axis.normalize();
        let (s, c) = (angle * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            Self::IDENTITY
        } else {
            let inv = 1.0 / len;
            Self::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
        }
    }

    pub fn conjugate(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Rotates `v` by this (unit) quaternion.
    pub fn rotate(self, v: Vector3) -> Vector3 {
        let q = Vector3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }

    /// Spherical linear interpolation along the shortest arc.
    pub fn slerp(self, other: Self, t: f32) -> Self {
        let mut cos_theta = self.dot(other);
        let mut end = other;
        if cos_theta < 0.0 {
            cos_theta = -cos_theta;
            end = Self::new(-other.x, -other.y, -other.z, -other.w);
        }

        let (k0, k1) = if cos_theta > 0.9995 {
            (1.0 - t, t)
        } else {
            let theta = cos_theta.acos();
            let inv_sin = 1.0 / theta.sin();
            (((1.0 - t) * theta).sin() * inv_sin, (t * theta).sin() * inv_sin)
        };

        Self::new(
            self.x * k0 + end.x * k1,
            self.y * k0 + end.y * k1,
            self.z * k0 + end.z * k1,
            self.w * k0 + end.w * k1,
        )
        .normalize()
    }
}

/// Hamilton product; `a * b` applies `b` first, then `a`.
impl Mul for Quaternion {
    type Output = Self;
    fn mul(self, b: Self) -> Self {
        let a = self;
        Self::new(
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
        )
    }
}
