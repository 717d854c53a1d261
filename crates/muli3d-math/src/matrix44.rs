use std::ops::{Mul, MulAssign};

use bytemuck::{Pod, Zeroable};

use crate::{Quaternion, Vector3};

/// Row-major 4x4 matrix (`m[row][column]`), used with row vectors.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Matrix44 {
    pub m: [[f32; 4]; 4],
}

impl Default for Matrix44 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix44 {
    pub const IDENTITY: Self = Self {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    #[inline]
    pub const fn from_rows(m: [[f32; 4]; 4]) -> Self {
        Self { m }
    }

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut out = Self::IDENTITY;
        out.m[3] = [x, y, z, 1.0];
        out
    }

    pub fn scaling(x: f32, y: f32, z: f32) -> Self {
        let mut out = Self::IDENTITY;
        out.m[0][0] = x;
        out.m[1][1] = y;
        out.m[2][2] = z;
        out
    }

    pub fn rotation_x(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, c, s, 0.0],
            [0.0, -s, c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotation_y(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_rows([
            [c, 0.0, -s, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [s, 0.0, c, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn rotation_z(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_rows([
            [c, s, 0.0, 0.0],
            [-s, c, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Rotation about an arbitrary axis (normalized internally).
    pub fn rotation_axis(axis: Vector3, angle: f32) -> Self {
        Self::from_quaternion(&Quaternion::from_axis_angle(axis, angle))
    }

    pub fn from_quaternion(q: &Quaternion) -> Self {
        let (x, y, z, w) = (q.x, q.y, q.z, q.w);
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);
        Self::from_rows([
            [1.0 - 2.0 * (yy + zz), 2.0 * (xy + wz), 2.0 * (xz - wy), 0.0],
            [2.0 * (xy - wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz + wx), 0.0],
            [2.0 * (xz + wy), 2.0 * (yz - wx), 1.0 - 2.0 * (xx + yy), 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// Left-handed perspective projection mapping view depth `[near, far]` to `[0, 1]`.
    pub fn perspective_fov_lh(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let y_scale = 1.0 / (fov_y * 0.5).tan();
        let x_scale = y_scale / aspect;
        let q = far / (far - near);
        Self::from_rows([
            [x_scale, 0.0, 0.0, 0.0],
            [0.0, y_scale, 0.0, 0.0],
            [0.0, 0.0, q, 1.0],
            [0.0, 0.0, -near * q, 0.0],
        ])
    }

    /// Left-handed orthographic projection mapping view depth `[near, far]` to `[0, 1]`.
    pub fn orthographic_lh(width: f32, height: f32, near: f32, far: f32) -> Self {
        Self::from_rows([
            [2.0 / width, 0.0, 0.0, 0.0],
            [0.0, 2.0 / height, 0.0, 0.0],
            [0.0, 0.0, 1.0 / (far - near), 0.0],
            [0.0, 0.0, near / (near - far), 1.0],
        ])
    }

    pub fn look_at_lh(eye: Vector3, at: Vector3, up: Vector3) -> Self {
        let z = (at - eye).normalize();
        let x = up.cross(z).normalize();
        let y = z.cross(x);
        Self::from_rows([
            [x.x, y.x, z.x, 0.0],
            [x.y, y.y, z.y, 0.0],
            [x.z, y.z, z.z, 0.0],
            [-x.dot(eye), -y.dot(eye), -z.dot(eye), 1.0],
        ])
    }

    /// Maps normalized device coordinates to the pixel rectangle `(x, y, width, height)` and depth
    /// to `[min_z, max_z]`. Screen-space y grows downwards.
    pub fn viewport(x: f32, y: f32, width: f32, height: f32, min_z: f32, max_z: f32) -> Self {
        let half_w = width * 0.5;
        let half_h = height * 0.5;
        Self::from_rows([
            [half_w, 0.0, 0.0, 0.0],
            [0.0, -half_h, 0.0, 0.0],
            [0.0, 0.0, max_z - min_z, 0.0],
            [x + half_w, y + half_h, min_z, 1.0],
        ])
    }

    pub fn transpose(&self) -> Self {
        let mut out = Self::IDENTITY;
        for r in 0..4 {
            for c in 0..4 {
                out.m[r][c] = self.m[c][r];
            }
        }
        out
    }

    pub fn determinant(&self) -> f32 {
        let (_, det) = self.adjugate();
        det
    }

    /// Returns `None` for singular matrices.
    pub fn inverse(&self) -> Option<Self> {
        let (adj, det) = self.adjugate();
        if det.abs() <= f32::EPSILON * f32::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let mut out = adj;
        for row in out.m.iter_mut() {
            for v in row.iter_mut() {
                *v *= inv_det;
            }
        }
        Some(out)
    }

    // Adjugate (transposed cofactor matrix) together with the determinant.
    fn adjugate(&self) -> (Self, f32) {
        let a = &self.m;
        let s0 = a[0][0] * a[1][1] - a[1][0] * a[0][1];
        let s1 = a[0][0] * a[1][2] - a[1][0] * a[0][2];
        let s2 = a[0][0] * a[1][3] - a[1][0] * a[0][3];
        let s3 = a[0][1] * a[1][2] - a[1][1] * a[0][2];
        let s4 = a[0][1] * a[1][3] - a[1][1] * a[0][3];
        let s5 = a[0][2] * a[1][3] - a[1][2] * a[0][3];

        let c5 = a[2][2] * a[3][3] - a[3][2] * a[2][3];
        let c4 = a[2][1] * a[3][3] - a[3][1] * a[2][3];
        let c3 = a[2][1] * a[3][2] - a[3][1] * a[2][2];
        let c2 = a[2][0] * a[3][3] - a[3][0] * a[2][3];
        let c1 = a[2][0] * a[3][2] - a[3][0] * a[2][2];
        let c0 = a[2][0] * a[3][1] - a[3][0] * a[2][1];

        let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;

        let adj = Self::from_rows([
            [
                a[1][1] * c5 - a[1][2] * c4 + a[1][3] * c3,
                -a[0][1] * c5 + a[0][2] * c4 - a[0][3] * c3,
                a[3][1] * s5 - a[3][2] * s4 + a[3][3] * s3,
                -a[2][1] * s5 + a[2][2] * s4 - a[2][3] * s3,
            ],
            [
                -a[1][0] * c5 + a[1][2] * c2 - a[1][3] * c1,
                a[0][0] * c5 - a[0][2] * c2 + a[0][3] * c1,
                -a[3][0] * s5 + a[3][2] * s2 - a[3][3] * s1,
                a[2][0] * s5 - a[2][2] * s2 + a[2][3] * s1,
            ],
            [
                a[1][0] * c4 - a[1][1] * c2 + a[1][3] * c0,
                -a[0][0] * c4 + a[0][1] * c2 - a[0][3] * c0,
                a[3][0] * s4 - a[3][1] * s2 + a[3][3] * s0,
                -a[2][0] * s4 + a[2][1] * s2 - a[2][3] * s0,
            ],
            [
                -a[1][0] * c3 + a[1][1] * c1 - a[1][2] * c0,
                a[0][0] * c3 - a[0][1] * c1 + a[0][2] * c0,
                -a[3][0] * s3 + a[3][1] * s1 - a[3][2] * s0,
                a[2][0] * s3 - a[2][1] * s1 + a[2][2] * s0,
            ],
        ]);
        (adj, det)
    }

    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(other.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Mul for Matrix44 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut out = Self { m: [[0.0; 4]; 4] };
        for r in 0..4 {
            for c in 0..4 {
                out.m[r][c] = (0..4).map(|k| self.m[r][k] * rhs.m[k][c]).sum();
            }
        }
        out
    }
}

impl MulAssign for Matrix44 {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Matrix44;
    use crate::{Vector3, Vector4, EPSILON};

    #[test]
    fn inverse_of_affine_transform_round_trips() {
        let m = Matrix44::rotation_y(0.7) * Matrix44::scaling(2.0, 3.0, 0.5) * Matrix44::translation(4.0, -1.0, 2.0);
        let inv = m.inverse().expect("matrix is invertible");
        assert!((m * inv).approx_eq(&Matrix44::IDENTITY, EPSILON));
        assert!((inv * m).approx_eq(&Matrix44::IDENTITY, EPSILON));
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        assert!(Matrix44::scaling(1.0, 0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let m = Matrix44::translation(1.0, 2.0, 3.0).transpose();
        assert_eq!(m.m[0][3], 1.0);
        assert_eq!(m.m[1][3], 2.0);
        assert_eq!(m.m[2][3], 3.0);
    }

    #[test]
    fn viewport_maps_ndc_corners_to_pixels() {
        let vp = Matrix44::viewport(0.0, 0.0, 64.0, 32.0, 0.0, 1.0);
        assert_eq!(Vector4::new(-1.0, 1.0, 0.0, 1.0) * vp, Vector4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(Vector4::new(1.0, -1.0, 1.0, 1.0) * vp, Vector4::new(64.0, 32.0, 1.0, 1.0));
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth() {
        let proj = Matrix44::perspective_fov_lh(std::f32::consts::FRAC_PI_2, 1.0, 1.0, 10.0);
        let near = Vector3::new(0.0, 0.0, 1.0).transform_coord(&proj);
        let far = Vector3::new(0.0, 0.0, 10.0).transform_coord(&proj);
        assert!(near.z.abs() < EPSILON);
        assert!((far.z - 1.0).abs() < EPSILON);
    }

    #[test]
    fn look_at_moves_eye_to_origin() {
        let view = Matrix44::look_at_lh(Vector3::new(0.0, 0.0, -5.0), Vector3::ZERO, Vector3::UNIT_Y);
        let eye = Vector3::new(0.0, 0.0, -5.0).transform_coord(&view);
        assert!(eye.approx_eq(Vector3::ZERO, EPSILON));
        let target = Vector3::ZERO.transform_coord(&view);
        assert!(target.approx_eq(Vector3::new(0.0, 0.0, 5.0), EPSILON));
    }
}
