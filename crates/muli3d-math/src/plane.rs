use bytemuck::{Pod, Zeroable};

use crate::{Vector3, Vector4};

/// Plane `a*x + b*y + c*z + d*w = 0`.
///
/// Points with a non-negative distance lie on the "inside" half-space; the clipper keeps them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Plane {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl Plane {
    #[inline]
    pub const fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self { a, b, c, d }
    }

    /// Plane through `point` with the given normal (pointing to the inside).
    pub fn from_point_normal(point: Vector3, normal: Vector3) -> Self {
        Self::new(normal.x, normal.y, normal.z, -normal.dot(point))
    }

    /// Plane through three points, inside on the side the clockwise winding faces.
    pub fn from_points(p0: Vector3, p1: Vector3, p2: Vector3) -> Self {
        let normal = (p1 - p0).cross(p2 - p0).normalize();
        Self::from_point_normal(p0, normal)
    }

    #[inline]
    pub fn normal(&self) -> Vector3 {
        Vector3::new(self.a, self.b, self.c)
    }

    /// Signed distance of a homogeneous point (4D dot product).
    #[inline]
    pub fn dot4(&self, p: Vector4) -> f32 {
        self.a * p.x + self.b * p.y + self.c * p.z + self.d * p.w
    }

    /// Signed distance of a 3D point (`w = 1`).
    #[inline]
    pub fn dot_coord(&self, p: Vector3) -> f32 {
        self.a * p.x + self.b * p.y + self.c * p.z + self.d
    }

    /// Scales the plane so its normal has unit length.
    pub fn normalize(self) -> Self {
        let len = self.normal().length();
        if len == 0.0 {
            self
        } else {
            let inv = 1.0 / len;
            Self::new(self.a * inv, self.b * inv, self.c * inv, self.d * inv)
        }
    }
}

impl From<Plane> for Vector4 {
    fn from(p: Plane) -> Self {
        Vector4::new(p.a, p.b, p.c, p.d)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Plane;
    use crate::{Vector3, Vector4};

    #[test]
    fn point_normal_plane_distances() {
        let p = Plane::from_point_normal(Vector3::new(0.0, 2.0, 0.0), Vector3::UNIT_Y);
        assert_eq!(p.dot_coord(Vector3::new(5.0, 3.0, -1.0)), 1.0);
        assert_eq!(p.dot_coord(Vector3::new(0.0, 0.0, 0.0)), -2.0);
    }

    #[test]
    fn homogeneous_distance_scales_d_by_w() {
        // -x + w >= 0 is the right clip plane.
        let right = Plane::new(-1.0, 0.0, 0.0, 1.0);
        assert_eq!(right.dot4(Vector4::new(0.5, 0.0, 0.0, 1.0)), 0.5);
        assert_eq!(right.dot4(Vector4::new(3.0, 0.0, 0.0, 2.0)), -1.0);
    }
}
