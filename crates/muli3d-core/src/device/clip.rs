//! Polygon clipping, projection and back-face culling.

use muli3d_math::{Matrix44, Plane, Vector4};

use crate::limits::CLIP_VERTEX_ARENA_SIZE;
use crate::shader::{RegisterLayout, VsOutput};
use crate::state::CullMode;

/// Arena slots: the three input vertices plus every vertex clipping may create.
const ARENA_CAPACITY: usize = CLIP_VERTEX_ARENA_SIZE + 3;

/// Polygon being clipped, stored as indices into a fixed vertex arena.
///
/// The index lists of the current and the next stage are swapped after each plane.
#[derive(Debug)]
pub(crate) struct ClipPolygon {
    arena: [VsOutput; ARENA_CAPACITY],
    allocated: usize,
    indices: [usize; ARENA_CAPACITY],
    next: [usize; ARENA_CAPACITY],
    len: usize,
}

impl Default for ClipPolygon {
    fn default() -> Self {
        Self {
            arena: [VsOutput::default(); ARENA_CAPACITY],
            allocated: 0,
            indices: [0; ARENA_CAPACITY],
            next: [0; ARENA_CAPACITY],
            len: 0,
        }
    }
}

impl ClipPolygon {
    pub fn reset(&mut self, triangle: &[VsOutput; 3]) {
        self.arena[..3].copy_from_slice(triangle);
        self.allocated = 3;
        self.indices[..3].copy_from_slice(&[0, 1, 2]);
        self.len = 3;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn vertex(&self, i: usize) -> &VsOutput {
        &self.arena[self.indices[i]]
    }

    #[inline]
    pub fn vertex_mut(&mut self, i: usize) -> &mut VsOutput {
        &mut self.arena[self.indices[i]]
    }

    /// Clips against the half-space where `distance >= 0` (Sutherland-Hodgman).
    ///
    /// Returns the new vertex count. The polygon is emptied if the arena overflows.
    pub fn clip(&mut self, layout: &RegisterLayout, distance: impl Fn(&VsOutput) -> f32) -> usize {
        if self.len == 0 {
            return 0;
        }

        let mut out = 0;
        for i in 0..self.len {
            let a = self.indices[i];
            let b = self.indices[(i + 1) % self.len];
            let da = distance(&self.arena[a]);
            let db = distance(&self.arena[b]);

            if da >= 0.0 {
                self.next[out] = a;
                out += 1;
            }
            // A vertex on the plane is its own intersection.
            if (da > 0.0 && db < 0.0) || (da < 0.0 && db > 0.0) {
                if self.allocated == ARENA_CAPACITY {
                    debug_assert!(false, "clip vertex arena exhausted");
                    tracing::error!(capacity = ARENA_CAPACITY, "clip vertex arena exhausted, dropping triangle");
                    self.len = 0;
                    return 0;
                }
                let t = da / (da - db);
                let (va, vb) = (self.arena[a], self.arena[b]);
                let slot = self.allocated;
                self.allocated += 1;
                interpolate(&va, &vb, t, layout, &mut self.arena[slot]);
                self.next[out] = slot;
                out += 1;
            }
        }

        std::mem::swap(&mut self.indices, &mut self.next);
        self.len = out;
        out
    }

    /// Twice the signed area of the polygon in the xy plane (shoelace formula).
    ///
    /// Positive for clockwise polygons once projected to screen space, where y grows downwards.
    pub fn winding(&self) -> f32 {
        (0..self.len)
            .map(|i| {
                let p = self.vertex(i).position;
                let q = self.vertex((i + 1) % self.len).position;
                p.x * q.y - q.x * p.y
            })
            .sum()
    }
}

/// Linear interpolation of position and declared registers between two shaded vertices.
pub(crate) fn interpolate(a: &VsOutput, b: &VsOutput, t: f32, layout: &RegisterLayout, out: &mut VsOutput) {
    out.source = a.source;
    out.position = a.position.lerp(b.position, t);
    layout.lerp(&a.registers, &b.registers, t, &mut out.registers);
}

/// Distance to a clip-space plane.
#[inline]
pub(crate) fn clip_space_distance(plane: &Plane, v: &VsOutput) -> f32 {
    plane.dot4(v.position)
}

/// Distance to a screen-space plane `a*x + b*y + d`.
#[inline]
pub(crate) fn screen_space_distance(plane: &Plane, v: &VsOutput) -> f32 {
    plane.a * v.position.x + plane.b * v.position.y + plane.d
}

/// Perspective divide and viewport transform.
///
/// Afterwards `position.w` holds `1/w` and the declared registers are multiplied by `1/w`, so that
/// everything can be interpolated linearly in screen space.
pub(crate) fn project(v: &mut VsOutput, viewport: &Matrix44, layout: &RegisterLayout) {
    let inv_w = 1.0 / v.position.w;
    let ndc = Vector4::new(
        v.position.x * inv_w,
        v.position.y * inv_w,
        v.position.z * inv_w,
        1.0,
    );
    let screen = ndc * *viewport;
    v.position = Vector4::new(screen.x, screen.y, screen.z, inv_w);
    layout.scale(&mut v.registers, inv_w);
}

/// Whether a projected polygon with the given [`ClipPolygon::winding`] faces away for `mode`.
pub(crate) fn is_culled(mode: CullMode, winding: f32) -> bool {
    match mode {
        CullMode::None => false,
        CullMode::Cw => winding > 0.0,
        CullMode::Ccw => winding < 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::MAX_SHADER_REGISTERS;
    use crate::shader::ShaderRegType;
    use crate::state::ClipPlane;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn layout() -> RegisterLayout {
        let mut types = [ShaderRegType::Unused; MAX_SHADER_REGISTERS];
        types[0] = ShaderRegType::Vector4;
        RegisterLayout::new(types)
    }

    fn vertex(x: f32, y: f32, z: f32, w: f32) -> VsOutput {
        let mut v = VsOutput {
            position: Vector4::new(x, y, z, w),
            ..VsOutput::default()
        };
        v.registers[0] = Vector4::new(x, y, z, w);
        v
    }

    fn polygon(tri: [VsOutput; 3]) -> ClipPolygon {
        let mut p = ClipPolygon::default();
        p.reset(&tri);
        p
    }

    #[test]
    fn inside_triangle_is_unchanged() {
        let tri = [
            vertex(-0.5, -0.5, 0.5, 1.0),
            vertex(0.5, -0.5, 0.5, 1.0),
            vertex(0.0, 0.5, 0.5, 1.0),
        ];
        let mut p = polygon(tri);
        for plane in ClipPlane::ALL {
            let plane = plane.default_plane();
            assert_eq!(p.clip(&layout(), |v| clip_space_distance(&plane, v)), 3);
        }
        for (i, v) in tri.iter().enumerate() {
            assert_eq!(p.vertex(i), v);
        }
    }

    #[test]
    fn outside_triangle_is_removed() {
        let mut p = polygon([
            vertex(-0.5, -0.5, 2.0, 1.0),
            vertex(0.5, -0.5, 3.0, 1.0),
            vertex(0.0, 0.5, 2.5, 1.0),
        ]);
        let far = ClipPlane::Far.default_plane();
        assert_eq!(p.clip(&layout(), |v| clip_space_distance(&far, v)), 0);
    }

    #[test]
    fn crossing_edge_is_split_at_the_plane() {
        // x = 2 is outside the right plane (-x + w >= 0).
        let mut p = polygon([
            vertex(0.0, 0.0, 0.5, 1.0),
            vertex(2.0, 0.0, 0.5, 1.0),
            vertex(0.0, 1.0, 0.5, 1.0),
        ]);
        let right = ClipPlane::Right.default_plane();
        assert_eq!(p.clip(&layout(), |v| clip_space_distance(&right, v)), 4);

        let expected = [
            Vector4::new(0.0, 0.0, 0.5, 1.0),
            Vector4::new(1.0, 0.0, 0.5, 1.0),
            Vector4::new(1.0, 0.5, 0.5, 1.0),
            Vector4::new(0.0, 1.0, 0.5, 1.0),
        ];
        for (i, e) in expected.iter().enumerate() {
            assert!(p.vertex(i).position.approx_eq(*e, 1e-6), "vertex {i}");
            // Registers travel with the position.
            assert!(p.vertex(i).registers[0].approx_eq(*e, 1e-6));
        }
    }

    #[test]
    fn vertex_on_the_plane_is_not_duplicated() {
        // The second vertex sits exactly on the right plane, the third is outside it.
        let tri = [
            vertex(-0.5, -0.5, 0.5, 1.0),
            vertex(1.0, -0.5, 0.5, 1.0),
            vertex(2.0, 0.8, 0.5, 1.0),
        ];
        let mut p = polygon(tri);
        let winding = p.winding();
        let right = ClipPlane::Right.default_plane();
        assert_eq!(p.clip(&layout(), |v| clip_space_distance(&right, v)), 3);

        assert_eq!(p.vertex(0), &tri[0]);
        assert_eq!(p.vertex(1), &tri[1]);
        assert!(p.vertex(2).position.approx_eq(Vector4::new(1.0, 0.28, 0.5, 1.0), 1e-5));
        // The clipped polygon keeps the orientation of the triangle.
        assert!(p.winding() * winding > 0.0);
    }

    #[test]
    fn projection_stores_reciprocal_w() {
        let mut v = vertex(2.0, -2.0, 1.0, 4.0);
        v.registers[0] = Vector4::new(8.0, 4.0, 2.0, 1.0);
        let viewport = Matrix44::viewport(0.0, 0.0, 100.0, 50.0, 0.0, 1.0);
        project(&mut v, &viewport, &layout());

        assert_eq!(v.position, Vector4::new(75.0, 37.5, 0.25, 0.25));
        assert_eq!(v.registers[0], Vector4::new(2.0, 1.0, 0.5, 0.25));
    }

    #[test]
    fn cull_table() {
        // Clockwise on screen (y down).
        let cw = [
            Vector4::new(0.0, 0.0, 0.0, 1.0),
            Vector4::new(10.0, 0.0, 0.0, 1.0),
            Vector4::new(0.0, 10.0, 0.0, 1.0),
        ];
        let ccw = [cw[0], cw[2], cw[1]];
        let cases = [
            (CullMode::None, cw, false),
            (CullMode::None, ccw, false),
            (CullMode::Cw, cw, true),
            (CullMode::Cw, ccw, false),
            (CullMode::Ccw, cw, false),
            (CullMode::Ccw, ccw, true),
        ];
        for (mode, tri, expected) in cases {
            let p = polygon(tri.map(|position| VsOutput {
                position,
                ..VsOutput::default()
            }));
            assert_eq!(is_culled(mode, p.winding()), expected, "{mode:?}");
        }
    }

    fn coord() -> impl Strategy<Value = f32> {
        -3.0f32..3.0
    }

    proptest! {
        #[test]
        fn clipped_vertices_lie_inside_every_plane(
            pts in proptest::array::uniform3((coord(), coord(), coord())),
        ) {
            let tri = pts.map(|(x, y, z)| vertex(x, y, z, 1.0));
            let mut p = polygon(tri);
            let planes = ClipPlane::ALL.map(|c| c.default_plane());
            for plane in &planes {
                p.clip(&layout(), |v| clip_space_distance(plane, v));
            }
            prop_assert!(p.len() == 0 || p.len() >= 3);
            prop_assert!(p.len() <= 9);
            for i in 0..p.len() {
                for plane in &planes {
                    prop_assert!(clip_space_distance(plane, p.vertex(i)) >= -1e-4);
                }
            }

            // Convex: every turn along the outline goes the same way, or is straight.
            let n = p.len();
            let turns: Vec<f32> = (0..n)
                .map(|i| {
                    let a = p.vertex(i).position;
                    let b = p.vertex((i + 1) % n).position;
                    let c = p.vertex((i + 2) % n).position;
                    (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x)
                })
                .collect();
            prop_assert!(
                turns.iter().all(|&t| t >= -1e-4) || turns.iter().all(|&t| t <= 1e-4),
                "{turns:?}"
            );
        }

        #[test]
        fn on_plane_vertices_keep_the_winding(
            (y0, y2) in (coord(), coord()),
            x2 in 1.1f32..3.0,
        ) {
            // Second vertex on the right plane, third beyond it.
            let tri = [
                vertex(-0.5, y0, 0.5, 1.0),
                vertex(1.0, -0.5, 0.5, 1.0),
                vertex(x2, y2, 0.5, 1.0),
            ];
            let mut p = polygon(tri);
            let winding = p.winding();
            prop_assume!(winding.abs() > 1e-3);
            let right = ClipPlane::Right.default_plane();
            prop_assert_eq!(p.clip(&layout(), |v| clip_space_distance(&right, v)), 3);
            for i in 0..3 {
                let next = p.vertex((i + 1) % 3).position;
                prop_assert!(p.vertex(i).position != next, "duplicate vertex {}", i);
            }
            prop_assert!(p.winding() * winding > 0.0);
        }
    }
}
