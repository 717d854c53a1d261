use muli3d_math::Vector4;

use crate::shader::{RegisterLayout, ShaderRegisters, VsOutput};

/// Interpolated values at a screen position: depth in `position.z`, `1/w` in `position.w`, and the
/// registers pre-multiplied by `1/w`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Interpolants {
    pub position: Vector4,
    pub registers: ShaderRegisters,
}

/// Screen-space partial derivatives of everything interpolated across a projected triangle.
#[derive(Clone, Debug)]
pub(crate) struct TriangleGradient {
    layout: RegisterLayout,
    base: Interpolants,
    ddx: Interpolants,
    ddy: Interpolants,
}

impl TriangleGradient {
    /// Solves for `d/dx` and `d/dy` of z, `1/w` and every declared register component.
    ///
    /// Returns `None` for triangles with no area in screen space.
    pub(crate) fn new(v0: &VsOutput, v1: &VsOutput, v2: &VsOutput, layout: RegisterLayout) -> Option<Self> {
        let dx0 = v1.position.x - v0.position.x;
        let dy0 = v1.position.y - v0.position.y;
        let dx1 = v2.position.x - v0.position.x;
        let dy1 = v2.position.y - v0.position.y;
        let area = dx0 * dy1 - dx1 * dy0;
        if area == 0.0 {
            return None;
        }
        let common = 1.0 / area;
        if !common.is_finite() {
            return None;
        }

        let solve = |f0: f32, f1: f32, f2: f32| {
            let df0 = f1 - f0;
            let df1 = f2 - f0;
            (
                (df0 * dy1 - df1 * dy0) * common,
                (df1 * dx0 - df0 * dx1) * common,
            )
        };

        let mut ddx = Interpolants::default();
        let mut ddy = Interpolants::default();
        for c in 2..4 {
            let (gx, gy) = solve(v0.position[c], v1.position[c], v2.position[c]);
            ddx.position[c] = gx;
            ddy.position[c] = gy;
        }
        layout.for_each_component(|i, c| {
            let (gx, gy) = solve(v0.registers[i][c], v1.registers[i][c], v2.registers[i][c]);
            ddx.registers[i][c] = gx;
            ddy.registers[i][c] = gy;
        });

        Some(Self {
            layout,
            base: Interpolants {
                position: v0.position,
                registers: v0.registers,
            },
            ddx,
            ddy,
        })
    }

    /// Gradient of a single screen-space edge from `a` to `b`, constant across the edge.
    ///
    /// Used to outline triangles that have no area. Returns `None` for zero-length edges.
    pub(crate) fn along_edge(a: &VsOutput, b: &VsOutput, layout: RegisterLayout) -> Option<Self> {
        let dx = b.position.x - a.position.x;
        let dy = b.position.y - a.position.y;
        let x_major = dx.abs() >= dy.abs();
        let length = if x_major { dx } else { dy };
        if length == 0.0 {
            return None;
        }
        let inv = 1.0 / length;

        let mut along = Interpolants::default();
        for c in 2..4 {
            along.position[c] = (b.position[c] - a.position[c]) * inv;
        }
        layout.for_each_component(|i, c| {
            along.registers[i][c] = (b.registers[i][c] - a.registers[i][c]) * inv;
        });
        let (ddx, ddy) = if x_major {
            (along, Interpolants::default())
        } else {
            (Interpolants::default(), along)
        };

        Some(Self {
            layout,
            base: Interpolants {
                position: a.position,
                registers: a.registers,
            },
            ddx,
            ddy,
        })
    }

    pub(crate) fn ddx(&self) -> &Interpolants {
        &self.ddx
    }

    pub(crate) fn ddy(&self) -> &Interpolants {
        &self.ddy
    }

    /// Values at screen position `(x, y)`.
    pub(crate) fn at(&self, x: f32, y: f32) -> Interpolants {
        let ox = x - self.base.position.x;
        let oy = y - self.base.position.y;
        let mut out = self.base;
        out.position = Vector4::new(
            x,
            y,
            self.base.position.z + self.ddx.position.z * ox + self.ddy.position.z * oy,
            self.base.position.w + self.ddx.position.w * ox + self.ddy.position.w * oy,
        );
        self.layout.add_scaled(&mut out.registers, &self.ddx.registers, ox);
        self.layout.add_scaled(&mut out.registers, &self.ddy.registers, oy);
        out
    }

    /// Advances `values` by one pixel along x.
    #[inline]
    pub(crate) fn step_x(&self, values: &mut Interpolants) {
        values.position.x += 1.0;
        values.position.z += self.ddx.position.z;
        values.position.w += self.ddx.position.w;
        self.layout.add_scaled(&mut values.registers, &self.ddx.registers, 1.0);
    }

    /// Perspective-corrected registers and `w` for `values`.
    #[inline]
    pub(crate) fn resolve(&self, values: &Interpolants, out: &mut ShaderRegisters) -> f32 {
        let w = 1.0 / values.position.w;
        *out = values.registers;
        self.layout.scale(out, w);
        w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::MAX_SHADER_REGISTERS;
    use crate::shader::ShaderRegType;

    fn vertex(x: f32, y: f32, f: impl Fn(f32, f32) -> f32) -> VsOutput {
        let mut v = VsOutput {
            position: Vector4::new(x, y, f(x, y) * 0.01, 1.0),
            ..VsOutput::default()
        };
        v.registers[1] = Vector4::new(f(x, y), 2.0 * f(x, y), 0.0, 0.0);
        v
    }

    fn layout() -> RegisterLayout {
        let mut types = [ShaderRegType::Unused; MAX_SHADER_REGISTERS];
        types[1] = ShaderRegType::Vector2;
        RegisterLayout::new(types)
    }

    #[test]
    fn recovers_affine_coefficients() {
        let f = |x: f32, y: f32| 3.0 * x - 0.5 * y + 7.0;
        let g = TriangleGradient::new(
            &vertex(10.0, 4.0, f),
            &vertex(30.0, 9.0, f),
            &vertex(14.0, 25.0, f),
            layout(),
        )
        .unwrap();

        assert!((g.ddx().registers[1].x - 3.0).abs() < 1e-4);
        assert!((g.ddy().registers[1].x + 0.5).abs() < 1e-4);
        assert!((g.ddx().registers[1].y - 6.0).abs() < 1e-4);
        assert!((g.ddy().registers[1].y + 1.0).abs() < 1e-4);
        assert!((g.ddx().position.z - 0.03).abs() < 1e-5);
        assert_eq!(g.ddx().position.w, 0.0);
        // Undeclared components are left alone.
        assert_eq!(g.ddx().registers[1].z, 0.0);
        assert_eq!(g.ddx().registers[0], Vector4::ZERO);
    }

    #[test]
    fn stepping_matches_direct_evaluation() {
        let f = |x: f32, y: f32| 0.25 * x + 2.0 * y;
        let g = TriangleGradient::new(
            &vertex(0.0, 0.0, f),
            &vertex(16.0, 0.0, f),
            &vertex(0.0, 16.0, f),
            layout(),
        )
        .unwrap();
        let mut stepped = g.at(2.0, 5.0);
        for _ in 0..4 {
            g.step_x(&mut stepped);
        }
        let direct = g.at(6.0, 5.0);
        assert!(stepped.registers[1].approx_eq(direct.registers[1], 1e-5));
        assert_eq!(direct.registers[1].x, f(6.0, 5.0));
    }

    #[test]
    fn degenerate_triangle_has_no_gradient() {
        let f = |_: f32, _: f32| 1.0;
        let g = TriangleGradient::new(
            &vertex(0.0, 0.0, f),
            &vertex(1.0, 1.0, f),
            &vertex(2.0, 2.0, f),
            layout(),
        );
        assert!(g.is_none());
    }

    #[test]
    fn edge_gradient_interpolates_between_endpoints() {
        let f = |x: f32, y: f32| x + 10.0 * y;
        let (a, b) = (vertex(2.0, 3.0, f), vertex(6.0, 11.0, f));
        let g = TriangleGradient::along_edge(&a, &b, layout()).unwrap();

        // y-major: the value only changes along y.
        assert_eq!(g.ddx().registers[1], Vector4::ZERO);
        let mid = g.at(4.0, 7.0);
        assert!((mid.registers[1].x - (f(2.0, 3.0) + f(6.0, 11.0)) * 0.5).abs() < 1e-4);
        assert!((g.at(6.0, 11.0).registers[1].x - f(6.0, 11.0)).abs() < 1e-4);

        assert!(TriangleGradient::along_edge(&a, &a, layout()).is_none());
    }
}
