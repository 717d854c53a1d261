//! Triangle refinement before clipping.
//!
//! New vertices are made by interpolating the vertex-shader *inputs* of their parents and shading
//! the result again, so every leaf is an ordinary shaded triangle for [`RenderPass::draw_triangle`].

use muli3d_math::{Vector3, Vector4, EPSILON};

use crate::error::Result;
use crate::limits::MAX_SHADER_REGISTERS;
use crate::shader::{ShaderRegisters, VsOutput};
use crate::state::SubdivisionMode;

use super::pass::RenderPass;

/// Children of a triangle split at its edge midpoints, in the parent's winding.
#[inline]
fn split(v: &[VsOutput; 3], m01: VsOutput, m12: VsOutput, m20: VsOutput) -> [[VsOutput; 3]; 4] {
    [
        [v[0], m01, m20],
        [m01, v[1], m12],
        [m20, m12, v[2]],
        [m01, m12, m20],
    ]
}

impl RenderPass<'_> {
    /// Entry point for every assembled triangle.
    pub fn process_triangle(&mut self, tri: [VsOutput; 3]) -> Result<()> {
        self.targets.stats.triangles_assembled += 1;
        let sub = self.inputs.info.states.subdivision;
        match sub.mode {
            SubdivisionMode::None => self.draw_triangle(tri),
            SubdivisionMode::Simple => self.subdivide(&tri, sub.levels, false),
            SubdivisionMode::Smooth => self.subdivide(&tri, sub.levels, true),
            SubdivisionMode::Adaptive => self.subdivide_adaptive(&tri),
        }
    }

    /// Vertex-shades a new vertex built from interpolated inputs.
    fn shade_source(&mut self, source: ShaderRegisters) -> VsOutput {
        let mut out = VsOutput {
            source,
            ..VsOutput::default()
        };
        self.inputs.shade(&mut out, self.targets.stats);
        out
    }

    fn midpoint(&mut self, a: &VsOutput, b: &VsOutput, smooth: bool) -> VsOutput {
        let mut source = [Vector4::ZERO; MAX_SHADER_REGISTERS];
        for (dst, (ra, rb)) in source.iter_mut().zip(a.source.iter().zip(b.source.iter())) {
            *dst = ra.lerp(*rb, 0.5);
        }
        if smooth {
            let sub = &self.inputs.info.states.subdivision;
            let (pr, nr) = (sub.position_register as usize, sub.normal_register as usize);
            let (position, normal) = smooth_midpoint(
                a.source[pr].xyz(),
                a.source[nr].xyz(),
                b.source[pr].xyz(),
                b.source[nr].xyz(),
            );
            source[pr] = Vector4::from_vec3(position, source[pr].w);
            source[nr] = Vector4::from_vec3(normal, source[nr].w);
        }
        self.shade_source(source)
    }

    /// Splits `levels` times into four, yielding `4^levels` leaves.
    fn subdivide(&mut self, tri: &[VsOutput; 3], levels: u32, smooth: bool) -> Result<()> {
        if levels == 0 {
            return self.draw_triangle(*tri);
        }
        let m01 = self.midpoint(&tri[0], &tri[1], smooth);
        let m12 = self.midpoint(&tri[1], &tri[2], smooth);
        let m20 = self.midpoint(&tri[2], &tri[0], smooth);
        for child in split(tri, m01, m12, m20) {
            self.subdivide(&child, levels - 1, smooth)?;
        }
        Ok(())
    }

    /// Fans the triangle around its centroid with every outer edge split `levels` deep, then
    /// refines the resulting triangles while their projected area exceeds the threshold.
    fn subdivide_adaptive(&mut self, tri: &[VsOutput; 3]) -> Result<()> {
        let mut source = [Vector4::ZERO; MAX_SHADER_REGISTERS];
        for (i, dst) in source.iter_mut().enumerate() {
            *dst = (tri[0].source[i] + tri[1].source[i] + tri[2].source[i]) * (1.0 / 3.0);
        }
        let centroid = self.shade_source(source);
        let levels = self.inputs.info.states.subdivision.levels;
        for (a, b) in [(0, 1), (1, 2), (2, 0)] {
            self.subdivide_edge(&tri[a], &tri[b], &centroid, levels)?;
        }
        Ok(())
    }

    fn subdivide_edge(&mut self, a: &VsOutput, b: &VsOutput, apex: &VsOutput, levels: u32) -> Result<()> {
        if levels == 0 {
            return self.subdivide_inner(&[*a, *b, *apex], 0);
        }
        let m = self.midpoint(a, b, false);
        self.subdivide_edge(a, &m, apex, levels - 1)?;
        self.subdivide_edge(&m, b, apex, levels - 1)
    }

    fn subdivide_inner(&mut self, tri: &[VsOutput; 3], level: u32) -> Result<()> {
        let sub = self.inputs.info.states.subdivision;
        if level >= sub.max_inner_levels || self.projected_area(tri) <= sub.max_screen_area {
            return self.draw_triangle(*tri);
        }
        let m01 = self.midpoint(&tri[0], &tri[1], false);
        let m12 = self.midpoint(&tri[1], &tri[2], false);
        let m20 = self.midpoint(&tri[2], &tri[0], false);
        for child in split(tri, m01, m12, m20) {
            self.subdivide_inner(&child, level + 1)?;
        }
        Ok(())
    }

    /// Screen-space area in pixels; zero when a vertex lies on or behind the eye plane.
    fn projected_area(&self, tri: &[VsOutput; 3]) -> f32 {
        if tri.iter().any(|v| v.position.w <= EPSILON) {
            return 0.0;
        }
        let viewport = self.inputs.info.viewport;
        let [s0, s1, s2] = (*tri).map(|v| {
            let p = v.position;
            Vector4::new(p.x / p.w, p.y / p.w, p.z / p.w, 1.0) * viewport
        });
        0.5 * (s1 - s0).xy().cross((s2 - s0).xy()).abs()
    }
}

/// Displaced position and blended normal for the midpoint of a curved edge.
///
/// Each endpoint's normal pulls the midpoint towards the tangent plane it defines at that
/// endpoint.
fn smooth_midpoint(p1: Vector3, n1: Vector3, p2: Vector3, n2: Vector3) -> (Vector3, Vector3) {
    let w12 = (p2 - p1).dot(n1);
    let w21 = (p1 - p2).dot(n2);
    let position = (p1 + p2) * 0.5 - (n1 * w12 + n2 * w21) * (1.0 / 6.0);
    let normal = (n1 + n2).normalize();
    (position, normal)
}
