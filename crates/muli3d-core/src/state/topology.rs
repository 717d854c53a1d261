use std::fmt;

/// Primitive types accepted by the draw entry points.
///
/// Lines only arise from wireframe fill mode; there is no line or point primitive at the draw-call
/// level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    TriangleFan,
    TriangleStrip,
    TriangleList,
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimitiveType::TriangleFan => "triangle_fan",
            PrimitiveType::TriangleStrip => "triangle_strip",
            PrimitiveType::TriangleList => "triangle_list",
        };
        f.write_str(s)
    }
}

impl PrimitiveType {
    /// Number of vertices consumed by `primitive_count` primitives.
    pub fn vertex_count(self, primitive_count: u32) -> u64 {
        let n = u64::from(primitive_count);
        match self {
            PrimitiveType::TriangleList => n * 3,
            PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan => n + 2,
        }
    }

    /// Number of whole primitives formed by `vertex_count` vertices.
    pub fn primitive_count(self, vertex_count: u32) -> u32 {
        match self {
            PrimitiveType::TriangleList => vertex_count / 3,
            PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan => vertex_count.saturating_sub(2),
        }
    }

    /// Vertex positions (relative to the first vertex of the draw) of triangle `i`.
    ///
    /// Fans keep vertex 0 fixed: triangle(i) = (0, i+1, i+2). Strips swap the first two vertices of
    /// every odd triangle so the winding stays consistent: triangle(i) = (i+1, i, i+2).
    pub fn triangle(self, i: u32) -> [u32; 3] {
        match self {
            PrimitiveType::TriangleList => [i * 3, i * 3 + 1, i * 3 + 2],
            PrimitiveType::TriangleFan => [0, i + 1, i + 2],
            PrimitiveType::TriangleStrip => {
                if i & 1 == 0 {
                    [i, i + 1, i + 2]
                } else {
                    [i + 1, i, i + 2]
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_fan_keeps_first_vertex() {
        let tris: Vec<_> = (0..3).map(|i| PrimitiveType::TriangleFan.triangle(i)).collect();
        assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
    }

    #[test]
    fn triangle_strip_flips_odd_triangles() {
        let tris: Vec<_> = (0..4).map(|i| PrimitiveType::TriangleStrip.triangle(i)).collect();
        assert_eq!(tris, vec![[0, 1, 2], [2, 1, 3], [2, 3, 4], [4, 3, 5]]);
    }

    #[test]
    fn vertex_and_primitive_counts_agree() {
        for ty in [
            PrimitiveType::TriangleFan,
            PrimitiveType::TriangleStrip,
            PrimitiveType::TriangleList,
        ] {
            for n in 1..10 {
                let verts = ty.vertex_count(n) as u32;
                assert_eq!(ty.primitive_count(verts), n, "{ty}");
            }
        }
    }
}
