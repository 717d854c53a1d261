/// Counters for one draw call, reset when the call starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub vertex_shader_invocations: u64,
    /// Triangles produced by primitive assembly, before subdivision.
    pub triangles_assembled: u64,
    /// Triangles entering the per-triangle pipeline (subdivision leaves when subdividing).
    pub triangles_processed: u64,
    pub triangles_rejected_by_shader: u64,
    /// Triangles clipped down to fewer than three vertices.
    pub triangles_clipped: u64,
    pub triangles_culled: u64,
    /// Triangles handed to the rasterizer after fan triangulation of the clipped polygon.
    pub triangles_rasterized: u64,
    /// Fragments that passed the depth test and were not discarded.
    pub rendered_pixels: u64,
}
