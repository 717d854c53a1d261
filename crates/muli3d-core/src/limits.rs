//! Centralized engine limits.
//!
//! Every per-draw scratch structure is a fixed-size array sized by these constants, so a draw call
//! never allocates on the per-vertex or per-pixel paths.

/// Number of vertex stream slots a vertex format may reference.
pub const MAX_VERTEX_STREAMS: usize = 8;

/// Number of 4-component registers passed between pipeline stages (vertex inputs, vertex outputs and
/// pixel inputs all share this count).
pub const MAX_SHADER_REGISTERS: usize = 8;

/// Number of texture sampler slots.
pub const MAX_TEXTURE_SAMPLERS: usize = 16;

/// Size of each shader constant bank (floats, vectors and matrices are separate banks).
pub const MAX_SHADER_CONSTANTS: usize = 32;

/// Entries in the per-draw post-transform vertex cache.
pub const VERTEX_CACHE_SIZE: usize = 32;

/// Frustum planes in clip space.
pub const NUM_FRUSTUM_PLANES: usize = 6;

/// Scissor planes in screen space.
pub const NUM_SCISSOR_PLANES: usize = 4;

/// New vertices the clipper may create for a single triangle.
///
/// Every plane adds at most two vertices to a convex polygon, so a triangle clipped against all
/// frustum and scissor planes needs at most `2 * (6 + 4)` slots.
pub const CLIP_VERTEX_ARENA_SIZE: usize = 2 * (NUM_FRUSTUM_PLANES + NUM_SCISSOR_PLANES);

/// Upper bound for the subdivision level render states.
pub const MAX_SUBDIVISION_LEVELS: u32 = 8;
