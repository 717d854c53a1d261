//! State of one draw call between validation and release of the locked buffers.

use muli3d_math::Vector4;

use crate::error::Result;
use crate::limits::{MAX_SHADER_REGISTERS, MAX_VERTEX_STREAMS};
use crate::shader::{PixelShader, SamplerContext, TriangleShader, VertexShader, VsOutput};
use crate::surface::Surface;
use crate::vertex_format::{StreamView, VertexFormat};

use super::clip::{clip_space_distance, is_culled, project, screen_space_distance, ClipPolygon};
use super::raster;
use super::render_info::RenderInfo;
use super::stats::DrawStats;
use super::vertex_cache::VertexCache;

/// Read-only inputs of a draw call.
pub(crate) struct PassInputs<'a> {
    pub info: &'a RenderInfo,
    pub vertex_format: &'a VertexFormat,
    pub streams: [Option<StreamView<'a>>; MAX_VERTEX_STREAMS],
    pub vertex_shader: &'a dyn VertexShader,
    pub triangle_shader: Option<&'a dyn TriangleShader>,
    pub pixel_shader: &'a dyn PixelShader,
    pub sampler: SamplerContext<'a>,
}

/// Scratch state and locked surfaces a draw call writes to.
pub(crate) struct PassTargets<'a> {
    pub cache: &'a mut VertexCache,
    pub clip: &'a mut ClipPolygon,
    pub stats: &'a mut DrawStats,
    /// Locked only while colour writes are enabled.
    pub color: Option<&'a mut Surface>,
    /// Locked only while depth testing is enabled.
    pub depth: Option<&'a mut Surface>,
}

pub(crate) struct RenderPass<'a> {
    pub inputs: PassInputs<'a>,
    pub targets: PassTargets<'a>,
}

impl PassInputs<'_> {
    /// Runs the vertex shader on `out.source`, filling position and output registers.
    pub fn shade(&self, out: &mut VsOutput, stats: &mut DrawStats) {
        out.position = Vector4::ZERO;
        out.registers = [Vector4::ZERO; MAX_SHADER_REGISTERS];
        self.vertex_shader
            .execute(&self.sampler, &out.source, &mut out.position, &mut out.registers);
        self.info.layout.mask(&mut out.registers);
        stats.vertex_shader_invocations += 1;
    }
}

impl RenderPass<'_> {
    /// Decodes and shades `vertex_index` unless the cache already holds it.
    pub fn fetch_vertex(&mut self, hint: &mut Option<usize>, vertex_index: u32) -> Result<usize> {
        let inputs = &self.inputs;
        let stats = &mut *self.targets.stats;
        self.targets.cache.fetch(hint, vertex_index, |out| {
            inputs
                .vertex_format
                .decode(&inputs.streams, vertex_index, &mut out.source)?;
            inputs.shade(out, stats);
            Ok(())
        })
    }

    #[inline]
    pub fn vertex_output(&self, slot: usize) -> &VsOutput {
        self.targets.cache.output(slot)
    }

    /// The per-triangle pipeline: triangle shader, frustum clip, projection, culling, scissor clip
    /// and rasterization of the fan-triangulated polygon.
    pub fn draw_triangle(&mut self, mut tri: [VsOutput; 3]) -> Result<()> {
        let inputs = &self.inputs;
        let targets = &mut self.targets;
        let info = inputs.info;
        let layout = &info.layout;
        targets.stats.triangles_processed += 1;

        if let Some(shader) = inputs.triangle_shader {
            let [v0, v1, v2] = &mut tri;
            if !shader.execute(&mut v0.registers, &mut v1.registers, &mut v2.registers) {
                targets.stats.triangles_rejected_by_shader += 1;
                return Ok(());
            }
            for v in &mut tri {
                layout.mask(&mut v.registers);
            }
        }

        let clip = &mut *targets.clip;
        clip.reset(&tri);
        for plane in info.frustum_planes.iter().flatten() {
            if clip.clip(layout, |v| clip_space_distance(plane, v)) < 3 {
                targets.stats.triangles_clipped += 1;
                return Ok(());
            }
        }

        for i in 0..clip.len() {
            project(clip.vertex_mut(i), &info.viewport, layout);
        }

        if is_culled(info.states.cull_mode, clip.winding()) {
            targets.stats.triangles_culled += 1;
            return Ok(());
        }

        if let Some(planes) = &info.scissor_planes {
            for plane in planes {
                if clip.clip(layout, |v| screen_space_distance(plane, v)) < 3 {
                    targets.stats.triangles_clipped += 1;
                    return Ok(());
                }
            }
        }

        for i in 1..targets.clip.len() - 1 {
            let fan = [
                *targets.clip.vertex(0),
                *targets.clip.vertex(i),
                *targets.clip.vertex(i + 1),
            ];
            targets.stats.triangles_rasterized += 1;
            raster::rasterize_triangle(inputs, targets, &fan);
        }
        Ok(())
    }
}
