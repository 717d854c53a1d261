//! Draw entry points and the per-draw setup they share.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::limits::MAX_VERTEX_STREAMS;
use crate::shader::{RegisterLayout, SamplerContext, VsOutput};
use crate::state::topology::PrimitiveType;
use crate::surface::Surface;
use crate::vertex_buffer::VertexBuffer;
use crate::vertex_format::StreamView;

use super::pass::{PassInputs, PassTargets, RenderPass};
use super::render_info::{scissor_planes, validate_subdivision, viewport_rect, FragmentPath, RenderInfo};
use super::stats::DrawStats;
use super::Device;

fn borrow_bound<'a, T: ?Sized>(slot: &'a Option<Rc<RefCell<T>>>, what: &str) -> Result<Ref<'a, T>> {
    slot.as_ref()
        .ok_or_else(|| Error::invalid_state(format!("no {what} bound")))?
        .try_borrow()
        .map_err(|_| Error::invalid_state(format!("bound {what} is in use")))
}

fn surface_size(surface: &RefCell<Surface>, what: &str) -> Result<(u32, u32)> {
    let surface = surface
        .try_borrow()
        .map_err(|_| Error::invalid_state(format!("{what} buffer is locked")))?;
    Ok((surface.width(), surface.height()))
}

fn lock_surface<'a>(surface: &'a RefCell<Surface>, what: &str) -> Result<RefMut<'a, Surface>> {
    surface
        .try_borrow_mut()
        .map_err(|_| Error::invalid_state(format!("{what} buffer is already locked")))
}

fn check_primitive_count(primitive_count: u32) -> Result<()> {
    if primitive_count == 0 {
        return Err(Error::invalid_parameters("primitive count must be non-zero"));
    }
    Ok(())
}

/// Feeds the triangles of `ty` through the pipeline.
///
/// `vertex` maps a position within the draw to the vertex index to fetch. Cache hints are carried
/// over from the previous triangle for positions shared with it, which covers the vertices strips and
/// fans reuse.
fn assemble(
    pass: &mut RenderPass<'_>,
    ty: PrimitiveType,
    primitive_count: u32,
    mut vertex: impl FnMut(u32) -> Result<u32>,
) -> Result<()> {
    let mut window: [(u32, Option<usize>); 3] = [(u32::MAX, None); 3];
    for i in 0..primitive_count {
        let positions = ty.triangle(i);
        let mut next = window;
        let mut tri = [VsOutput::default(); 3];
        for (k, &position) in positions.iter().enumerate() {
            let mut hint = window
                .iter()
                .find(|(p, _)| *p == position)
                .and_then(|&(_, slot)| slot);
            let slot = pass.fetch_vertex(&mut hint, vertex(position)?)?;
            next[k] = (position, Some(slot));
            tri[k] = *pass.vertex_output(slot);
        }
        window = next;
        pass.process_triangle(tri)?;
    }
    Ok(())
}

impl Device {
    /// Validates the bound state, locks the render target and runs `body` over a fresh pass.
    ///
    /// Every lock taken here is released when this returns, whether `body` succeeded or not.
    fn run_pass(&mut self, body: impl FnOnce(&mut RenderPass<'_>) -> Result<()>) -> Result<()> {
        let result = self.execute_pass(body);
        match &result {
            Ok(()) => tracing::debug!(stats = ?self.stats, "draw call completed"),
            Err(err) => tracing::warn!(%err, "draw call failed"),
        }
        result
    }

    fn execute_pass(&mut self, body: impl FnOnce(&mut RenderPass<'_>) -> Result<()>) -> Result<()> {
        let Device {
            render_states,
            sampler_states,
            textures,
            vertex_streams,
            vertex_format,
            vertex_shader,
            triangle_shader,
            pixel_shader,
            render_target,
            scissor_rect,
            depth_bounds,
            clipping_planes,
            vertex_cache,
            clip_polygon,
            stats,
            ..
        } = self;
        *stats = DrawStats::default();
        let states = *render_states;

        let vertex_format = vertex_format
            .as_deref()
            .ok_or_else(|| Error::invalid_state("no vertex format bound"))?;
        let vertex_shader = borrow_bound(vertex_shader, "vertex shader")?;
        let pixel_shader = borrow_bound(pixel_shader, "pixel shader")?;
        let triangle_shader = match triangle_shader {
            Some(_) => Some(borrow_bound(triangle_shader, "triangle shader")?),
            None => None,
        };

        let render_target = borrow_bound(render_target, "render target")?;
        let color_buffer = render_target
            .color_buffer()
            .ok_or_else(|| Error::invalid_state("render target has no colour buffer"))?;
        let depth_buffer = render_target.depth_buffer();
        if states.z_enable && depth_buffer.is_none() {
            return Err(Error::invalid_state(
                "depth testing is enabled but the render target has no depth buffer",
            ));
        }

        let mut sizes = vec![surface_size(&color_buffer, "colour")?];
        if let Some(depth) = &depth_buffer {
            sizes.push(surface_size(depth, "depth")?);
        }
        let viewport = render_target.viewport_matrix();
        let viewport_rect = viewport_rect(&viewport, &sizes)?;

        let raster_rect = if states.scissor_test_enable {
            if !viewport_rect.contains(scissor_rect) {
                return Err(Error::invalid_state(format!(
                    "scissor rect {scissor_rect:?} is not inside viewport {viewport_rect:?}"
                )));
            }
            *scissor_rect
        } else {
            viewport_rect
        };
        if states.line_thickness == 0 {
            return Err(Error::invalid_state("line thickness must be non-zero"));
        }
        validate_subdivision(&states.subdivision)?;

        let mut stream_guards: [Option<Ref<'_, VertexBuffer>>; MAX_VERTEX_STREAMS] = Default::default();
        let mut streams: [Option<StreamView<'_>>; MAX_VERTEX_STREAMS] = [None; MAX_VERTEX_STREAMS];
        for (i, (guard, binding)) in stream_guards.iter_mut().zip(vertex_streams.iter()).enumerate() {
            if !vertex_format.uses_stream(i) {
                continue;
            }
            let binding = binding.as_ref().ok_or_else(|| {
                Error::invalid_state(format!("vertex stream {i} is read by the vertex format but not bound"))
            })?;
            *guard = Some(
                binding
                    .buffer
                    .try_borrow()
                    .map_err(|_| Error::invalid_state(format!("vertex buffer on stream {i} is locked")))?,
            );
        }
        for ((view, guard), binding) in streams.iter_mut().zip(stream_guards.iter()).zip(vertex_streams.iter()) {
            if let (Some(guard), Some(binding)) = (guard, binding) {
                *view = Some(StreamView {
                    data: guard.data(),
                    offset: binding.offset,
                    stride: binding.stride,
                });
            }
        }

        let mut color_lock = if states.color_write_enable {
            Some(lock_surface(&color_buffer, "colour")?)
        } else {
            None
        };
        let mut depth_lock = match &depth_buffer {
            Some(depth) if states.z_enable => Some(lock_surface(depth, "depth")?),
            _ => None,
        };

        let info = RenderInfo {
            states,
            viewport,
            raster_rect,
            frustum_planes: *clipping_planes,
            scissor_planes: states.scissor_test_enable.then(|| scissor_planes(&raster_rect)),
            layout: RegisterLayout::new(vertex_shader.output_register_types()),
            fragment_path: FragmentPath::select(pixel_shader.output(), pixel_shader.might_kill_pixels()),
            depth_bounds: *depth_bounds,
        };

        vertex_cache.reset();
        let mut pass = RenderPass {
            inputs: PassInputs {
                info: &info,
                vertex_format,
                streams,
                vertex_shader: &*vertex_shader,
                triangle_shader: triangle_shader.as_deref(),
                pixel_shader: &*pixel_shader,
                sampler: SamplerContext::new(textures, sampler_states),
            },
            targets: PassTargets {
                cache: vertex_cache,
                clip: clip_polygon,
                stats,
                color: color_lock.as_deref_mut(),
                depth: depth_lock.as_deref_mut(),
            },
        };
        body(&mut pass)
    }

    /// Draws `primitive_count` primitives from consecutive vertices starting at `start_vertex`.
    pub fn draw_primitive(&mut self, ty: PrimitiveType, start_vertex: u32, primitive_count: u32) -> Result<()> {
        check_primitive_count(primitive_count)?;
        let last = u64::from(start_vertex) + ty.vertex_count(primitive_count) - 1;
        if last > u64::from(u32::MAX) {
            return Err(Error::invalid_parameters(format!(
                "{primitive_count} {ty} primitives from vertex {start_vertex} overflow the vertex range"
            )));
        }
        self.run_pass(|pass| assemble(pass, ty, primitive_count, |position| Ok(start_vertex + position)))
    }

    /// Draws primitives whose vertices are read through the bound index buffer.
    ///
    /// Every index must lie in `[min_index, min_index + num_vertices)`; the fetched vertex is
    /// `base_vertex_index + index`.
    pub fn draw_indexed_primitive(
        &mut self,
        ty: PrimitiveType,
        base_vertex_index: i32,
        min_index: u32,
        num_vertices: u32,
        start_index: u32,
        primitive_count: u32,
    ) -> Result<()> {
        check_primitive_count(primitive_count)?;
        if num_vertices == 0 {
            return Err(Error::invalid_parameters("vertex count must be non-zero"));
        }
        let buffer = self
            .index_buffer
            .clone()
            .ok_or_else(|| Error::invalid_state("no index buffer bound"))?;
        let indices = buffer
            .try_borrow()
            .map_err(|_| Error::invalid_state("bound index buffer is locked"))?;

        let index_count = ty.vertex_count(primitive_count);
        if u64::from(start_index) + index_count > indices.num_indices() as u64 {
            return Err(Error::invalid_parameters(format!(
                "{index_count} indices from {start_index} exceed the {} in the index buffer",
                indices.num_indices()
            )));
        }
        let index_end = u64::from(min_index) + u64::from(num_vertices);

        self.run_pass(|pass| {
            assemble(pass, ty, primitive_count, |position| {
                let index = indices.index((start_index + position) as usize)?;
                if index < min_index || u64::from(index) >= index_end {
                    return Err(Error::invalid_parameters(format!(
                        "index {index} outside [{min_index}, {index_end})"
                    )));
                }
                let vertex = i64::from(base_vertex_index) + i64::from(index);
                u32::try_from(vertex).map_err(|_| {
                    Error::invalid_parameters(format!(
                        "base vertex {base_vertex_index} and index {index} give invalid vertex {vertex}"
                    ))
                })
            })
        })
    }

    /// Draws with an index order produced by the bound primitive assembler over
    /// `[0, num_vertices)`, offset by `start_vertex`.
    pub fn draw_dynamic_primitive(&mut self, start_vertex: u32, num_vertices: u32) -> Result<()> {
        if num_vertices == 0 {
            return Err(Error::invalid_parameters("vertex count must be non-zero"));
        }
        if start_vertex.checked_add(num_vertices - 1).is_none() {
            return Err(Error::invalid_parameters(format!(
                "{num_vertices} vertices from {start_vertex} overflow the vertex range"
            )));
        }
        let assembler = self
            .primitive_assembler
            .clone()
            .ok_or_else(|| Error::invalid_state("no primitive assembler bound"))?;

        let mut indices = Vec::new();
        let ty = assembler
            .try_borrow_mut()
            .map_err(|_| Error::invalid_state("bound primitive assembler is in use"))?
            .execute(&mut indices, num_vertices);

        let primitive_count = u32::try_from(indices.len())
            .map(|n| ty.primitive_count(n))
            .map_err(|_| Error::invalid_parameters("primitive assembler produced too many indices"))?;
        check_primitive_count(primitive_count)?;
        if let Some(bad) = indices.iter().find(|&&index| index >= num_vertices) {
            return Err(Error::invalid_parameters(format!(
                "primitive assembler produced index {bad} outside [0, {num_vertices})"
            )));
        }

        self.run_pass(|pass| {
            assemble(pass, ty, primitive_count, |position| {
                Ok(start_vertex + indices[position as usize])
            })
        })
    }
}
