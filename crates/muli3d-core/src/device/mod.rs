//! The rendering device: resource factories, bound state and the draw entry points.
//!
//! A draw call validates the bound state, locks the render target buffers and runs every assembled
//! triangle through subdivision, clipping, projection, culling and scanline rasterization on the
//! calling thread. Scratch state (vertex cache, clip arena, statistics) is owned by the device and
//! reset per draw.

mod clip;
mod draw;
pub(crate) mod gradient;
mod pass;
mod raster;
mod render_info;
pub mod stats;
mod subdivision;
mod vertex_cache;

#[cfg(test)]
mod tests;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use muli3d_math::{Plane, Vector4};
use tracing::debug;

use crate::base_texture::BaseTexture;
use crate::config::DeviceConfig;
use crate::cube_texture::CubeTexture;
use crate::error::{Error, Result};
use crate::format::{Format, IndexFormat};
use crate::index_buffer::IndexBuffer;
use crate::limits::{MAX_TEXTURE_SAMPLERS, MAX_VERTEX_STREAMS, NUM_FRUSTUM_PLANES};
use crate::present::PresentTarget;
use crate::render_target::RenderTarget;
use crate::shader::{
    PixelShader, PrimitiveAssembler, SamplerContext, SamplerSlots, TextureSlots, TriangleShader,
    VertexShader,
};
use crate::state::{ClipPlane, RenderState, RenderStates, SamplerState, SamplerStates};
use crate::surface::{Rect, Surface};
use crate::texture::Texture;
use crate::vertex_buffer::VertexBuffer;
use crate::vertex_format::{VertexElement, VertexFormat};
use crate::volume::Volume;
use crate::volume_texture::VolumeTexture;

use self::clip::ClipPolygon;
use self::stats::DrawStats;
use self::vertex_cache::VertexCache;

/// A vertex buffer bound to a stream slot.
#[derive(Clone, Debug)]
pub struct VertexStream {
    pub buffer: Rc<RefCell<VertexBuffer>>,
    /// Byte offset of vertex 0.
    pub offset: usize,
    /// Bytes between consecutive vertices.
    pub stride: usize,
}

pub struct Device {
    config: DeviceConfig,
    render_states: RenderStates,
    sampler_states: SamplerSlots,
    textures: TextureSlots,
    vertex_streams: [Option<VertexStream>; MAX_VERTEX_STREAMS],
    index_buffer: Option<Rc<RefCell<IndexBuffer>>>,
    vertex_format: Option<Rc<VertexFormat>>,
    primitive_assembler: Option<Rc<RefCell<dyn PrimitiveAssembler>>>,
    vertex_shader: Option<Rc<RefCell<dyn VertexShader>>>,
    triangle_shader: Option<Rc<RefCell<dyn TriangleShader>>>,
    pixel_shader: Option<Rc<RefCell<dyn PixelShader>>>,
    render_target: Option<Rc<RefCell<RenderTarget>>>,
    scissor_rect: Rect,
    depth_bounds: (f32, f32),
    clipping_planes: [Option<Plane>; NUM_FRUSTUM_PLANES],
    present_target: Option<Box<dyn PresentTarget>>,

    vertex_cache: VertexCache,
    clip_polygon: ClipPolygon,
    stats: DrawStats,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("config", &self.config)
            .field("render_states", &self.render_states)
            .field("scissor_rect", &self.scissor_rect)
            .field("depth_bounds", &self.depth_bounds)
            .field("last_draw_stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn check_sampler(sampler: usize) -> Result<()> {
    if sampler >= MAX_TEXTURE_SAMPLERS {
        return Err(Error::invalid_parameters(format!(
            "sampler {sampler} out of range (max {MAX_TEXTURE_SAMPLERS})"
        )));
    }
    Ok(())
}

fn check_stream(stream: usize) -> Result<()> {
    if stream >= MAX_VERTEX_STREAMS {
        return Err(Error::invalid_parameters(format!(
            "vertex stream {stream} out of range (max {MAX_VERTEX_STREAMS})"
        )));
    }
    Ok(())
}

impl Device {
    pub fn new(config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            width = config.backbuffer_width,
            height = config.backbuffer_height,
            "created muli3d device"
        );
        Ok(Self {
            config,
            render_states: RenderStates::default(),
            sampler_states: [SamplerStates::default(); MAX_TEXTURE_SAMPLERS],
            textures: Default::default(),
            vertex_streams: Default::default(),
            index_buffer: None,
            vertex_format: None,
            primitive_assembler: None,
            vertex_shader: None,
            triangle_shader: None,
            pixel_shader: None,
            render_target: None,
            scissor_rect: Rect::new(0, 0, config.backbuffer_width, config.backbuffer_height),
            depth_bounds: (0.0, 1.0),
            clipping_planes: ClipPlane::ALL.map(|plane| Some(plane.default_plane())),
            present_target: None,
            vertex_cache: VertexCache::default(),
            clip_polygon: ClipPolygon::default(),
            stats: DrawStats::default(),
        })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    // Resource factories.

    pub fn create_vertex_format(&self, declaration: &[VertexElement]) -> Result<Rc<VertexFormat>> {
        Ok(Rc::new(VertexFormat::new(declaration)?))
    }

    pub fn create_vertex_buffer(&self, length: usize) -> Result<Rc<RefCell<VertexBuffer>>> {
        Ok(Rc::new(RefCell::new(VertexBuffer::new(length)?)))
    }

    pub fn create_index_buffer(&self, length: usize, format: IndexFormat) -> Result<Rc<RefCell<IndexBuffer>>> {
        Ok(Rc::new(RefCell::new(IndexBuffer::new(length, format)?)))
    }

    pub fn create_surface(&self, width: u32, height: u32, format: Format) -> Result<Rc<RefCell<Surface>>> {
        Ok(Rc::new(RefCell::new(Surface::new(width, height, format)?)))
    }

    /// `mip_levels == 0` creates the full chain down to 1x1.
    pub fn create_texture(&self, width: u32, height: u32, mip_levels: u32, format: Format) -> Result<Rc<Texture>> {
        Ok(Rc::new(Texture::new(width, height, mip_levels, format)?))
    }

    pub fn create_cube_texture(&self, edge_length: u32, mip_levels: u32, format: Format) -> Result<Rc<CubeTexture>> {
        Ok(Rc::new(CubeTexture::new(edge_length, mip_levels, format)?))
    }

    pub fn create_volume(&self, width: u32, height: u32, depth: u32, format: Format) -> Result<Rc<RefCell<Volume>>> {
        Ok(Rc::new(RefCell::new(Volume::new(width, height, depth, format)?)))
    }

    pub fn create_volume_texture(
        &self,
        width: u32,
        height: u32,
        depth: u32,
        mip_levels: u32,
        format: Format,
    ) -> Result<Rc<VolumeTexture>> {
        Ok(Rc::new(VolumeTexture::new(width, height, depth, mip_levels, format)?))
    }

    pub fn create_render_target(&self) -> Rc<RefCell<RenderTarget>> {
        Rc::new(RefCell::new(RenderTarget::new()))
    }

    // Render and sampler states.

    pub fn set_render_state(&mut self, state: RenderState) {
        debug!(?state, "set render state");
        self.render_states.apply(state);
    }

    pub fn render_states(&self) -> &RenderStates {
        &self.render_states
    }

    pub fn set_sampler_state(&mut self, sampler: usize, state: SamplerState) -> Result<()> {
        check_sampler(sampler)?;
        self.sampler_states[sampler].apply(state);
        Ok(())
    }

    pub fn sampler_states(&self, sampler: usize) -> Result<SamplerStates> {
        check_sampler(sampler)?;
        Ok(self.sampler_states[sampler])
    }

    pub fn set_texture(&mut self, sampler: usize, texture: Option<Rc<dyn BaseTexture>>) -> Result<()> {
        check_sampler(sampler)?;
        self.textures[sampler] = texture;
        Ok(())
    }

    pub fn texture(&self, sampler: usize) -> Result<Option<Rc<dyn BaseTexture>>> {
        check_sampler(sampler)?;
        Ok(self.textures[sampler].clone())
    }

    /// Samples the texture bound to `sampler` with that sampler's states.
    pub fn sample_texture(
        &self,
        sampler: usize,
        u: f32,
        v: f32,
        w: f32,
        ddx: Option<&Vector4>,
        ddy: Option<&Vector4>,
    ) -> Result<Vector4> {
        SamplerContext::new(&self.textures, &self.sampler_states).sample_texture(sampler, u, v, w, ddx, ddy)
    }

    // Geometry inputs.

    /// Binds `buffer` to `stream`; vertex `i` starts at byte `offset + i * stride`.
    pub fn set_vertex_stream(
        &mut self,
        stream: usize,
        buffer: Option<Rc<RefCell<VertexBuffer>>>,
        offset: usize,
        stride: usize,
    ) -> Result<()> {
        check_stream(stream)?;
        self.vertex_streams[stream] = match buffer {
            Some(buffer) => {
                if stride == 0 {
                    return Err(Error::invalid_parameters("vertex stream stride must be non-zero"));
                }
                Some(VertexStream { buffer, offset, stride })
            }
            None => None,
        };
        Ok(())
    }

    pub fn vertex_stream(&self, stream: usize) -> Result<Option<VertexStream>> {
        check_stream(stream)?;
        Ok(self.vertex_streams[stream].clone())
    }

    pub fn set_index_buffer(&mut self, buffer: Option<Rc<RefCell<IndexBuffer>>>) {
        self.index_buffer = buffer;
    }

    pub fn index_buffer(&self) -> Option<Rc<RefCell<IndexBuffer>>> {
        self.index_buffer.clone()
    }

    pub fn set_vertex_format(&mut self, format: Option<Rc<VertexFormat>>) {
        self.vertex_format = format;
    }

    pub fn vertex_format(&self) -> Option<Rc<VertexFormat>> {
        self.vertex_format.clone()
    }

    pub fn set_primitive_assembler(&mut self, assembler: Option<Rc<RefCell<dyn PrimitiveAssembler>>>) {
        self.primitive_assembler = assembler;
    }

    pub fn primitive_assembler(&self) -> Option<Rc<RefCell<dyn PrimitiveAssembler>>> {
        self.primitive_assembler.clone()
    }

    // Shaders.

    pub fn set_vertex_shader(&mut self, shader: Option<Rc<RefCell<dyn VertexShader>>>) {
        self.vertex_shader = shader;
    }

    pub fn vertex_shader(&self) -> Option<Rc<RefCell<dyn VertexShader>>> {
        self.vertex_shader.clone()
    }

    pub fn set_triangle_shader(&mut self, shader: Option<Rc<RefCell<dyn TriangleShader>>>) {
        self.triangle_shader = shader;
    }

    pub fn triangle_shader(&self) -> Option<Rc<RefCell<dyn TriangleShader>>> {
        self.triangle_shader.clone()
    }

    pub fn set_pixel_shader(&mut self, shader: Option<Rc<RefCell<dyn PixelShader>>>) {
        self.pixel_shader = shader;
    }

    pub fn pixel_shader(&self) -> Option<Rc<RefCell<dyn PixelShader>>> {
        self.pixel_shader.clone()
    }

    // Output state.

    pub fn set_render_target(&mut self, target: Option<Rc<RefCell<RenderTarget>>>) {
        self.render_target = target;
    }

    pub fn render_target(&self) -> Option<Rc<RefCell<RenderTarget>>> {
        self.render_target.clone()
    }

    /// Rectangle used while scissor testing is enabled. It must lie inside the viewport at draw
    /// time.
    pub fn set_scissor_rect(&mut self, rect: Rect) -> Result<()> {
        if rect.is_empty() {
            return Err(Error::invalid_parameters(format!("scissor rect {rect:?} is empty")));
        }
        self.scissor_rect = rect;
        Ok(())
    }

    pub fn scissor_rect(&self) -> Rect {
        self.scissor_rect
    }

    /// Depth range fragments must fall in while depth testing is enabled.
    pub fn set_depth_bounds(&mut self, min: f32, max: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min > max {
            return Err(Error::invalid_parameters(format!(
                "depth bounds [{min}, {max}] must satisfy 0 <= min <= max <= 1"
            )));
        }
        self.depth_bounds = (min, max);
        Ok(())
    }

    pub fn depth_bounds(&self) -> (f32, f32) {
        self.depth_bounds
    }

    /// Replaces a frustum plane; `None` disables clipping against it.
    pub fn set_clipping_plane(&mut self, which: ClipPlane, plane: Option<Plane>) {
        self.clipping_planes[which.index()] = plane;
    }

    pub fn clipping_plane(&self, which: ClipPlane) -> Option<Plane> {
        self.clipping_planes[which.index()]
    }

    // Presentation and statistics.

    pub fn set_present_target(&mut self, target: Option<Box<dyn PresentTarget>>) {
        self.present_target = target;
    }

    /// Hands the colour buffer of `target` to the present target. It must match the backbuffer
    /// size.
    pub fn present(&mut self, target: &RenderTarget) -> Result<()> {
        let (width, height) = (self.config.backbuffer_width, self.config.backbuffer_height);
        let present_target = self
            .present_target
            .as_mut()
            .ok_or_else(|| Error::invalid_state("no present target installed"))?;
        let color = target
            .color_buffer()
            .ok_or_else(|| Error::invalid_state("render target has no colour buffer"))?;
        let surface = color
            .try_borrow()
            .map_err(|_| Error::invalid_state("colour buffer is locked"))?;
        if (surface.width(), surface.height()) != (width, height) {
            return Err(Error::invalid_parameters(format!(
                "colour buffer is {}x{}, backbuffer is {width}x{height}",
                surface.width(),
                surface.height()
            )));
        }
        present_target.present(&surface)
    }

    /// Pixels written by the most recent draw call.
    pub fn rendered_pixels(&self) -> u64 {
        self.stats.rendered_pixels
    }

    pub fn last_draw_stats(&self) -> DrawStats {
        self.stats
    }
}
