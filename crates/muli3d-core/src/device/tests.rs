use std::cell::{Cell, RefCell};
use std::rc::Rc;

use muli3d_math::{Matrix44, Vector4};
use pretty_assertions::assert_eq;

use crate::base_texture::BaseTexture;
use crate::format::{Format, IndexFormat};
use crate::limits::MAX_SHADER_REGISTERS;
use crate::present::PresentTarget;
use crate::render_target::RenderTarget;
use crate::shader::{
    PixelContext, PixelShader, PixelShaderOutput, PrimitiveAssembler, SamplerContext, Shader,
    ShaderConstants, ShaderRegType, ShaderRegisters, TriangleShader, VertexShader,
};
use crate::state::topology::PrimitiveType;
use crate::state::{ClipPlane, CmpFunc, CullMode, FillMode, RenderState, SubdivisionMode};
use crate::surface::{Rect, Surface};
use crate::vertex_buffer::VertexBuffer;
use crate::vertex_format::{VertexElement, VertexElementType};
use crate::{DeviceConfig, Error};

use super::Device;

const SIZE: u32 = 32;
const RED: Vector4 = Vector4::new(1.0, 0.0, 0.0, 1.0);
const BLUE: Vector4 = Vector4::new(0.0, 0.0, 1.0, 1.0);

/// Viewport-filling quad as a strip, clockwise on screen.
fn quad(z: f32) -> [[f32; 4]; 4] {
    [
        [-1.0, -1.0, z, 1.0],
        [-1.0, 1.0, z, 1.0],
        [1.0, -1.0, z, 1.0],
        [1.0, 1.0, z, 1.0],
    ]
}

/// Passes the position through and exposes it in output register 0.
#[derive(Default)]
struct PassThrough {
    constants: ShaderConstants,
}

impl Shader for PassThrough {
    fn constants(&self) -> &ShaderConstants {
        &self.constants
    }

    fn constants_mut(&mut self) -> &mut ShaderConstants {
        &mut self.constants
    }
}

impl VertexShader for PassThrough {
    fn output_register_types(&self) -> [ShaderRegType; MAX_SHADER_REGISTERS] {
        let mut types = [ShaderRegType::Unused; MAX_SHADER_REGISTERS];
        types[0] = ShaderRegType::Vector4;
        types
    }

    fn execute(
        &self,
        _ctx: &SamplerContext<'_>,
        input: &ShaderRegisters,
        position: &mut Vector4,
        output: &mut ShaderRegisters,
    ) {
        *position = input[0];
        output[0] = input[0];
    }
}

/// Writes a constant colour, optionally with a constant depth.
struct Flat {
    constants: ShaderConstants,
    color: Vector4,
    depth: Option<f32>,
    derivatives: Cell<Option<(Vector4, Vector4)>>,
}

impl Flat {
    fn new(color: Vector4) -> Self {
        Self {
            constants: ShaderConstants::default(),
            color,
            depth: None,
            derivatives: Cell::new(None),
        }
    }

    fn with_depth(color: Vector4, depth: f32) -> Self {
        Self {
            depth: Some(depth),
            ..Self::new(color)
        }
    }
}

impl Shader for Flat {
    fn constants(&self) -> &ShaderConstants {
        &self.constants
    }

    fn constants_mut(&mut self) -> &mut ShaderConstants {
        &mut self.constants
    }
}

impl PixelShader for Flat {
    fn output(&self) -> PixelShaderOutput {
        if self.depth.is_some() {
            PixelShaderOutput::ColorDepth
        } else {
            PixelShaderOutput::Color
        }
    }

    fn might_kill_pixels(&self) -> bool {
        false
    }

    fn execute(&self, ctx: &PixelContext<'_>, _input: &ShaderRegisters, color: &mut Vector4, depth: &mut f32) -> bool {
        if self.derivatives.get().is_none() {
            self.derivatives.set(ctx.derivatives(0).ok());
        }
        *color = self.color;
        if let Some(d) = self.depth {
            *depth = d;
        }
        true
    }
}

struct RejectAll {
    constants: ShaderConstants,
}

impl Shader for RejectAll {
    fn constants(&self) -> &ShaderConstants {
        &self.constants
    }

    fn constants_mut(&mut self) -> &mut ShaderConstants {
        &mut self.constants
    }
}

impl TriangleShader for RejectAll {
    fn execute(&self, _: &mut ShaderRegisters, _: &mut ShaderRegisters, _: &mut ShaderRegisters) -> bool {
        false
    }
}

struct FixedOrder {
    ty: PrimitiveType,
    indices: Vec<u32>,
}

impl PrimitiveAssembler for FixedOrder {
    fn execute(&mut self, indices: &mut Vec<u32>, _num_vertices: u32) -> PrimitiveType {
        indices.extend_from_slice(&self.indices);
        self.ty
    }
}

struct Harness {
    device: Device,
    color: Rc<RefCell<Surface>>,
    depth: Rc<RefCell<Surface>>,
    target: Rc<RefCell<RenderTarget>>,
    vertices: Rc<RefCell<VertexBuffer>>,
}

impl Harness {
    fn new(vertices: &[[f32; 4]]) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();

        let mut device = Device::new(DeviceConfig::new(SIZE, SIZE)).unwrap();
        let color = device.create_surface(SIZE, SIZE, Format::R32G32B32A32F).unwrap();
        let depth = device.create_surface(SIZE, SIZE, Format::R32F).unwrap();
        depth.borrow_mut().clear(Vector4::splat(1.0));

        let target = device.create_render_target();
        {
            let mut rt = target.borrow_mut();
            rt.set_color_buffer(Some(color.clone()));
            rt.set_depth_buffer(Some(depth.clone())).unwrap();
            rt.set_viewport_matrix(Matrix44::viewport(0.0, 0.0, SIZE as f32, SIZE as f32, 0.0, 1.0));
        }
        device.set_render_target(Some(target.clone()));

        let buffer = device.create_vertex_buffer(vertices.len() * 16).unwrap();
        buffer.borrow_mut().write(0, vertices).unwrap();
        device.set_vertex_stream(0, Some(buffer.clone()), 0, 16).unwrap();
        let format = device
            .create_vertex_format(&[VertexElement::new(0, VertexElementType::Vector4, 0)])
            .unwrap();
        device.set_vertex_format(Some(format));
        device.set_vertex_shader(Some(Rc::new(RefCell::new(PassThrough::default()))));
        device.set_pixel_shader(Some(Rc::new(RefCell::new(Flat::new(RED)))));

        Self {
            device,
            color,
            depth,
            target,
            vertices: buffer,
        }
    }

    fn pixel(&self, x: u32, y: u32) -> Vector4 {
        self.color.borrow().pixel(x, y).unwrap()
    }

    fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depth.borrow().pixel(x, y).unwrap().x
    }
}

#[test]
fn strip_quad_covers_every_pixel_once() {
    let mut h = Harness::new(&quad(0.5));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();

    let stats = h.device.last_draw_stats();
    assert_eq!(stats.rendered_pixels, u64::from(SIZE * SIZE));
    assert_eq!(stats.vertex_shader_invocations, 4);
    assert_eq!(stats.triangles_assembled, 2);
    assert_eq!(stats.triangles_rasterized, 2);
    assert_eq!(h.pixel(0, 0), RED);
    assert_eq!(h.pixel(31, 31), RED);
    assert_eq!(h.depth_at(5, 9), 0.5);
}

#[test]
fn indexed_draw_reuses_shaded_vertices() {
    let mut h = Harness::new(&quad(0.5));
    let ib = h.device.create_index_buffer(6 * 2, IndexFormat::Index16).unwrap();
    ib.borrow_mut().write_u16(0, &[0, 1, 2, 2, 1, 3]).unwrap();
    h.device.set_index_buffer(Some(ib));

    h.device
        .draw_indexed_primitive(PrimitiveType::TriangleList, 0, 0, 4, 0, 2)
        .unwrap();
    assert_eq!(h.device.rendered_pixels(), u64::from(SIZE * SIZE));
    assert_eq!(h.device.last_draw_stats().vertex_shader_invocations, 4);
}

#[test]
fn indexed_draw_applies_base_vertex_and_checks_range() {
    let mut vertices = quad(0.5).to_vec();
    vertices.extend_from_slice(&quad(0.5));
    let mut h = Harness::new(&vertices);
    let ib = h.device.create_index_buffer(3 * 4, IndexFormat::Index32).unwrap();
    ib.borrow_mut().write_u32(0, &[4, 5, 6]).unwrap();
    h.device.set_index_buffer(Some(ib));

    h.device
        .draw_indexed_primitive(PrimitiveType::TriangleList, -4, 4, 3, 0, 1)
        .unwrap();
    assert_eq!(h.device.rendered_pixels(), 496);

    let err = h
        .device
        .draw_indexed_primitive(PrimitiveType::TriangleList, -4, 4, 2, 0, 1)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameters(_)), "{err}");

    let err = h
        .device
        .draw_indexed_primitive(PrimitiveType::TriangleList, -5, 4, 3, 0, 1)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameters(_)), "{err}");
}

#[test]
fn dynamic_draw_uses_assembler_order() {
    let mut h = Harness::new(&quad(0.5));
    assert!(matches!(
        h.device.draw_dynamic_primitive(0, 4),
        Err(Error::InvalidState(_))
    ));

    h.device.set_primitive_assembler(Some(Rc::new(RefCell::new(FixedOrder {
        ty: PrimitiveType::TriangleStrip,
        indices: vec![0, 1, 2, 3],
    }))));
    h.device.draw_dynamic_primitive(0, 4).unwrap();
    assert_eq!(h.device.rendered_pixels(), u64::from(SIZE * SIZE));

    h.device.set_primitive_assembler(Some(Rc::new(RefCell::new(FixedOrder {
        ty: PrimitiveType::TriangleList,
        indices: vec![0, 1, 4],
    }))));
    assert!(matches!(
        h.device.draw_dynamic_primitive(0, 4),
        Err(Error::InvalidParameters(_))
    ));
}

#[test]
fn default_cull_mode_drops_counter_clockwise_triangles() {
    let q = quad(0.5);
    // Same triangle as the first half of the quad, opposite winding.
    let mut h = Harness::new(&[q[0], q[2], q[1]]);
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    assert_eq!(h.device.last_draw_stats().triangles_culled, 1);
    assert_eq!(h.device.rendered_pixels(), 0);

    h.device.set_render_state(RenderState::CullMode(CullMode::Cw));
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    assert_eq!(h.device.rendered_pixels(), 496);

    h.device.set_render_state(RenderState::CullMode(CullMode::None));
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    assert_eq!(h.device.rendered_pixels(), 496);
}

#[test]
fn vertex_on_a_frustum_plane_keeps_back_face_culling() {
    // The second vertex lies exactly on the right plane and the third is beyond it. The triangle
    // is counter-clockwise on screen.
    let tri = [[-0.5, -0.5, 0.5, 1.0], [1.0, -0.5, 0.5, 1.0], [2.0, 0.8, 0.5, 1.0]];
    let mut h = Harness::new(&tri);

    h.device.set_render_state(RenderState::CullMode(CullMode::None));
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    let visible = h.device.rendered_pixels();
    assert!(visible > 0);

    h.device.set_render_state(RenderState::CullMode(CullMode::Ccw));
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    assert_eq!(h.device.last_draw_stats().triangles_culled, 1);
    assert_eq!(h.device.rendered_pixels(), 0);

    h.device.set_render_state(RenderState::CullMode(CullMode::Cw));
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    assert_eq!(h.device.last_draw_stats().triangles_culled, 0);
    assert_eq!(h.device.rendered_pixels(), visible);
}

#[test]
fn edge_on_triangle_is_outlined_but_not_filled() {
    // All three vertices on the row y = 16.
    let tri = [[-1.0, 0.0, 0.5, 1.0], [0.0, 0.0, 0.5, 1.0], [1.0, 0.0, 0.5, 1.0]];
    let mut h = Harness::new(&tri);
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    assert_eq!(h.device.last_draw_stats().triangles_rasterized, 1);
    assert_eq!(h.device.rendered_pixels(), 0);

    h.device.set_render_state(RenderState::FillMode(FillMode::Wireframe));
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    assert!(h.device.rendered_pixels() >= 16, "{}", h.device.rendered_pixels());
    assert_eq!(h.pixel(5, 16), RED);
    assert_eq!(h.pixel(5, 15), Vector4::ZERO);
    assert!((h.depth_at(5, 16) - 0.5).abs() < 1e-6);
}

#[test]
fn nearer_surface_wins_the_depth_test() {
    let mut vertices = quad(0.2).to_vec();
    vertices.extend_from_slice(&quad(0.6));
    let mut h = Harness::new(&vertices);
    h.device.set_render_state(RenderState::ZFunc(CmpFunc::Less));

    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
    h.device.set_pixel_shader(Some(Rc::new(RefCell::new(Flat::new(BLUE)))));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 4, 2).unwrap();

    assert_eq!(h.device.rendered_pixels(), 0);
    assert_eq!(h.pixel(16, 16), RED);
    assert!((h.depth_at(16, 16) - 0.2).abs() < 1e-6);
}

#[test]
fn disabled_depth_writes_keep_the_depth_buffer() {
    let mut h = Harness::new(&quad(0.3));
    h.device.set_render_state(RenderState::ZWriteEnable(false));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
    assert_eq!(h.device.rendered_pixels(), u64::from(SIZE * SIZE));
    assert_eq!(h.depth_at(3, 3), 1.0);
}

#[test]
fn disabled_color_writes_still_count_pixels() {
    let mut h = Harness::new(&quad(0.3));
    h.device.set_render_state(RenderState::ColorWriteEnable(false));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
    assert_eq!(h.device.rendered_pixels(), u64::from(SIZE * SIZE));
    assert_eq!(h.pixel(3, 3), Vector4::ZERO);
    assert!((h.depth_at(3, 3) - 0.3).abs() < 1e-6);
}

#[test]
fn depth_output_shader_is_tested_with_its_own_depth() {
    let mut h = Harness::new(&quad(0.5));
    h.device.set_render_state(RenderState::ZFunc(CmpFunc::Less));
    h.device
        .set_pixel_shader(Some(Rc::new(RefCell::new(Flat::with_depth(BLUE, 0.1)))));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
    assert_eq!(h.device.rendered_pixels(), u64::from(SIZE * SIZE));
    assert!((h.depth_at(7, 7) - 0.1).abs() < 1e-6);

    // 0.5 would pass against 0.1 with Greater; the shader's 0.05 does not.
    h.device.set_render_state(RenderState::ZFunc(CmpFunc::Greater));
    h.device
        .set_pixel_shader(Some(Rc::new(RefCell::new(Flat::with_depth(RED, 0.05)))));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
    assert_eq!(h.device.rendered_pixels(), 0);
    assert_eq!(h.pixel(7, 7), BLUE);
}

#[test]
fn depth_bounds_reject_fragments_outside_the_range() {
    let mut h = Harness::new(&quad(0.5));
    h.device.set_depth_bounds(0.0, 0.4).unwrap();
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
    assert_eq!(h.device.rendered_pixels(), 0);

    assert!(matches!(h.device.set_depth_bounds(0.6, 0.4), Err(Error::InvalidParameters(_))));
    assert!(matches!(h.device.set_depth_bounds(-0.1, 0.4), Err(Error::InvalidParameters(_))));
    assert_eq!(h.device.depth_bounds(), (0.0, 0.4));
}

#[test]
fn scissor_rect_limits_coverage() {
    let mut h = Harness::new(&quad(0.5));
    h.device.set_scissor_rect(Rect::new(8, 8, 16, 16)).unwrap();
    h.device.set_render_state(RenderState::ScissorTestEnable(true));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
    assert_eq!(h.device.rendered_pixels(), 64);
    assert_eq!(h.pixel(8, 8), RED);
    assert_eq!(h.pixel(7, 8), Vector4::ZERO);
    assert_eq!(h.pixel(16, 15), Vector4::ZERO);

    h.device.set_scissor_rect(Rect::new(0, 0, 40, 16)).unwrap();
    assert!(matches!(
        h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn far_plane_clips_unless_disabled() {
    let far: Vec<[f32; 4]> = quad(2.0)[..3].to_vec();
    let mut h = Harness::new(&far);
    h.device.set_render_state(RenderState::ZEnable(false));
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    assert_eq!(h.device.last_draw_stats().triangles_clipped, 1);
    assert_eq!(h.device.rendered_pixels(), 0);

    h.device.set_clipping_plane(ClipPlane::Far, None);
    assert_eq!(h.device.clipping_plane(ClipPlane::Far), None);
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    assert_eq!(h.device.rendered_pixels(), 496);
}

#[test]
fn triangle_shader_can_reject_triangles() {
    let mut h = Harness::new(&quad(0.5));
    h.device.set_triangle_shader(Some(Rc::new(RefCell::new(RejectAll {
        constants: ShaderConstants::default(),
    }))));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
    let stats = h.device.last_draw_stats();
    assert_eq!(stats.triangles_rejected_by_shader, 2);
    assert_eq!(stats.rendered_pixels, 0);
}

#[test]
fn wireframe_draws_only_edges() {
    let mut h = Harness::new(&quad(0.5));
    h.device.set_render_state(RenderState::FillMode(FillMode::Wireframe));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
    let thin = h.device.rendered_pixels();
    assert!(thin > 0 && thin < u64::from(SIZE * SIZE), "{thin}");
    // The shared diagonal is on the line.
    assert_eq!(h.pixel(10, 10), RED);
    assert_eq!(h.pixel(20, 5), Vector4::ZERO);

    h.device.set_render_state(RenderState::LineThickness(3));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
    assert!(h.device.rendered_pixels() > thin);

    h.device.set_render_state(RenderState::LineThickness(0));
    assert!(matches!(
        h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn simple_subdivision_yields_four_to_the_level_leaves() {
    let mut h = Harness::new(&quad(0.5)[..3]);
    h.device.set_render_state(RenderState::SubdivisionMode(SubdivisionMode::Simple));
    h.device.set_render_state(RenderState::SubdivisionLevels(2));
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();

    let stats = h.device.last_draw_stats();
    assert_eq!(stats.triangles_assembled, 1);
    assert_eq!(stats.triangles_processed, 16);
    // Three source vertices, three midpoints at level one, twelve at level two.
    assert_eq!(stats.vertex_shader_invocations, 18);
    // The leaves tile the parent exactly.
    assert_eq!(stats.rendered_pixels, 496);
}

#[test]
fn smooth_subdivision_needs_valid_registers() {
    let mut h = Harness::new(&quad(0.5)[..3]);
    h.device.set_render_state(RenderState::SubdivisionMode(SubdivisionMode::Smooth));
    h.device.set_render_state(RenderState::SubdivisionNormalRegister(9));
    assert!(matches!(
        h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1),
        Err(Error::InvalidState(_))
    ));

    h.device.set_render_state(RenderState::SubdivisionNormalRegister(1));
    h.device.set_render_state(RenderState::SubdivisionLevels(1));
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    assert_eq!(h.device.last_draw_stats().triangles_processed, 4);
}

#[test]
fn adaptive_subdivision_refines_only_large_triangles() {
    let mut h = Harness::new(&quad(0.5)[..3]);
    h.device.set_render_state(RenderState::SubdivisionMode(SubdivisionMode::Adaptive));
    h.device.set_render_state(RenderState::SubdivisionLevels(1));
    h.device.set_render_state(RenderState::SubdivisionMaxInnerLevels(2));
    h.device.set_render_state(RenderState::SubdivisionMaxScreenArea(1.0e9));
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();

    let coarse = h.device.last_draw_stats();
    assert_eq!(coarse.triangles_processed, 3 * 2);
    // Sources, centroid and one midpoint per outer edge.
    assert_eq!(coarse.vertex_shader_invocations, 3 + 1 + 3);

    // Every inner triangle is tens of pixels large, so all of them split twice.
    h.device.set_render_state(RenderState::SubdivisionMaxScreenArea(1.0));
    h.device.draw_primitive(PrimitiveType::TriangleList, 0, 1).unwrap();
    assert_eq!(h.device.last_draw_stats().triangles_processed, 6 * 16);
}

#[test]
fn pixel_shader_sees_screen_space_derivatives() {
    let mut h = Harness::new(&quad(0.5));
    let shader = Rc::new(RefCell::new(Flat::new(RED)));
    h.device.set_pixel_shader(Some(shader.clone() as Rc<RefCell<dyn PixelShader>>));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();

    let (ddx, ddy) = shader.borrow().derivatives.get().unwrap();
    let step = 2.0 / SIZE as f32;
    assert!(ddx.approx_eq(Vector4::new(step, 0.0, 0.0, 0.0), 1e-6), "{ddx:?}");
    assert!(ddy.approx_eq(Vector4::new(0.0, -step, 0.0, 0.0), 1e-6), "{ddy:?}");
}

#[test]
fn draw_requires_complete_state() {
    let mut h = Harness::new(&quad(0.5));
    h.device.set_vertex_shader(None);
    assert!(matches!(
        h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2),
        Err(Error::InvalidState(_))
    ));
    h.device.set_vertex_shader(Some(Rc::new(RefCell::new(PassThrough::default()))));

    h.target.borrow_mut().set_depth_buffer(None).unwrap();
    assert!(matches!(
        h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2),
        Err(Error::InvalidState(_))
    ));
    h.device.set_render_state(RenderState::ZEnable(false));
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();

    assert!(matches!(
        h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 0),
        Err(Error::InvalidParameters(_))
    ));

    h.device.set_vertex_stream(0, None, 0, 0).unwrap();
    assert!(matches!(
        h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(
        h.device.set_vertex_stream(0, Some(h.vertices.clone()), 0, 0),
        Err(Error::InvalidParameters(_))
    ));
    assert!(matches!(
        h.device.set_vertex_stream(8, Some(h.vertices.clone()), 0, 16),
        Err(Error::InvalidParameters(_))
    ));
}

#[test]
fn reading_past_the_vertex_buffer_fails_the_draw() {
    let mut h = Harness::new(&quad(0.5));
    let err = h.device.draw_primitive(PrimitiveType::TriangleStrip, 1, 2).unwrap_err();
    assert!(matches!(err, Error::InvalidParameters(_)), "{err}");
    // The locks were released, so the buffers can be borrowed again.
    assert!(h.color.try_borrow_mut().is_ok());
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
}

#[test]
fn locked_render_target_is_invalid_state() {
    let mut h = Harness::new(&quad(0.5));
    let guard = h.color.borrow_mut();
    assert!(matches!(
        h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2),
        Err(Error::InvalidState(_))
    ));
    drop(guard);
    h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2).unwrap();
}

#[test]
fn viewport_outside_the_surface_is_rejected() {
    let mut h = Harness::new(&quad(0.5));
    h.target
        .borrow_mut()
        .set_viewport_matrix(Matrix44::viewport(0.0, 0.0, 64.0, 32.0, 0.0, 1.0));
    assert!(matches!(
        h.device.draw_primitive(PrimitiveType::TriangleStrip, 0, 2),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn device_samples_bound_textures() {
    let mut h = Harness::new(&quad(0.5));
    let texture = h.device.create_texture(2, 1, 1, Format::R32G32B32A32F).unwrap();
    {
        let level = texture.surface_level(0).unwrap();
        let mut level = level.borrow_mut();
        level.set_pixel(0, 0, RED).unwrap();
        level.set_pixel(1, 0, BLUE).unwrap();
    }
    assert!(matches!(
        h.device.sample_texture(3, 0.25, 0.5, 0.0, None, None),
        Err(Error::InvalidState(_))
    ));

    h.device.set_texture(3, Some(texture as Rc<dyn BaseTexture>)).unwrap();
    assert_eq!(h.device.sample_texture(3, 0.25, 0.5, 0.0, None, None).unwrap(), RED);
    // Wrapping brings 1.75 back to 0.75.
    assert_eq!(h.device.sample_texture(3, 1.75, 0.5, 0.0, None, None).unwrap(), BLUE);
    assert!(matches!(
        h.device.sample_texture(16, 0.25, 0.5, 0.0, None, None),
        Err(Error::InvalidParameters(_))
    ));
}

struct CountingPresent {
    presented: Rc<Cell<u32>>,
}

impl PresentTarget for CountingPresent {
    fn present(&mut self, surface: &Surface) -> crate::Result<()> {
        assert_eq!((surface.width(), surface.height()), (SIZE, SIZE));
        self.presented.set(self.presented.get() + 1);
        Ok(())
    }
}

#[test]
fn present_forwards_matching_color_buffers() {
    let mut h = Harness::new(&quad(0.5));
    assert!(matches!(
        h.device.present(&h.target.borrow()),
        Err(Error::InvalidState(_))
    ));

    let presented = Rc::new(Cell::new(0));
    h.device.set_present_target(Some(Box::new(CountingPresent {
        presented: presented.clone(),
    })));
    h.device.present(&h.target.borrow()).unwrap();
    assert_eq!(presented.get(), 1);

    let small = h.device.create_surface(16, 16, Format::R32G32B32A32F).unwrap();
    let mut other = RenderTarget::new();
    other.set_color_buffer(Some(small));
    assert!(matches!(h.device.present(&other), Err(Error::InvalidParameters(_))));
    assert_eq!(presented.get(), 1);
}

#[test]
fn device_config_is_validated() {
    assert!(matches!(
        Device::new(DeviceConfig::new(0, 480)),
        Err(Error::InvalidParameters(_))
    ));
    let device = Device::new(DeviceConfig::default()).unwrap();
    assert_eq!(device.scissor_rect(), Rect::new(0, 0, 640, 480));
    assert_eq!(device.render_states().z_func, CmpFunc::LessEqual);
}
