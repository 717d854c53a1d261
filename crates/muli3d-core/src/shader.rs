//! Shader contracts and the register plumbing shared by every pipeline stage.
//!
//! Shaders are user-supplied strategy objects invoked through dynamic dispatch. Every shader kind
//! carries the same constant banks (see [`ShaderConstants`]) and samples textures through the
//! context handed to its `execute` method.

use std::rc::Rc;

use muli3d_math::{Matrix44, Vector4};

use crate::base_texture::{BaseTexture, TextureSampleInput};
use crate::device::gradient::TriangleGradient;
use crate::error::{Error, Result};
use crate::limits::{MAX_SHADER_CONSTANTS, MAX_SHADER_REGISTERS, MAX_TEXTURE_SAMPLERS};
use crate::state::topology::PrimitiveType;
use crate::state::SamplerStates;

/// Semantic width of a shader register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ShaderRegType {
    #[default]
    Unused,
    Float,
    Vector2,
    Vector3,
    Vector4,
}

impl ShaderRegType {
    /// Number of meaningful components.
    #[inline]
    pub const fn components(self) -> usize {
        match self {
            ShaderRegType::Unused => 0,
            ShaderRegType::Float => 1,
            ShaderRegType::Vector2 => 2,
            ShaderRegType::Vector3 => 3,
            ShaderRegType::Vector4 => 4,
        }
    }
}

/// The register file passed between stages.
pub type ShaderRegisters = [Vector4; MAX_SHADER_REGISTERS];

/// Result of running the vertex shader on one source vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VsOutput {
    /// Decoded vertex-shader inputs. Subdivision interpolates these and shades the result again.
    pub source: ShaderRegisters,
    /// Clip-space position. After projection: screen x/y, depth z and `1/w` in `w`.
    pub position: Vector4,
    pub registers: ShaderRegisters,
}

/// Per-register widths declared by the vertex shader.
///
/// Every interpolation, gradient and projection step reads and writes only the declared
/// components of each register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RegisterLayout {
    types: [ShaderRegType; MAX_SHADER_REGISTERS],
}

impl RegisterLayout {
    pub(crate) fn new(types: [ShaderRegType; MAX_SHADER_REGISTERS]) -> Self {
        Self { types }
    }

    #[inline]
    fn active(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.types
            .iter()
            .enumerate()
            .map(|(i, ty)| (i, ty.components()))
            .filter(|&(_, n)| n > 0)
    }

    /// Zeroes every component beyond the declared width.
    pub(crate) fn mask(&self, regs: &mut ShaderRegisters) {
        for (reg, ty) in regs.iter_mut().zip(self.types.iter()) {
            for c in ty.components()..4 {
                reg[c] = 0.0;
            }
        }
    }

    pub(crate) fn lerp(&self, a: &ShaderRegisters, b: &ShaderRegisters, t: f32, out: &mut ShaderRegisters) {
        for (i, n) in self.active() {
            for c in 0..n {
                out[i][c] = a[i][c] + (b[i][c] - a[i][c]) * t;
            }
        }
    }

    pub(crate) fn scale(&self, regs: &mut ShaderRegisters, s: f32) {
        for (i, n) in self.active() {
            for c in 0..n {
                regs[i][c] *= s;
            }
        }
    }

    /// `dst += src * s` on the declared components.
    pub(crate) fn add_scaled(&self, dst: &mut ShaderRegisters, src: &ShaderRegisters, s: f32) {
        for (i, n) in self.active() {
            for c in 0..n {
                dst[i][c] += src[i][c] * s;
            }
        }
    }

    /// `f(i, c)` for every declared component `c` of register `i`.
    pub(crate) fn for_each_component(&self, mut f: impl FnMut(usize, usize)) {
        for (i, n) in self.active() {
            for c in 0..n {
                f(i, c);
            }
        }
    }
}

/// Constant registers shared by all shader kinds.
///
/// Floats, vectors and matrices live in separate banks of [`MAX_SHADER_CONSTANTS`] entries.
/// Reading an out-of-range index yields zero.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderConstants {
    floats: [f32; MAX_SHADER_CONSTANTS],
    vectors: [Vector4; MAX_SHADER_CONSTANTS],
    matrices: [Matrix44; MAX_SHADER_CONSTANTS],
}

const ZERO_MATRIX: Matrix44 = Matrix44::from_rows([[0.0; 4]; 4]);

impl Default for ShaderConstants {
    fn default() -> Self {
        Self {
            floats: [0.0; MAX_SHADER_CONSTANTS],
            vectors: [Vector4::ZERO; MAX_SHADER_CONSTANTS],
            matrices: [ZERO_MATRIX; MAX_SHADER_CONSTANTS],
        }
    }
}

fn check_constant_index(kind: &str, index: usize) -> Result<()> {
    if index >= MAX_SHADER_CONSTANTS {
        return Err(Error::invalid_parameters(format!(
            "{kind} constant index {index} out of range (max {MAX_SHADER_CONSTANTS})"
        )));
    }
    Ok(())
}

impl ShaderConstants {
    pub fn set_float(&mut self, index: usize, value: f32) -> Result<()> {
        check_constant_index("float", index)?;
        self.floats[index] = value;
        Ok(())
    }

    pub fn float(&self, index: usize) -> f32 {
        self.floats.get(index).copied().unwrap_or(0.0)
    }

    pub fn set_vector(&mut self, index: usize, value: Vector4) -> Result<()> {
        check_constant_index("vector", index)?;
        self.vectors[index] = value;
        Ok(())
    }

    pub fn vector(&self, index: usize) -> Vector4 {
        self.vectors.get(index).copied().unwrap_or(Vector4::ZERO)
    }

    pub fn set_matrix(&mut self, index: usize, value: Matrix44) -> Result<()> {
        check_constant_index("matrix", index)?;
        self.matrices[index] = value;
        Ok(())
    }

    pub fn matrix(&self, index: usize) -> Matrix44 {
        self.matrices.get(index).copied().unwrap_or(ZERO_MATRIX)
    }
}

/// Base contract of every shader kind: access to its constant banks.
pub trait Shader {
    fn constants(&self) -> &ShaderConstants;
    fn constants_mut(&mut self) -> &mut ShaderConstants;

    fn set_float_constant(&mut self, index: usize, value: f32) -> Result<()> {
        self.constants_mut().set_float(index, value)
    }

    fn float_constant(&self, index: usize) -> f32 {
        self.constants().float(index)
    }

    fn set_vector_constant(&mut self, index: usize, value: Vector4) -> Result<()> {
        self.constants_mut().set_vector(index, value)
    }

    fn vector_constant(&self, index: usize) -> Vector4 {
        self.constants().vector(index)
    }

    fn set_matrix_constant(&mut self, index: usize, value: Matrix44) -> Result<()> {
        self.constants_mut().set_matrix(index, value)
    }

    fn matrix_constant(&self, index: usize) -> Matrix44 {
        self.constants().matrix(index)
    }
}

pub trait VertexShader: Shader {
    /// Declared width of each output register.
    fn output_register_types(&self) -> [ShaderRegType; MAX_SHADER_REGISTERS];

    /// Transforms one vertex. `position` receives the clip-space position.
    fn execute(
        &self,
        ctx: &SamplerContext<'_>,
        input: &ShaderRegisters,
        position: &mut Vector4,
        output: &mut ShaderRegisters,
    );
}

/// Optional per-triangle stage run after vertex shading and before clipping.
pub trait TriangleShader: Shader {
    /// May rewrite the output registers of the three vertices. Returning `false` drops the
    /// triangle.
    fn execute(
        &self,
        v0: &mut ShaderRegisters,
        v1: &mut ShaderRegisters,
        v2: &mut ShaderRegisters,
    ) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelShaderOutput {
    /// The shader writes colour only; the depth test runs before the shader.
    Color,
    /// The shader may replace the interpolated depth; the depth test runs after the shader.
    ColorDepth,
}

pub trait PixelShader: Shader {
    fn output(&self) -> PixelShaderOutput;

    /// Whether `execute` can return `false` to discard a fragment.
    fn might_kill_pixels(&self) -> bool;

    /// Shades one fragment. `color` holds the current framebuffer colour on entry and `depth`
    /// the interpolated depth.
    fn execute(
        &self,
        ctx: &PixelContext<'_>,
        input: &ShaderRegisters,
        color: &mut Vector4,
        depth: &mut f32,
    ) -> bool;
}

/// Produces the index order for `draw_dynamic_primitive`.
pub trait PrimitiveAssembler {
    /// Fills `indices` with vertex numbers in `[0, num_vertices)` and returns how they are to be
    /// assembled into triangles.
    fn execute(&mut self, indices: &mut Vec<u32>, num_vertices: u32) -> PrimitiveType;
}

pub(crate) type TextureSlots = [Option<Rc<dyn BaseTexture>>; MAX_TEXTURE_SAMPLERS];
pub(crate) type SamplerSlots = [SamplerStates; MAX_TEXTURE_SAMPLERS];

/// Bound textures and sampler states, as seen by a shader.
pub struct SamplerContext<'a> {
    textures: &'a TextureSlots,
    samplers: &'a SamplerSlots,
}

impl<'a> SamplerContext<'a> {
    pub(crate) fn new(textures: &'a TextureSlots, samplers: &'a SamplerSlots) -> Self {
        Self { textures, samplers }
    }

    /// Samples the texture bound to `sampler`.
    ///
    /// The coordinates are first wrapped or clamped per the sampler's address modes, for as many
    /// axes as the texture consumes. Cube textures take a direction vector and skip addressing.
    /// `ddx`/`ddy` are the screen-space derivatives of the coordinates and drive mip selection.
    pub fn sample_texture(
        &self,
        sampler: usize,
        u: f32,
        v: f32,
        w: f32,
        ddx: Option<&Vector4>,
        ddy: Option<&Vector4>,
    ) -> Result<Vector4> {
        if sampler >= MAX_TEXTURE_SAMPLERS {
            return Err(Error::invalid_parameters(format!(
                "sampler {sampler} out of range (max {MAX_TEXTURE_SAMPLERS})"
            )));
        }
        let texture = self.textures[sampler]
            .as_ref()
            .ok_or_else(|| Error::invalid_state(format!("no texture bound to sampler {sampler}")))?;
        let states = &self.samplers[sampler];

        let coord = match texture.sample_input() {
            TextureSampleInput::Uv => {
                Vector4::new(states.address_u.apply(u), states.address_v.apply(v), 0.0, 0.0)
            }
            TextureSampleInput::Uvw => Vector4::new(
                states.address_u.apply(u),
                states.address_v.apply(v),
                states.address_w.apply(w),
                0.0,
            ),
            TextureSampleInput::Direction => Vector4::new(u, v, w, 0.0),
        };
        texture.sample(states, coord, ddx, ddy)
    }
}

/// What a pixel shader sees: the samplers plus the screen-space derivatives of its inputs.
pub struct PixelContext<'a> {
    sampler: &'a SamplerContext<'a>,
    gradient: &'a TriangleGradient,
    input: &'a ShaderRegisters,
    w: f32,
}

impl<'a> PixelContext<'a> {
    pub(crate) fn new(
        sampler: &'a SamplerContext<'a>,
        gradient: &'a TriangleGradient,
        input: &'a ShaderRegisters,
        w: f32,
    ) -> Self {
        Self {
            sampler,
            gradient,
            input,
            w,
        }
    }

    pub fn sampler(&self) -> &SamplerContext<'a> {
        self.sampler
    }

    pub fn sample_texture(
        &self,
        sampler: usize,
        u: f32,
        v: f32,
        w: f32,
        ddx: Option<&Vector4>,
        ddy: Option<&Vector4>,
    ) -> Result<Vector4> {
        self.sampler.sample_texture(sampler, u, v, w, ddx, ddy)
    }

    /// Screen-space derivatives `(d/dx, d/dy)` of input register `register` at this fragment.
    pub fn derivatives(&self, register: usize) -> Result<(Vector4, Vector4)> {
        if register >= MAX_SHADER_REGISTERS {
            return Err(Error::invalid_parameters(format!(
                "register {register} out of range (max {MAX_SHADER_REGISTERS})"
            )));
        }
        let r = self.input[register];
        let ddx = self.gradient.ddx();
        let ddy = self.gradient.ddy();
        let dx = (ddx.registers[register] - r * ddx.position.w) * self.w;
        let dy = (ddy.registers[register] - r * ddy.position.w) * self.w;
        Ok((dx, dy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_banks_are_bounds_checked() {
        let mut constants = ShaderConstants::default();
        constants.set_float(3, 2.5).unwrap();
        constants.set_vector(31, Vector4::ONE).unwrap();
        assert!(matches!(
            constants.set_matrix(32, Matrix44::IDENTITY),
            Err(Error::InvalidParameters(_))
        ));

        assert_eq!(constants.float(3), 2.5);
        assert_eq!(constants.vector(31), Vector4::ONE);
        assert_eq!(constants.float(99), 0.0);
        assert_eq!(constants.matrix(0), ZERO_MATRIX);
    }

    #[test]
    fn layout_touches_only_declared_components() {
        let mut types = [ShaderRegType::Unused; MAX_SHADER_REGISTERS];
        types[0] = ShaderRegType::Vector2;
        types[2] = ShaderRegType::Vector4;
        let layout = RegisterLayout::new(types);

        let mut regs = [Vector4::splat(2.0); MAX_SHADER_REGISTERS];
        layout.scale(&mut regs, 0.5);
        assert_eq!(regs[0], Vector4::new(1.0, 1.0, 2.0, 2.0));
        assert_eq!(regs[1], Vector4::splat(2.0));
        assert_eq!(regs[2], Vector4::splat(1.0));

        layout.mask(&mut regs);
        assert_eq!(regs[0], Vector4::new(1.0, 1.0, 0.0, 0.0));
        assert_eq!(regs[1], Vector4::ZERO);
        assert_eq!(regs[2], Vector4::splat(1.0));
    }
}
