//! Bindable device state: render states, sampler states and clipping planes.

pub mod topology;

use muli3d_math::Plane;

/// Depth comparison functions. The incoming fragment depth is the left operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpFunc {
    Never,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Always,
}

impl CmpFunc {
    pub const ALL: [CmpFunc; 8] = [
        CmpFunc::Never,
        CmpFunc::Equal,
        CmpFunc::NotEqual,
        CmpFunc::Less,
        CmpFunc::LessEqual,
        CmpFunc::Greater,
        CmpFunc::GreaterEqual,
        CmpFunc::Always,
    ];

    /// Returns whether a fragment with depth `incoming` passes against the stored depth `existing`.
    #[inline]
    pub fn passes(self, incoming: f32, existing: f32) -> bool {
        match self {
            CmpFunc::Never => false,
            CmpFunc::Equal => incoming == existing,
            CmpFunc::NotEqual => incoming != existing,
            CmpFunc::Less => incoming < existing,
            CmpFunc::LessEqual => incoming <= existing,
            CmpFunc::Greater => incoming > existing,
            CmpFunc::GreaterEqual => incoming >= existing,
            CmpFunc::Always => true,
        }
    }
}

/// Which screen-space winding is discarded.
///
/// Screen space has y growing downwards, so `Cw` culls triangles that appear clockwise on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Cw,
    Ccw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubdivisionMode {
    None,
    /// Midpoint subdivision to a fixed depth.
    Simple,
    /// Midpoint subdivision with midpoints displaced along the endpoint normals.
    Smooth,
    /// Fixed-depth edge subdivision around a centroid, then area-driven inner subdivision.
    Adaptive,
}

/// Subdivision parameters. Only the fields required by `mode` are validated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubdivisionStates {
    pub mode: SubdivisionMode,
    pub levels: u32,
    /// Vertex input register holding the object-space position (smooth mode).
    pub position_register: u32,
    /// Vertex input register holding the object-space normal (smooth mode).
    pub normal_register: u32,
    /// Projected area in pixels above which adaptive mode keeps refining inner triangles.
    pub max_screen_area: f32,
    pub max_inner_levels: u32,
}

impl Default for SubdivisionStates {
    fn default() -> Self {
        Self {
            mode: SubdivisionMode::None,
            levels: 1,
            position_register: 0,
            normal_register: 1,
            max_screen_area: 1.0,
            max_inner_levels: 1,
        }
    }
}

/// Snapshot of every render state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderStates {
    pub z_enable: bool,
    pub z_write_enable: bool,
    pub z_func: CmpFunc,
    pub color_write_enable: bool,
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub subdivision: SubdivisionStates,
    pub scissor_test_enable: bool,
    pub line_thickness: u32,
}

impl Default for RenderStates {
    fn default() -> Self {
        Self {
            z_enable: true,
            z_write_enable: true,
            z_func: CmpFunc::LessEqual,
            color_write_enable: true,
            fill_mode: FillMode::Solid,
            cull_mode: CullMode::Ccw,
            subdivision: SubdivisionStates::default(),
            scissor_test_enable: false,
            line_thickness: 1,
        }
    }
}

/// A single render state together with its value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RenderState {
    ZEnable(bool),
    ZWriteEnable(bool),
    ZFunc(CmpFunc),
    ColorWriteEnable(bool),
    FillMode(FillMode),
    CullMode(CullMode),
    SubdivisionMode(SubdivisionMode),
    SubdivisionLevels(u32),
    SubdivisionPositionRegister(u32),
    SubdivisionNormalRegister(u32),
    SubdivisionMaxScreenArea(f32),
    SubdivisionMaxInnerLevels(u32),
    ScissorTestEnable(bool),
    LineThickness(u32),
}

impl RenderStates {
    pub fn apply(&mut self, state: RenderState) {
        match state {
            RenderState::ZEnable(v) => self.z_enable = v,
            RenderState::ZWriteEnable(v) => self.z_write_enable = v,
            RenderState::ZFunc(v) => self.z_func = v,
            RenderState::ColorWriteEnable(v) => self.color_write_enable = v,
            RenderState::FillMode(v) => self.fill_mode = v,
            RenderState::CullMode(v) => self.cull_mode = v,
            RenderState::SubdivisionMode(v) => self.subdivision.mode = v,
            RenderState::SubdivisionLevels(v) => self.subdivision.levels = v,
            RenderState::SubdivisionPositionRegister(v) => self.subdivision.position_register = v,
            RenderState::SubdivisionNormalRegister(v) => self.subdivision.normal_register = v,
            RenderState::SubdivisionMaxScreenArea(v) => self.subdivision.max_screen_area = v,
            RenderState::SubdivisionMaxInnerLevels(v) => self.subdivision.max_inner_levels = v,
            RenderState::ScissorTestEnable(v) => self.scissor_test_enable = v,
            RenderState::LineThickness(v) => self.line_thickness = v,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Clamp,
}

impl AddressMode {
    /// Maps a texture coordinate into `[0, 1]`.
    #[inline]
    pub fn apply(self, coord: f32) -> f32 {
        match self {
            AddressMode::Wrap => coord - coord.floor(),
            AddressMode::Clamp => coord.clamp(0.0, 1.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Point,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MipFilter {
    None,
    Point,
    Linear,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerStates {
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub mip_filter: MipFilter,
    pub mip_lod_bias: f32,
}

impl Default for SamplerStates {
    fn default() -> Self {
        Self {
            address_u: AddressMode::Wrap,
            address_v: AddressMode::Wrap,
            address_w: AddressMode::Wrap,
            min_filter: TextureFilter::Point,
            mag_filter: TextureFilter::Point,
            mip_filter: MipFilter::None,
            mip_lod_bias: 0.0,
        }
    }
}

/// A single sampler state together with its value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SamplerState {
    AddressU(AddressMode),
    AddressV(AddressMode),
    AddressW(AddressMode),
    MinFilter(TextureFilter),
    MagFilter(TextureFilter),
    MipFilter(MipFilter),
    MipLodBias(f32),
}

impl SamplerStates {
    pub fn apply(&mut self, state: SamplerState) {
        match state {
            SamplerState::AddressU(v) => self.address_u = v,
            SamplerState::AddressV(v) => self.address_v = v,
            SamplerState::AddressW(v) => self.address_w = v,
            SamplerState::MinFilter(v) => self.min_filter = v,
            SamplerState::MagFilter(v) => self.mag_filter = v,
            SamplerState::MipFilter(v) => self.mip_filter = v,
            SamplerState::MipLodBias(v) => self.mip_lod_bias = v,
        }
    }
}

/// The clip-space frustum planes. Each can be replaced or disabled on the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClipPlane {
    Left,
    Right,
    Top,
    Bottom,
    Near,
    Far,
}

impl ClipPlane {
    pub const ALL: [ClipPlane; 6] = [
        ClipPlane::Near,
        ClipPlane::Far,
        ClipPlane::Left,
        ClipPlane::Right,
        ClipPlane::Top,
        ClipPlane::Bottom,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            ClipPlane::Near => 0,
            ClipPlane::Far => 1,
            ClipPlane::Left => 2,
            ClipPlane::Right => 3,
            ClipPlane::Top => 4,
            ClipPlane::Bottom => 5,
        }
    }

    /// Clip-space plane (`0 <= z <= w`, `-w <= x, y <= w`) with the inside on its positive side.
    pub fn default_plane(self) -> Plane {
        match self {
            ClipPlane::Near => Plane::new(0.0, 0.0, 1.0, 0.0),
            ClipPlane::Far => Plane::new(0.0, 0.0, -1.0, 1.0),
            ClipPlane::Left => Plane::new(1.0, 0.0, 0.0, 1.0),
            ClipPlane::Right => Plane::new(-1.0, 0.0, 0.0, 1.0),
            ClipPlane::Top => Plane::new(0.0, -1.0, 0.0, 1.0),
            ClipPlane::Bottom => Plane::new(0.0, 1.0, 0.0, 1.0),
        }
    }
}
