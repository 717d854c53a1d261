//! Pre-draw validation and the per-draw snapshot derived from it.

use muli3d_math::{Matrix44, Plane};

use crate::error::{Error, Result};
use crate::limits::{MAX_SHADER_REGISTERS, MAX_SUBDIVISION_LEVELS, NUM_FRUSTUM_PLANES, NUM_SCISSOR_PLANES};
use crate::shader::{PixelShaderOutput, RegisterLayout};
use crate::state::{RenderStates, SubdivisionMode, SubdivisionStates};
use crate::surface::Rect;

/// Fragment routine chosen once per draw from the pixel shader's declared traits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum FragmentPath {
    /// Depth test, then shade; every shaded fragment is written.
    Color,
    /// Depth test, then shade; the shader may discard.
    ColorKill,
    /// Shade first, then depth test against the shader's depth.
    ColorDepth,
    ColorDepthKill,
}

impl FragmentPath {
    pub fn select(output: PixelShaderOutput, might_kill: bool) -> Self {
        match (output, might_kill) {
            (PixelShaderOutput::Color, false) => FragmentPath::Color,
            (PixelShaderOutput::Color, true) => FragmentPath::ColorKill,
            (PixelShaderOutput::ColorDepth, false) => FragmentPath::ColorDepth,
            (PixelShaderOutput::ColorDepth, true) => FragmentPath::ColorDepthKill,
        }
    }
}

/// Everything the pipeline needs about the current draw call, validated up front.
#[derive(Clone, Debug)]
pub(crate) struct RenderInfo {
    pub states: RenderStates,
    pub viewport: Matrix44,
    /// Pixels the rasterizer may touch: the scissor rect when scissoring, else the viewport.
    pub raster_rect: Rect,
    pub frustum_planes: [Option<Plane>; NUM_FRUSTUM_PLANES],
    pub scissor_planes: Option<[Plane; NUM_SCISSOR_PLANES]>,
    pub layout: RegisterLayout,
    pub fragment_path: FragmentPath,
    pub depth_bounds: (f32, f32),
}

impl RenderInfo {
    /// Fragments passing the depth bounds and the depth comparison against `existing`.
    #[inline]
    pub fn depth_passes(&self, depth: f32, existing: f32) -> bool {
        depth >= self.depth_bounds.0 && depth <= self.depth_bounds.1 && self.states.z_func.passes(depth, existing)
    }
}

/// Checks the render states the configured subdivision mode depends on.
pub(crate) fn validate_subdivision(sub: &SubdivisionStates) -> Result<()> {
    if sub.mode == SubdivisionMode::None {
        return Ok(());
    }
    if !(1..=MAX_SUBDIVISION_LEVELS).contains(&sub.levels) {
        return Err(Error::invalid_state(format!(
            "subdivision levels {} outside 1..={MAX_SUBDIVISION_LEVELS}",
            sub.levels
        )));
    }
    match sub.mode {
        SubdivisionMode::Smooth => {
            for (name, reg) in [("position", sub.position_register), ("normal", sub.normal_register)] {
                if reg as usize >= MAX_SHADER_REGISTERS {
                    return Err(Error::invalid_state(format!(
                        "subdivision {name} register {reg} out of range (max {MAX_SHADER_REGISTERS})"
                    )));
                }
            }
        }
        SubdivisionMode::Adaptive => {
            if !(sub.max_screen_area > 0.0) {
                return Err(Error::invalid_state(format!(
                    "adaptive subdivision needs a positive max screen area (got {})",
                    sub.max_screen_area
                )));
            }
            if !(1..=MAX_SUBDIVISION_LEVELS).contains(&sub.max_inner_levels) {
                return Err(Error::invalid_state(format!(
                    "subdivision max inner levels {} outside 1..={MAX_SUBDIVISION_LEVELS}",
                    sub.max_inner_levels
                )));
            }
        }
        SubdivisionMode::None | SubdivisionMode::Simple => {}
    }
    Ok(())
}

/// Pixel rectangle covered by the viewport transform.
///
/// The transform maps NDC x in `[-1, 1]` to `[m30 - m00, m30 + m00]` and NDC y in `[-1, 1]` to
/// `[m31 - m11, m31 + m11]` (with `m11` negative for a y-down screen). The rectangle must be
/// non-empty and fit inside every bound surface.
pub(crate) fn viewport_rect(viewport: &Matrix44, surfaces: &[(u32, u32)]) -> Result<Rect> {
    let m = &viewport.m;
    let (x0, x1) = (m[3][0] - m[0][0], m[3][0] + m[0][0]);
    let (y0, y1) = (m[3][1] + m[1][1], m[3][1] - m[1][1]);
    let (left, right) = (x0.min(x1), x0.max(x1));
    let (top, bottom) = (y0.min(y1), y0.max(y1));

    if ![left, right, top, bottom].iter().all(|v| v.is_finite()) || left < 0.0 || top < 0.0 {
        return Err(Error::invalid_state(format!(
            "viewport ({left}, {top})-({right}, {bottom}) is not inside the render target"
        )));
    }
    let rect = Rect::new(
        left.ceil() as u32,
        top.ceil() as u32,
        right.ceil() as u32,
        bottom.ceil() as u32,
    );
    if rect.is_empty() {
        return Err(Error::invalid_state(format!("viewport {rect:?} is degenerate")));
    }
    for &(width, height) in surfaces {
        if !Rect::new(0, 0, width, height).contains(&rect) {
            return Err(Error::invalid_state(format!(
                "viewport {rect:?} exceeds {width}x{height} render target surface"
            )));
        }
    }
    Ok(rect)
}

/// Screen-space planes bounding `rect`, inside where `a*x + b*y + d >= 0`.
pub(crate) fn scissor_planes(rect: &Rect) -> [Plane; NUM_SCISSOR_PLANES] {
    [
        Plane::new(1.0, 0.0, 0.0, -(rect.left as f32)),
        Plane::new(-1.0, 0.0, 0.0, rect.right as f32),
        Plane::new(0.0, 1.0, 0.0, -(rect.top as f32)),
        Plane::new(0.0, -1.0, 0.0, rect.bottom as f32),
    ]
}
