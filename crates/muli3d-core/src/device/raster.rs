//! Scanline and line rasterization plus per-fragment processing.
//!
//! Pixels are sampled at integer coordinates. A scanline covers the pixels from `ceil(x_left)` up to,
//! but excluding, `ceil(x_right)`, and rows are treated the same way, so triangles sharing an edge
//! never touch the same pixel twice.

use muli3d_math::Vector4;

use crate::limits::MAX_SHADER_REGISTERS;
use crate::shader::{PixelContext, VsOutput};
use crate::state::FillMode;

use super::gradient::{Interpolants, TriangleGradient};
use super::pass::{PassInputs, PassTargets};
use super::render_info::FragmentPath;

/// Rasterizes one projected triangle with the fragment routine chosen for this draw.
pub(crate) fn rasterize_triangle(inputs: &PassInputs<'_>, targets: &mut PassTargets<'_>, tri: &[VsOutput; 3]) {
    let gradient = TriangleGradient::new(&tri[0], &tri[1], &tri[2], inputs.info.layout);
    let gradient = gradient.as_ref();
    match inputs.info.fragment_path {
        FragmentPath::Color => rasterize::<false, false>(inputs, targets, gradient, tri),
        FragmentPath::ColorKill => rasterize::<false, true>(inputs, targets, gradient, tri),
        FragmentPath::ColorDepth => rasterize::<true, false>(inputs, targets, gradient, tri),
        FragmentPath::ColorDepthKill => rasterize::<true, true>(inputs, targets, gradient, tri),
    }
}

/// `gradient` is `None` for triangles without screen-space area. Those fill nothing, but their
/// outline is still drawn in wireframe mode.
fn rasterize<const DEPTH_OUT: bool, const KILL: bool>(
    inputs: &PassInputs<'_>,
    targets: &mut PassTargets<'_>,
    gradient: Option<&TriangleGradient>,
    tri: &[VsOutput; 3],
) {
    match (inputs.info.states.fill_mode, gradient) {
        (FillMode::Solid, Some(gradient)) => scan_triangle::<DEPTH_OUT, KILL>(inputs, targets, gradient, tri),
        (FillMode::Solid, None) => {}
        (FillMode::Wireframe, _) => {
            for (a, b) in [(0, 1), (1, 2), (2, 0)] {
                let (from, to) = (&tri[a], &tri[b]);
                match gradient {
                    Some(gradient) => rasterize_line::<DEPTH_OUT, KILL>(inputs, targets, gradient, from, to),
                    None => {
                        if let Some(edge) = TriangleGradient::along_edge(from, to, inputs.info.layout) {
                            rasterize_line::<DEPTH_OUT, KILL>(inputs, targets, &edge, from, to);
                        }
                    }
                }
            }
        }
    }
}

#[inline]
fn inverse_slope(from: Vector4, to: Vector4) -> f32 {
    let dy = to.y - from.y;
    if dy == 0.0 {
        0.0
    } else {
        (to.x - from.x) / dy
    }
}

fn scan_triangle<const DEPTH_OUT: bool, const KILL: bool>(
    inputs: &PassInputs<'_>,
    targets: &mut PassTargets<'_>,
    gradient: &TriangleGradient,
    tri: &[VsOutput; 3],
) {
    let rect = inputs.info.raster_rect;
    let (mut a, mut b, mut c) = (tri[0].position, tri[1].position, tri[2].position);
    if a.y > b.y {
        std::mem::swap(&mut a, &mut b);
    }
    if b.y > c.y {
        std::mem::swap(&mut b, &mut c);
    }
    if a.y > b.y {
        std::mem::swap(&mut a, &mut b);
    }

    let slope_ab = inverse_slope(a, b);
    let slope_ac = inverse_slope(a, c);
    let slope_bc = inverse_slope(b, c);

    let y_start = (a.y.ceil() as i64).max(i64::from(rect.top));
    let y_end = (c.y.ceil() as i64).min(i64::from(rect.bottom));
    let y_middle = b.y.ceil() as i64;

    for y in y_start..y_end {
        let fy = y as f32;
        let x_long = a.x + (fy - a.y) * slope_ac;
        let x_short = if y < y_middle {
            a.x + (fy - a.y) * slope_ab
        } else {
            b.x + (fy - b.y) * slope_bc
        };
        let (x_left, x_right) = if x_long < x_short { (x_long, x_short) } else { (x_short, x_long) };

        let x_start = (x_left.ceil() as i64).max(i64::from(rect.left));
        let x_end = (x_right.ceil() as i64).min(i64::from(rect.right));
        if x_start >= x_end {
            continue;
        }

        let mut values = gradient.at(x_start as f32, fy);
        for x in x_start..x_end {
            shade_fragment::<DEPTH_OUT, KILL>(inputs, targets, gradient, &values, x as u32, y as u32);
            gradient.step_x(&mut values);
        }
    }
}

/// Draws an edge `line_thickness` pixels wide by walking its major axis.
fn rasterize_line<const DEPTH_OUT: bool, const KILL: bool>(
    inputs: &PassInputs<'_>,
    targets: &mut PassTargets<'_>,
    gradient: &TriangleGradient,
    from: &VsOutput,
    to: &VsOutput,
) {
    let rect = inputs.info.raster_rect;
    let thickness = i64::from(inputs.info.states.line_thickness);
    let band = -(thickness / 2)..thickness - thickness / 2;
    let (p, q) = (from.position, to.position);
    let (dx, dy) = (q.x - p.x, q.y - p.y);
    if dx == 0.0 && dy == 0.0 {
        return;
    }

    let x_major = dx.abs() >= dy.abs();
    // Along the major axis `u`, across it `v`.
    let (u0, v0, u1, v1) = if x_major { (p.x, p.y, q.x, q.y) } else { (p.y, p.x, q.y, q.x) };
    let (u0, v0, u1, v1) = if u0 <= u1 { (u0, v0, u1, v1) } else { (u1, v1, u0, v0) };
    let slope = (v1 - v0) / (u1 - u0);
    let (u_min, u_max, v_min, v_max) = if x_major {
        (rect.left, rect.right, rect.top, rect.bottom)
    } else {
        (rect.top, rect.bottom, rect.left, rect.right)
    };

    let u_start = (u0.ceil() as i64).max(i64::from(u_min));
    let u_end = (u1.ceil() as i64).min(i64::from(u_max));
    for u in u_start..u_end {
        let center = (v0 + (u as f32 - u0) * slope + 0.5).floor() as i64;
        for offset in band.clone() {
            let v = center + offset;
            if v < i64::from(v_min) || v >= i64::from(v_max) {
                continue;
            }
            let (x, y) = if x_major { (u, v) } else { (v, u) };
            let values = gradient.at(x as f32, y as f32);
            shade_fragment::<DEPTH_OUT, KILL>(inputs, targets, gradient, &values, x as u32, y as u32);
        }
    }
}

/// Depth test, pixel shader and buffer writes for one covered pixel.
///
/// Colour-only shaders are depth tested before they run against the interpolated depth. Shaders
/// that output depth run first and are tested against the depth they return.
#[inline]
fn shade_fragment<const DEPTH_OUT: bool, const KILL: bool>(
    inputs: &PassInputs<'_>,
    targets: &mut PassTargets<'_>,
    gradient: &TriangleGradient,
    values: &Interpolants,
    x: u32,
    y: u32,
) {
    let info = inputs.info;
    let interpolated_depth = values.position.z;

    if !DEPTH_OUT {
        if let Some(zb) = targets.depth.as_deref() {
            if !info.depth_passes(interpolated_depth, zb.scalar(x, y)) {
                return;
            }
        }
    }

    let mut registers = [Vector4::ZERO; MAX_SHADER_REGISTERS];
    let w = gradient.resolve(values, &mut registers);
    let mut color = match targets.color.as_deref() {
        Some(surface) => surface.texel(x as usize, y as usize),
        None => Vector4::ZERO,
    };
    let mut depth = interpolated_depth;

    let ctx = PixelContext::new(&inputs.sampler, gradient, &registers, w);
    let keep = inputs.pixel_shader.execute(&ctx, &registers, &mut color, &mut depth);
    if KILL && !keep {
        return;
    }

    if DEPTH_OUT {
        if let Some(zb) = targets.depth.as_deref() {
            if !info.depth_passes(depth, zb.scalar(x, y)) {
                return;
            }
        }
    } else {
        depth = interpolated_depth;
    }

    if let Some(surface) = targets.color.as_deref_mut() {
        surface.put_texel(x, y, color);
    }
    if info.states.z_write_enable {
        if let Some(zb) = targets.depth.as_deref_mut() {
            zb.put_scalar(x, y, depth);
        }
    }
    targets.stats.rendered_pixels += 1;
}
