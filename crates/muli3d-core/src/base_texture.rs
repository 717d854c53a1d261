use muli3d_math::Vector4;

use crate::error::Result;
use crate::format::Format;
use crate::state::{MipFilter, SamplerStates, TextureFilter};

/// Coordinates a texture consumes when sampled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSampleInput {
    /// `(u, v)`, addressed per axis.
    Uv,
    /// `(u, v, w)`, addressed per axis.
    Uvw,
    /// A direction vector; no addressing.
    Direction,
}

/// Sampling contract shared by 2D, cube and volume textures.
pub trait BaseTexture {
    fn format(&self) -> Format;

    fn mip_levels(&self) -> u32;

    fn sample_input(&self) -> TextureSampleInput;

    /// Samples with already-addressed coordinates. `ddx`/`ddy` are screen-space coordinate
    /// derivatives used to pick the mip level.
    fn sample(
        &self,
        states: &SamplerStates,
        coord: Vector4,
        ddx: Option<&Vector4>,
        ddy: Option<&Vector4>,
    ) -> Result<Vector4>;
}

/// Number of levels in a full mip chain for the largest dimension `size`.
pub(crate) fn full_mip_chain(size: u32) -> u32 {
    32 - size.max(1).leading_zeros()
}

/// Extent of `size` at mip `level`.
#[inline]
pub(crate) fn mip_extent(size: u32, level: u32) -> u32 {
    (size >> level).max(1)
}

/// Level-of-detail from texel-space derivatives. Without derivatives only the bias applies.
pub(crate) fn compute_lod(
    size: [f32; 3],
    components: usize,
    ddx: Option<&Vector4>,
    ddy: Option<&Vector4>,
    bias: f32,
) -> f32 {
    let (Some(ddx), Some(ddy)) = (ddx, ddy) else {
        return bias;
    };
    let texel_len = |d: &Vector4| {
        (0..components)
            .map(|c| {
                let t = d[c] * size[c];
                t * t
            })
            .sum::<f32>()
            .sqrt()
    };
    let rho = texel_len(ddx).max(texel_len(ddy));
    if rho <= 0.0 {
        return f32::NEG_INFINITY;
    }
    rho.log2() + bias
}

/// Which mip levels to read and how to blend them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct MipSelection {
    pub filter: TextureFilter,
    pub level: u32,
    /// Second level and its weight for linear mip filtering.
    pub blend: Option<(u32, f32)>,
}

pub(crate) fn select_mip(states: &SamplerStates, lod: f32, levels: u32) -> MipSelection {
    if lod <= 0.0 || levels <= 1 {
        let filter = if lod <= 0.0 {
            states.mag_filter
        } else {
            states.min_filter
        };
        return MipSelection {
            filter,
            level: 0,
            blend: None,
        };
    }

    let last = (levels - 1) as f32;
    let filter = states.min_filter;
    match states.mip_filter {
        MipFilter::None => MipSelection {
            filter,
            level: 0,
            blend: None,
        },
        MipFilter::Point => MipSelection {
            filter,
            level: (lod + 0.5).floor().min(last) as u32,
            blend: None,
        },
        MipFilter::Linear => {
            let base = lod.floor().min(last);
            let next = (base + 1.0).min(last);
            let t = if next > base { lod - base } else { 0.0 };
            MipSelection {
                filter,
                level: base as u32,
                blend: (t > 0.0).then_some((next as u32, t)),
            }
        }
    }
}
