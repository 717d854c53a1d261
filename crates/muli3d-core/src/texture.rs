use std::cell::RefCell;
use std::rc::Rc;

use muli3d_math::Vector4;

use crate::base_texture::{compute_lod, full_mip_chain, mip_extent, select_mip, BaseTexture, TextureSampleInput};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::state::{SamplerStates, TextureFilter};
use crate::surface::Surface;

/// A 2D texture: a chain of shared surfaces, level 0 being the largest.
#[derive(Debug)]
pub struct Texture {
    format: Format,
    width: u32,
    height: u32,
    levels: Vec<Rc<RefCell<Surface>>>,
}

pub(crate) fn borrow_level(level: &RefCell<Surface>) -> Result<std::cell::Ref<'_, Surface>> {
    level
        .try_borrow()
        .map_err(|_| Error::invalid_state("texture surface is locked for writing"))
}

impl Texture {
    /// `mip_levels == 0` creates the full chain down to 1x1.
    pub fn new(width: u32, height: u32, mip_levels: u32, format: Format) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_parameters(format!(
                "texture dimensions must be non-zero (got {width}x{height})"
            )));
        }
        let max_levels = full_mip_chain(width.max(height));
        let count = if mip_levels == 0 { max_levels } else { mip_levels };
        if count > max_levels {
            return Err(Error::invalid_parameters(format!(
                "{count} mip levels requested for a {width}x{height} texture (max {max_levels})"
            )));
        }

        let mut levels = Vec::new();
        levels.try_reserve_exact(count as usize)?;
        for level in 0..count {
            let surface = Surface::new(mip_extent(width, level), mip_extent(height, level), format)?;
            levels.push(Rc::new(RefCell::new(surface)));
        }
        Ok(Self {
            format,
            width,
            height,
            levels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Shared handle to mip `level`, for locking or binding as a render target.
    pub fn surface_level(&self, level: u32) -> Result<Rc<RefCell<Surface>>> {
        self.levels.get(level as usize).cloned().ok_or_else(|| {
            Error::invalid_parameters(format!(
                "mip level {level} out of range ({} levels)",
                self.levels.len()
            ))
        })
    }

    /// Rebuilds every level below `src_level` with a 2x2 box filter.
    pub fn generate_mip_sub_levels(&self, src_level: u32) -> Result<()> {
        let src_level = src_level as usize;
        if src_level >= self.levels.len() {
            return Err(Error::invalid_parameters(format!(
                "mip level {src_level} out of range ({} levels)",
                self.levels.len()
            )));
        }
        for pair in self.levels[src_level..].windows(2) {
            let src = borrow_level(&pair[0])?;
            let mut dst = pair[1]
                .try_borrow_mut()
                .map_err(|_| Error::invalid_state("texture surface is in use"))?;
            downsample(&src, &mut dst);
        }
        Ok(())
    }

    /// Samples `level` with `filter`, at already-addressed coordinates.
    pub(crate) fn sample_level(&self, level: u32, filter: TextureFilter, u: f32, v: f32) -> Result<Vector4> {
        let surface = borrow_level(&self.levels[level as usize])?;
        Ok(surface.sample(filter, u, v))
    }

    pub(crate) fn sample_2d(
        &self,
        states: &SamplerStates,
        u: f32,
        v: f32,
        ddx: Option<&Vector4>,
        ddy: Option<&Vector4>,
    ) -> Result<Vector4> {
        let size = [self.width() as f32, self.height() as f32, 1.0];
        let lod = compute_lod(size, 2, ddx, ddy, states.mip_lod_bias);
        let sel = select_mip(states, lod, self.mip_levels());
        let value = self.sample_level(sel.level, sel.filter, u, v)?;
        match sel.blend {
            Some((next, t)) => Ok(value.lerp(self.sample_level(next, sel.filter, u, v)?, t)),
            None => Ok(value),
        }
    }
}

fn downsample(src: &Surface, dst: &mut Surface) {
    let (sw, sh) = (src.width() as usize, src.height() as usize);
    for y in 0..dst.height() {
        for x in 0..dst.width() {
            let x0 = (x as usize * 2).min(sw - 1);
            let y0 = (y as usize * 2).min(sh - 1);
            let x1 = (x0 + 1).min(sw - 1);
            let y1 = (y0 + 1).min(sh - 1);
            let sum = src.texel(x0, y0) + src.texel(x1, y0) + src.texel(x0, y1) + src.texel(x1, y1);
            dst.put_texel(x, y, sum * 0.25);
        }
    }
}

impl BaseTexture for Texture {
    fn format(&self) -> Format {
        self.format
    }

    fn mip_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    fn sample_input(&self) -> TextureSampleInput {
        TextureSampleInput::Uv
    }

    fn sample(
        &self,
        states: &SamplerStates,
        coord: Vector4,
        ddx: Option<&Vector4>,
        ddy: Option<&Vector4>,
    ) -> Result<Vector4> {
        self.sample_2d(states, coord.x, coord.y, ddx, ddy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MipFilter;

    fn checker(size: u32) -> Texture {
        let tex = Texture::new(size, size, 0, Format::R32F).unwrap();
        let top = tex.surface_level(0).unwrap();
        let mut top = top.borrow_mut();
        for y in 0..size {
            for x in 0..size {
                let v = ((x + y) % 2) as f32;
                top.set_pixel(x, y, Vector4::splat(v)).unwrap();
            }
        }
        drop(top);
        tex
    }

    #[test]
    fn full_chain_is_created() {
        let tex = Texture::new(8, 2, 0, Format::R32G32F).unwrap();
        assert_eq!(tex.mip_levels(), 4);
        let last = tex.surface_level(3).unwrap();
        assert_eq!((last.borrow().width(), last.borrow().height()), (1, 1));
        assert!(Texture::new(8, 8, 5, Format::R32F).is_err());
    }

    #[test]
    fn mips_average_checkerboard() {
        let tex = checker(4);
        tex.generate_mip_sub_levels(0).unwrap();
        let level1 = tex.surface_level(1).unwrap();
        assert_eq!(level1.borrow().pixel(1, 1).unwrap().x, 0.5);
        let level2 = tex.surface_level(2).unwrap();
        assert_eq!(level2.borrow().pixel(0, 0).unwrap().x, 0.5);
    }

    #[test]
    fn minification_reads_smaller_level() {
        let tex = checker(4);
        tex.generate_mip_sub_levels(0).unwrap();
        let states = SamplerStates {
            mip_filter: MipFilter::Point,
            ..SamplerStates::default()
        };
        // One pixel step covers four texels: lod 2.
        let ddx = Vector4::new(1.0, 0.0, 0.0, 0.0);
        let ddy = Vector4::new(0.0, 1.0, 0.0, 0.0);
        let minified = tex.sample_2d(&states, 0.1, 0.1, Some(&ddx), Some(&ddy)).unwrap();
        assert_eq!(minified.x, 0.5);
        let magnified = tex.sample_2d(&states, 0.1, 0.1, None, None).unwrap();
        assert_eq!(magnified.x, 0.0);
    }

    #[test]
    fn writer_lock_makes_sampling_fail() {
        let tex = checker(2);
        let level = tex.surface_level(0).unwrap();
        let _guard = level.borrow_mut();
        let err = tex.sample_2d(&SamplerStates::default(), 0.5, 0.5, None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
