use std::cell::RefCell;
use std::rc::Rc;

use muli3d_math::Vector4;

use crate::base_texture::{compute_lod, full_mip_chain, mip_extent, select_mip, BaseTexture, TextureSampleInput};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::state::{SamplerStates, TextureFilter};
use crate::volume::Volume;

/// A 3D texture: a mip chain of shared volumes.
#[derive(Debug)]
pub struct VolumeTexture {
    format: Format,
    extent: [u32; 3],
    levels: Vec<Rc<RefCell<Volume>>>,
}

impl VolumeTexture {
    /// `mip_levels == 0` creates the full chain down to 1x1x1.
    pub fn new(width: u32, height: u32, depth: u32, mip_levels: u32, format: Format) -> Result<Self> {
        if width == 0 || height == 0 || depth == 0 {
            return Err(Error::invalid_parameters(format!(
                "volume texture dimensions must be non-zero (got {width}x{height}x{depth})"
            )));
        }
        let max_levels = full_mip_chain(width.max(height).max(depth));
        let count = if mip_levels == 0 { max_levels } else { mip_levels };
        if count > max_levels {
            return Err(Error::invalid_parameters(format!(
                "{count} mip levels requested for a {width}x{height}x{depth} volume (max {max_levels})"
            )));
        }

        let mut levels = Vec::new();
        levels.try_reserve_exact(count as usize)?;
        for level in 0..count {
            let volume = Volume::new(
                mip_extent(width, level),
                mip_extent(height, level),
                mip_extent(depth, level),
                format,
            )?;
            levels.push(Rc::new(RefCell::new(volume)));
        }
        Ok(Self {
            format,
            extent: [width, height, depth],
            levels,
        })
    }

    pub fn extent(&self) -> (u32, u32, u32) {
        (self.extent[0], self.extent[1], self.extent[2])
    }

    pub fn volume_level(&self, level: u32) -> Result<Rc<RefCell<Volume>>> {
        self.levels.get(level as usize).cloned().ok_or_else(|| {
            Error::invalid_parameters(format!(
                "mip level {level} out of range ({} levels)",
                self.levels.len()
            ))
        })
    }

    /// Rebuilds every level below `src_level` with a 2x2x2 box filter.
    pub fn generate_mip_sub_levels(&self, src_level: u32) -> Result<()> {
        let src_level = src_level as usize;
        if src_level >= self.levels.len() {
            return Err(Error::invalid_parameters(format!(
                "mip level {src_level} out of range ({} levels)",
                self.levels.len()
            )));
        }
        for pair in self.levels[src_level..].windows(2) {
            let src = borrow_volume(&pair[0])?;
            let mut dst = pair[1]
                .try_borrow_mut()
                .map_err(|_| Error::invalid_state("volume is in use"))?;
            downsample(&src, &mut dst)?;
        }
        Ok(())
    }

    fn sample_level(&self, level: u32, filter: TextureFilter, coord: &Vector4) -> Result<Vector4> {
        let volume = borrow_volume(&self.levels[level as usize])?;
        Ok(volume.sample(filter, coord.x, coord.y, coord.z))
    }
}

fn borrow_volume(level: &RefCell<Volume>) -> Result<std::cell::Ref<'_, Volume>> {
    level
        .try_borrow()
        .map_err(|_| Error::invalid_state("volume is locked for writing"))
}

fn downsample(src: &Volume, dst: &mut Volume) -> Result<()> {
    let clamp = |v: u32, max: u32| (v as usize).min(max as usize - 1);
    for z in 0..dst.depth() {
        for y in 0..dst.height() {
            for x in 0..dst.width() {
                let mut sum = Vector4::ZERO;
                for (dx, dy, dz) in [
                    (0, 0, 0),
                    (1, 0, 0),
                    (0, 1, 0),
                    (1, 1, 0),
                    (0, 0, 1),
                    (1, 0, 1),
                    (0, 1, 1),
                    (1, 1, 1),
                ] {
                    sum += src.texel(
                        clamp(x * 2 + dx, src.width()),
                        clamp(y * 2 + dy, src.height()),
                        clamp(z * 2 + dz, src.depth()),
                    );
                }
                dst.set_voxel(x, y, z, sum * 0.125)?;
            }
        }
    }
    Ok(())
}

impl BaseTexture for VolumeTexture {
    fn format(&self) -> Format {
        self.format
    }

    fn mip_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    fn sample_input(&self) -> TextureSampleInput {
        TextureSampleInput::Uvw
    }

    fn sample(
        &self,
        states: &SamplerStates,
        coord: Vector4,
        ddx: Option<&Vector4>,
        ddy: Option<&Vector4>,
    ) -> Result<Vector4> {
        let size = self.extent.map(|e| e as f32);
        let lod = compute_lod(size, 3, ddx, ddy, states.mip_lod_bias);
        let sel = select_mip(states, lod, self.mip_levels());
        let value = self.sample_level(sel.level, sel.filter, &coord)?;
        match sel.blend {
            Some((next, t)) => Ok(value.lerp(self.sample_level(next, sel.filter, &coord)?, t)),
            None => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_follows_largest_axis() {
        let tex = VolumeTexture::new(8, 2, 1, 0, Format::R32F).unwrap();
        assert_eq!(tex.mip_levels(), 4);
        let last = tex.volume_level(3).unwrap();
        let last = last.borrow();
        assert_eq!((last.width(), last.height(), last.depth()), (1, 1, 1));
    }

    #[test]
    fn box_filter_averages_eight_voxels() {
        let tex = VolumeTexture::new(2, 2, 2, 0, Format::R32F).unwrap();
        {
            let top = tex.volume_level(0).unwrap();
            let mut top = top.borrow_mut();
            for i in 0..8u32 {
                top.set_voxel(i & 1, (i >> 1) & 1, i >> 2, Vector4::splat(i as f32)).unwrap();
            }
        }
        tex.generate_mip_sub_levels(0).unwrap();
        let smallest = tex.volume_level(1).unwrap();
        assert_eq!(smallest.borrow().voxel(0, 0, 0).unwrap().x, 3.5);
    }
}
