use muli3d_math::Vector4;

use crate::error::{try_alloc_zeroed, Error, Result};
use crate::format::Format;
use crate::state::TextureFilter;
use crate::surface::{linear_taps, point_tap};

/// Integer box; `right`, `bottom` and `back` are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Box3 {
    pub left: u32,
    pub top: u32,
    pub front: u32,
    pub right: u32,
    pub bottom: u32,
    pub back: u32,
}

impl Box3 {
    pub const fn new(left: u32, top: u32, front: u32, right: u32, bottom: u32, back: u32) -> Self {
        Self {
            left,
            top,
            front,
            right,
            bottom,
            back,
        }
    }

    pub const fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub const fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub const fn depth(&self) -> u32 {
        self.back.saturating_sub(self.front)
    }

    pub const fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top || self.back <= self.front
    }

    pub const fn contains(&self, other: &Box3) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.front >= self.front
            && other.right <= self.right
            && other.bottom <= self.bottom
            && other.back <= self.back
    }
}

/// A 3D float image stored slice by slice, each slice row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Volume {
    format: Format,
    width: u32,
    height: u32,
    depth: u32,
    data: Vec<f32>,
}

/// Mutable view of a locked sub-box.
#[derive(Debug)]
pub struct LockedBox<'a> {
    data: &'a mut [f32],
    row_pitch: usize,
    slice_pitch: usize,
    format: Format,
    extent: (u32, u32, u32),
}

impl LockedBox<'_> {
    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    pub fn slice_pitch(&self) -> usize {
        self.slice_pitch
    }

    pub fn extent(&self) -> (u32, u32, u32) {
        self.extent
    }

    pub fn set(&mut self, x: u32, y: u32, z: u32, value: Vector4) {
        let n = self.format.components();
        let o = z as usize * self.slice_pitch + y as usize * self.row_pitch + x as usize * n;
        self.format.store(&mut self.data[o..o + n], value);
    }
}

impl Volume {
    pub fn new(width: u32, height: u32, depth: u32, format: Format) -> Result<Self> {
        if width == 0 || height == 0 || depth == 0 {
            return Err(Error::invalid_parameters(format!(
                "volume dimensions must be non-zero (got {width}x{height}x{depth})"
            )));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(depth as usize))
            .and_then(|n| n.checked_mul(format.components()))
            .ok_or(Error::OutOfMemory)?;
        Ok(Self {
            format,
            width,
            height,
            depth,
            data: try_alloc_zeroed(len)?,
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn bounds(&self) -> Box3 {
        Box3::new(0, 0, 0, self.width, self.height, self.depth)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    fn offset(&self, x: usize, y: usize, z: usize) -> usize {
        ((z * self.height as usize + y) * self.width as usize + x) * self.format.components()
    }

    #[inline]
    pub(crate) fn texel(&self, x: usize, y: usize, z: usize) -> Vector4 {
        let n = self.format.components();
        let o = self.offset(x, y, z);
        self.format.expand(&self.data[o..o + n])
    }

    #[inline]
    fn put_texel(&mut self, x: u32, y: u32, z: u32, value: Vector4) {
        let n = self.format.components();
        let o = self.offset(x as usize, y as usize, z as usize);
        self.format.store(&mut self.data[o..o + n], value);
    }

    pub fn voxel(&self, x: u32, y: u32, z: u32) -> Result<Vector4> {
        self.check_point(x, y, z)?;
        Ok(self.texel(x as usize, y as usize, z as usize))
    }

    pub fn set_voxel(&mut self, x: u32, y: u32, z: u32, value: Vector4) -> Result<()> {
        self.check_point(x, y, z)?;
        self.put_texel(x, y, z, value);
        Ok(())
    }

    fn check_point(&self, x: u32, y: u32, z: u32) -> Result<()> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return Err(Error::invalid_parameters(format!(
                "voxel ({x}, {y}, {z}) outside {}x{}x{} volume",
                self.width, self.height, self.depth
            )));
        }
        Ok(())
    }

    fn resolve_box(&self, b: Option<Box3>) -> Result<Box3> {
        let b = b.unwrap_or_else(|| self.bounds());
        if b.is_empty() || !self.bounds().contains(&b) {
            return Err(Error::invalid_parameters(format!(
                "box {b:?} is empty or outside {}x{}x{} volume",
                self.width, self.height, self.depth
            )));
        }
        Ok(b)
    }

    pub fn lock_box(&mut self, b: Option<Box3>) -> Result<LockedBox<'_>> {
        let b = self.resolve_box(b)?;
        let start = self.offset(b.left as usize, b.top as usize, b.front as usize);
        let row_pitch = self.width as usize * self.format.components();
        let slice_pitch = row_pitch * self.height as usize;
        Ok(LockedBox {
            data: &mut self.data[start..],
            row_pitch,
            slice_pitch,
            format: self.format,
            extent: (b.width(), b.height(), b.depth()),
        })
    }

    pub fn clear(&mut self, color: Vector4) {
        let n = self.format.components();
        let format = self.format;
        for texel in self.data.chunks_exact_mut(n) {
            format.store(texel, color);
        }
    }

    pub fn clear_box(&mut self, color: Vector4, b: Box3) -> Result<()> {
        let b = self.resolve_box(Some(b))?;
        for z in b.front..b.back {
            for y in b.top..b.bottom {
                for x in b.left..b.right {
                    self.put_texel(x, y, z, color);
                }
            }
        }
        Ok(())
    }

    pub fn sample_point(&self, u: f32, v: f32, w: f32) -> Vector4 {
        self.texel(
            point_tap(u, self.width),
            point_tap(v, self.height),
            point_tap(w, self.depth),
        )
    }

    /// Trilinear filter over the eight nearest texel centres, clamped at the edges.
    pub fn sample_linear(&self, u: f32, v: f32, w: f32) -> Vector4 {
        let (x0, x1, tx) = linear_taps(u, self.width);
        let (y0, y1, ty) = linear_taps(v, self.height);
        let (z0, z1, tz) = linear_taps(w, self.depth);
        let slice = |z: usize| {
            let top = self.texel(x0, y0, z).lerp(self.texel(x1, y0, z), tx);
            let bottom = self.texel(x0, y1, z).lerp(self.texel(x1, y1, z), tx);
            top.lerp(bottom, ty)
        };
        slice(z0).lerp(slice(z1), tz)
    }

    pub fn sample(&self, filter: TextureFilter, u: f32, v: f32, w: f32) -> Vector4 {
        match filter {
            TextureFilter::Point => self.sample_point(u, v, w),
            TextureFilter::Linear => self.sample_linear(u, v, w),
        }
    }

    /// Copies `src_box` into `dest_box` of `dest`, rescaling with `filter`.
    pub fn copy_to_volume(
        &self,
        src_box: Option<Box3>,
        dest: &mut Volume,
        dest_box: Option<Box3>,
        filter: TextureFilter,
    ) -> Result<()> {
        let src = self.resolve_box(src_box)?;
        let dst = dest.resolve_box(dest_box)?;

        let origin = [
            src.left as f32 / self.width as f32,
            src.top as f32 / self.height as f32,
            src.front as f32 / self.depth as f32,
        ];
        let scale = [
            src.width() as f32 / self.width as f32,
            src.height() as f32 / self.height as f32,
            src.depth() as f32 / self.depth as f32,
        ];
        let coord = |i: u32, n: u32, axis: usize| origin[axis] + (i as f32 + 0.5) / n as f32 * scale[axis];

        for z in 0..dst.depth() {
            let w = coord(z, dst.depth(), 2);
            for y in 0..dst.height() {
                let v = coord(y, dst.height(), 1);
                for x in 0..dst.width() {
                    let u = coord(x, dst.width(), 0);
                    let value = self.sample(filter, u, v, w);
                    dest.put_texel(dst.left + x, dst.top + y, dst.front + z, value);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(size: u32) -> Volume {
        let mut vol = Volume::new(size, size, size, Format::R32F).unwrap();
        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let v = (x + y * size + z * size * size) as f32;
                    vol.set_voxel(x, y, z, Vector4::splat(v)).unwrap();
                }
            }
        }
        vol
    }

    #[test]
    fn point_vs_trilinear() {
        let vol = cube(2);
        // Centre of the last voxel.
        assert_eq!(vol.sample_point(0.75, 0.75, 0.75).x, 7.0);
        // Exact centre averages all eight voxels.
        assert_eq!(vol.sample_linear(0.5, 0.5, 0.5).x, 3.5);
    }

    #[test]
    fn lock_box_writes_through() {
        let mut vol = Volume::new(2, 2, 2, Format::R32G32B32A32F).unwrap();
        {
            let mut lock = vol.lock_box(Some(Box3::new(1, 0, 1, 2, 2, 2))).unwrap();
            assert_eq!(lock.extent(), (1, 2, 1));
            lock.set(0, 1, 0, Vector4::ONE);
        }
        assert_eq!(vol.voxel(1, 1, 1).unwrap(), Vector4::ONE);
        assert!(vol.lock_box(Some(Box3::new(0, 0, 0, 3, 1, 1))).is_err());
    }

    #[test]
    fn copy_halves_each_axis() {
        let src = cube(2);
        let mut dst = Volume::new(1, 1, 1, Format::R32F).unwrap();
        src.copy_to_volume(None, &mut dst, None, TextureFilter::Linear).unwrap();
        assert_eq!(dst.voxel(0, 0, 0).unwrap().x, 3.5);
    }
}
