use muli3d_math::Vector4;

use crate::error::{try_alloc_zeroed, Error, Result};
use crate::format::Format;
use crate::state::TextureFilter;

/// Integer rectangle; `right` and `bottom` are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub const fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub const fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    pub const fn contains(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }
}

/// Texel coordinate and weight of the two taps a linear filter reads along one axis.
#[inline]
pub(crate) fn linear_taps(coord: f32, size: u32) -> (usize, usize, f32) {
    let f = coord * size as f32 - 0.5;
    let base = f.floor();
    let t = f - base;
    let max = size as i64 - 1;
    let i0 = (base as i64).clamp(0, max) as usize;
    let i1 = (base as i64 + 1).clamp(0, max) as usize;
    (i0, i1, t)
}

#[inline]
pub(crate) fn point_tap(coord: f32, size: u32) -> usize {
    ((coord * size as f32).floor() as i64).clamp(0, size as i64 - 1) as usize
}

/// A 2D float image, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    format: Format,
    width: u32,
    height: u32,
    data: Vec<f32>,
}

/// Mutable view of a locked sub-rectangle.
#[derive(Debug)]
pub struct LockedRect<'a> {
    data: &'a mut [f32],
    pitch: usize,
    format: Format,
    width: u32,
    height: u32,
}

impl LockedRect<'_> {
    /// Floats between the starts of consecutive rows.
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row `y` of the locked rectangle, `width * components` floats long.
    pub fn row_mut(&mut self, y: u32) -> &mut [f32] {
        let start = y as usize * self.pitch;
        let len = self.width as usize * self.format.components();
        &mut self.data[start..start + len]
    }

    pub fn set(&mut self, x: u32, y: u32, value: Vector4) {
        let n = self.format.components();
        let format = self.format;
        let row = self.row_mut(y);
        format.store(&mut row[x as usize * n..(x as usize + 1) * n], value);
    }
}

impl Surface {
    pub fn new(width: u32, height: u32, format: Format) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_parameters(format!(
                "surface dimensions must be non-zero (got {width}x{height})"
            )));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(format.components()))
            .ok_or(Error::OutOfMemory)?;
        Ok(Self {
            format,
            width,
            height,
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

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Floats per row.
    pub fn pitch(&self) -> usize {
        self.width as usize * self.format.components()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.format.components()
    }

    /// Unchecked texel read for callers that already clamped the coordinates.
    #[inline]
    pub(crate) fn texel(&self, x: usize, y: usize) -> Vector4 {
        let n = self.format.components();
        let o = (y * self.width as usize + x) * n;
        self.format.expand(&self.data[o..o + n])
    }

    #[inline]
    pub(crate) fn put_texel(&mut self, x: u32, y: u32, value: Vector4) {
        let n = self.format.components();
        let o = self.offset(x, y);
        self.format.store(&mut self.data[o..o + n], value);
    }

    /// First component of a texel; used for depth surfaces.
    #[inline]
    pub(crate) fn scalar(&self, x: u32, y: u32) -> f32 {
        self.data[self.offset(x, y)]
    }

    #[inline]
    pub(crate) fn put_scalar(&mut self, x: u32, y: u32, value: f32) {
        let o = self.offset(x, y);
        self.data[o] = value;
    }

    fn check_point(&self, x: u32, y: u32) -> Result<()> {
        if x >= self.width || y >= self.height {
            return Err(Error::invalid_parameters(format!(
                "pixel ({x}, {y}) outside {}x{} surface",
                self.width, self.height
            )));
        }
        Ok(())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Result<Vector4> {
        self.check_point(x, y)?;
        Ok(self.texel(x as usize, y as usize))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, value: Vector4) -> Result<()> {
        self.check_point(x, y)?;
        self.put_texel(x, y, value);
        Ok(())
    }

    fn resolve_rect(&self, rect: Option<Rect>) -> Result<Rect> {
        let rect = rect.unwrap_or_else(|| self.bounds());
        if rect.is_empty() || !self.bounds().contains(&rect) {
            return Err(Error::invalid_parameters(format!(
                "rect {rect:?} is empty or outside {}x{} surface",
                self.width, self.height
            )));
        }
        Ok(rect)
    }

    /// Locks `rect` (the whole surface for `None`) for direct writes.
    pub fn lock_rect(&mut self, rect: Option<Rect>) -> Result<LockedRect<'_>> {
        let rect = self.resolve_rect(rect)?;
        let start = self.offset(rect.left, rect.top);
        let pitch = self.pitch();
        Ok(LockedRect {
            data: &mut self.data[start..],
            pitch,
            format: self.format,
            width: rect.width(),
            height: rect.height(),
        })
    }

    pub fn clear(&mut self, color: Vector4) {
        let n = self.format.components();
        let format = self.format;
        for texel in self.data.chunks_exact_mut(n) {
            format.store(texel, color);
        }
    }

    pub fn clear_rect(&mut self, color: Vector4, rect: Rect) -> Result<()> {
        let rect = self.resolve_rect(Some(rect))?;
        for y in rect.top..rect.bottom {
            for x in rect.left..rect.right {
                self.put_texel(x, y, color);
            }
        }
        Ok(())
    }

    /// Nearest texel for normalized coordinates; out-of-range coordinates clamp to the edge.
    pub fn sample_point(&self, u: f32, v: f32) -> Vector4 {
        self.texel(point_tap(u, self.width), point_tap(v, self.height))
    }

    /// Bilinear filter over the four nearest texel centres, clamped at the edges.
    pub fn sample_linear(&self, u: f32, v: f32) -> Vector4 {
        let (x0, x1, tx) = linear_taps(u, self.width);
        let (y0, y1, ty) = linear_taps(v, self.height);
        let top = self.texel(x0, y0).lerp(self.texel(x1, y0), tx);
        let bottom = self.texel(x0, y1).lerp(self.texel(x1, y1), tx);
        top.lerp(bottom, ty)
    }

    pub fn sample(&self, filter: TextureFilter, u: f32, v: f32) -> Vector4 {
        match filter {
            TextureFilter::Point => self.sample_point(u, v),
            TextureFilter::Linear => self.sample_linear(u, v),
        }
    }

    /// Copies `src_rect` of this surface into `dest_rect` of `dest`, rescaling with `filter` and
    /// converting between formats.
    pub fn copy_to_surface(
        &self,
        src_rect: Option<Rect>,
        dest: &mut Surface,
        dest_rect: Option<Rect>,
        filter: TextureFilter,
    ) -> Result<()> {
        let src = self.resolve_rect(src_rect)?;
        let dst = dest.resolve_rect(dest_rect)?;

        // Normalized coordinates of the source rect inside the whole surface.
        let u0 = src.left as f32 / self.width as f32;
        let v0 = src.top as f32 / self.height as f32;
        let su = src.width() as f32 / self.width as f32;
        let sv = src.height() as f32 / self.height as f32;

        for y in 0..dst.height() {
            let v = v0 + (y as f32 + 0.5) / dst.height() as f32 * sv;
            for x in 0..dst.width() {
                let u = u0 + (x as f32 + 0.5) / dst.width() as f32 * su;
                let value = match filter {
                    TextureFilter::Point => self.sample_point(u, v),
                    TextureFilter::Linear => self.sample_linear_within(&src, u, v),
                };
                dest.put_texel(dst.left + x, dst.top + y, value);
            }
        }
        Ok(())
    }

    /// Bilinear sample whose taps stay inside `rect`.
    fn sample_linear_within(&self, rect: &Rect, u: f32, v: f32) -> Vector4 {
        let (x0, x1, tx) = linear_taps(u, self.width);
        let (y0, y1, ty) = linear_taps(v, self.height);
        let cx = |x: usize| x.clamp(rect.left as usize, rect.right as usize - 1);
        let cy = |y: usize| y.clamp(rect.top as usize, rect.bottom as usize - 1);
        let (x0, x1, y0, y1) = (cx(x0), cx(x1), cy(y0), cy(y1));
        let top = self.texel(x0, y0).lerp(self.texel(x1, y0), tx);
        let bottom = self.texel(x0, y1).lerp(self.texel(x1, y1), tx);
        top.lerp(bottom, ty)
    }
}
