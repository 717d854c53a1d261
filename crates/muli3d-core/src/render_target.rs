use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use muli3d_math::{Matrix44, Vector4};

use crate::error::{Error, Result};
use crate::format::Format;
use crate::surface::{Rect, Surface};

bitflags! {
    /// Buffers touched by [`RenderTarget::clear`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

/// A colour surface, an optional depth surface and the viewport transform that maps normalized
/// device coordinates onto them.
#[derive(Debug, Default)]
pub struct RenderTarget {
    color: Option<Rc<RefCell<Surface>>>,
    depth: Option<Rc<RefCell<Surface>>>,
    viewport: Matrix44,
}

fn borrow_mut(surface: &RefCell<Surface>) -> Result<std::cell::RefMut<'_, Surface>> {
    surface
        .try_borrow_mut()
        .map_err(|_| Error::invalid_state("render target surface is in use"))
}

impl RenderTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_color_buffer(&mut self, surface: Option<Rc<RefCell<Surface>>>) {
        self.color = surface;
    }

    pub fn color_buffer(&self) -> Option<Rc<RefCell<Surface>>> {
        self.color.clone()
    }

    /// Binds a depth surface, which must be single-channel.
    pub fn set_depth_buffer(&mut self, surface: Option<Rc<RefCell<Surface>>>) -> Result<()> {
        if let Some(s) = &surface {
            let format = s
                .try_borrow()
                .map_err(|_| Error::invalid_state("depth surface is locked"))?
                .format();
            if format != Format::R32F {
                return Err(Error::invalid_format(format!("depth buffer must be R32F, got {format}")));
            }
        }
        self.depth = surface;
        Ok(())
    }

    pub fn depth_buffer(&self) -> Option<Rc<RefCell<Surface>>> {
        self.depth.clone()
    }

    pub fn set_viewport_matrix(&mut self, viewport: Matrix44) {
        self.viewport = viewport;
    }

    pub fn viewport_matrix(&self) -> Matrix44 {
        self.viewport
    }

    /// Clears the colour buffer, optionally restricted to `rect`.
    pub fn clear_color_buffer(&self, color: Vector4, rect: Option<Rect>) -> Result<()> {
        let surface = self
            .color
            .as_ref()
            .ok_or_else(|| Error::invalid_state("render target has no colour buffer"))?;
        let mut surface = borrow_mut(surface)?;
        match rect {
            Some(rect) => surface.clear_rect(color, rect),
            None => {
                surface.clear(color);
                Ok(())
            }
        }
    }

    pub fn clear_depth_buffer(&self, depth: f32, rect: Option<Rect>) -> Result<()> {
        let surface = self
            .depth
            .as_ref()
            .ok_or_else(|| Error::invalid_state("render target has no depth buffer"))?;
        let mut surface = borrow_mut(surface)?;
        let value = Vector4::splat(depth);
        match rect {
            Some(rect) => surface.clear_rect(value, rect),
            None => {
                surface.clear(value);
                Ok(())
            }
        }
    }

    pub fn clear(&self, flags: ClearFlags, color: Vector4, depth: f32, rect: Option<Rect>) -> Result<()> {
        if flags.contains(ClearFlags::COLOR) {
            self.clear_color_buffer(color, rect)?;
        }
        if flags.contains(ClearFlags::DEPTH) {
            self.clear_depth_buffer(depth, rect)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_buffer_must_be_single_channel() {
        let mut rt = RenderTarget::new();
        let rgba = Rc::new(RefCell::new(Surface::new(4, 4, Format::R32G32B32A32F).unwrap()));
        assert!(matches!(rt.set_depth_buffer(Some(rgba)), Err(Error::InvalidFormat(_))));

        let r = Rc::new(RefCell::new(Surface::new(4, 4, Format::R32F).unwrap()));
        rt.set_depth_buffer(Some(r)).unwrap();
        assert!(rt.depth_buffer().is_some());
    }

    #[test]
    fn clear_honours_flags() {
        let mut rt = RenderTarget::new();
        let color = Rc::new(RefCell::new(Surface::new(2, 2, Format::R32G32B32A32F).unwrap()));
        let depth = Rc::new(RefCell::new(Surface::new(2, 2, Format::R32F).unwrap()));
        rt.set_color_buffer(Some(color.clone()));
        rt.set_depth_buffer(Some(depth.clone())).unwrap();

        rt.clear(ClearFlags::DEPTH, Vector4::ONE, 0.75, None).unwrap();
        assert_eq!(color.borrow().pixel(1, 1).unwrap(), Vector4::ZERO);
        assert_eq!(depth.borrow().pixel(1, 1).unwrap().x, 0.75);

        rt.clear(ClearFlags::all(), Vector4::ONE, 1.0, Some(Rect::new(0, 0, 1, 1))).unwrap();
        assert_eq!(color.borrow().pixel(0, 0).unwrap(), Vector4::ONE);
        assert_eq!(color.borrow().pixel(1, 0).unwrap(), Vector4::ZERO);
    }
}
