use crate::error::Result;
use crate::surface::Surface;

/// Sink that displays a finished colour surface (a window, a framebuffer, an image file).
pub trait PresentTarget {
    fn present(&mut self, surface: &Surface) -> Result<()>;
}
