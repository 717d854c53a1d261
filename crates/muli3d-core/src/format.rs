use std::fmt;

use muli3d_math::Vector4;

/// Texel formats for surfaces, textures and volumes. All formats store 32-bit floats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    R32F,
    R32G32F,
    R32G32B32F,
    R32G32B32A32F,
}

impl Format {
    #[inline]
    pub const fn components(self) -> usize {
        match self {
            Format::R32F => 1,
            Format::R32G32F => 2,
            Format::R32G32B32F => 3,
            Format::R32G32B32A32F => 4,
        }
    }

    /// Expands a stored texel to four components; missing channels read as `(.., 0, 0, 1)`.
    #[inline]
    pub fn expand(self, texel: &[f32]) -> Vector4 {
        match self {
            Format::R32F => Vector4::new(texel[0], 0.0, 0.0, 1.0),
            Format::R32G32F => Vector4::new(texel[0], texel[1], 0.0, 1.0),
            Format::R32G32B32F => Vector4::new(texel[0], texel[1], texel[2], 1.0),
            Format::R32G32B32A32F => Vector4::new(texel[0], texel[1], texel[2], texel[3]),
        }
    }

    /// Writes the leading components of `value` into `texel`.
    #[inline]
    pub fn store(self, texel: &mut [f32], value: Vector4) {
        let n = self.components();
        texel[..n].copy_from_slice(&value.to_array()[..n]);
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::R32F => "R32F",
            Format::R32G32F => "R32G32F",
            Format::R32G32B32F => "R32G32B32F",
            Format::R32G32B32A32F => "R32G32B32A32F",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Index16,
    Index32,
}

impl IndexFormat {
    #[inline]
    pub const fn size_bytes(self) -> usize {
        match self {
            IndexFormat::Index16 => 2,
            IndexFormat::Index32 => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_formats_fill_defaults() {
        assert_eq!(Format::R32F.expand(&[0.5]), Vector4::new(0.5, 0.0, 0.0, 1.0));
        assert_eq!(
            Format::R32G32B32F.expand(&[0.1, 0.2, 0.3]),
            Vector4::new(0.1, 0.2, 0.3, 1.0)
        );
    }

    #[test]
    fn store_truncates_to_format_width() {
        let mut texel = [9.0f32; 2];
        Format::R32G32F.store(&mut texel, Vector4::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(texel, [1.0, 2.0]);
    }
}
