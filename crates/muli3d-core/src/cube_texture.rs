use std::cell::RefCell;
use std::rc::Rc;

use muli3d_math::{Vector3, Vector4};

use crate::base_texture::{BaseTexture, TextureSampleInput};
use crate::error::{Error, Result};
use crate::format::Format;
use crate::state::SamplerStates;
use crate::surface::Surface;
use crate::texture::Texture;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Picks the face hit by `dir` and the `(u, v)` coordinate on it.
    pub fn from_direction(dir: Vector3) -> (CubeFace, f32, f32) {
        let (ax, ay, az) = (dir.x.abs(), dir.y.abs(), dir.z.abs());
        let (face, sc, tc, ma) = if ax >= ay && ax >= az {
            if dir.x >= 0.0 {
                (CubeFace::PositiveX, -dir.z, -dir.y, ax)
            } else {
                (CubeFace::NegativeX, dir.z, -dir.y, ax)
            }
        } else if ay >= az {
            if dir.y >= 0.0 {
                (CubeFace::PositiveY, dir.x, dir.z, ay)
            } else {
                (CubeFace::NegativeY, dir.x, -dir.z, ay)
            }
        } else if dir.z >= 0.0 {
            (CubeFace::PositiveZ, dir.x, -dir.y, az)
        } else {
            (CubeFace::NegativeZ, -dir.x, -dir.y, az)
        };

        if ma == 0.0 {
            return (face, 0.5, 0.5);
        }
        (face, (sc / ma + 1.0) * 0.5, (tc / ma + 1.0) * 0.5)
    }
}

/// Six square faces, each with its own mip chain, sampled by direction vector.
#[derive(Debug)]
pub struct CubeTexture {
    format: Format,
    faces: Vec<Texture>,
}

impl CubeTexture {
    pub fn new(edge_length: u32, mip_levels: u32, format: Format) -> Result<Self> {
        let mut faces = Vec::new();
        faces.try_reserve_exact(CubeFace::ALL.len())?;
        for _ in CubeFace::ALL {
            faces.push(Texture::new(edge_length, edge_length, mip_levels, format)?);
        }
        Ok(Self { format, faces })
    }

    pub fn edge_length(&self) -> u32 {
        self.faces[0].width()
    }

    pub fn face(&self, face: CubeFace) -> &Texture {
        &self.faces[face.index()]
    }

    pub fn surface_level(&self, face: CubeFace, level: u32) -> Result<Rc<RefCell<Surface>>> {
        self.face(face).surface_level(level)
    }

    pub fn generate_mip_sub_levels(&self, src_level: u32) -> Result<()> {
        for face in &self.faces {
            face.generate_mip_sub_levels(src_level)?;
        }
        Ok(())
    }
}

impl BaseTexture for CubeTexture {
    fn format(&self) -> Format {
        self.format
    }

    fn mip_levels(&self) -> u32 {
        self.faces[0].mip_levels()
    }

    fn sample_input(&self) -> TextureSampleInput {
        TextureSampleInput::Direction
    }

    fn sample(
        &self,
        states: &SamplerStates,
        coord: Vector4,
        ddx: Option<&Vector4>,
        ddy: Option<&Vector4>,
    ) -> Result<Vector4> {
        let dir = coord.xyz();
        if dir.length_squared() == 0.0 {
            return Err(Error::invalid_parameters("cube texture sampled with a zero direction"));
        }
        let (face, u, v) = CubeFace::from_direction(dir);
        self.face(face).sample_2d(states, u, v, ddx, ddy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_axis_selects_face() {
        let (face, u, v) = CubeFace::from_direction(Vector3::new(1.0, 0.0, 0.0));
        assert_eq!((face, u, v), (CubeFace::PositiveX, 0.5, 0.5));

        let (face, u, v) = CubeFace::from_direction(Vector3::new(0.5, 0.5, -1.0));
        assert_eq!((face, u, v), (CubeFace::NegativeZ, 0.25, 0.25));

        let (face, ..) = CubeFace::from_direction(Vector3::new(0.1, -2.0, 0.3));
        assert_eq!(face, CubeFace::NegativeY);
    }

    #[test]
    fn samples_the_hit_face() {
        let cube = CubeTexture::new(2, 1, Format::R32F).unwrap();
        for (i, face) in CubeFace::ALL.into_iter().enumerate() {
            cube.surface_level(face, 0).unwrap().borrow_mut().clear(Vector4::splat(i as f32));
        }
        let sample = cube
            .sample(&SamplerStates::default(), Vector4::new(0.0, -3.0, 0.0, 0.0), None, None)
            .unwrap();
        assert_eq!(sample.x, 3.0);
    }
}
