//! Device, resources and shader contracts of the Muli3D software rasterizer.
//!
//! Everything runs on the calling thread. Resources are shared through `Rc`; those the application
//! writes to after creation (buffers, surfaces, volumes, render targets, shaders) sit behind a
//! `RefCell`, and a conflicting borrow while drawing is reported as [`Error::InvalidState`].

pub mod base_texture;
pub mod config;
pub mod cube_texture;
pub mod device;
pub mod error;
pub mod format;
pub mod index_buffer;
pub mod limits;
pub mod present;
pub mod render_target;
pub mod shader;
pub mod state;
pub mod surface;
pub mod texture;
pub mod vertex_buffer;
pub mod vertex_format;
pub mod volume;
pub mod volume_texture;

pub use base_texture::{BaseTexture, TextureSampleInput};
pub use config::DeviceConfig;
pub use cube_texture::{CubeFace, CubeTexture};
pub use device::stats::DrawStats;
pub use device::{Device, VertexStream};
pub use error::{Error, Result};
pub use format::{Format, IndexFormat};
pub use index_buffer::IndexBuffer;
pub use present::PresentTarget;
pub use render_target::{ClearFlags, RenderTarget};
pub use shader::{
    PixelContext, PixelShader, PixelShaderOutput, PrimitiveAssembler, SamplerContext, Shader,
    ShaderConstants, ShaderRegType, ShaderRegisters, TriangleShader, VertexShader, VsOutput,
};
pub use state::topology::PrimitiveType;
pub use state::{
    AddressMode, ClipPlane, CmpFunc, CullMode, FillMode, MipFilter, RenderState, RenderStates,
    SamplerState, SamplerStates, SubdivisionMode, SubdivisionStates, TextureFilter,
};
pub use surface::{LockedRect, Rect, Surface};
pub use texture::Texture;
pub use vertex_buffer::VertexBuffer;
pub use vertex_format::{VertexElement, VertexElementType, VertexFormat};
pub use volume::{Box3, LockedBox, Volume};
pub use volume_texture::VolumeTexture;
