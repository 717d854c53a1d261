use muli3d_math::Vector4;

use crate::error::{Error, Result};
use crate::limits::{MAX_SHADER_REGISTERS, MAX_VERTEX_STREAMS};
use crate::shader::ShaderRegisters;

/// Component layout of one vertex element. All element types are 32-bit floats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexElementType {
    Float,
    Vector2,
    Vector3,
    Vector4,
}

impl VertexElementType {
    #[inline]
    pub const fn components(self) -> usize {
        match self {
            VertexElementType::Float => 1,
            VertexElementType::Vector2 => 2,
            VertexElementType::Vector3 => 3,
            VertexElementType::Vector4 => 4,
        }
    }

    #[inline]
    pub const fn byte_size(self) -> usize {
        self.components() * 4
    }

    /// Expands raw components into a register: missing components default to `(.., 0, 0, 1)`.
    fn expand(self, c: [f32; 4]) -> Vector4 {
        match self {
            VertexElementType::Float => Vector4::new(c[0], 0.0, 0.0, 1.0),
            VertexElementType::Vector2 => Vector4::new(c[0], c[1], 0.0, 1.0),
            VertexElementType::Vector3 => Vector4::new(c[0], c[1], c[2], 1.0),
            VertexElementType::Vector4 => Vector4::from_array(c),
        }
    }
}

/// One entry of a vertex declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexElement {
    pub stream: u32,
    pub ty: VertexElementType,
    /// Vertex-shader input register that receives the element.
    pub register: u32,
}

impl VertexElement {
    pub const fn new(stream: u32, ty: VertexElementType, register: u32) -> Self {
        Self {
            stream,
            ty,
            register,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ResolvedElement {
    stream: usize,
    ty: VertexElementType,
    register: usize,
    /// Byte offset inside the stream's vertex, accumulated in declaration order.
    offset: usize,
}

/// A validated vertex declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexFormat {
    elements: Vec<ResolvedElement>,
    stream_sizes: [usize; MAX_VERTEX_STREAMS],
}

/// View of a bound vertex stream for the duration of a draw call.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StreamView<'a> {
    pub data: &'a [u8],
    pub offset: usize,
    pub stride: usize,
}

impl VertexFormat {
    pub fn new(declaration: &[VertexElement]) -> Result<Self> {
        if declaration.is_empty() {
            return Err(Error::invalid_parameters("vertex declaration is empty"));
        }

        let mut elements = Vec::with_capacity(declaration.len());
        let mut stream_sizes = [0usize; MAX_VERTEX_STREAMS];
        let mut registers_used = [false; MAX_SHADER_REGISTERS];
        for el in declaration {
            let stream = el.stream as usize;
            let register = el.register as usize;
            if stream >= MAX_VERTEX_STREAMS {
                return Err(Error::invalid_parameters(format!(
                    "vertex element stream {stream} out of range (max {MAX_VERTEX_STREAMS})"
                )));
            }
            if register >= MAX_SHADER_REGISTERS {
                return Err(Error::invalid_parameters(format!(
                    "vertex element register {register} out of range (max {MAX_SHADER_REGISTERS})"
                )));
            }
            if std::mem::replace(&mut registers_used[register], true) {
                return Err(Error::invalid_parameters(format!(
                    "vertex register {register} is declared twice"
                )));
            }

            elements.push(ResolvedElement {
                stream,
                ty: el.ty,
                register,
                offset: stream_sizes[stream],
            });
            stream_sizes[stream] += el.ty.byte_size();
        }

        Ok(Self {
            elements,
            stream_sizes,
        })
    }

    /// Whether any element reads from `stream`.
    pub fn uses_stream(&self, stream: usize) -> bool {
        self.stream_sizes.get(stream).is_some_and(|&size| size > 0)
    }

    /// Bytes per vertex the declaration reads from `stream`.
    pub fn stream_vertex_size(&self, stream: usize) -> usize {
        self.stream_sizes.get(stream).copied().unwrap_or(0)
    }

    /// Decodes vertex `vertex_index` into `out`. Registers not named by the declaration are zero.
    pub(crate) fn decode(
        &self,
        streams: &[Option<StreamView<'_>>; MAX_VERTEX_STREAMS],
        vertex_index: u32,
        out: &mut ShaderRegisters,
    ) -> Result<()> {
        *out = [Vector4::ZERO; MAX_SHADER_REGISTERS];
        for el in &self.elements {
            let stream = streams[el.stream].ok_or_else(|| {
                Error::invalid_state(format!("vertex stream {} is not bound", el.stream))
            })?;
            let size = el.ty.byte_size();
            let start = (vertex_index as usize)
                .checked_mul(stream.stride)
                .and_then(|v| v.checked_add(stream.offset))
                .and_then(|v| v.checked_add(el.offset));
            let bytes = start
                .and_then(|start| stream.data.get(start..start.checked_add(size)?))
                .ok_or_else(|| {
                    Error::invalid_parameters(format!(
                        "vertex {vertex_index} reads past the end of stream {} ({} bytes)",
                        el.stream,
                        stream.data.len()
                    ))
                })?;

            let mut c = [0.0f32; 4];
            for (dst, chunk) in c.iter_mut().zip(bytes.chunks_exact(4)) {
                *dst = bytemuck::pod_read_unaligned::<f32>(chunk);
            }
            out[el.register] = el.ty.expand(c);
        }
        Ok(())
    }
}
