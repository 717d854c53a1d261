use crate::error::{try_alloc_zeroed, Error, Result};
use crate::format::IndexFormat;

/// 16- or 32-bit index storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexBuffer {
    format: IndexFormat,
    data: Vec<u8>,
}

impl IndexBuffer {
    /// Creates a zeroed buffer of `length` bytes, which must hold a whole number of indices.
    pub fn new(length: usize, format: IndexFormat) -> Result<Self> {
        if length == 0 || length % format.size_bytes() != 0 {
            return Err(Error::invalid_parameters(format!(
                "index buffer length {length} is not a non-zero multiple of {}",
                format.size_bytes()
            )));
        }
        Ok(Self {
            format,
            data: try_alloc_zeroed(length)?,
        })
    }

    pub fn format(&self) -> IndexFormat {
        self.format
    }

    pub fn len_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn num_indices(&self) -> usize {
        self.data.len() / self.format.size_bytes()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Reads index `position`, independent of the storage width.
    pub fn index(&self, position: usize) -> Result<u32> {
        let size = self.format.size_bytes();
        let start = position.checked_mul(size);
        let bytes = start
            .and_then(|start| self.data.get(start..start.checked_add(size)?))
            .ok_or_else(|| {
                Error::invalid_parameters(format!(
                    "index {position} out of range ({} indices)",
                    self.num_indices()
                ))
            })?;
        Ok(match self.format {
            IndexFormat::Index16 => u32::from(bytemuck::pod_read_unaligned::<u16>(bytes)),
            IndexFormat::Index32 => bytemuck::pod_read_unaligned::<u32>(bytes),
        })
    }

    pub fn write_u16(&mut self, start: usize, indices: &[u16]) -> Result<()> {
        if self.format != IndexFormat::Index16 {
            return Err(Error::invalid_format("16-bit indices written to a 32-bit index buffer"));
        }
        self.write_bytes(start * 2, bytemuck::cast_slice(indices))
    }

    pub fn write_u32(&mut self, start: usize, indices: &[u32]) -> Result<()> {
        if self.format != IndexFormat::Index32 {
            return Err(Error::invalid_format("32-bit indices written to a 16-bit index buffer"));
        }
        self.write_bytes(start * 4, bytemuck::cast_slice(indices))
    }

    fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let len = self.data.len();
        let dst = offset
            .checked_add(bytes.len())
            .and_then(|end| self.data.get_mut(offset..end))
            .ok_or_else(|| {
                Error::invalid_parameters(format!(
                    "write of {} bytes at offset {offset} exceeds index buffer length {len}",
                    bytes.len()
                ))
            })?;
        dst.copy_from_slice(bytes);
        Ok(())
    }
}
