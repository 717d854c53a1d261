use bytemuck::Pod;

use crate::error::{try_alloc_zeroed, Error, Result};

/// Raw vertex storage. Layout is described by a [`crate::VertexFormat`] and the stream binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexBuffer {
    data: Vec<u8>,
}

impl VertexBuffer {
    pub fn new(length: usize) -> Result<Self> {
        if length == 0 {
            return Err(Error::invalid_parameters("vertex buffer length must be non-zero"));
        }
        Ok(Self {
            data: try_alloc_zeroed(length)?,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copies `items` into the buffer starting at byte `offset`.
    pub fn write<T: Pod>(&mut self, offset: usize, items: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(items);
        let len = self.data.len();
        let dst = offset
            .checked_add(bytes.len())
            .and_then(|end| self.data.get_mut(offset..end))
            .ok_or_else(|| {
                Error::invalid_parameters(format!(
                    "write of {} bytes at offset {offset} exceeds vertex buffer length {}",
                    bytes.len(),
                    len
                ))
            })?;
        dst.copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_is_bounds_checked() {
        let mut vb = VertexBuffer::new(16).unwrap();
        vb.write(8, &[1.0f32, 2.0]).unwrap();
        assert_eq!(bytemuck::pod_read_unaligned::<f32>(&vb.data()[12..16]), 2.0);
        assert!(vb.write(12, &[1.0f32, 2.0]).is_err());
        assert!(VertexBuffer::new(0).is_err());
    }

    #[test]
    fn rejected_write_names_the_buffer_length_and_leaves_data_untouched() {
        let mut vb = VertexBuffer::new(8).unwrap();
        vb.write(0, &[3.0f32, 4.0]).unwrap();
        let err = vb.write(usize::MAX, &[1.0f32]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameters(_)), "{err}");
        let err = vb.write(4, &[1.0f32, 2.0]).unwrap_err();
        assert!(err.to_string().contains("length 8"), "{err}");
        assert_eq!(bytemuck::pod_read_unaligned::<[f32; 2]>(vb.data()), [3.0, 4.0]);
    }
}
