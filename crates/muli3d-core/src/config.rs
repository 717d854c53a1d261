use crate::error::{Error, Result};

/// Device creation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Width of the surfaces handed to the present target.
    pub backbuffer_width: u32,
    /// Height of the surfaces handed to the present target.
    pub backbuffer_height: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backbuffer_width: 640,
            backbuffer_height: 480,
        }
    }
}

impl DeviceConfig {
    pub fn new(backbuffer_width: u32, backbuffer_height: u32) -> Self {
        Self {
            backbuffer_width,
            backbuffer_height,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.backbuffer_width == 0 || self.backbuffer_height == 0 {
            return Err(Error::invalid_parameters(format!(
                "backbuffer dimensions must be non-zero (got {}x{})",
                self.backbuffer_width, self.backbuffer_height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_backbuffer_is_rejected() {
        assert!(DeviceConfig::new(0, 480).validate().is_err());
        assert!(DeviceConfig::default().validate().is_ok());
    }
}
