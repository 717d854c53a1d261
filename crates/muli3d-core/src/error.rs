use thiserror::Error;

/// Failure kinds reported by every fallible device, resource and shader operation.
///
/// Errors are detected where the invalid condition arises and returned immediately; nothing in the
/// core retries. A failing draw call draws nothing further and leaves all bound state intact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unknown error")]
    Unknown,
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub(crate) fn invalid_parameters(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }

    pub(crate) fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Allocates a zero-initialised buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_alloc_zeroed<T: Copy + Default>(len: usize) -> Result<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)?;
    data.resize(len, T::default());
    Ok(data)
}
