use thiserror::Error;

/// Errors saving or restoring engine state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistError {
    #[error("session file has no CPU register chunk")]
    MissingChunk,

    #[error("CPU register chunk is {actual} bytes, expected {expected}")]
    BadLength { expected: usize, actual: usize },

    #[error("session storage error: {0}")]
    Storage(String),
}

/// Errors in an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("slow cycle mask {0:#x} must be one less than a power of two")]
    SlowCycleMask(u32),

    #[error("history capacity {0} is too large")]
    HistoryCapacity(usize),
}

pub type Result<T, E = PersistError> = std::result::Result<T, E>;
