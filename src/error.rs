//! Error types for record construction, access and decoding

use thiserror::Error;

/// Errors produced by the record, codec and trace-file layers
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("payload has width {width} bits; text requires 8-bit storage")]
    NotText { width: u8 },

    #[error("payload is not a stage value (width {width} bits, {len} elements)")]
    NotStage { width: u8, len: u16 },

    #[error("unknown stage byte: {0}")]
    UnknownStage(u8),

    #[error("payload has {len} elements; at most {max} are representable")]
    TooManyElements { len: usize, max: usize },

    #[error("element index {index} is beyond the maximum payload length {max}")]
    IndexOutOfRange { index: usize, max: usize },

    #[error("failed to allocate {bytes} bytes of external payload storage")]
    Allocation { bytes: usize },

    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    #[error("invalid element width code: {0}")]
    InvalidWidthCode(u8),

    #[error("value {value} does not fit in a {width}-bit element")]
    ValueOutOfRange { value: i64, width: u8 },

    #[error("not a trace file (bad magic {0:02x?})")]
    BadMagic([u8; 4]),

    #[error("unsupported trace file version: expected {expected}, found {found}")]
    UnsupportedVersion { expected: u16, found: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for record operations
pub type Result<T> = std::result::Result<T, RecordError>;
