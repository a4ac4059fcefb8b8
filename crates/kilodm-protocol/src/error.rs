use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame length mismatch: expected {expected} bytes, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    #[error("unknown message type: {0:#04x}")]
    UnknownMsgType(u8),

    #[error("checksum mismatch: frame carries {actual:#06x}, computed {expected:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("field {field} out of range: {value}")]
    FieldOutOfRange { field: &'static str, value: u32 },

    #[error("invalid commitment byte: {0:#04x}")]
    InvalidCommitment(u8),

    #[error("invalid arena state byte: {0:#04x}")]
    InvalidArenaState(u8),
}
