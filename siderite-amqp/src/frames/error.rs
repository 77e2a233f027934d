//! Frame codec error type

use std::io;

/// Errors from encoding or decoding frames
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error from the underlying transport
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The frame header is not well formed (size < 8, doff < 2, or
    /// doff * 4 > size)
    #[error("Malformed frame header")]
    MalformedFrame,

    /// The announced frame size exceeds the negotiated max-frame-size
    #[error("Frame size exceeds max frame size")]
    FrameSizeExceedsMaxFrameSize,

    /// The frame type octet is neither AMQP (0x00) nor SASL (0x01)
    #[error("Frame type {0:#x} is not implemented")]
    NotImplemented(u8),

    /// The frame body could not be decoded
    #[error(transparent)]
    Codec(#[from] siderite_amqp_types::codec::Error),
}
