//! Wire codec error taxonomy (spec.md §7).

use thiserror::Error;

/// Errors raised by [`crate::Codec`].
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    /// Header or length sanity check failed: short buffer, bad version,
    /// header_len mismatch, or declared `tlv_length` exceeds the buffer.
    #[error("invalid packet: {0}")]
    InvalidPacket(&'static str),

    /// An unregistered TLV was encountered and either fell in the critical
    /// range (0x8000-0xFFFF) or `skip_unknown` was disabled.
    #[error("unknown TLV type {0:#06x}")]
    UnknownTlv(u16),

    /// The header sets `COMPRESSED` or `ENCRYPTED` and this codec instance
    /// has neither configured (spec.md §4.1 flag bits: "implementations
    /// must preserve them on forward and reject payloads if not
    /// configured").
    #[error("payload requires unsupported processing (compressed/encrypted)")]
    UnsupportedProcessing,
}
