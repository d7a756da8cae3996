//! Header flag bits (spec.md §6).

/// This packet is a request.
pub const FLAG_REQUEST: u8 = 0x01;
/// This packet is a response.
pub const FLAG_RESPONSE: u8 = 0x02;
/// This packet carries an `ERROR_INFO` TLV.
pub const FLAG_ERROR: u8 = 0x04;
/// Payload is compressed. Reserved: implementations must preserve the bit
/// on forward and reject payloads if compression is not configured.
pub const FLAG_COMPRESSED: u8 = 0x08;
/// Payload is encrypted. Reserved, same forwarding rule as `FLAG_COMPRESSED`.
pub const FLAG_ENCRYPTED: u8 = 0x10;

/// `true` if `flags` sets any bit this codec does not implement support
/// for (compression, encryption) — callers must reject rather than
/// silently treat the payload as plaintext.
pub fn requires_unsupported_processing(flags: u8) -> bool {
    flags & (FLAG_COMPRESSED | FLAG_ENCRYPTED) != 0
}
