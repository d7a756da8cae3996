//! The 20-byte DDARP header (spec.md §6, bit-exact layout).

use crate::error::CodecError;
use byteorder::{BigEndian, ByteOrder};

/// Size, in bytes, of the fixed header.
pub const HEADER_LEN: usize = 20;

/// Protocol version this codec implements.
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed 20-byte header preceding every TLV payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub flags: u8,
    pub header_len: u16,
    pub tunnel_id: u32,
    pub sequence: u32,
    pub timestamp: u32,
    pub tlv_length: u32,
}

impl Header {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.version);
        out.push(self.flags);
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, self.header_len);
        out.extend_from_slice(&buf);

        let mut buf4 = [0u8; 4];
        BigEndian::write_u32(&mut buf4, self.tunnel_id);
        out.extend_from_slice(&buf4);
        BigEndian::write_u32(&mut buf4, self.sequence);
        out.extend_from_slice(&buf4);
        BigEndian::write_u32(&mut buf4, self.timestamp);
        out.extend_from_slice(&buf4);
        BigEndian::write_u32(&mut buf4, self.tlv_length);
        out.extend_from_slice(&buf4);
    }

    /// Parse and structurally validate the header (spec.md §4.1 rule 1).
    ///
    /// Does not check that the buffer actually holds `tlv_length` bytes of
    /// TLV payload beyond the header itself — callers that have the whole
    /// packet do that check against the full buffer length.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::InvalidPacket("buffer shorter than header"));
        }
        let version = bytes[0];
        if version != PROTOCOL_VERSION {
            return Err(CodecError::InvalidPacket("unsupported protocol version"));
        }
        let flags = bytes[1];
        let header_len = BigEndian::read_u16(&bytes[2..4]);
        if header_len as usize != HEADER_LEN {
            return Err(CodecError::InvalidPacket("header_len must be 20"));
        }
        let tunnel_id = BigEndian::read_u32(&bytes[4..8]);
        let sequence = BigEndian::read_u32(&bytes[8..12]);
        let timestamp = BigEndian::read_u32(&bytes[12..16]);
        let tlv_length = BigEndian::read_u32(&bytes[16..20]);

        Ok(Self {
            version,
            flags,
            header_len,
            tunnel_id,
            sequence,
            timestamp,
            tlv_length,
        })
    }
}
