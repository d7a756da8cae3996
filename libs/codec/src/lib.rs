//! DDARP wire codec (spec.md §4.1, §6): 20-byte header + TLV payload.
//!
//! `Codec` is constructed with an explicit [`TlvRegistry`] rather than
//! consulting a process-wide table, so multiple codecs with different
//! extension types can coexist in one process (spec.md §9).

pub mod error;
pub mod flags;
pub mod header;
pub mod tlv;

pub use error::CodecError;
pub use flags::{
    requires_unsupported_processing, FLAG_COMPRESSED, FLAG_ENCRYPTED, FLAG_ERROR, FLAG_REQUEST,
    FLAG_RESPONSE,
};
pub use header::{Header, HEADER_LEN, PROTOCOL_VERSION};
pub use tlv::{TlvRegistry, TlvValue};

use byteorder::{BigEndian, ByteOrder};
use std::time::{SystemTime, UNIX_EPOCH};

/// A decoded TLV: its wire type plus the decoded value, or raw bytes if
/// decoding that value failed without failing the packet.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTlv {
    pub type_: u16,
    pub value: TlvValue,
}

/// Counters accumulated while decoding one packet (spec.md §7's
/// "Metrics counters expose per-error-kind totals").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Non-critical unregistered TLVs that were skipped.
    pub unknown_tlv_count: u32,
    /// Registered TLVs whose value failed to decode (returned as raw bytes).
    pub decode_warning_count: u32,
}

/// Header fields plus the TLV types present, tolerant of undecodable
/// values (spec.md §4.1 `packet_info`).
#[derive(Debug, Clone, PartialEq)]
pub struct PacketInfo {
    pub header: Header,
    pub tlv_types: Vec<u16>,
}

/// The wire codec. Stateless apart from its registry and `skip_unknown`
/// policy — no mutable state is shared across calls.
#[derive(Debug, Clone)]
pub struct Codec {
    registry: TlvRegistry,
    skip_unknown: bool,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(TlvRegistry::new(), true)
    }
}

impl Codec {
    pub fn new(registry: TlvRegistry, skip_unknown: bool) -> Self {
        Self {
            registry,
            skip_unknown,
        }
    }

    /// Encode a full packet. `tlv_length` in the header is always the
    /// summed byte length of the packed TLVs — callers never compute it.
    pub fn encode(
        &self,
        tunnel_id: u32,
        sequence: u32,
        flags: u8,
        timestamp: Option<u32>,
        tlvs: &[(u16, TlvValue)],
    ) -> Vec<u8> {
        let mut tlv_bytes = Vec::new();
        for (type_, value) in tlvs {
            let encoded = value.encode();
            let mut type_buf = [0u8; 2];
            BigEndian::write_u16(&mut type_buf, *type_);
            tlv_bytes.extend_from_slice(&type_buf);
            BigEndian::write_u16(&mut type_buf, encoded.len() as u16);
            tlv_bytes.extend_from_slice(&type_buf);
            tlv_bytes.extend_from_slice(&encoded);
        }

        let header = Header {
            version: PROTOCOL_VERSION,
            flags,
            header_len: HEADER_LEN as u16,
            tunnel_id,
            sequence,
            timestamp: timestamp.unwrap_or_else(current_unix_seconds),
            tlv_length: tlv_bytes.len() as u32,
        };

        let mut out = Vec::with_capacity(HEADER_LEN + tlv_bytes.len());
        header.write_to(&mut out);
        out.extend_from_slice(&tlv_bytes);
        out
    }

    /// Build a request packet: sets `FLAG_REQUEST`.
    pub fn request(
        &self,
        tunnel_id: u32,
        sequence: u32,
        tlvs: &[(u16, TlvValue)],
    ) -> Vec<u8> {
        self.encode(tunnel_id, sequence, FLAG_REQUEST, None, tlvs)
    }

    /// Build a response packet: sets `FLAG_RESPONSE`.
    pub fn response(
        &self,
        tunnel_id: u32,
        sequence: u32,
        tlvs: &[(u16, TlvValue)],
    ) -> Vec<u8> {
        self.encode(tunnel_id, sequence, FLAG_RESPONSE, None, tlvs)
    }

    /// Build an error packet: sets `FLAG_ERROR` and emits a single
    /// `ERROR_INFO` TLV carrying `message`.
    pub fn error(&self, tunnel_id: u32, sequence: u32, message: impl Into<String>) -> Vec<u8> {
        self.encode(
            tunnel_id,
            sequence,
            FLAG_ERROR,
            None,
            &[(tlv::TYPE_ERROR_INFO, TlvValue::ErrorInfo(message.into()))],
        )
    }

    /// Cheap header/length sanity check (spec.md §4.1).
    pub fn validate(&self, bytes: &[u8]) -> bool {
        match Header::parse(bytes) {
            Ok(header) => bytes.len() >= HEADER_LEN + header.tlv_length as usize,
            Err(_) => false,
        }
    }

    /// Decode a full packet into its header and TLVs.
    ///
    /// Fails only on structural problems (spec.md §4.1 rule 1). Per-TLV
    /// decode failures and skipped non-critical unknown TLVs are reported
    /// via `DecodeStats`, not as an error.
    pub fn decode(
        &self,
        bytes: &[u8],
    ) -> Result<(Header, Vec<DecodedTlv>, DecodeStats), CodecError> {
        let header = Header::parse(bytes)?;
        if requires_unsupported_processing(header.flags) {
            return Err(CodecError::UnsupportedProcessing);
        }
        let total_len = HEADER_LEN + header.tlv_length as usize;
        if bytes.len() < total_len {
            return Err(CodecError::InvalidPacket(
                "buffer shorter than declared tlv_length",
            ));
        }

        let payload = &bytes[HEADER_LEN..total_len];
        let mut tlvs = Vec::new();
        let mut stats = DecodeStats::default();
        let mut offset = 0usize;

        while offset < payload.len() {
            if payload.len() - offset < 4 {
                return Err(CodecError::InvalidPacket("truncated TLV header"));
            }
            let type_ = BigEndian::read_u16(&payload[offset..offset + 2]);
            let length = BigEndian::read_u16(&payload[offset + 2..offset + 4]) as usize;
            offset += 4;
            if payload.len() - offset < length {
                return Err(CodecError::InvalidPacket("truncated TLV value"));
            }
            let value_bytes = &payload[offset..offset + length];
            offset += length;

            match TlvValue::decode_known(type_, value_bytes) {
                Some(Ok(value)) => tlvs.push(DecodedTlv { type_, value }),
                Some(Err(())) => {
                    tracing::warn!(tlv_type = format!("{:#06x}", type_), "TLV value failed to decode");
                    stats.decode_warning_count += 1;
                    tlvs.push(DecodedTlv {
                        type_,
                        value: TlvValue::Raw(value_bytes.to_vec()),
                    });
                }
                None => {
                    if self.registry.is_registered(type_) {
                        tlvs.push(DecodedTlv {
                            type_,
                            value: TlvValue::Raw(value_bytes.to_vec()),
                        });
                    } else if tlv::is_critical(type_) || !self.skip_unknown {
                        return Err(CodecError::UnknownTlv(type_));
                    } else {
                        tracing::warn!(tlv_type = format!("{:#06x}", type_), "skipping unknown TLV");
                        stats.unknown_tlv_count += 1;
                        tlvs.push(DecodedTlv {
                            type_,
                            value: TlvValue::Raw(value_bytes.to_vec()),
                        });
                    }
                }
            }
        }

        Ok((header, tlvs, stats))
    }

    /// Header fields plus the TLV types seen, tolerant of undecodable
    /// payloads — used for diagnostics where a best-effort summary is
    /// preferable to a hard failure.
    pub fn packet_info(&self, bytes: &[u8]) -> Result<PacketInfo, CodecError> {
        let header = Header::parse(bytes)?;
        let total_len = HEADER_LEN + header.tlv_length as usize;
        if bytes.len() < total_len {
            return Err(CodecError::InvalidPacket(
                "buffer shorter than declared tlv_length",
            ));
        }
        let payload = &bytes[HEADER_LEN..total_len];
        let mut tlv_types = Vec::new();
        let mut offset = 0usize;
        while offset + 4 <= payload.len() {
            let type_ = BigEndian::read_u16(&payload[offset..offset + 2]);
            let length = BigEndian::read_u16(&payload[offset + 2..offset + 4]) as usize;
            tlv_types.push(type_);
            offset += 4;
            if payload.len() - offset < length {
                break;
            }
            offset += length;
        }
        Ok(PacketInfo { header, tlv_types })
    }
}

fn current_unix_seconds() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ByteOrder};

    #[test]
    fn s1_round_trips_multi_tlv_packet() {
        let codec = Codec::default();
        let bytes = codec.encode(
            0x04D2,
            0x01C8,
            FLAG_REQUEST,
            Some(0x6000_0000),
            &[
                (tlv::TYPE_KEEPALIVE, TlvValue::Keepalive),
                (
                    tlv::TYPE_OWL_METRICS,
                    TlvValue::OwlMetrics {
                        latency_ns: 1_500_000,
                        jitter_ns: 50_000,
                        timestamp: 0x6000_0000,
                    },
                ),
            ],
        );
        assert_eq!(bytes.len(), 48);

        let (header, tlvs, stats) = codec.decode(&bytes).unwrap();
        assert_eq!(header.tunnel_id, 0x04D2);
        assert_eq!(header.sequence, 0x01C8);
        assert_eq!(header.flags, FLAG_REQUEST);
        assert_eq!(header.timestamp, 0x6000_0000);
        assert_eq!(tlvs.len(), 2);
        assert_eq!(tlvs[0].value, TlvValue::Keepalive);
        assert_eq!(stats, DecodeStats::default());
    }

    #[test]
    fn s4_unknown_tlv_is_tolerated_and_counted() {
        let codec = Codec::default();
        let mut bytes = codec.encode(1, 1, 0, Some(0), &[(tlv::TYPE_KEEPALIVE, TlvValue::Keepalive)]);
        // append an unknown non-critical TLV: type 0x9999 is in Vendor/Experimental-adjacent
        // space but not in the critical range, so it should be tolerated.
        let unknown_type = 0x4999u16;
        bytes.extend_from_slice(&[0x49, 0x99, 0x00, 0x04]);
        bytes.extend_from_slice(b"test");
        BigEndian::write_u32(&mut bytes[16..20], (bytes.len() - HEADER_LEN) as u32);

        let (_, tlvs, stats) = codec.decode(&bytes).unwrap();
        assert_eq!(stats.unknown_tlv_count, 1);
        assert_eq!(tlvs.len(), 2);
        assert_eq!(
            tlvs[1],
            DecodedTlv {
                type_: unknown_type,
                value: TlvValue::Raw(b"test".to_vec())
            }
        );
    }

    #[test]
    fn s5_malformed_tlv_length_is_rejected_without_partial_decode() {
        let mut bytes = vec![0u8; 30];
        bytes[0] = PROTOCOL_VERSION;
        BigEndian::write_u16(&mut bytes[2..4], HEADER_LEN as u16);
        BigEndian::write_u32(&mut bytes[16..20], 0x0000_00FF);

        let codec = Codec::default();
        assert!(matches!(
            codec.decode(&bytes),
            Err(CodecError::InvalidPacket(_))
        ));
    }

    #[test]
    fn critical_unknown_tlv_rejects_packet() {
        let codec = Codec::default();
        let mut bytes = codec.encode(1, 1, 0, Some(0), &[]);
        bytes.extend_from_slice(&[0x90, 0x00, 0x00, 0x00]);
        BigEndian::write_u32(&mut bytes[16..20], 4);

        assert_eq!(codec.decode(&bytes), Err(CodecError::UnknownTlv(0x9000)));
    }

    #[test]
    fn skip_unknown_false_rejects_non_critical_unknown_too() {
        let codec = Codec::new(TlvRegistry::new(), false);
        let mut bytes = codec.encode(1, 1, 0, Some(0), &[]);
        bytes.extend_from_slice(&[0x40, 0x00, 0x00, 0x00]);
        BigEndian::write_u32(&mut bytes[16..20], 4);

        assert_eq!(codec.decode(&bytes), Err(CodecError::UnknownTlv(0x4000)));
    }

    #[test]
    fn error_helper_sets_flag_and_error_info_tlv() {
        let codec = Codec::default();
        let bytes = codec.error(7, 1, "boom");
        let (header, tlvs, _) = codec.decode(&bytes).unwrap();
        assert_eq!(header.flags, FLAG_ERROR);
        assert_eq!(tlvs[0].value, TlvValue::ErrorInfo("boom".to_string()));
    }

    #[test]
    fn validate_rejects_short_and_truncated_buffers() {
        let codec = Codec::default();
        assert!(!codec.validate(&[0u8; 5]));
        let mut bytes = codec.encode(1, 1, 0, Some(0), &[(tlv::TYPE_KEEPALIVE, TlvValue::Keepalive)]);
        bytes.truncate(bytes.len() - 1);
        assert!(!codec.validate(&bytes));
    }

    #[test]
    fn packet_info_reports_types_even_with_malformed_values() {
        let codec = Codec::default();
        let bytes = codec.encode(
            1,
            1,
            0,
            Some(0),
            &[(tlv::TYPE_OWL_METRICS, TlvValue::Raw(vec![0u8; 3]))],
        );
        let info = codec.packet_info(&bytes).unwrap();
        assert_eq!(info.tlv_types, vec![tlv::TYPE_OWL_METRICS]);
    }

    #[test]
    fn compressed_flag_is_rejected_without_partial_decode() {
        let codec = Codec::default();
        let bytes = codec.encode(1, 1, FLAG_COMPRESSED, Some(0), &[]);
        assert_eq!(codec.decode(&bytes), Err(CodecError::UnsupportedProcessing));
    }

    #[test]
    fn encrypted_flag_is_rejected_without_partial_decode() {
        let codec = Codec::default();
        let bytes = codec.encode(1, 1, FLAG_ENCRYPTED, Some(0), &[]);
        assert_eq!(codec.decode(&bytes), Err(CodecError::UnsupportedProcessing));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_tlv() -> impl Strategy<Value = (u16, TlvValue)> {
        prop_oneof![
            Just((tlv::TYPE_KEEPALIVE, TlvValue::Keepalive)),
            (0u64..1_000_000_000, 0u64..100_000, 0u32..u32::MAX).prop_map(
                |(latency_ns, jitter_ns, timestamp)| (
                    tlv::TYPE_OWL_METRICS,
                    TlvValue::OwlMetrics {
                        latency_ns,
                        jitter_ns,
                        timestamp,
                    }
                )
            ),
            "[a-zA-Z0-9 ]{0,64}".prop_map(|s| (tlv::TYPE_ERROR_INFO, TlvValue::ErrorInfo(s))),
        ]
    }

    proptest! {
        // spec.md §8 invariant 1: decode(encode(p)) == p modulo the
        // auto-filled timestamp, for any legal set of TLVs.
        #[test]
        fn round_trip_preserves_header_and_tlvs(
            tunnel_id in any::<u32>(),
            sequence in any::<u32>(),
            timestamp in any::<u32>(),
            tlvs in prop::collection::vec(arb_tlv(), 0..6),
        ) {
            let codec = Codec::default();
            let bytes = codec.encode(tunnel_id, sequence, FLAG_REQUEST, Some(timestamp), &tlvs);
            let (header, decoded, stats) = codec.decode(&bytes).unwrap();

            prop_assert_eq!(header.tunnel_id, tunnel_id);
            prop_assert_eq!(header.sequence, sequence);
            prop_assert_eq!(header.timestamp, timestamp);
            prop_assert_eq!(header.flags, FLAG_REQUEST);
            prop_assert_eq!(stats, DecodeStats::default());
            prop_assert_eq!(decoded.len(), tlvs.len());
            for (original, got) in tlvs.iter().zip(decoded.iter()) {
                prop_assert_eq!(original.0, got.type_);
                prop_assert_eq!(&original.1, &got.value);
            }
        }

        #[test]
        fn validate_agrees_with_decode(
            tunnel_id in any::<u32>(),
            sequence in any::<u32>(),
            tlvs in prop::collection::vec(arb_tlv(), 0..4),
        ) {
            let codec = Codec::default();
            let bytes = codec.encode(tunnel_id, sequence, 0, Some(0), &tlvs);
            prop_assert!(codec.validate(&bytes));
            prop_assert!(codec.decode(&bytes).is_ok());
        }
    }
}
