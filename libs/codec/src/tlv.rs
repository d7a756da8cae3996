//! TLV registry and value encodings (spec.md §6).

use byteorder::{BigEndian, ByteOrder};
use std::collections::HashSet;

pub const TYPE_T3_TERNARY: u16 = 0x0001;
pub const TYPE_OWL_METRICS: u16 = 0x0002;
pub const TYPE_ROUTING_INFO: u16 = 0x0003;
pub const TYPE_NEIGHBOR_LIST: u16 = 0x0010;
pub const TYPE_KEEPALIVE: u16 = 0x0030;
pub const TYPE_ERROR_INFO: u16 = 0x0031;
pub const TYPE_CAPABILITIES: u16 = 0x0032;

const CRITICAL_RANGE: std::ops::RangeInclusive<u16> = 0x8000..=0xFFFF;

/// `true` if `type_` falls in the critical range, where an unregistered
/// TLV must reject the whole packet rather than being skipped.
pub fn is_critical(type_: u16) -> bool {
    CRITICAL_RANGE.contains(&type_)
}

/// Logical TLV value, used both as encode input and decode output.
///
/// `Raw` carries either a genuinely opaque/unknown payload, or the raw
/// bytes of a TLV whose registered decoder failed — per spec.md §4.1 rule
/// 3, a per-TLV decode failure never fails the containing packet.
#[derive(Debug, Clone, PartialEq)]
pub enum TlvValue {
    /// Application-defined body; validated by the application, not here
    /// (spec.md §9 design note).
    T3Ternary(Vec<u8>),
    OwlMetrics {
        latency_ns: u64,
        jitter_ns: u64,
        timestamp: u32,
    },
    RoutingInfo {
        destination: String,
        next_hop: String,
        metric: u32,
    },
    NeighborList(Vec<String>),
    Keepalive,
    ErrorInfo(String),
    /// Application-defined JSON object, opaque at this layer.
    Capabilities(Vec<u8>),
    /// Unknown type, or a known type whose value failed to decode.
    Raw(Vec<u8>),
}

impl TlvValue {
    pub(crate) fn encode(&self) -> Vec<u8> {
        match self {
            TlvValue::T3Ternary(bytes) => bytes.clone(),
            TlvValue::OwlMetrics {
                latency_ns,
                jitter_ns,
                timestamp,
            } => {
                let mut buf = vec![0u8; 20];
                BigEndian::write_u64(&mut buf[0..8], *latency_ns);
                BigEndian::write_u64(&mut buf[8..16], *jitter_ns);
                BigEndian::write_u32(&mut buf[16..20], *timestamp);
                buf
            }
            TlvValue::RoutingInfo {
                destination,
                next_hop,
                metric,
            } => {
                let dest_bytes = destination.as_bytes();
                let hop_bytes = next_hop.as_bytes();
                let mut buf = Vec::with_capacity(4 + dest_bytes.len() + hop_bytes.len() + 4);
                let mut len_buf = [0u8; 2];
                BigEndian::write_u16(&mut len_buf, dest_bytes.len() as u16);
                buf.extend_from_slice(&len_buf);
                BigEndian::write_u16(&mut len_buf, hop_bytes.len() as u16);
                buf.extend_from_slice(&len_buf);
                buf.extend_from_slice(dest_bytes);
                buf.extend_from_slice(hop_bytes);
                let mut metric_buf = [0u8; 4];
                BigEndian::write_u32(&mut metric_buf, *metric);
                buf.extend_from_slice(&metric_buf);
                buf
            }
            TlvValue::NeighborList(ids) => {
                serde_json::to_vec(ids).expect("Vec<String> always serializes")
            }
            TlvValue::Keepalive => Vec::new(),
            TlvValue::ErrorInfo(message) => message.as_bytes().to_vec(),
            TlvValue::Capabilities(bytes) => bytes.clone(),
            TlvValue::Raw(bytes) => bytes.clone(),
        }
    }

    /// Decode the value of a TLV whose type is one of the seven registered
    /// types. Returns `None` for any other type (including app-registered
    /// extension types, which this codec treats as opaque).
    pub(crate) fn decode_known(type_: u16, bytes: &[u8]) -> Option<Result<TlvValue, ()>> {
        match type_ {
            TYPE_T3_TERNARY => Some(Ok(TlvValue::T3Ternary(bytes.to_vec()))),
            TYPE_OWL_METRICS => {
                if bytes.len() != 20 {
                    Some(Err(()))
                } else {
                    Some(Ok(TlvValue::OwlMetrics {
                        latency_ns: BigEndian::read_u64(&bytes[0..8]),
                        jitter_ns: BigEndian::read_u64(&bytes[8..16]),
                        timestamp: BigEndian::read_u32(&bytes[16..20]),
                    }))
                }
            }
            TYPE_ROUTING_INFO => Some(Self::decode_routing_info(bytes).ok_or(())),
            TYPE_NEIGHBOR_LIST => Some(
                serde_json::from_slice::<Vec<String>>(bytes)
                    .map(TlvValue::NeighborList)
                    .map_err(|_| ()),
            ),
            TYPE_KEEPALIVE => {
                if bytes.is_empty() {
                    Some(Ok(TlvValue::Keepalive))
                } else {
                    Some(Err(()))
                }
            }
            TYPE_ERROR_INFO => Some(
                String::from_utf8(bytes.to_vec())
                    .map(TlvValue::ErrorInfo)
                    .map_err(|_| ()),
            ),
            TYPE_CAPABILITIES => Some(Ok(TlvValue::Capabilities(bytes.to_vec()))),
            _ => None,
        }
    }

    fn decode_routing_info(bytes: &[u8]) -> Option<TlvValue> {
        if bytes.len() < 4 {
            return None;
        }
        let dest_len = BigEndian::read_u16(&bytes[0..2]) as usize;
        let hop_len = BigEndian::read_u16(&bytes[2..4]) as usize;
        let needed = 4 + dest_len + hop_len + 4;
        if bytes.len() != needed {
            return None;
        }
        let dest_bytes = &bytes[4..4 + dest_len];
        let hop_bytes = &bytes[4 + dest_len..4 + dest_len + hop_len];
        let metric = BigEndian::read_u32(&bytes[4 + dest_len + hop_len..needed]);
        let destination = std::str::from_utf8(dest_bytes).ok()?.to_string();
        let next_hop = std::str::from_utf8(hop_bytes).ok()?.to_string();
        Some(TlvValue::RoutingInfo {
            destination,
            next_hop,
            metric,
        })
    }
}

/// Tracks which TLV types this codec instance understands, beyond the
/// seven built into the protocol.
///
/// Passed into [`crate::Codec::new`] rather than held as a process-global
/// registry, per spec.md §9's redesign flag against module-level
/// loggers/global registries.
#[derive(Debug, Clone, Default)]
pub struct TlvRegistry {
    extra: HashSet<u16>,
}

impl TlvRegistry {
    /// A registry that knows only the seven built-in TLV types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional type as known (e.g. an application-defined
    /// vendor or experimental TLV). The codec still treats its value as
    /// opaque — only the seven built-in types have structured decoders.
    pub fn register(&mut self, type_: u16) {
        self.extra.insert(type_);
    }

    pub fn is_registered(&self, type_: u16) -> bool {
        matches!(
            type_,
            TYPE_T3_TERNARY
                | TYPE_OWL_METRICS
                | TYPE_ROUTING_INFO
                | TYPE_NEIGHBOR_LIST
                | TYPE_KEEPALIVE
                | TYPE_ERROR_INFO
                | TYPE_CAPABILITIES
        ) || self.extra.contains(&type_)
    }
}
