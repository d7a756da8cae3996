//! Signed probe envelopes (spec.md §4.2, §6).
//!
//! Each probe is `{"payload": ..., "signature": hex-hmac-sha256}`. The
//! signature covers the exact bytes `serde_json` produces for `payload` —
//! struct field order is fixed by declaration order and never changes
//! between signer and verifier, so this is a stable canonical form even
//! though no canonicalization library is involved (spec.md §6, SPEC_FULL
//! §C.1).

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The logical contents of a probe or reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProbePayload {
    Ping {
        src: String,
        dest: String,
        seq: u32,
        send_time_ns: u64,
    },
    Pong {
        src: String,
        dest: String,
        seq: u32,
        original_send_time_ns: u64,
        reply_time_ns: u64,
    },
}

/// The signed envelope actually placed on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub payload: ProbePayload,
    pub signature: String,
}

/// Sign `payload` with `secret`, producing the envelope to send.
pub fn sign(secret: &[u8], payload: ProbePayload) -> SignedEnvelope {
    let signature = compute_signature(secret, &payload);
    SignedEnvelope { payload, signature }
}

/// Verify an inbound envelope's signature against `secret`.
///
/// Constant-time comparison via `hmac`'s `verify_slice`, matching the
/// `hmac.compare_digest` the source uses to avoid timing side channels.
pub fn verify(secret: &[u8], envelope: &SignedEnvelope) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    let canonical = serde_json::to_vec(&envelope.payload).unwrap_or_default();
    mac.update(&canonical);
    let expected = match hex::decode(&envelope.signature) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    mac.verify_slice(&expected).is_ok()
}

fn compute_signature(secret: &[u8], payload: &ProbePayload) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    let canonical = serde_json::to_vec(payload).expect("ProbePayload always serializes");
    mac.update(&canonical);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_correctly_signed_envelope() {
        let payload = ProbePayload::Ping {
            src: "a".into(),
            dest: "b".into(),
            seq: 1,
            send_time_ns: 42,
        };
        let envelope = sign(b"secret", payload);
        assert!(verify(b"secret", &envelope));
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = ProbePayload::Ping {
            src: "a".into(),
            dest: "b".into(),
            seq: 1,
            send_time_ns: 42,
        };
        let envelope = sign(b"secret", payload);
        assert!(!verify(b"wrong-secret", &envelope));
    }

    #[test]
    fn rejects_tampered_payload() {
        let payload = ProbePayload::Ping {
            src: "a".into(),
            dest: "b".into(),
            seq: 1,
            send_time_ns: 42,
        };
        let mut envelope = sign(b"secret", payload);
        envelope.payload = ProbePayload::Ping {
            src: "a".into(),
            dest: "b".into(),
            seq: 2,
            send_time_ns: 42,
        };
        assert!(!verify(b"secret", &envelope));
    }
}
