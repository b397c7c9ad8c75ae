//! Signature header codec
//!
//! `UCP-Signature: t=<unix-seconds>,v1=<base64url(DER ECDSA signature)>`
//!
//! The signed message is `"<t>.<raw body>"`, hashed with SHA-256.

use crate::VerificationError;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Header names for signed order webhooks
pub mod headers {
    /// Timestamped signature
    pub const SIGNATURE: &str = "UCP-Signature";

    /// Key ID selecting the verification key
    pub const KEY_ID: &str = "UCP-Key-Id";

    /// Event ID on outbound deliveries
    pub const EVENT_ID: &str = "X-Event-Id";
}

/// Parsed `UCP-Signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Signed unix timestamp
    pub timestamp: i64,
    /// DER-encoded ECDSA signature
    pub signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parse a header value
    pub fn parse(value: &str) -> Result<Self, VerificationError> {
        let mut timestamp = None;
        let mut sig = None;

        for part in value.split(',') {
            let mut kv = part.trim().splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("t"), Some(t)) => timestamp = Some(t),
                (Some("v1"), Some(v)) => sig = Some(v),
                _ => {}
            }
        }

        let (Some(timestamp), Some(sig)) = (timestamp, sig) else {
            return Err(VerificationError::MalformedSignature(
                "missing t or v1".to_string(),
            ));
        };

        let timestamp: i64 = timestamp.parse().map_err(|_| {
            VerificationError::MalformedSignature("timestamp is not an integer".to_string())
        })?;

        let signature = decode_base64url(sig).map_err(|_| {
            VerificationError::MalformedSignature("signature is not base64url".to_string())
        })?;
        if signature.is_empty() {
            return Err(VerificationError::MalformedSignature(
                "empty signature".to_string(),
            ));
        }

        Ok(Self {
            timestamp,
            signature,
        })
    }

    /// Format a header value
    pub fn format(timestamp: i64, der_signature: &[u8]) -> String {
        format!("t={},v1={}", timestamp, URL_SAFE_NO_PAD.encode(der_signature))
    }
}

/// Bytes covered by the signature: `"<timestamp>.<body>"`
pub fn signed_message(timestamp: i64, body: &[u8]) -> Vec<u8> {
    let prefix = format!("{}.", timestamp);
    let mut message = Vec::with_capacity(prefix.len() + body.len());
    message.extend_from_slice(prefix.as_bytes());
    message.extend_from_slice(body);
    message
}

/// Hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Decode base64url, with or without padding
pub(crate) fn decode_base64url(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(value.trim_end_matches('='))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        let header = SignatureHeader::format(1_700_000_000, &[0x30, 0x06, 0x02, 0x01, 0x01]);
        let parsed = SignatureHeader::parse(&header).unwrap();
        assert_eq!(parsed.timestamp, 1_700_000_000);
        assert_eq!(parsed.signature, vec![0x30, 0x06, 0x02, 0x01, 0x01]);
    }

    #[test]
    fn test_parse_ignores_unknown_parts_and_padding() {
        let parsed = SignatureHeader::parse("v0=zzz, t=42 ,v1=AQI=").unwrap();
        assert_eq!(parsed.timestamp, 42);
        assert_eq!(parsed.signature, vec![1, 2]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for value in ["", "t=1", "v1=AQI", "t=abc,v1=AQI", "t=1,v1=***", "t=1,v1="] {
            let err = SignatureHeader::parse(value).unwrap_err();
            assert_eq!(err.code(), "malformed_signature", "value: {value:?}");
        }
    }

    #[test]
    fn test_signed_message() {
        assert_eq!(signed_message(12, b"{\"a\":1}"), b"12.{\"a\":1}".to_vec());
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
