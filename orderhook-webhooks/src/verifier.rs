//! Key-set signature verifier

use crate::cache::KeySetCache;
use crate::nonce::{NonceStore, signature_nonce};
use crate::signature::{SignatureHeader, headers, signed_message};
use crate::VerificationError;
use hyper::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Signature-related request headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub signature: Option<String>,
    pub key_id: Option<String>,
}

impl SignatureHeaders {
    pub fn new(signature: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self {
            signature: Some(signature.into()),
            key_id: Some(key_id.into()),
        }
    }

    /// Extract from HTTP headers (names are case-insensitive)
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let get = |name: &str| {
            map.get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            signature: get(headers::SIGNATURE),
            key_id: get(headers::KEY_ID),
        }
    }
}

/// Verifier settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Allowed clock skew in either direction
    pub tolerance: Duration,
    /// Accept everything without checking. Non-production harnesses only.
    pub skip_verification: bool,
    /// Lifetime of signature nonces
    pub nonce_ttl: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            tolerance: Duration::from_secs(300),
            skip_verification: false,
            nonce_ttl: Duration::from_secs(600),
        }
    }
}

/// A request that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub key_id: Option<String>,
    pub timestamp: Option<i64>,
    /// Verification was bypassed by configuration
    pub skipped: bool,
}

/// Verifies `UCP-Signature` against the cached key set.
pub struct SignatureVerifier {
    keys: Option<Arc<KeySetCache>>,
    nonces: Option<Arc<dyn NonceStore>>,
    config: VerifierConfig,
}

impl SignatureVerifier {
    pub fn new(keys: Arc<KeySetCache>, config: VerifierConfig) -> Self {
        Self {
            keys: Some(keys),
            nonces: None,
            config,
        }
    }

    /// A verifier with no key source. Every request fails as misconfigured
    /// unless `skip_verification` is set.
    pub fn without_keys(config: VerifierConfig) -> Self {
        Self {
            keys: None,
            nonces: None,
            config,
        }
    }

    /// Reject exact signature reuse through `store`
    pub fn with_nonce_store(mut self, store: Arc<dyn NonceStore>) -> Self {
        self.nonces = Some(store);
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub async fn verify(
        &self,
        headers: &SignatureHeaders,
        body: &[u8],
    ) -> Result<Verified, VerificationError> {
        self.verify_at(chrono::Utc::now().timestamp(), headers, body)
            .await
    }

    /// Verify against an explicit unix time
    pub async fn verify_at(
        &self,
        now: i64,
        headers: &SignatureHeaders,
        body: &[u8],
    ) -> Result<Verified, VerificationError> {
        if self.config.skip_verification {
            debug!(target: "orderhook::verifier", "signature verification skipped");
            return Ok(Verified {
                key_id: headers.key_id.clone(),
                timestamp: None,
                skipped: true,
            });
        }

        let keys = self.keys.as_ref().ok_or_else(|| {
            VerificationError::Misconfigured("no key-set source configured".to_string())
        })?;

        let raw_signature = headers
            .signature
            .as_deref()
            .ok_or(VerificationError::MissingSignature)?;
        let key_id = headers
            .key_id
            .as_deref()
            .ok_or(VerificationError::MissingKeyId)?;

        let parsed = SignatureHeader::parse(raw_signature)?;

        let age_secs = now.abs_diff(parsed.timestamp);
        let tolerance_secs = self.config.tolerance.as_secs();
        if age_secs > tolerance_secs {
            return Err(VerificationError::TimestampExpired {
                age_secs,
                tolerance_secs,
            });
        }

        let key = keys.get(key_id).await?;
        let message = signed_message(parsed.timestamp, body);
        if !key.verify(&message, &parsed.signature) {
            return Err(VerificationError::InvalidSignature);
        }

        if let Some(nonces) = &self.nonces {
            let nonce = signature_nonce(raw_signature, key_id);
            let fresh = nonces
                .try_mark(&nonce, self.config.nonce_ttl)
                .await
                .map_err(|e| {
                    warn!(target: "orderhook::verifier", error = %e, "nonce store failed");
                    VerificationError::Misconfigured(format!("nonce store: {}", e))
                })?;
            if !fresh {
                return Err(VerificationError::SignatureReplayed);
            }
        }

        Ok(Verified {
            key_id: Some(key_id.to_string()),
            timestamp: Some(parsed.timestamp),
            skipped: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::KeySetCacheConfig;
    use crate::nonce::MemoryNonceStore;
    use crate::testing::{StaticKeySetFetcher, TestSigner};

    const NOW: i64 = 1_700_000_000;

    fn verifier(signer: &TestSigner) -> SignatureVerifier {
        let fetcher = Arc::new(StaticKeySetFetcher::new(TestSigner::jwk_set(&[signer])));
        let cache = Arc::new(KeySetCache::new(fetcher, KeySetCacheConfig::default()));
        SignatureVerifier::new(cache, VerifierConfig::default())
    }

    #[tokio::test]
    async fn test_valid_signature() {
        let signer = TestSigner::new("k1", 9);
        let body = br#"{"event_id":"evt_1"}"#;
        let headers = signer.headers_at(NOW, body);

        let verified = verifier(&signer).verify_at(NOW + 10, &headers, body).await.unwrap();
        assert_eq!(verified.key_id.as_deref(), Some("k1"));
        assert_eq!(verified.timestamp, Some(NOW));
        assert!(!verified.skipped);
    }

    #[tokio::test]
    async fn test_tampered_body() {
        let signer = TestSigner::new("k1", 9);
        let headers = signer.headers_at(NOW, b"{\"amount\":1}");
        let err = verifier(&signer)
            .verify_at(NOW, &headers, b"{\"amount\":9}")
            .await
            .unwrap_err();
        assert_eq!(err, VerificationError::InvalidSignature);
    }

    #[tokio::test]
    async fn test_wrong_key_id() {
        let signer = TestSigner::new("k1", 9);
        let body = b"{}";
        let mut headers = signer.headers_at(NOW, body);
        headers.key_id = Some("k2".into());

        let err = verifier(&signer).verify_at(NOW, &headers, body).await.unwrap_err();
        assert_eq!(err.code(), "key_not_found");
    }

    #[tokio::test]
    async fn test_signed_by_untrusted_key() {
        let trusted = TestSigner::new("k1", 9);
        let impostor = TestSigner::new("k1", 10);
        let body = b"{}";
        let headers = impostor.headers_at(NOW, body);

        let err = verifier(&trusted).verify_at(NOW, &headers, body).await.unwrap_err();
        assert_eq!(err, VerificationError::InvalidSignature);
    }

    #[tokio::test]
    async fn test_timestamp_outside_tolerance() {
        let signer = TestSigner::new("k1", 9);
        let body = b"{}";
        let verifier = verifier(&signer);

        let old = signer.headers_at(NOW - 301, body);
        let err = verifier.verify_at(NOW, &old, body).await.unwrap_err();
        assert_eq!(err.code(), "timestamp_expired");

        let future = signer.headers_at(NOW + 301, body);
        let err = verifier.verify_at(NOW, &future, body).await.unwrap_err();
        assert_eq!(err.code(), "timestamp_expired");

        let edge = signer.headers_at(NOW - 300, body);
        assert!(verifier.verify_at(NOW, &edge, body).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_headers() {
        let signer = TestSigner::new("k1", 9);
        let verifier = verifier(&signer);

        let err = verifier
            .verify_at(NOW, &SignatureHeaders::default(), b"{}")
            .await
            .unwrap_err();
        assert_eq!(err, VerificationError::MissingSignature);

        let no_kid = SignatureHeaders {
            signature: Some("t=1,v1=AA".into()),
            key_id: None,
        };
        let err = verifier.verify_at(NOW, &no_kid, b"{}").await.unwrap_err();
        assert_eq!(err, VerificationError::MissingKeyId);

        let garbage = SignatureHeaders::new("nonsense", "k1");
        let err = verifier.verify_at(NOW, &garbage, b"{}").await.unwrap_err();
        assert_eq!(err.code(), "malformed_signature");
    }

    #[tokio::test]
    async fn test_nonce_rejects_signature_reuse() {
        let signer = TestSigner::new("k1", 9);
        let verifier = verifier(&signer).with_nonce_store(Arc::new(MemoryNonceStore::new()));
        let body = b"{}";
        let headers = signer.headers_at(NOW, body);

        verifier.verify_at(NOW, &headers, body).await.unwrap();
        let err = verifier.verify_at(NOW, &headers, body).await.unwrap_err();
        assert_eq!(err, VerificationError::SignatureReplayed);
    }

    #[tokio::test]
    async fn test_invalid_signature_does_not_burn_nonce() {
        let signer = TestSigner::new("k1", 9);
        let nonces = Arc::new(MemoryNonceStore::new());
        let verifier = verifier(&signer).with_nonce_store(nonces.clone());
        let headers = signer.headers_at(NOW, b"{\"a\":1}");

        assert!(verifier.verify_at(NOW, &headers, b"{\"a\":2}").await.is_err());
        assert_eq!(nonces.len().await, 0);
    }

    #[tokio::test]
    async fn test_skip_verification() {
        let verifier = SignatureVerifier::without_keys(VerifierConfig {
            skip_verification: true,
            ..VerifierConfig::default()
        });
        let verified = verifier
            .verify_at(NOW, &SignatureHeaders::default(), b"anything")
            .await
            .unwrap();
        assert!(verified.skipped);
    }

    #[tokio::test]
    async fn test_no_key_source_is_misconfigured() {
        let verifier = SignatureVerifier::without_keys(VerifierConfig::default());
        let err = verifier
            .verify_at(NOW, &SignatureHeaders::new("t=1,v1=AA", "k1"), b"{}")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "verifier_misconfigured");
        assert!(err.is_internal());
    }

    #[test]
    fn test_headers_from_header_map() {
        let mut map = HeaderMap::new();
        map.insert("ucp-signature", "t=1,v1=AA".parse().unwrap());
        map.insert("ucp-key-id", " k1 ".parse().unwrap());

        let headers = SignatureHeaders::from_header_map(&map);
        assert_eq!(headers, SignatureHeaders::new("t=1,v1=AA", "k1"));
    }
}
