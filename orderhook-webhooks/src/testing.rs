//! Test doubles: an ES256 signer and an in-process key-set fetcher.

use crate::WebhookError;
use crate::cache::KeySetFetcher;
use crate::keys::{Jwk, JwkSet};
use crate::signature::{SignatureHeader, signed_message};
use crate::verifier::SignatureHeaders;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey as EcSigningKey};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Deterministic P-256 signer. `seed` must be non-zero.
pub struct TestSigner {
    kid: String,
    key: EcSigningKey,
}

impl TestSigner {
    pub fn new(kid: impl Into<String>, seed: u8) -> Self {
        let key = EcSigningKey::from_slice(&[seed; 32]).expect("seed is a valid scalar");
        Self {
            kid: kid.into(),
            key,
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Public half as a JWK
    pub fn jwk(&self) -> Jwk {
        let point = self.key.verifying_key().to_encoded_point(false);
        let x = point.x().expect("uncompressed point has x");
        let y = point.y().expect("uncompressed point has y");
        Jwk {
            kty: "EC".to_string(),
            crv: Some("P-256".to_string()),
            x: Some(URL_SAFE_NO_PAD.encode(x)),
            y: Some(URL_SAFE_NO_PAD.encode(y)),
            kid: Some(self.kid.clone()),
            key_use: Some("sig".to_string()),
            alg: Some("ES256".to_string()),
        }
    }

    pub fn jwk_set(signers: &[&TestSigner]) -> JwkSet {
        JwkSet {
            keys: signers.iter().map(|s| s.jwk()).collect(),
        }
    }

    /// DER signature over `message`
    pub fn sign_der(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.key.sign(message);
        signature.to_der().as_bytes().to_vec()
    }

    /// `UCP-Signature` value for `body` signed at `timestamp`
    pub fn header_at(&self, timestamp: i64, body: &[u8]) -> String {
        SignatureHeader::format(timestamp, &self.sign_der(&signed_message(timestamp, body)))
    }

    pub fn headers_at(&self, timestamp: i64, body: &[u8]) -> SignatureHeaders {
        SignatureHeaders::new(self.header_at(timestamp, body), self.kid.clone())
    }

    /// Headers signed now
    pub fn headers(&self, body: &[u8]) -> SignatureHeaders {
        self.headers_at(chrono::Utc::now().timestamp(), body)
    }
}

/// Serves a fixed JWK set and counts fetches
pub struct StaticKeySetFetcher {
    keys: Mutex<JwkSet>,
    fetches: AtomicUsize,
    failing: AtomicBool,
}

impl StaticKeySetFetcher {
    pub fn new(keys: JwkSet) -> Self {
        Self {
            keys: Mutex::new(keys),
            fetches: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Rotate the served keys
    pub fn set_keys(&self, keys: JwkSet) {
        *self.keys.lock().expect("key lock poisoned") = keys;
    }

    /// Answer every fetch with a 503
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetFetcher for StaticKeySetFetcher {
    async fn fetch(&self) -> Result<JwkSet, WebhookError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(WebhookError::KeySetStatus(503));
        }
        Ok(self.keys.lock().expect("key lock poisoned").clone())
    }
}
