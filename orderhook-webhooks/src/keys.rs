//! Key-set model
//!
//! Remote keys arrive as a JWK set. Only `kty=EC`, `crv=P-256` entries with
//! 32-byte `x`/`y` coordinates are usable; everything else is skipped.

use crate::signature::decode_base64url;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::{EncodedPoint, FieldBytes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A JSON Web Key as published by the key-set endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

/// `{"keys": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// A trusted P-256 verification key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    pub kid: String,
    key: VerifyingKey,
}

impl SigningKey {
    pub fn new(kid: impl Into<String>, key: VerifyingKey) -> Self {
        Self {
            kid: kid.into(),
            key,
        }
    }

    /// Build from a JWK, or explain why it is unusable
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, String> {
        if jwk.kty != "EC" {
            return Err(format!("unsupported kty {}", jwk.kty));
        }
        if jwk.crv.as_deref() != Some("P-256") {
            return Err("unsupported curve".to_string());
        }
        let kid = jwk.kid.clone().ok_or("missing kid")?;

        let x = coordinate(jwk.x.as_deref(), "x")?;
        let y = coordinate(jwk.y.as_deref(), "y")?;

        let point = EncodedPoint::from_affine_coordinates(
            &FieldBytes::from(x),
            &FieldBytes::from(y),
            false,
        );
        let key = VerifyingKey::from_encoded_point(&point)
            .map_err(|_| "point is not on the curve".to_string())?;

        Ok(Self { kid, key })
    }

    /// Check a DER signature over `message` (SHA-256 digest)
    pub fn verify(&self, message: &[u8], der_signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_der(der_signature) else {
            return false;
        };
        self.key.verify(message, &signature).is_ok()
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }
}

fn coordinate(value: Option<&str>, name: &str) -> Result<[u8; 32], String> {
    let value = value.ok_or_else(|| format!("missing {}", name))?;
    let bytes = decode_base64url(value).map_err(|_| format!("{} is not base64url", name))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| format!("{} must be 32 bytes", name))
}

/// Usable keys indexed by key ID
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, SigningKey>,
}

impl KeySet {
    /// Keep every usable entry of `jwks`
    pub fn from_jwks(jwks: &JwkSet) -> Self {
        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            match SigningKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(key.kid.clone(), key);
                }
                Err(reason) => {
                    debug!(
                        target: "orderhook::keys",
                        kid = jwk.kid.as_deref().unwrap_or("-"),
                        reason = %reason,
                        "skipping unusable key"
                    );
                }
            }
        }
        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
