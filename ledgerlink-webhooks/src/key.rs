//! Verification keys published by the provider.

use crate::codec::{self, COMPONENT_LEN, StructuredKey};
use crate::token::BASE64_URL;
use crate::{Result, WebhookError};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only curve webhook keys are issued on.
pub const P256_CURVE: &str = "P-256";

/// JSON Web Key as returned by the provider's key endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    pub kid: String,
    pub x: String,
    pub y: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_at: Option<i64>,
}

/// An immutable P-256 verification key.
#[derive(Clone, PartialEq, Eq)]
pub struct VerificationKey {
    key_id: String,
    x: [u8; COMPONENT_LEN],
    y: [u8; COMPONENT_LEN],
}

impl VerificationKey {
    /// Create a key from fixed-width coordinates.
    pub fn new(
        key_id: impl Into<String>,
        x: [u8; COMPONENT_LEN],
        y: [u8; COMPONENT_LEN],
    ) -> Self {
        Self {
            key_id: key_id.into(),
            x,
            y,
        }
    }

    /// Create a key from coordinate slices, which must be 32 bytes each.
    pub fn from_coordinates(key_id: impl Into<String>, x: &[u8], y: &[u8]) -> Result<Self> {
        let x = x.try_into().map_err(|_| {
            WebhookError::InvalidKey(format!("x coordinate is {} bytes, expected 32", x.len()))
        })?;
        let y = y.try_into().map_err(|_| {
            WebhookError::InvalidKey(format!("y coordinate is {} bytes, expected 32", y.len()))
        })?;
        Ok(Self::new(key_id, x, y))
    }

    /// Convert a provider JWK.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self> {
        if jwk.kty != "EC" {
            return Err(WebhookError::InvalidKey(format!(
                "unsupported key type: {}",
                jwk.kty
            )));
        }
        if jwk.crv != P256_CURVE {
            return Err(WebhookError::InvalidKey(format!(
                "unsupported curve: {}",
                jwk.crv
            )));
        }

        let x = BASE64_URL
            .decode(&jwk.x)
            .map_err(|e| WebhookError::InvalidKey(format!("x coordinate: {e}")))?;
        let y = BASE64_URL
            .decode(&jwk.y)
            .map_err(|e| WebhookError::InvalidKey(format!("y coordinate: {e}")))?;

        Self::from_coordinates(jwk.kid.clone(), &x, &y)
    }

    /// Key identifier (`kid`).
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Curve name.
    pub fn curve(&self) -> &'static str {
        P256_CURVE
    }

    /// Affine x coordinate.
    pub fn x(&self) -> &[u8; COMPONENT_LEN] {
        &self.x
    }

    /// Affine y coordinate.
    pub fn y(&self) -> &[u8; COMPONENT_LEN] {
        &self.y
    }

    /// DER public key for the codec.
    pub fn structured(&self) -> StructuredKey {
        codec::build_public_key(&self.x, &self.y)
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("key_id", &self.key_id)
            .field("curve", &P256_CURVE)
            .field("x", &hex::encode(self.x))
            .field("y", &hex::encode(self.y))
            .finish()
    }
}
