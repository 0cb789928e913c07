//! Compact JWS parsing for webhook verification tokens.

use crate::codec::RAW_SIGNATURE_LEN;
use crate::{Result, WebhookError};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// The only accepted signing algorithm.
pub const ES256: &str = "ES256";

/// base64url; encodes without padding, decodes with or without.
pub(crate) const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded JOSE header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Claims carried by a verified webhook token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookClaims {
    /// Hex SHA-256 of the webhook body the provider sent.
    pub request_body_sha256: String,
    /// Issue time, unix seconds. Fractional values are truncated.
    #[serde(
        default,
        deserialize_with = "deserialize_iat",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,
    /// Any other claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A parsed, not yet verified, compact token.
#[derive(Debug, Clone)]
pub struct SignedWebhookToken<'a> {
    header: TokenHeader,
    key_id: String,
    header_b64: &'a str,
    payload_b64: &'a str,
    signature: [u8; RAW_SIGNATURE_LEN],
}

impl<'a> SignedWebhookToken<'a> {
    /// Parse `header.payload.signature`.
    ///
    /// The algorithm is checked before anything else about the header, so a
    /// missing, null or non-ES256 `alg` is always `UnsupportedAlgorithm` and
    /// never reaches key resolution.
    pub fn parse(token: &'a str) -> Result<Self> {
        let parts: Vec<&str> = token.trim().split('.').collect();
        let [header_b64, payload_b64, signature_b64] = parts[..] else {
            return Err(WebhookError::MalformedToken(format!(
                "expected 3 segments, got {}",
                parts.len()
            )));
        };

        // `alg` is checked before any other field is typed.
        let fields: Map<String, Value> = serde_json::from_slice(&BASE64_URL.decode(header_b64)?)?;
        match fields.get("alg") {
            Some(Value::String(alg)) if alg == ES256 => {}
            Some(Value::String(alg)) => {
                return Err(WebhookError::UnsupportedAlgorithm(alg.clone()));
            }
            Some(other) => return Err(WebhookError::UnsupportedAlgorithm(other.to_string())),
            None => return Err(WebhookError::UnsupportedAlgorithm("none".to_string())),
        }

        let key_id = match fields.get("kid").and_then(Value::as_str) {
            Some(kid) if !kid.is_empty() => kid.to_string(),
            _ => {
                return Err(WebhookError::MalformedToken(
                    "header has no key id".to_string(),
                ));
            }
        };
        let header = TokenHeader {
            alg: ES256.to_string(),
            kid: Some(key_id.clone()),
            typ: fields.get("typ").and_then(Value::as_str).map(str::to_string),
        };

        let raw_signature = BASE64_URL.decode(signature_b64)?;
        let signature = raw_signature
            .as_slice()
            .try_into()
            .map_err(|_| WebhookError::InvalidSignature)?;

        Ok(Self {
            header,
            key_id,
            header_b64,
            payload_b64,
            signature,
        })
    }

    /// Decoded header.
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// Key identifier from the header.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Raw `r || s` signature.
    pub fn signature(&self) -> &[u8; RAW_SIGNATURE_LEN] {
        &self.signature
    }

    /// The exact bytes that were signed: the two encoded segments joined by `.`.
    pub fn signing_input(&self) -> String {
        let mut input = String::with_capacity(self.header_b64.len() + 1 + self.payload_b64.len());
        input.push_str(self.header_b64);
        input.push('.');
        input.push_str(self.payload_b64);
        input
    }

    /// Decode the payload claims. Only meaningful after the signature verified.
    pub fn claims(&self) -> Result<WebhookClaims> {
        Ok(serde_json::from_slice(&BASE64_URL.decode(self.payload_b64)?)?)
    }
}

fn deserialize_iat<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(number
        .as_i64()
        .or_else(|| number.as_f64().map(|secs| secs.trunc() as i64)))
}
