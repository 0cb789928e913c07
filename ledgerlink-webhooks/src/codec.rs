//! Byte-level ES256 codec.
//!
//! Converts raw P-256 coordinates into a DER `SubjectPublicKeyInfo` and a raw
//! `r || s` JWS signature into a DER `ECDSA-Sig-Value`, then hands both to the
//! ECDSA primitive. Nothing here depends on the rest of the crate.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;

/// Length of one P-256 coordinate or signature component.
pub const COMPONENT_LEN: usize = 32;

/// Length of a raw JWS ES256 signature (`r || s`).
pub const RAW_SIGNATURE_LEN: usize = 2 * COMPONENT_LEN;

/// DER prefix of a `SubjectPublicKeyInfo` for an id-ecPublicKey on prime256v1,
/// up to and including the BIT STRING's unused-bits byte.
pub const SPKI_P256_HEADER: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08, 0x2a,
    0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

const UNCOMPRESSED_POINT: u8 = 0x04;
const DER_SEQUENCE: u8 = 0x30;
const DER_INTEGER: u8 = 0x02;

/// A P-256 public key in DER `SubjectPublicKeyInfo` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredKey {
    der: Vec<u8>,
}

impl StructuredKey {
    /// DER bytes.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// PEM armour (`PUBLIC KEY`), 64-column lines.
    pub fn to_pem(&self) -> String {
        let encoded = STANDARD.encode(&self.der);
        let mut pem = String::from("-----BEGIN PUBLIC KEY-----\n");
        for line in encoded.as_bytes().chunks(64) {
            // base64 output is ASCII
            pem.push_str(&String::from_utf8_lossy(line));
            pem.push('\n');
        }
        pem.push_str("-----END PUBLIC KEY-----\n");
        pem
    }
}

/// An ECDSA signature in DER `SEQUENCE { r INTEGER, s INTEGER }` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredSignature {
    der: Vec<u8>,
}

impl StructuredSignature {
    /// DER bytes.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
}

/// Build a DER public key from raw affine coordinates.
pub fn build_public_key(x: &[u8; COMPONENT_LEN], y: &[u8; COMPONENT_LEN]) -> StructuredKey {
    let mut der = Vec::with_capacity(SPKI_P256_HEADER.len() + 1 + RAW_SIGNATURE_LEN);
    der.extend_from_slice(&SPKI_P256_HEADER);
    der.push(UNCOMPRESSED_POINT);
    der.extend_from_slice(x);
    der.extend_from_slice(y);
    StructuredKey { der }
}

/// Build a DER signature from a raw `r || s` signature.
pub fn build_signature(raw: &[u8; RAW_SIGNATURE_LEN]) -> StructuredSignature {
    let (r, s) = raw.split_at(COMPONENT_LEN);

    let mut body = Vec::with_capacity(2 * (2 + COMPONENT_LEN + 1));
    encode_integer(&mut body, r);
    encode_integer(&mut body, s);

    // At most 70 content bytes, so the short length form always applies.
    let mut der = Vec::with_capacity(2 + body.len());
    der.push(DER_SEQUENCE);
    der.push(body.len() as u8);
    der.extend_from_slice(&body);
    StructuredSignature { der }
}

/// Append an unsigned big-endian value as a minimal DER INTEGER.
fn encode_integer(out: &mut Vec<u8>, unsigned: &[u8]) {
    let digits = match unsigned.iter().position(|&b| b != 0) {
        Some(start) => &unsigned[start..],
        None => &[0u8][..],
    };
    let needs_pad = digits[0] & 0x80 != 0;

    out.push(DER_INTEGER);
    out.push((digits.len() + usize::from(needs_pad)) as u8);
    if needs_pad {
        out.push(0x00);
    }
    out.extend_from_slice(digits);
}

/// Verify an ECDSA P-256 / SHA-256 signature over `message`.
///
/// Structures the primitive cannot parse (point not on the curve, zero
/// scalars) verify as `false`.
pub fn verify(key: &StructuredKey, signature: &StructuredSignature, message: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_public_key_der(key.as_der()) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(signature.as_der()) else {
        return false;
    };
    verifying_key.verify(message, &signature).is_ok()
}
