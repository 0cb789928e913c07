//! Fuzz target for DER signature building.
//!
//! Every raw signature must produce a well-formed, minimal
//! `SEQUENCE { INTEGER r, INTEGER s }`, and verification must not panic.

#![no_main]

use arbitrary::Arbitrary;
use ledgerlink_webhooks::codec::{build_public_key, build_signature, verify};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    raw: [u8; 64],
    x: [u8; 32],
    y: [u8; 32],
    message: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let signature = build_signature(&input.raw);
    let der = signature.as_der();

    assert_eq!(der[0], 0x30);
    assert_eq!(der[1] as usize, der.len() - 2);

    let mut offset = 2;
    for _ in 0..2 {
        assert_eq!(der[offset], 0x02);
        let len = der[offset + 1] as usize;
        let int = &der[offset + 2..offset + 2 + len];
        assert!(len >= 1 && len <= 33);
        assert_eq!(int[0] & 0x80, 0);
        if len > 1 {
            assert!(int[0] != 0 || int[1] & 0x80 != 0);
        }
        offset += 2 + len;
    }
    assert_eq!(offset, der.len());

    let key = build_public_key(&input.x, &input.y);
    assert_eq!(key.as_der().len(), 91);
    let _ = verify(&key, &signature, &input.message);
});
