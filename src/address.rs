//! Recipient address validation.

use bech32::{FromBase32, Variant};

/// Payload length of a bech32 account address, in bytes.
const ACCOUNT_ADDRESS_LEN: usize = 20;

/// Check `candidate` against the chain's canonical account-address encoding:
/// bech32 (not bech32m) with the expected human-readable prefix and a 20-byte
/// payload.
///
/// Returns false for any malformed input; never panics.
pub fn validate(candidate: &str, expected_prefix: &str) -> bool {
    if candidate.is_empty() {
        return false;
    }
    // Canonical account addresses are lowercase. The bech32 checksum also
    // decodes all-uppercase strings, which the chain itself rejects.
    if candidate.chars().any(|c| c.is_ascii_uppercase()) {
        return false;
    }
    match bech32::decode(candidate) {
        Ok((hrp, data, Variant::Bech32)) => {
            hrp == expected_prefix
                && Vec::<u8>::from_base32(&data)
                    .map(|bytes| bytes.len() == ACCOUNT_ADDRESS_LEN)
                    .unwrap_or(false)
        }
        _ => false,
    }
}
