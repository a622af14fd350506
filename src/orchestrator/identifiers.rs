//! Deterministic ledger identifiers for off-chain records.
//!
//! Both derivations are one-way: the ledger never sees the application id.

use alloy::primitives::{keccak256, B256, U256};

/// `keccak256(agreement_id)` as the registry's `bytes32` key.
pub fn derive_agreement_id(agreement_id: &str) -> B256 {
    keccak256(agreement_id.as_bytes())
}

/// `keccak256(property_id)` read as a big-endian `uint256`.
pub fn derive_property_id(property_id: &str) -> U256 {
    U256::from_be_bytes(keccak256(property_id.as_bytes()).0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agreement_id_is_deterministic() {
        let a = derive_agreement_id("6650f1c2e4b0a1d2c3e4f5a6");
        let b = derive_agreement_id("6650f1c2e4b0a1d2c3e4f5a6");
        assert_eq!(a, b);
        assert_ne!(a, derive_agreement_id("6650f1c2e4b0a1d2c3e4f5a7"));
    }

    #[test]
    fn test_known_digest() {
        // keccak256("") is a fixed constant.
        assert_eq!(
            derive_agreement_id("").to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_property_id_matches_agreement_digest_bytes() {
        let id = "property-42";
        let as_int = derive_property_id(id);
        assert_eq!(as_int, derive_property_id(id));
        assert_eq!(B256::from(as_int.to_be_bytes::<32>()), derive_agreement_id(id));
    }
}
