//! Arguments of the on-chain confirmation call.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use serde::Serialize;

use crate::ledger::contract::IRentalRegistry;
use crate::ledger::types::{LedgerError, LedgerResult};

/// Immutable arguments for `confirmAgreement`.
///
/// Fields are validated once at construction; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationPayload {
    agreement_id: B256,
    property_id: U256,
    tenant: Address,
    landlord: Address,
    metadata_uri: String,
}

impl ConfirmationPayload {
    pub fn new(
        agreement_id: B256,
        property_id: U256,
        tenant: Address,
        landlord: Address,
        metadata_uri: impl Into<String>,
    ) -> LedgerResult<Self> {
        let metadata_uri = metadata_uri.into();
        if metadata_uri.trim().is_empty() {
            return Err(LedgerError::Argument("metadata URI is empty".to_string()));
        }
        if tenant == Address::ZERO || landlord == Address::ZERO {
            return Err(LedgerError::Argument(
                "participant wallet is the zero address".to_string(),
            ));
        }
        if tenant == landlord {
            return Err(LedgerError::Argument(format!(
                "tenant and landlord share wallet {}",
                tenant
            )));
        }

        Ok(Self {
            agreement_id,
            property_id,
            tenant,
            landlord,
            metadata_uri,
        })
    }

    /// Build a payload from wallet address strings as stored by the application.
    pub fn from_parts(
        agreement_id: B256,
        property_id: U256,
        tenant: &str,
        landlord: &str,
        metadata_uri: &str,
    ) -> LedgerResult<Self> {
        let tenant = parse_address("tenant", tenant)?;
        let landlord = parse_address("landlord", landlord)?;
        Self::new(agreement_id, property_id, tenant, landlord, metadata_uri)
    }

    pub fn agreement_id(&self) -> B256 {
        self.agreement_id
    }

    pub fn property_id(&self) -> U256 {
        self.property_id
    }

    pub fn tenant(&self) -> Address {
        self.tenant
    }

    pub fn landlord(&self) -> Address {
        self.landlord
    }

    pub fn metadata_uri(&self) -> &str {
        &self.metadata_uri
    }

    /// ABI-encoded `confirmAgreement` call data.
    pub fn calldata(&self) -> Bytes {
        IRentalRegistry::confirmAgreementCall {
            agreementId: self.agreement_id,
            propertyId: self.property_id,
            tenant: self.tenant,
            landlord: self.landlord,
            metadataUri: self.metadata_uri.clone(),
        }
        .abi_encode()
        .into()
    }
}

fn parse_address(field: &str, value: &str) -> LedgerResult<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| LedgerError::Argument(format!("{} wallet '{}' is not an address: {}", field, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENANT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
    const LANDLORD: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";

    fn payload() -> ConfirmationPayload {
        ConfirmationPayload::from_parts(
            B256::repeat_byte(0x11),
            U256::from(42u64),
            TENANT,
            LANDLORD,
            "urn:rental-metadata:abc",
        )
        .unwrap()
    }

    #[test]
    fn test_calldata_selector() {
        let data = payload().calldata();
        assert_eq!(&data[..4], IRentalRegistry::confirmAgreementCall::SELECTOR.as_slice());
    }

    #[test]
    fn test_calldata_decodes_back() {
        let payload = payload();
        let decoded = IRentalRegistry::confirmAgreementCall::abi_decode(&payload.calldata()).unwrap();
        assert_eq!(decoded.agreementId, payload.agreement_id());
        assert_eq!(decoded.propertyId, U256::from(42u64));
        assert_eq!(decoded.tenant, payload.tenant());
        assert_eq!(decoded.metadataUri, "urn:rental-metadata:abc");
    }

    #[test]
    fn test_malformed_address_is_argument_error() {
        let err = ConfirmationPayload::from_parts(B256::ZERO, U256::ZERO, "0xnot-hex", LANDLORD, "uri")
            .unwrap_err();
        assert!(matches!(err, LedgerError::Argument(_)));
        assert!(err.to_string().contains("tenant"));
    }

    #[test]
    fn test_rejects_same_wallet_and_empty_uri() {
        let err = ConfirmationPayload::from_parts(B256::ZERO, U256::ZERO, TENANT, TENANT, "uri")
            .unwrap_err();
        assert!(matches!(err, LedgerError::Argument(_)));

        let err = ConfirmationPayload::from_parts(B256::ZERO, U256::ZERO, TENANT, LANDLORD, "  ")
            .unwrap_err();
        assert!(matches!(err, LedgerError::Argument(_)));
    }
}
