//! Rental registry contract ABI.

use alloy::sol;

sol! {
    /// Registry contract that anchors confirmed rental agreements.
    interface IRentalRegistry {
        /// Emitted when an agreement is anchored on-chain.
        event AgreementConfirmed(
            bytes32 indexed agreementId,
            uint256 indexed propertyId,
            address tenant,
            address landlord,
            string metadataUri
        );

        function confirmAgreement(
            bytes32 agreementId,
            uint256 propertyId,
            address tenant,
            address landlord,
            string metadataUri
        ) external;

        function isConfirmed(bytes32 agreementId) external view returns (bool);
    }
}
