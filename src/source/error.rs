//! Failure taxonomy for the upstream link
//!
//! Every failure the link manager can hit maps to one recovery action.
//! Decode rejections never show up here: the relay drops those locally.

use super::traits::BleError;
use crate::config::BleUuid;

/// Identity characteristic a validation step was looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Manufacturer,
    Model,
}

/// Why the connected device was not accepted as the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Device information service absent
    ServiceMissing,
    CharacteristicMissing(IdentityField),
    ReadFailed(IdentityField, BleError),
    NotUtf8(IdentityField),
    /// Value present but not the expected string
    Mismatch(IdentityField),
}

/// Why a data characteristic could not be set up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionError {
    ServiceMissing(BleUuid),
    CharacteristicMissing(BleUuid),
    Subscribe(BleUuid, BleError),
    /// Writing the radar activation command failed
    Activation(BleError),
}

/// A failure that ends the current link attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFailure {
    /// No matching advertisement within the scan window
    Discovery,
    Connect(BleError),
    Validation(ValidationError),
    Subscription(SubscriptionError),
    /// Link dropped while relaying, with the I/O error that revealed it
    LinkLost(Option<BleError>),
}

/// What the link manager does after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Start over from scanning
    Rescan,
    /// Retry the connection to the device already found
    Reconnect,
}

impl LinkFailure {
    pub const fn recovery(&self) -> Recovery {
        match self {
            LinkFailure::Discovery => Recovery::Rescan,
            LinkFailure::Connect(_) => Recovery::Reconnect,
            LinkFailure::Validation(_) => Recovery::Rescan,
            LinkFailure::Subscription(_) => Recovery::Rescan,
            LinkFailure::LinkLost(_) => Recovery::Rescan,
        }
    }

    /// Whether the full disconnect-and-clear sequence runs
    pub const fn needs_teardown(&self) -> bool {
        match self {
            LinkFailure::Discovery | LinkFailure::Connect(_) => false,
            LinkFailure::Validation(_)
            | LinkFailure::Subscription(_)
            | LinkFailure::LinkLost(_) => true,
        }
    }
}

impl From<ValidationError> for LinkFailure {
    fn from(e: ValidationError) -> Self {
        LinkFailure::Validation(e)
    }
}

impl From<SubscriptionError> for LinkFailure {
    fn from(e: SubscriptionError) -> Self {
        LinkFailure::Subscription(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_table() {
        assert_eq!(LinkFailure::Discovery.recovery(), Recovery::Rescan);
        assert_eq!(
            LinkFailure::Connect(BleError::ConnectFailed).recovery(),
            Recovery::Reconnect
        );
        assert_eq!(
            LinkFailure::Validation(ValidationError::Mismatch(IdentityField::Model)).recovery(),
            Recovery::Rescan
        );
        assert_eq!(
            LinkFailure::Subscription(SubscriptionError::Activation(BleError::WriteFailed))
                .recovery(),
            Recovery::Rescan
        );
        assert_eq!(LinkFailure::LinkLost(None).recovery(), Recovery::Rescan);
    }

    #[test]
    fn test_validation_and_link_loss_share_teardown() {
        let validation = LinkFailure::Validation(ValidationError::ServiceMissing);
        let lost = LinkFailure::LinkLost(Some(BleError::Disconnected));

        assert!(validation.needs_teardown());
        assert!(lost.needs_teardown());
        assert_eq!(validation.recovery(), lost.recovery());

        assert!(!LinkFailure::Discovery.needs_teardown());
        assert!(!LinkFailure::Connect(BleError::ConnectFailed).needs_teardown());
    }

    #[test]
    fn test_from_conversions() {
        let f: LinkFailure = ValidationError::NotUtf8(IdentityField::Manufacturer).into();
        assert!(matches!(f, LinkFailure::Validation(_)));

        let f: LinkFailure = SubscriptionError::ServiceMissing(BleUuid::Short(0x180F)).into();
        assert!(matches!(f, LinkFailure::Subscription(_)));
    }
}
