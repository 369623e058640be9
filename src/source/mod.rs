//! Upstream side of the proxy: the link to the radar sensor

pub mod error;
pub mod manager;
pub mod traits;

pub use error::{IdentityField, LinkFailure, Recovery, SubscriptionError, ValidationError};
pub use manager::{LinkManager, LinkState, ValidatedIdentity};
pub use traits::{BleError, SourceBle};
