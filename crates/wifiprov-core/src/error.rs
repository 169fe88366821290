//! Caller-facing error type for a provisioning attempt.

use thiserror::Error;

use crate::payload::PatchError;
use crate::state::ProvisionState;
use crate::transport::TransportError;

/// Why a provisioning attempt failed.
///
/// Every variant is terminal for the attempt. The transport is closed before
/// the error is returned.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("Could not open transport: {0}")]
    TransportOpen(#[source] TransportError),

    #[error("Write to device failed: {0}")]
    TransportWrite(#[source] TransportError),

    #[error("Read from device failed: {0}")]
    TransportRead(#[source] TransportError),

    #[error("Device config is not valid JSON: {0}")]
    MalformedConfig(#[source] serde_json::Error),

    #[error("Device config has an unexpected shape: {0}")]
    Schema(String),

    #[error("No complete config dump after {waited_ms}ms")]
    ProtocolTimeout { waited_ms: u64 },

    #[error("Invalid state transition {from} -> {to}")]
    InvalidTransition {
        from: ProvisionState,
        to: ProvisionState,
    },
}

impl ProvisioningError {
    /// Reconnecting the device may help.
    pub fn is_transport_problem(&self) -> bool {
        matches!(
            self,
            ProvisioningError::TransportOpen(_)
                | ProvisioningError::TransportWrite(_)
                | ProvisioningError::TransportRead(_)
                | ProvisioningError::ProtocolTimeout { .. }
        )
    }

    /// The device's stored config needs manual recovery.
    pub fn is_device_state_problem(&self) -> bool {
        matches!(
            self,
            ProvisioningError::MalformedConfig(_) | ProvisioningError::Schema(_)
        )
    }
}

impl From<PatchError> for ProvisioningError {
    fn from(err: PatchError) -> Self {
        match err {
            PatchError::Malformed(e) => ProvisioningError::MalformedConfig(e),
            schema @ PatchError::Schema { .. } => ProvisioningError::Schema(schema.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_error_mapping() {
        let malformed = crate::payload::patch("{", "n", "c").unwrap_err();
        let err = ProvisioningError::from(malformed);
        assert!(matches!(err, ProvisioningError::MalformedConfig(_)));
        assert!(err.is_device_state_problem());
        assert!(!err.is_transport_problem());

        let schema = crate::payload::patch(r#"{"wifis":1}"#, "n", "c").unwrap_err();
        let err = ProvisioningError::from(schema);
        assert!(matches!(err, ProvisioningError::Schema(_)));
        assert!(err.to_string().contains("wifis"));
    }

    #[test]
    fn test_transport_classification() {
        let err = ProvisioningError::TransportWrite(TransportError::Disconnected);
        assert!(err.is_transport_problem());
        assert!(!err.is_device_state_problem());
    }
}
