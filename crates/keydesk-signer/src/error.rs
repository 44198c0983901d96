use thiserror::Error;

/// Firmware message a Ledger returns when contract data is disabled in the
/// Ethereum app settings.
pub const LEDGER_CONTRACT_DATA_DISABLED: &str = "Ledger device: Invalid data received (0x6a80)";

/// Firmware message a Ledger returns when the user rejects on the device.
pub const LEDGER_DENIED_BY_USER: &str =
    "Ledger device: Condition of use not satisfied (denied by the user?) (0x6985)";

/// Classification of a signer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerErrorKind {
    /// The device refused to sign contract data.
    ContractDataDisabled,
    /// The user rejected the operation on the device.
    DeviceDeclined,
    /// The requested account index does not exist.
    InvalidIndex,
    /// Transport or firmware failure.
    Device,
    Other,
}

/// Failure surfaced by a signing backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SignerError {
    pub kind: SignerErrorKind,
    pub message: String,
}

impl SignerError {
    pub fn new(kind: SignerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(SignerErrorKind::Other, message)
    }

    pub fn invalid_index(index: usize, available: usize) -> Self {
        Self::new(
            SignerErrorKind::InvalidIndex,
            format!("account index {index} out of range ({available} accounts)"),
        )
    }

    /// Build an error from a raw device/driver message, recognising the
    /// vendor strings we have friendly notices for.
    ///
    /// Only device adapters should call this; everything above them matches on
    /// [`SignerErrorKind`].
    pub fn from_device_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = match message.as_str() {
            LEDGER_CONTRACT_DATA_DISABLED => SignerErrorKind::ContractDataDisabled,
            LEDGER_DENIED_BY_USER => SignerErrorKind::DeviceDeclined,
            _ => SignerErrorKind::Device,
        };
        Self { kind, message }
    }
}
