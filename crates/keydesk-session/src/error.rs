use keydesk_signer::SignerError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no signer selected")]
    NoActiveSigner,

    #[error("wrong account selected: expected {expected}, got {got}")]
    AccountMismatch { expected: String, got: String },

    #[error("signer not found: {0}")]
    SignerNotFound(String),

    #[error("signer {0} does not support PIN entry")]
    PinUnsupported(String),

    #[error(transparent)]
    Backend(#[from] SignerError),
}

impl SessionError {
    /// Stable wire code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NoActiveSigner => "no_active_signer",
            SessionError::AccountMismatch { .. } => "account_mismatch",
            SessionError::SignerNotFound(_) => "signer_not_found",
            SessionError::PinUnsupported(_) => "pin_unsupported",
            SessionError::Backend(_) => "signer_error",
        }
    }
}
