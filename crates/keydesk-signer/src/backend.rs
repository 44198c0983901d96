use async_trait::async_trait;
use keydesk::protocol::{SignerSummary, SignerView};

use crate::error::SignerError;

/// Options passed to [`SignerBackend::update`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Ask observers of the signer to switch to this view.
    pub set_view: Option<SignerView>,
}

impl UpdateOptions {
    pub fn with_view(view: SignerView) -> Self {
        Self {
            set_view: Some(view),
        }
    }
}

/// The capability set every signing backend (hardware driver or software
/// keystore) exposes to the session layer.
///
/// Each async method resolves exactly once. Backends are shared as
/// `Arc<dyn SignerBackend>` so every method takes `&self`.
#[async_trait]
pub trait SignerBackend: Send + Sync {
    fn summary(&self) -> SignerSummary;

    fn id(&self) -> String {
        self.summary().id
    }

    /// Currently selected account index.
    fn index(&self) -> usize {
        self.summary().index
    }

    async fn get_accounts(&self) -> Result<Vec<String>, SignerError>;

    async fn get_coinbase(&self) -> Result<String, SignerError>;

    /// EIP-191 sign `message` with the selected account. Returns `0x`-hex.
    async fn sign_personal(&self, message: &[u8]) -> Result<String, SignerError>;

    /// Sign an unsigned transaction payload (`0x`-hex). Returns `0x`-hex.
    async fn sign_transaction(&self, raw_tx: &str) -> Result<String, SignerError>;

    /// Select (or re-apply) the account at `index`.
    async fn set_index(&self, index: usize) -> Result<(), SignerError>;

    /// Notify the backend's own observers that something about it changed.
    fn update(&self, options: UpdateOptions);

    /// Accounts currently selected on this backend, primary first.
    fn selected_accounts(&self) -> Vec<String> {
        let summary = self.summary();
        summary
            .accounts
            .get(summary.index)
            .cloned()
            .into_iter()
            .collect()
    }

    fn selected_account(&self) -> Option<String> {
        self.selected_accounts().into_iter().next()
    }

    fn address_verifier(&self) -> Option<&dyn AddressVerifier> {
        None
    }

    fn pin_entry(&self) -> Option<&dyn PinEntry> {
        None
    }
}

/// Optional capability: show or verify the selected address on the device.
#[async_trait]
pub trait AddressVerifier: Send + Sync {
    async fn verify_address(&self, display: bool) -> Result<(), SignerError>;
}

/// Optional capability: accept a PIN typed into the host UI.
pub trait PinEntry: Send + Sync {
    fn set_pin(&self, pin: &str) -> Result<(), SignerError>;
}
