use alloy::primitives::keccak256;
use alloy::signers::{SignerSync, local::PrivateKeySigner};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k256::SecretKey;
use keydesk::protocol::{SignerKind, SignerSummary};
use rand::rngs::OsRng;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::backend::{SignerBackend, UpdateOptions};
use crate::error::SignerError;

const HOT_KEY_FILE: &str = "hot.key";

/// Status a hot signer reports once its keys are loaded.
pub const HOT_STATUS_OK: &str = "ok";

/// Software signer backed by secp256k1 keys held in memory.
pub struct HotSigner {
    id: String,
    keys: Vec<PrivateKeySigner>,
    accounts: Vec<String>,
    index: AtomicUsize,
    revision: AtomicU64,
}

impl HotSigner {
    /// Create a hot signer from raw secret key bytes, one account per key.
    pub fn new(id: impl Into<String>, secret_keys: &[[u8; 32]]) -> Result<Self> {
        if secret_keys.is_empty() {
            anyhow::bail!("hot signer needs at least one key");
        }
        let keys = secret_keys
            .iter()
            .map(|bytes| {
                PrivateKeySigner::from_slice(bytes)
                    .context("failed to create signer from secret key")
            })
            .collect::<Result<Vec<_>>>()?;
        let accounts = keys.iter().map(|k| format!("{:#x}", k.address())).collect();

        Ok(Self {
            id: id.into(),
            keys,
            accounts,
            index: AtomicUsize::new(0),
            revision: AtomicU64::new(0),
        })
    }

    /// Load the keys in `state_dir/hot.key`, generating one if missing.
    pub fn load_or_create(id: impl Into<String>, state_dir: &Path) -> Result<Self> {
        let keys = if has_hot_key(state_dir) {
            load_hot_keys(state_dir)?
        } else {
            vec![generate_hot_key(state_dir)?]
        };
        Self::new(id, &keys)
    }

    /// How many times observers have been notified via `update`.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    fn selected_key(&self) -> &PrivateKeySigner {
        let index = self.index.load(Ordering::SeqCst);
        &self.keys[index.min(self.keys.len() - 1)]
    }
}

#[async_trait]
impl SignerBackend for HotSigner {
    fn summary(&self) -> SignerSummary {
        SignerSummary {
            id: self.id.clone(),
            kind: Some(SignerKind::Hot),
            status: HOT_STATUS_OK.to_string(),
            accounts: self.accounts.clone(),
            index: self.index.load(Ordering::SeqCst),
        }
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn index(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    async fn get_accounts(&self) -> Result<Vec<String>, SignerError> {
        Ok(self.accounts.clone())
    }

    async fn get_coinbase(&self) -> Result<String, SignerError> {
        Ok(format!("{:#x}", self.selected_key().address()))
    }

    async fn sign_personal(&self, message: &[u8]) -> Result<String, SignerError> {
        let sig = self
            .selected_key()
            .sign_message_sync(message)
            .map_err(|e| SignerError::other(format!("signPersonal failed: {e}")))?;
        Ok(format!("0x{}", hex::encode(sig.as_bytes())))
    }

    async fn sign_transaction(&self, raw_tx: &str) -> Result<String, SignerError> {
        let payload = hex::decode(raw_tx.trim_start_matches("0x"))
            .map_err(|e| SignerError::other(format!("invalid transaction payload: {e}")))?;
        let hash = keccak256(&payload);
        let sig = self
            .selected_key()
            .sign_hash_sync(&hash)
            .map_err(|e| SignerError::other(format!("signTransaction failed: {e}")))?;
        Ok(format!("0x{}", hex::encode(sig.as_bytes())))
    }

    async fn set_index(&self, index: usize) -> Result<(), SignerError> {
        if index >= self.accounts.len() {
            return Err(SignerError::invalid_index(index, self.accounts.len()));
        }
        self.index.store(index, Ordering::SeqCst);
        Ok(())
    }

    fn update(&self, options: UpdateOptions) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(signer_id = %self.id, revision, view = ?options.set_view, "hot signer updated");
    }
}

/// Generate a new hot key, append it to state_dir/hot.key and return it.
pub fn generate_hot_key(state_dir: &Path) -> Result<[u8; 32]> {
    let secret = SecretKey::random(&mut OsRng);
    let key_bytes: [u8; 32] = secret.to_bytes().into();

    let path = state_dir.join(HOT_KEY_FILE);
    let mut contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&hex::encode(key_bytes));
    contents.push('\n');

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(key_bytes)
}

/// Load every key in state_dir/hot.key (one hex key per line).
pub fn load_hot_keys(state_dir: &Path) -> Result<Vec<[u8; 32]>> {
    let path = state_dir.join(HOT_KEY_FILE);
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut keys = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let bytes = hex::decode(line)
            .with_context(|| format!("invalid hex in hot.key line {}", lineno + 1))?;
        if bytes.len() != 32 {
            anyhow::bail!(
                "hot.key line {} has invalid length: expected 32 bytes, got {}",
                lineno + 1,
                bytes.len()
            );
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        keys.push(key);
    }
    if keys.is_empty() {
        anyhow::bail!("{} contains no keys", path.display());
    }
    Ok(keys)
}

/// Check whether a hot key file exists.
pub fn has_hot_key(state_dir: &Path) -> bool {
    state_dir.join(HOT_KEY_FILE).exists()
}
