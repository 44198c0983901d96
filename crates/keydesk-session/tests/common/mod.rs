#![allow(dead_code)]

use async_trait::async_trait;
use keydesk::protocol::{Broadcast, Event, SignerKind, SignerSummary};
use keydesk_session::{SessionConfig, SignerSession};
use keydesk_signer::{PinEntry, SignerBackend, SignerError, UpdateOptions};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub const ACCOUNT_A: &str = "0xAA00000000000000000000000000000000000001";
pub const ACCOUNT_B: &str = "0xBB00000000000000000000000000000000000002";

#[derive(Default)]
pub struct FakePin {
    pub pins: Mutex<Vec<String>>,
}

impl PinEntry for FakePin {
    fn set_pin(&self, pin: &str) -> Result<(), SignerError> {
        self.pins.lock().unwrap().push(pin.to_string());
        Ok(())
    }
}

/// Scriptable in-memory backend that records how it was used.
pub struct FakeSigner {
    id: String,
    kind: SignerKind,
    status: Mutex<String>,
    accounts: Vec<String>,
    index: AtomicUsize,
    reject_select: AtomicBool,
    sign_error: Mutex<Option<SignerError>>,
    pin: Option<FakePin>,
    /// Routed signing/account calls.
    pub calls: AtomicUsize,
    pub updates: Mutex<Vec<UpdateOptions>>,
}

impl FakeSigner {
    pub fn new(id: &str, accounts: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            kind: SignerKind::Ledger,
            status: Mutex::new("ok".to_string()),
            accounts: accounts.iter().map(|a| a.to_string()).collect(),
            index: AtomicUsize::new(0),
            reject_select: AtomicBool::new(false),
            sign_error: Mutex::new(None),
            pin: None,
            calls: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn with_status(self, status: &str) -> Self {
        *self.status.lock().unwrap() = status.to_string();
        self
    }

    pub fn with_pin(mut self) -> Self {
        self.kind = SignerKind::Trezor;
        self.pin = Some(FakePin::default());
        self
    }

    pub fn rejecting_selection(self) -> Self {
        self.reject_select.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_with(self, err: SignerError) -> Self {
        *self.sign_error.lock().unwrap() = Some(err);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn pins(&self) -> Vec<String> {
        self.pin
            .as_ref()
            .map(|p| p.pins.lock().unwrap().clone())
            .unwrap_or_default()
    }

    fn routed<T>(&self, ok: T) -> Result<T, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.sign_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(ok),
        }
    }
}

#[async_trait]
impl SignerBackend for FakeSigner {
    fn summary(&self) -> SignerSummary {
        SignerSummary {
            id: self.id.clone(),
            kind: Some(self.kind),
            status: self.status.lock().unwrap().clone(),
            accounts: self.accounts.clone(),
            index: self.index.load(Ordering::SeqCst),
        }
    }

    async fn get_accounts(&self) -> Result<Vec<String>, SignerError> {
        self.routed(self.accounts.clone())
    }

    async fn get_coinbase(&self) -> Result<String, SignerError> {
        let index = self.index.load(Ordering::SeqCst);
        self.routed(self.accounts[index].clone())
    }

    async fn sign_personal(&self, message: &[u8]) -> Result<String, SignerError> {
        self.routed(format!("sig:{}", String::from_utf8_lossy(message)))
    }

    async fn sign_transaction(&self, raw_tx: &str) -> Result<String, SignerError> {
        self.routed(format!("tx:{raw_tx}"))
    }

    async fn set_index(&self, index: usize) -> Result<(), SignerError> {
        if self.reject_select.load(Ordering::SeqCst) {
            return Err(SignerError::from_device_message("device locked"));
        }
        if index >= self.accounts.len() {
            return Err(SignerError::invalid_index(index, self.accounts.len()));
        }
        self.index.store(index, Ordering::SeqCst);
        Ok(())
    }

    fn update(&self, options: UpdateOptions) {
        self.updates.lock().unwrap().push(options);
    }

    fn pin_entry(&self) -> Option<&dyn PinEntry> {
        self.pin.as_ref().map(|p| p as &dyn PinEntry)
    }
}

pub fn session() -> SignerSession {
    SignerSession::new(SessionConfig::default())
}

/// A session with backend `A` registered (accounts A, B) but not selected.
pub async fn session_with_a() -> (SignerSession, Arc<FakeSigner>) {
    let session = session();
    let a = Arc::new(FakeSigner::new("A", &[ACCOUNT_A, ACCOUNT_B]));
    session.register_signer(a.clone()).await;
    (session, a)
}

/// A session with backend `A` registered and selected.
pub async fn session_with_a_selected() -> (SignerSession, Arc<FakeSigner>) {
    let (session, a) = session_with_a().await;
    session.select_signer("A").await.expect("select A");
    (session, a)
}

/// Everything broadcast so far, without waiting.
pub fn drain(rx: &mut broadcast::Receiver<Broadcast>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(b) = rx.try_recv() {
        events.push(b.event);
    }
    events
}
