use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use keydesk::protocol::{
    Broadcast, Event, MAIN_ACTION_CHANNEL, PinStatus, RequestStatus, SignRequest, SignerSummary,
    SignerView,
};
use keydesk_signer::{SignerBackend, SignerError, UpdateOptions};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::broker::EventBroker;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::queue::{NOTICE_DECLINED, NOTICE_PENDING, NOTICE_SUCCESS, RequestQueue, notice_for};
use crate::registry::SignerRegistry;
use crate::timer::GraceTimers;

/// How long a cleared signer keeps its request queue.
pub const CLEAR_DEFER: Duration = Duration::from_millis(10);

/// Everything guarded by the session lock.
#[derive(Default)]
struct SessionState {
    current: Option<String>,
    registry: SignerRegistry,
    queues: HashMap<String, RequestQueue>,
    timers: GraceTimers,
}

impl SessionState {
    fn current_backend(&self) -> Option<(String, Arc<dyn SignerBackend>)> {
        let id = self.current.as_ref()?;
        let backend = self.registry.get(id)?;
        Some((id.clone(), backend))
    }
}

struct Inner {
    state: Mutex<SessionState>,
    broker: EventBroker,
    config: SessionConfig,
}

/// Routes signing work to the single current signer and tracks the sign
/// requests queued against it.
///
/// Cheap to clone; all clones share one session. The state lock is never held
/// across a call into a backend, and every broadcast is sent while the lock is
/// held so observers see transitions in the order they were applied.
#[derive(Clone)]
pub struct SignerSession {
    inner: Arc<Inner>,
}

impl SignerSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::default()),
                broker: EventBroker::new(config.event_capacity),
                config,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.inner.broker.subscribe()
    }

    /// The broker session events go out on, for callers publishing their
    /// own notifications alongside them.
    pub fn broker(&self) -> &EventBroker {
        &self.inner.broker
    }

    fn broadcast(&self, event: Event) {
        self.inner.broker.broadcast(MAIN_ACTION_CHANNEL, event);
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Add (or replace) a backend discovered by a driver.
    pub async fn register_signer(&self, backend: Arc<dyn SignerBackend>) {
        let id = backend.id();
        let mut state = self.inner.state.lock().await;
        if state.registry.insert(backend).is_some() {
            debug!(signer_id = %id, "signer replaced");
        } else {
            info!(signer_id = %id, "signer registered");
        }
        self.broadcast(Event::SignersChanged);
    }

    /// Remove a backend that went away. If it was current, the current
    /// signer is cleared as well.
    pub async fn unregister_signer(&self, id: &str) -> Option<Arc<dyn SignerBackend>> {
        let (removed, was_current) = {
            let mut state = self.inner.state.lock().await;
            let removed = state.registry.remove(id)?;
            if let Some(queue) = state.queues.remove(id) {
                for req in queue.snapshot() {
                    state.timers.cancel(&req.handler_id);
                }
            }
            info!(signer_id = %id, "signer unregistered");
            self.broadcast(Event::SignersChanged);
            (removed, state.current.as_deref() == Some(id))
        };
        if was_current {
            self.clear_signer().await;
        }
        Some(removed)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Summaries of every ready signer.
    pub async fn list_signers(&self) -> BTreeMap<String, SignerSummary> {
        self.inner.state.lock().await.registry.summaries()
    }

    pub async fn current_signer(&self) -> Option<String> {
        self.inner.state.lock().await.current.clone()
    }

    /// Re-validate the signer's selected account and make it current.
    pub async fn select_signer(&self, id: &str) -> Result<SignerSummary, SessionError> {
        let backend = self
            .inner
            .state
            .lock()
            .await
            .registry
            .get(id)
            .ok_or_else(|| SessionError::SignerNotFound(id.to_string()))?;

        backend.set_index(backend.index()).await.map_err(|e| {
            warn!(signer_id = %id, err = %e, "signer rejected selection");
            SessionError::Backend(e)
        })?;

        let mut state = self.inner.state.lock().await;
        // The backend may have been unplugged while we were waiting on it.
        if !state.registry.contains(id) {
            return Err(SessionError::SignerNotFound(id.to_string()));
        }
        state.current = Some(id.to_string());
        let summary = backend.summary();
        info!(signer_id = %id, "signer selected");
        self.broadcast(Event::SetSigner {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    /// Unset the current signer. Its request queue is cleared after a yield
    /// plus [`CLEAR_DEFER`], so reactions to `unset_signer` still see it on
    /// any runtime flavor.
    pub async fn clear_signer(&self) -> SignerSummary {
        let summary = SignerSummary::empty();
        let previous = {
            let mut state = self.inner.state.lock().await;
            let previous = state.current.take();
            self.broadcast(Event::UnsetSigner {
                summary: summary.clone(),
            });
            previous
        };

        if let Some(previous) = previous {
            info!(signer_id = %previous, "signer cleared");
            let session = self.clone();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                tokio::time::sleep(CLEAR_DEFER).await;
                session.clear_requests(&previous).await;
            });
        }
        summary
    }

    async fn clear_requests(&self, signer_id: &str) {
        let mut state = self.inner.state.lock().await;
        let cleared = match state.queues.get_mut(signer_id) {
            Some(queue) => queue.clear(),
            None => Vec::new(),
        };
        for req in &cleared {
            state.timers.cancel(&req.handler_id);
        }
        if let Some(backend) = state.registry.get(signer_id) {
            backend.update(UpdateOptions::default());
        }
        debug!(signer_id, cleared = cleared.len(), "signer requests cleared");
        self.broadcast(Event::SignerUpdated {
            id: signer_id.to_string(),
            requests: Vec::new(),
        });
    }

    // -----------------------------------------------------------------------
    // Routed operations
    // -----------------------------------------------------------------------

    async fn active(&self) -> Result<Arc<dyn SignerBackend>, SessionError> {
        self.inner
            .state
            .lock()
            .await
            .current_backend()
            .map(|(_, backend)| backend)
            .ok_or(SessionError::NoActiveSigner)
    }

    pub async fn selected_accounts(&self) -> Vec<String> {
        match self.active().await {
            Ok(backend) => backend.selected_accounts(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn selected_account(&self) -> Option<String> {
        self.active().await.ok()?.selected_account()
    }

    pub async fn get_accounts(&self) -> Result<Vec<String>, SessionError> {
        Ok(self.active().await?.get_accounts().await?)
    }

    pub async fn get_coinbase(&self) -> Result<String, SessionError> {
        Ok(self.active().await?.get_coinbase().await?)
    }

    /// Sign `message` with the current signer, provided `address` is its
    /// selected account.
    pub async fn sign_personal(&self, message: &[u8], address: &str) -> Result<String, SessionError> {
        let backend = self.active().await?;
        match backend.selected_account() {
            Some(expected) if expected.eq_ignore_ascii_case(address) => {}
            expected => {
                return Err(SessionError::AccountMismatch {
                    expected: expected.unwrap_or_default(),
                    got: address.to_string(),
                });
            }
        }
        Ok(backend.sign_personal(message).await?)
    }

    pub async fn sign_transaction(&self, raw_tx: &str) -> Result<String, SessionError> {
        Ok(self.active().await?.sign_transaction(raw_tx).await?)
    }

    pub async fn set_account_index(&self, index: usize) -> Result<(), SessionError> {
        Ok(self.active().await?.set_index(index).await?)
    }

    /// Ask the current signer to verify its address on-device. Does nothing
    /// when there is no current signer or it cannot verify addresses.
    pub async fn verify_address(&self, display: bool) -> Result<(), SessionError> {
        let Ok(backend) = self.active().await else {
            debug!("verify_address without a current signer");
            return Ok(());
        };
        match backend.address_verifier() {
            Some(verifier) => Ok(verifier.verify_address(display).await?),
            None => Ok(()),
        }
    }

    /// Enter a PIN on the signer `id`, which need not be current.
    pub async fn set_pin(&self, id: &str, pin: &str) -> Result<PinStatus, SessionError> {
        let backend = self
            .inner
            .state
            .lock()
            .await
            .registry
            .get(id)
            .ok_or_else(|| SessionError::SignerNotFound(id.to_string()))?;
        let pin_entry = backend
            .pin_entry()
            .ok_or_else(|| SessionError::PinUnsupported(id.to_string()))?;
        pin_entry.set_pin(pin)?;
        Ok(PinStatus::ok())
    }

    // -----------------------------------------------------------------------
    // Request lifecycle
    // -----------------------------------------------------------------------

    /// Queue a sign request on the current signer. Ignored when there is no
    /// current signer or the handler id is already queued.
    pub async fn add_request(&self, req: SignRequest) {
        info!(handler_id = %req.handler_id, "add_request");
        let mut state = self.inner.state.lock().await;
        let Some((id, backend)) = state.current_backend() else {
            debug!(handler_id = %req.handler_id, "no current signer, request dropped");
            return;
        };
        let queue = state.queues.entry(id.clone()).or_default();
        if !queue.insert(req) {
            return;
        }
        let requests = queue.snapshot();

        backend.update(UpdateOptions::with_view(SignerView::Default));
        self.broadcast(Event::ShowTray);
        self.broadcast(Event::SetSignerView {
            view: SignerView::Default,
        });
        self.broadcast(Event::SignerUpdated { id, requests });
    }

    pub async fn remove_request(&self, handler_id: &str) {
        let mut state = self.inner.state.lock().await;
        state.timers.cancel(handler_id);
        self.remove_locked(&mut state, handler_id);
    }

    fn remove_locked(&self, state: &mut SessionState, handler_id: &str) {
        let Some((id, backend)) = state.current_backend() else {
            return;
        };
        let Some(queue) = state.queues.get_mut(&id) else {
            return;
        };
        if queue.remove(handler_id).is_none() {
            return;
        }
        debug!(signer_id = %id, handler_id, "request removed");
        let requests = queue.snapshot();
        backend.update(UpdateOptions::default());
        self.broadcast(Event::SignerUpdated { id, requests });
    }

    /// Apply a status change to a request on the current signer and notify.
    /// Returns false when there is no current signer or no such request.
    fn transition_locked(
        &self,
        state: &mut SessionState,
        handler_id: &str,
        status: RequestStatus,
        notice: String,
    ) -> bool {
        let Some((id, backend)) = state.current_backend() else {
            return false;
        };
        let Some(queue) = state.queues.get_mut(&id) else {
            return false;
        };
        if !queue.transition(handler_id, status, notice) {
            debug!(signer_id = %id, handler_id, ?status, "request not queued");
            return false;
        }
        let requests = queue.snapshot();
        backend.update(UpdateOptions::default());
        self.broadcast(Event::SignerUpdated { id, requests });
        true
    }

    fn schedule_removal(&self, state: &mut SessionState, handler_id: &str, delay: Duration) {
        let session = self.clone();
        let handler = handler_id.to_string();
        state.timers.schedule(handler_id, delay, move |token| async move {
            session.expire_request(&handler, token).await;
        });
    }

    async fn expire_request(&self, handler_id: &str, token: u64) {
        let mut state = self.inner.state.lock().await;
        if state.timers.claim(handler_id, token) {
            self.remove_locked(&mut state, handler_id);
        }
    }

    /// The user declined the request. It is purged after the short grace
    /// period.
    pub async fn decline_request(&self, handler_id: &str) {
        let mut state = self.inner.state.lock().await;
        if state.current.is_none() {
            return;
        }
        self.transition_locked(
            &mut state,
            handler_id,
            RequestStatus::Declined,
            NOTICE_DECLINED.to_string(),
        );
        self.schedule_removal(&mut state, handler_id, self.inner.config.short_grace());
    }

    /// The signer is working on the request (e.g. waiting for the user to
    /// confirm on the device).
    pub async fn set_request_pending(&self, handler_id: &str) {
        info!(handler_id, "set_request_pending");
        let mut state = self.inner.state.lock().await;
        self.transition_locked(
            &mut state,
            handler_id,
            RequestStatus::Pending,
            NOTICE_PENDING.to_string(),
        );
    }

    /// Signing failed. The request is purged after the long grace period.
    pub async fn set_request_error(&self, handler_id: &str, err: &SignerError) {
        info!(handler_id, err = %err, "set_request_error");
        let mut state = self.inner.state.lock().await;
        if self.transition_locked(&mut state, handler_id, RequestStatus::Error, notice_for(err)) {
            self.schedule_removal(&mut state, handler_id, self.inner.config.error_grace());
        }
    }

    /// Signing succeeded. The request is purged after the short grace period.
    pub async fn set_request_success(&self, handler_id: &str) {
        info!(handler_id, "set_request_success");
        let mut state = self.inner.state.lock().await;
        if self.transition_locked(
            &mut state,
            handler_id,
            RequestStatus::Success,
            NOTICE_SUCCESS.to_string(),
        ) {
            self.schedule_removal(&mut state, handler_id, self.inner.config.short_grace());
        }
    }

    /// Snapshot of the requests queued on `signer_id`.
    pub async fn requests(&self, signer_id: &str) -> Vec<SignRequest> {
        self.inner
            .state
            .lock()
            .await
            .queues
            .get(signer_id)
            .map(RequestQueue::snapshot)
            .unwrap_or_default()
    }

    pub async fn request(&self, signer_id: &str, handler_id: &str) -> Option<SignRequest> {
        self.inner
            .state
            .lock()
            .await
            .queues
            .get(signer_id)?
            .get(handler_id)
            .cloned()
    }

    /// Snapshot of the requests queued on the current signer.
    pub async fn current_requests(&self) -> Vec<SignRequest> {
        let state = self.inner.state.lock().await;
        state
            .current
            .as_ref()
            .and_then(|id| state.queues.get(id))
            .map(RequestQueue::snapshot)
            .unwrap_or_default()
    }

    /// Cancel every pending grace timer.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        debug!(timers = state.timers.len(), "session shutting down");
        state.timers.cancel_all();
    }
}
