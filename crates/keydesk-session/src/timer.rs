use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::AbortHandle;

struct Pending {
    token: u64,
    handle: AbortHandle,
}

/// Cancellable delayed callbacks, at most one per handler id.
///
/// Each scheduled callback receives a token. When it fires it must
/// [`claim`](Self::claim) its slot with that token; a stale callback whose
/// slot was replaced or cancelled gets `false` and must do nothing.
#[derive(Default)]
pub struct GraceTimers {
    next_token: u64,
    pending: HashMap<String, Pending>,
}

impl GraceTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the future built by `fire` after `delay`, replacing any timer
    /// already armed for `handler_id`.
    pub fn schedule<F, Fut>(&mut self, handler_id: &str, delay: Duration, fire: F)
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.next_token += 1;
        let token = self.next_token;
        let callback = fire(token);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback.await;
        });
        let replaced = self.pending.insert(
            handler_id.to_string(),
            Pending {
                token,
                handle: task.abort_handle(),
            },
        );
        if let Some(old) = replaced {
            old.handle.abort();
        }
    }

    /// Claim the slot for `handler_id` on behalf of the timer holding `token`.
    pub fn claim(&mut self, handler_id: &str, token: u64) -> bool {
        match self.pending.get(handler_id) {
            Some(p) if p.token == token => {
                self.pending.remove(handler_id);
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self, handler_id: &str) {
        if let Some(p) = self.pending.remove(handler_id) {
            p.handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, p) in self.pending.drain() {
            p.handle.abort();
        }
    }

    pub fn is_armed(&self, handler_id: &str) -> bool {
        self.pending.contains_key(handler_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for GraceTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
