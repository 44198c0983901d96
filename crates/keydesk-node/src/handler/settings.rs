use super::{NodeState, error_response, ok_response};
use keydesk::protocol::{Event, MAIN_ACTION_CHANNEL, Response};
use keydesk_store::StateStore;
use std::sync::Arc;

fn announce(state: &Arc<NodeState>, store: &StateStore, path: &str) {
    if let Err(e) = store.save() {
        tracing::warn!(err = %e, "failed to persist settings");
    }
    tracing::debug!(path, "settings changed");
    state.session.broker().broadcast(
        MAIN_ACTION_CHANNEL,
        Event::StateChanged {
            path: path.to_string(),
        },
    );
}

pub async fn handle_get_state(state: &Arc<NodeState>, path: Option<&str>) -> Response {
    let store = state.store.lock().await;
    let value = match path {
        Some(path) => store.get(path).cloned(),
        None => Some(store.snapshot().clone()),
    };
    ok_response(value)
}

pub async fn handle_sync_path(
    state: &Arc<NodeState>,
    path: &str,
    value: serde_json::Value,
) -> Response {
    let mut store = state.store.lock().await;
    match store.sync_path(path, value) {
        Ok(()) => {
            announce(state, &store, path);
            ok_response(None)
        }
        Err(e) => error_response("read_only", &e.to_string()),
    }
}

/// Apply one of the named settings actions and announce the path it changed.
pub async fn handle_action<F>(state: &Arc<NodeState>, action: F) -> Response
where
    F: FnOnce(&mut StateStore) -> &'static str,
{
    let mut store = state.store.lock().await;
    let path = action(&mut *store);
    announce(state, &store, path);
    ok_response(None)
}
