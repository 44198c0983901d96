use super::{NodeState, json_response, ok_response};
use keydesk::protocol::{Response, SignRequest};
use keydesk_signer::SignerError;
use std::sync::Arc;

// Lifecycle operations never fail: unknown handlers or a missing current
// signer are silently ignored by the session.

pub async fn handle_add_request(state: &Arc<NodeState>, request: SignRequest) -> Response {
    state.session.add_request(request).await;
    ok_response(None)
}

pub async fn handle_remove_request(state: &Arc<NodeState>, handler_id: &str) -> Response {
    state.session.remove_request(handler_id).await;
    ok_response(None)
}

pub async fn handle_decline_request(state: &Arc<NodeState>, handler_id: &str) -> Response {
    state.session.decline_request(handler_id).await;
    ok_response(None)
}

pub async fn handle_set_request_pending(state: &Arc<NodeState>, handler_id: &str) -> Response {
    state.session.set_request_pending(handler_id).await;
    ok_response(None)
}

/// `message` is the raw failure text reported by the signing driver.
pub async fn handle_set_request_error(
    state: &Arc<NodeState>,
    handler_id: &str,
    message: &str,
) -> Response {
    let err = SignerError::from_device_message(message);
    state.session.set_request_error(handler_id, &err).await;
    ok_response(None)
}

pub async fn handle_set_request_success(state: &Arc<NodeState>, handler_id: &str) -> Response {
    state.session.set_request_success(handler_id).await;
    ok_response(None)
}

pub async fn handle_list_requests(state: &Arc<NodeState>) -> Response {
    json_response(state.session.current_requests().await)
}
