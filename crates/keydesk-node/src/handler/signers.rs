use super::{NodeState, error_response, json_response, ok_response};
use keydesk::protocol::{Response, SignatureResult};
use keydesk_session::SessionError;
use std::sync::Arc;

fn session_error(e: SessionError) -> Response {
    error_response(e.code(), &e.to_string())
}

/// Hex (`0x..`) messages are signed as raw bytes, anything else as UTF-8 text.
fn parse_message_bytes(message: &str) -> Vec<u8> {
    if let Some(hex) = message.strip_prefix("0x") {
        hex::decode(hex).unwrap_or_else(|_| message.as_bytes().to_vec())
    } else {
        message.as_bytes().to_vec()
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

pub async fn handle_list_signers(state: &Arc<NodeState>) -> Response {
    json_response(state.session.list_signers().await)
}

pub async fn handle_select_signer(state: &Arc<NodeState>, id: &str) -> Response {
    match state.session.select_signer(id).await {
        Ok(summary) => json_response(summary),
        Err(e) => session_error(e),
    }
}

pub async fn handle_clear_signer(state: &Arc<NodeState>) -> Response {
    json_response(state.session.clear_signer().await)
}

pub async fn handle_set_account_index(state: &Arc<NodeState>, index: usize) -> Response {
    match state.session.set_account_index(index).await {
        Ok(()) => json_response(serde_json::json!({
            "index": index,
            "account": state.session.selected_account().await,
        })),
        Err(e) => session_error(e),
    }
}

pub async fn handle_set_pin(state: &Arc<NodeState>, id: &str, pin: &str) -> Response {
    match state.session.set_pin(id, pin).await {
        Ok(status) => json_response(status),
        Err(e) => session_error(e),
    }
}

pub async fn handle_verify_address(state: &Arc<NodeState>, display: bool) -> Response {
    match state.session.verify_address(display).await {
        Ok(()) => ok_response(None),
        Err(e) => session_error(e),
    }
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

pub async fn handle_get_accounts(state: &Arc<NodeState>) -> Response {
    match state.session.get_accounts().await {
        Ok(accounts) => json_response(accounts),
        Err(e) => session_error(e),
    }
}

pub async fn handle_get_coinbase(state: &Arc<NodeState>) -> Response {
    match state.session.get_coinbase().await {
        Ok(account) => json_response(account),
        Err(e) => session_error(e),
    }
}

pub async fn handle_sign_personal(state: &Arc<NodeState>, message: &str, address: &str) -> Response {
    let bytes = parse_message_bytes(message);
    match state.session.sign_personal(&bytes, address).await {
        Ok(signature) => json_response(SignatureResult { signature }),
        Err(e) => {
            tracing::warn!(address, err = %e, "sign_personal failed");
            session_error(e)
        }
    }
}

pub async fn handle_sign_transaction(state: &Arc<NodeState>, raw_tx: &str) -> Response {
    match state.session.sign_transaction(raw_tx).await {
        Ok(signature) => json_response(SignatureResult { signature }),
        Err(e) => {
            tracing::warn!(err = %e, "sign_transaction failed");
            session_error(e)
        }
    }
}
