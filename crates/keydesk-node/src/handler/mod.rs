pub mod requests;
pub mod settings;
pub mod signers;

use keydesk::protocol::{Request, Response};
use keydesk_session::{SessionConfig, SignerSession};
use keydesk_store::{StateStore, actions};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared node state accessible by all client connections.
pub struct NodeState {
    pub session: SignerSession,
    /// Companion settings, persisted after every change.
    pub store: Mutex<StateStore>,
}

impl NodeState {
    pub fn new(config: SessionConfig, store: StateStore) -> Arc<Self> {
        Arc::new(Self {
            session: SignerSession::new(config),
            store: Mutex::new(store),
        })
    }
}

/// Handle a single request from a client.
pub async fn handle_request(state: &Arc<NodeState>, req: Request) -> Response {
    match req {
        // Signer selection
        Request::ListSigners => signers::handle_list_signers(state).await,
        Request::SelectSigner { id } => signers::handle_select_signer(state, &id).await,
        Request::ClearSigner => signers::handle_clear_signer(state).await,
        Request::SetAccountIndex { index } => {
            signers::handle_set_account_index(state, index).await
        }
        Request::SetPin { id, pin } => signers::handle_set_pin(state, &id, &pin).await,
        Request::VerifyAddress { display } => {
            signers::handle_verify_address(state, display).await
        }

        // Signing
        Request::GetAccounts => signers::handle_get_accounts(state).await,
        Request::GetCoinbase => signers::handle_get_coinbase(state).await,
        Request::SignPersonal { message, address } => {
            signers::handle_sign_personal(state, &message, &address).await
        }
        Request::SignTransaction { raw_tx } => {
            signers::handle_sign_transaction(state, &raw_tx).await
        }

        // Request queue
        Request::AddRequest { request } => requests::handle_add_request(state, request).await,
        Request::RemoveRequest { handler_id } => {
            requests::handle_remove_request(state, &handler_id).await
        }
        Request::DeclineRequest { handler_id } => {
            requests::handle_decline_request(state, &handler_id).await
        }
        Request::SetRequestPending { handler_id } => {
            requests::handle_set_request_pending(state, &handler_id).await
        }
        Request::SetRequestError {
            handler_id,
            message,
        } => requests::handle_set_request_error(state, &handler_id, &message).await,
        Request::SetRequestSuccess { handler_id } => {
            requests::handle_set_request_success(state, &handler_id).await
        }
        Request::ListRequests => requests::handle_list_requests(state).await,

        // Settings store
        Request::GetState { path } => settings::handle_get_state(state, path.as_deref()).await,
        Request::SyncPath { path, value } => {
            settings::handle_sync_path(state, &path, value).await
        }
        Request::SelectNetwork { network } => {
            settings::handle_action(state, |s| actions::select_network(s, &network)).await
        }
        Request::SelectSecondary { direction } => {
            settings::handle_action(state, |s| actions::select_secondary(s, direction)).await
        }
        Request::SetSecondaryCustom { target } => {
            settings::handle_action(state, |s| actions::set_secondary_custom(s, &target)).await
        }
        Request::ToggleConnection { node } => {
            settings::handle_action(state, |s| actions::toggle_connection(s, node)).await
        }
        Request::SetLocal { status } => {
            settings::handle_action(state, |s| actions::set_local(s, status)).await
        }
        Request::SetSecondary { status } => {
            settings::handle_action(state, |s| actions::set_secondary(s, status)).await
        }
        Request::SetLaunch { launch } => {
            settings::handle_action(state, |s| actions::set_launch(s, launch)).await
        }
        Request::ToggleLaunch => settings::handle_action(state, actions::toggle_launch).await,
        Request::ToggleReveal => settings::handle_action(state, actions::toggle_reveal).await,
        Request::GiveAccess { request, access } => {
            settings::handle_action(state, |s| actions::give_access(s, &request, access)).await
        }
        Request::ToggleAccess {
            account,
            handler_id,
        } => {
            settings::handle_action(state, |s| actions::toggle_access(s, &account, &handler_id))
                .await
        }
        Request::ClearPermissions { account } => {
            settings::handle_action(state, |s| actions::clear_permissions(s, &account)).await
        }

        Request::Shutdown => handle_shutdown(state).await,
    }
}

pub async fn handle_shutdown(state: &Arc<NodeState>) -> Response {
    state.session.shutdown().await;
    ok_response(None)
}

pub fn ok_response(data: Option<serde_json::Value>) -> Response {
    Response::Ok { data }
}

pub fn error_response(code: &str, message: &str) -> Response {
    Response::Error {
        code: code.to_string(),
        message: message.to_string(),
    }
}

/// `Ok` carrying `value` as its data.
pub fn json_response<T: Serialize>(value: T) -> Response {
    match serde_json::to_value(value) {
        Ok(data) => ok_response(Some(data)),
        Err(e) => error_response("internal", &format!("failed to encode response: {e}")),
    }
}

#[cfg(test)]
mod tests;
