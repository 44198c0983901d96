use super::*;
use keydesk::protocol::{
    AccessRequest, Direction, Event, MAIN_ACTION_CHANNEL, Request, RequestStatus, Response,
    SignRequest,
};
use keydesk_signer::HotSigner;
use keydesk_signer::error::LEDGER_DENIED_BY_USER;
use std::sync::Arc;

/// Create a test NodeState backed by a temp state dir, with no signers.
fn make_test_state() -> (Arc<NodeState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::load(dir.path()).unwrap();
    let state = NodeState::new(SessionConfig::default(), store);
    (state, dir)
}

/// Same, with a two-account hot signer registered (not selected).
async fn make_test_state_with_hot() -> (Arc<NodeState>, tempfile::TempDir, Vec<String>) {
    let (state, dir) = make_test_state();
    let hot = HotSigner::new("hot", &[[7u8; 32], [9u8; 32]]).unwrap();
    let accounts = keydesk_signer::SignerBackend::summary(&hot).accounts;
    state.session.register_signer(Arc::new(hot)).await;
    (state, dir, accounts)
}

fn assert_ok(resp: &Response) -> Option<serde_json::Value> {
    match resp {
        Response::Ok { data } => data.clone(),
        other => panic!("expected Response::Ok, got: {other:?}"),
    }
}

fn assert_error(resp: &Response, expected_code: &str) -> String {
    match resp {
        Response::Error { code, message } => {
            assert_eq!(
                code, expected_code,
                "unexpected error code, message: {message}"
            );
            message.clone()
        }
        other => panic!("expected Response::Error({expected_code}), got: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Signers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_signers_shows_registered_hot_signer() {
    let (state, _dir) = make_test_state();
    let data = assert_ok(&handle_request(&state, Request::ListSigners).await).unwrap();
    assert_eq!(data, serde_json::json!({}));

    let (state, _dir, accounts) = make_test_state_with_hot().await;
    let data = assert_ok(&handle_request(&state, Request::ListSigners).await).unwrap();
    assert_eq!(data["hot"]["type"], "hot");
    assert_eq!(data["hot"]["accounts"][0], accounts[0].as_str());
}

#[tokio::test]
async fn routed_requests_without_selection_fail() {
    let (state, _dir, accounts) = make_test_state_with_hot().await;

    for req in [
        Request::GetAccounts,
        Request::GetCoinbase,
        Request::SignTransaction {
            raw_tx: "0x01".to_string(),
        },
        Request::SignPersonal {
            message: "hi".to_string(),
            address: accounts[0].clone(),
        },
        Request::SetAccountIndex { index: 1 },
    ] {
        let resp = handle_request(&state, req).await;
        assert_error(&resp, "no_active_signer");
    }
}

#[tokio::test]
async fn select_and_sign_with_hot_signer() {
    let (state, _dir, accounts) = make_test_state_with_hot().await;

    let summary = assert_ok(
        &handle_request(
            &state,
            Request::SelectSigner {
                id: "hot".to_string(),
            },
        )
        .await,
    )
    .unwrap();
    assert_eq!(summary["id"], "hot");

    let coinbase = assert_ok(&handle_request(&state, Request::GetCoinbase).await).unwrap();
    assert_eq!(coinbase, accounts[0].as_str());

    let sig = assert_ok(
        &handle_request(
            &state,
            Request::SignPersonal {
                message: "hello".to_string(),
                address: accounts[0].to_uppercase().replacen("0X", "0x", 1),
            },
        )
        .await,
    )
    .unwrap();
    let signature = sig["signature"].as_str().unwrap();
    assert!(signature.starts_with("0x"));
    assert_eq!(signature.len(), 2 + 65 * 2);

    let resp = handle_request(
        &state,
        Request::SignPersonal {
            message: "hello".to_string(),
            address: accounts[1].clone(),
        },
    )
    .await;
    assert_error(&resp, "account_mismatch");

    let data = assert_ok(&handle_request(&state, Request::SetAccountIndex { index: 1 }).await)
        .unwrap();
    assert_eq!(data["account"], accounts[1].as_str());

    let resp = handle_request(&state, Request::SetAccountIndex { index: 5 }).await;
    assert_error(&resp, "signer_error");
}

#[tokio::test]
async fn select_unknown_signer_and_pin_errors() {
    let (state, _dir, _) = make_test_state_with_hot().await;

    let resp = handle_request(
        &state,
        Request::SelectSigner {
            id: "ledger-1".to_string(),
        },
    )
    .await;
    assert_error(&resp, "signer_not_found");

    let resp = handle_request(
        &state,
        Request::SetPin {
            id: "hot".to_string(),
            pin: "1234".to_string(),
        },
    )
    .await;
    assert_error(&resp, "pin_unsupported");

    // Hot signers have nothing to show on-device.
    let resp = handle_request(&state, Request::VerifyAddress { display: true }).await;
    assert!(assert_ok(&resp).is_none());
}

#[tokio::test]
async fn clear_signer_returns_placeholder() {
    let (state, _dir, _) = make_test_state_with_hot().await;
    state.session.select_signer("hot").await.unwrap();

    let data = assert_ok(&handle_request(&state, Request::ClearSigner).await).unwrap();
    assert_eq!(data["id"], "");
    assert!(data["type"].is_null());
    assert_eq!(data["index"], 0);
    assert!(state.session.current_signer().await.is_none());
}

// ---------------------------------------------------------------------------
// Request queue
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn request_lifecycle_over_the_handler() {
    let (state, _dir, _) = make_test_state_with_hot().await;
    state.session.select_signer("hot").await.unwrap();

    let mut request = SignRequest::new("h1");
    request.origin = Some("https://dapp.example".to_string());
    assert_ok(&handle_request(&state, Request::AddRequest { request }).await);

    let data = assert_ok(&handle_request(&state, Request::ListRequests).await).unwrap();
    assert_eq!(data[0]["handler_id"], "h1");
    assert_eq!(data[0]["status"], "pending");

    assert_ok(
        &handle_request(
            &state,
            Request::SetRequestError {
                handler_id: "h1".to_string(),
                message: LEDGER_DENIED_BY_USER.to_string(),
            },
        )
        .await,
    );
    let h1 = state.session.request("hot", "h1").await.unwrap();
    assert_eq!(h1.status, RequestStatus::Error);
    assert_eq!(h1.notice.as_deref(), Some("Ledger Signature Declined"));

    tokio::time::sleep(std::time::Duration::from_millis(3_400)).await;
    let data = assert_ok(&handle_request(&state, Request::ListRequests).await).unwrap();
    assert_eq!(data, serde_json::json!([]));
}

#[tokio::test]
async fn lifecycle_requests_for_unknown_handlers_succeed() {
    let (state, _dir) = make_test_state();
    for req in [
        Request::DeclineRequest {
            handler_id: "ghost".to_string(),
        },
        Request::SetRequestPending {
            handler_id: "ghost".to_string(),
        },
        Request::SetRequestSuccess {
            handler_id: "ghost".to_string(),
        },
        Request::RemoveRequest {
            handler_id: "ghost".to_string(),
        },
    ] {
        assert!(assert_ok(&handle_request(&state, req).await).is_none());
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_path_rejects_main_and_announces_changes() {
    let (state, _dir) = make_test_state();
    let mut rx = state.session.subscribe();

    let resp = handle_request(
        &state,
        Request::SyncPath {
            path: "main.launch".to_string(),
            value: serde_json::json!(true),
        },
    )
    .await;
    assert_error(&resp, "read_only");

    assert_ok(
        &handle_request(
            &state,
            Request::SyncPath {
                path: "view.theme".to_string(),
                value: serde_json::json!("dark"),
            },
        )
        .await,
    );
    let data = assert_ok(
        &handle_request(
            &state,
            Request::GetState {
                path: Some("view.theme".to_string()),
            },
        )
        .await,
    );
    assert_eq!(data, Some(serde_json::json!("dark")));

    let b = rx.try_recv().unwrap();
    assert_eq!(b.channel, MAIN_ACTION_CHANNEL);
    assert_eq!(
        b.event,
        Event::StateChanged {
            path: "view.theme".to_string()
        }
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn settings_actions_persist_to_state_dir() {
    let (state, dir) = make_test_state();

    assert_ok(&handle_request(&state, Request::ToggleLaunch).await);
    assert_ok(
        &handle_request(
            &state,
            Request::SelectSecondary {
                direction: Direction::Next,
            },
        )
        .await,
    );
    assert_ok(
        &handle_request(
            &state,
            Request::GiveAccess {
                request: AccessRequest {
                    handler_id: "h1".to_string(),
                    account: "0xabc".to_string(),
                    origin: "https://dapp.example".to_string(),
                },
                access: true,
            },
        )
        .await,
    );

    let reloaded = StateStore::load(dir.path()).unwrap();
    assert_eq!(reloaded.get("main.launch"), Some(&serde_json::json!(true)));
    assert_eq!(
        reloaded.get("main.connection.secondary.settings.mainnet.current"),
        Some(&serde_json::json!("custom"))
    );
    let accounts = reloaded.get("main.accounts").unwrap();
    assert_eq!(accounts["0xabc"]["permissions"]["h1"]["provider"], true);
}

#[tokio::test]
async fn get_state_without_path_returns_everything() {
    let (state, _dir) = make_test_state();
    let data = assert_ok(&handle_request(&state, Request::GetState { path: None }).await)
        .unwrap();
    assert_eq!(data["main"]["connection"]["network"], "mainnet");

    let missing = handle_request(
        &state,
        Request::GetState {
            path: Some("nope".to_string()),
        },
    )
    .await;
    assert!(assert_ok(&missing).is_none());
}

#[tokio::test]
async fn shutdown_is_acknowledged() {
    let (state, _dir) = make_test_state();
    assert!(assert_ok(&handle_request(&state, Request::Shutdown).await).is_none());
}
