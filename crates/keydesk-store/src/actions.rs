//! Named mutations of the `main` settings subtree.
//!
//! Each action returns the path it changed so the caller can announce it.

use keydesk::protocol::{AccessRequest, ConnectionNode, Direction};
use serde_json::{Value, json};

use crate::store::{StateStore, merge};

pub const LAUNCH: &str = "main.launch";
pub const REVEAL: &str = "main.reveal";
pub const CONNECTION: &str = "main.connection";
pub const ACCOUNTS: &str = "main.accounts";

fn toggle(value: Value) -> Value {
    Value::Bool(!value.as_bool().unwrap_or(false))
}

fn current_network(store: &StateStore) -> String {
    store
        .get("main.connection.network")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Switch networks. Both connections go back to a loading state.
pub fn select_network(store: &mut StateStore, network: &str) -> &'static str {
    store.update(CONNECTION, None, |mut connection| {
        merge(&mut connection, json!({ "network": network }));
        for node in ["local", "secondary"] {
            let mut status = connection.get(node).cloned().unwrap_or(Value::Null);
            merge(
                &mut status,
                json!({ "status": "loading", "connected": false, "type": "", "network": "" }),
            );
            merge(&mut connection, json!({ node: status }));
        }
        connection
    });
    CONNECTION
}

/// Step the secondary connection to the next or previous preset of the
/// current network, wrapping at either end.
pub fn select_secondary(store: &mut StateStore, direction: Direction) -> &'static str {
    let network = current_network(store);
    let settings = format!("main.connection.secondary.settings.{network}");
    store.update(&settings, None, |mut settings| {
        let names: Vec<String> = settings
            .get("options")
            .and_then(Value::as_object)
            .map(|options| options.keys().cloned().collect())
            .unwrap_or_default();
        if names.is_empty() {
            return settings;
        }
        let position = settings
            .get("current")
            .and_then(Value::as_str)
            .and_then(|current| names.iter().position(|name| name == current));
        let next = match (direction, position) {
            (Direction::Next, Some(i)) if i + 1 < names.len() => i + 1,
            (Direction::Next, _) => 0,
            (Direction::Previous, Some(i)) if i > 0 => i - 1,
            (Direction::Previous, _) => names.len() - 1,
        };
        merge(&mut settings, json!({ "current": names[next] }));
        settings
    });
    CONNECTION
}

/// Set the `custom` preset target of the current network.
pub fn set_secondary_custom(store: &mut StateStore, target: &str) -> &'static str {
    let network = current_network(store);
    let options = format!("main.connection.secondary.settings.{network}.options");
    store.update(&options, Some("custom"), |_| json!(target));
    CONNECTION
}

pub fn toggle_connection(store: &mut StateStore, node: ConnectionNode) -> &'static str {
    store.update(CONNECTION, Some(node.as_str()), |mut connection| {
        let on = toggle(connection.get("on").cloned().unwrap_or(Value::Null));
        merge(&mut connection, json!({ "on": on }));
        connection
    });
    CONNECTION
}

fn set_connection(store: &mut StateStore, node: ConnectionNode, status: Value) -> &'static str {
    store.update(CONNECTION, Some(node.as_str()), |mut connection| {
        merge(&mut connection, status);
        connection
    });
    CONNECTION
}

pub fn set_local(store: &mut StateStore, status: Value) -> &'static str {
    set_connection(store, ConnectionNode::Local, status)
}

pub fn set_secondary(store: &mut StateStore, status: Value) -> &'static str {
    set_connection(store, ConnectionNode::Secondary, status)
}

pub fn set_launch(store: &mut StateStore, launch: bool) -> &'static str {
    store.update(LAUNCH, None, |_| Value::Bool(launch));
    LAUNCH
}

pub fn toggle_launch(store: &mut StateStore) -> &'static str {
    store.update(LAUNCH, None, toggle);
    LAUNCH
}

pub fn toggle_reveal(store: &mut StateStore) -> &'static str {
    store.update(REVEAL, None, toggle);
    REVEAL
}

/// Forget every origin `account` has granted or denied.
pub fn clear_permissions(store: &mut StateStore, account: &str) -> &'static str {
    store.update(ACCOUNTS, Some(account), |mut entry| {
        merge(&mut entry, json!({ "permissions": {} }));
        entry
    });
    ACCOUNTS
}

/// Record the user's answer to an access request.
pub fn give_access(store: &mut StateStore, request: &AccessRequest, access: bool) -> &'static str {
    store.update(ACCOUNTS, Some(&request.account), |mut entry| {
        let mut permissions = entry.get("permissions").cloned().unwrap_or(Value::Null);
        merge(
            &mut permissions,
            json!({
                request.handler_id.as_str(): {
                    "handlerId": request.handler_id,
                    "origin": request.origin,
                    "provider": access,
                }
            }),
        );
        merge(&mut entry, json!({ "permissions": permissions }));
        entry
    });
    ACCOUNTS
}

/// Flip an existing grant. Unknown grants are left alone.
pub fn toggle_access(store: &mut StateStore, account: &str, handler_id: &str) -> &'static str {
    let known = store
        .get(ACCOUNTS)
        .and_then(|accounts| accounts.get(account))
        .and_then(|entry| entry.get("permissions"))
        .and_then(|permissions| permissions.get(handler_id))
        .is_some();
    if !known {
        return ACCOUNTS;
    }
    store.update(ACCOUNTS, Some(account), |mut entry| {
        if let Some(grant) = entry
            .get_mut("permissions")
            .and_then(|permissions| permissions.get_mut(handler_id))
        {
            let provider = toggle(grant.get("provider").cloned().unwrap_or(Value::Null));
            merge(grant, json!({ "provider": provider }));
        }
        entry
    });
    ACCOUNTS
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "0xaa00000000000000000000000000000000000001";

    fn access(handler_id: &str) -> AccessRequest {
        AccessRequest {
            handler_id: handler_id.to_string(),
            account: ACCOUNT.to_string(),
            origin: "https://dapp.example".to_string(),
        }
    }

    fn secondary_current(store: &StateStore) -> &str {
        store
            .get("main.connection.secondary.settings.mainnet.current")
            .and_then(Value::as_str)
            .unwrap()
    }

    #[test]
    fn select_network_resets_both_connections() {
        let mut store = StateStore::new();
        set_local(
            &mut store,
            json!({ "status": "connected", "connected": true, "type": "ipc", "network": "1" }),
        );

        assert_eq!(select_network(&mut store, "sepolia"), CONNECTION);

        assert_eq!(store.get("main.connection.network"), Some(&json!("sepolia")));
        let local = store.get("main.connection.local").unwrap();
        assert_eq!(local["status"], "loading");
        assert_eq!(local["connected"], false);
        assert_eq!(local["type"], "");
        // Untouched fields survive the reset.
        assert_eq!(local["on"], true);
        assert_eq!(store.get("main.connection.secondary.status"), Some(&json!("loading")));
    }

    #[test]
    fn select_secondary_cycles_and_wraps() {
        let mut store = StateStore::new();
        assert_eq!(secondary_current(&store), "infura");

        select_secondary(&mut store, Direction::Next);
        assert_eq!(secondary_current(&store), "custom");
        select_secondary(&mut store, Direction::Next);
        assert_eq!(secondary_current(&store), "infura");

        select_secondary(&mut store, Direction::Previous);
        assert_eq!(secondary_current(&store), "custom");
    }

    #[test]
    fn select_secondary_with_unknown_current_starts_at_an_end() {
        let mut store = StateStore::new();
        store.update(
            "main.connection.secondary.settings.mainnet",
            Some("current"),
            |_| json!("gone"),
        );
        select_secondary(&mut store, Direction::Next);
        assert_eq!(secondary_current(&store), "infura");

        store.update(
            "main.connection.secondary.settings.mainnet",
            Some("current"),
            |_| json!("gone"),
        );
        select_secondary(&mut store, Direction::Previous);
        assert_eq!(secondary_current(&store), "custom");
    }

    #[test]
    fn set_secondary_custom_targets_current_network() {
        let mut store = StateStore::new();
        set_secondary_custom(&mut store, "wss://node.example");
        assert_eq!(
            store.get("main.connection.secondary.settings.mainnet.options.custom"),
            Some(&json!("wss://node.example"))
        );
        assert_eq!(
            store.get("main.connection.secondary.settings.sepolia.options.custom"),
            Some(&json!(""))
        );
    }

    #[test]
    fn toggles_flip_booleans() {
        let mut store = StateStore::new();
        toggle_connection(&mut store, ConnectionNode::Secondary);
        assert_eq!(store.get("main.connection.secondary.on"), Some(&json!(true)));
        toggle_connection(&mut store, ConnectionNode::Local);
        assert_eq!(store.get("main.connection.local.on"), Some(&json!(false)));

        assert_eq!(toggle_launch(&mut store), LAUNCH);
        assert_eq!(store.get(LAUNCH), Some(&json!(true)));
        set_launch(&mut store, false);
        assert_eq!(store.get(LAUNCH), Some(&json!(false)));

        assert_eq!(toggle_reveal(&mut store), REVEAL);
        assert_eq!(store.get(REVEAL), Some(&json!(true)));
    }

    #[test]
    fn set_secondary_merges_status() {
        let mut store = StateStore::new();
        set_secondary(&mut store, json!({ "status": "connected", "connected": true }));
        let secondary = store.get("main.connection.secondary").unwrap();
        assert_eq!(secondary["status"], "connected");
        assert_eq!(secondary["connected"], true);
        assert!(secondary.get("settings").is_some());
    }

    #[test]
    fn access_grants_toggle_and_clear() {
        let mut store = StateStore::new();
        give_access(&mut store, &access("h1"), true);
        give_access(&mut store, &access("h2"), false);

        let grant = |store: &StateStore, id: &str| {
            store.get(ACCOUNTS).unwrap()[ACCOUNT]["permissions"][id].clone()
        };
        assert_eq!(grant(&store, "h1")["provider"], true);
        assert_eq!(grant(&store, "h1")["origin"], "https://dapp.example");
        assert_eq!(grant(&store, "h2")["provider"], false);

        toggle_access(&mut store, ACCOUNT, "h1");
        assert_eq!(grant(&store, "h1")["provider"], false);

        // Unknown grants are not created.
        toggle_access(&mut store, ACCOUNT, "h3");
        assert!(grant(&store, "h3").is_null());

        clear_permissions(&mut store, ACCOUNT);
        assert_eq!(
            store.get(ACCOUNTS).unwrap()[ACCOUNT]["permissions"],
            json!({})
        );
    }
}
