use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level key owned by the daemon; callers cannot write under it.
pub const RESERVED_ROOT: &str = "main";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("path is read-only: {0:?}")]
    ReadOnly(String),
}

/// Settings tree addressed by dotted paths (`main.connection.local`).
pub struct StateStore {
    root: Value,
    file: Option<PathBuf>,
}

impl StateStore {
    const FILE: &'static str = "state.json";

    /// In-memory store seeded with the default settings.
    pub fn new() -> Self {
        Self {
            root: default_state(),
            file: None,
        }
    }

    /// Load `state_dir/state.json` over the defaults. A missing file yields
    /// the defaults.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(Self::FILE);
        let mut root = default_state();
        if path.exists() {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let saved: Value = serde_json::from_str(&data)
                .with_context(|| format!("invalid JSON in {}", path.display()))?;
            deep_merge(&mut root, saved);
        }
        Ok(Self {
            root,
            file: Some(path),
        })
    }

    /// Persist to the file this store was loaded from, if any.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        let data = serde_json::to_string_pretty(&self.root)?;
        std::fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
    }

    /// The whole tree.
    pub fn snapshot(&self) -> &Value {
        &self.root
    }

    /// The value at `path`, if present.
    pub fn get(&self, path: &str) -> Option<&Value> {
        segments(path).try_fold(&self.root, |node, seg| node.get(seg))
    }

    /// Replace the value at `path` (then `key`, when given) with
    /// `reducer(old)`. Missing intermediate objects are created and a missing
    /// value is passed to the reducer as `Value::Null`.
    pub fn update<F>(&mut self, path: &str, key: Option<&str>, reducer: F)
    where
        F: FnOnce(Value) -> Value,
    {
        let mut slot = slot_mut(&mut self.root, segments(path));
        if let Some(key) = key {
            slot = slot_mut(slot, std::iter::once(key));
        }
        let old = std::mem::take(slot);
        *slot = reducer(old);
    }

    /// Overwrite `path` on behalf of an external caller.
    pub fn sync_path(&mut self, path: &str, value: Value) -> Result<(), StoreError> {
        let segs: Vec<&str> = segments(path).collect();
        let reserved = match segs.as_slice() {
            [] | ["*"] => true,
            [first, ..] => first.starts_with(RESERVED_ROOT),
        };
        if reserved {
            return Err(StoreError::ReadOnly(path.to_string()));
        }
        self.update(path, None, |_| value);
        Ok(())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

fn slot_mut<'a, 'k>(mut node: &'a mut Value, path: impl Iterator<Item = &'k str>) -> &'a mut Value {
    for seg in path {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            unreachable!("node was just made an object");
        };
        node = map.entry(seg.to_string()).or_insert(Value::Null);
    }
    node
}

/// Shallow merge of `patch`'s fields into `target` (which becomes an object).
pub fn merge(target: &mut Value, patch: Value) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let (Value::Object(dst), Value::Object(src)) = (target, patch) {
        for (k, v) in src {
            dst.insert(k, v);
        }
    }
}

fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(dst), Value::Object(src)) => {
            for (k, v) in src {
                match dst.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst.insert(k, v);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

fn connection_status() -> Value {
    json!({ "on": true, "status": "loading", "connected": false, "type": "", "network": "" })
}

fn default_state() -> Value {
    let mut local = connection_status();
    merge(&mut local, json!({ "settings": {} }));
    let mut secondary = connection_status();
    merge(
        &mut secondary,
        json!({
            "on": false,
            "settings": {
                "mainnet": {
                    "current": "infura",
                    "options": { "infura": "https://mainnet.infura.io", "custom": "" }
                },
                "sepolia": {
                    "current": "infura",
                    "options": { "infura": "https://sepolia.infura.io", "custom": "" }
                }
            }
        }),
    );
    json!({
        "main": {
            "launch": false,
            "reveal": false,
            "connection": {
                "network": "mainnet",
                "local": local,
                "secondary": secondary
            },
            "accounts": {}
        }
    })
}
