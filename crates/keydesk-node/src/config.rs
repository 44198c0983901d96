use anyhow::{Context, Result};
use keydesk_session::SessionConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

const DEFAULT_STATE_DIR: &str = ".local/state/keydesk";

/// Daemon settings read from `config.toml`. Every field is optional.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NodeConfig {
    /// Unix socket to listen on.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
    /// Where settings and hot keys live.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(flatten)]
    pub session: SessionConfig,
}

impl NodeConfig {
    /// Load `path`, or the default config file when `path` is `None`. Only an
    /// explicitly named file is required to exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::config_path(), false),
        };
        if !path.exists() {
            if required {
                anyhow::bail!("config file {} not found", path.display());
            }
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn config_path() -> PathBuf {
        config_dir().join("config.toml")
    }
}

fn config_dir() -> PathBuf {
    if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(config_dir).join("keydesk")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("keydesk")
    } else {
        PathBuf::from("/tmp/keydesk")
    }
}

/// Return the keydesk state directory path.
///
/// Priority: `$KEYDESK_STATE_DIR` env var, then `~/.local/state/keydesk`.
pub fn default_state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("KEYDESK_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME env var not set")?;
    Ok(PathBuf::from(home).join(DEFAULT_STATE_DIR))
}

/// Ensure the state directory exists with `0700` permissions.
pub fn ensure_state_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("failed to create state dir {}", path.display()))?;
    }
    #[cfg(unix)]
    {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .with_context(|| format!("failed to set state dir permissions {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_config_yields_defaults() {
        let config: NodeConfig = toml::from_str("").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.session.short_grace_ms, 1_800);
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = NodeConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn session_tunables_are_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "socket_path = \"/tmp/kd.sock\"\nshort_grace_ms = 500\nevent_capacity = 16\n",
        )
        .unwrap();

        let config = NodeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.socket_path, Some(PathBuf::from("/tmp/kd.sock")));
        assert_eq!(config.session.short_grace_ms, 500);
        assert_eq!(config.session.error_grace_ms, 3_300);
        assert_eq!(config.session.event_capacity, 16);
    }

    #[test]
    fn ensure_creates_private_dir() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("sub/state");
        ensure_state_dir(&state).unwrap();
        assert!(state.exists());
        #[cfg(unix)]
        {
            let mode = std::fs::metadata(&state).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }
}
