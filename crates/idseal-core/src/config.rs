use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from idseal.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdsealConfig {
    pub authority: AuthorityConfig,
    pub engine: EngineConfig,
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Unix socket path the authority daemon listens on
    pub socket: PathBuf,
    /// Path to the master key file (authority side only)
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// What to do when the stored ciphertext hash does not match:
    /// "block" (refuse to decrypt) or "warn" (log and continue)
    pub integrity_policy: String,
    /// Maximum number of derived keys kept in the in-process cache
    pub key_cache_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            socket: PathBuf::from("/run/idseald/idseald.sock"),
            key_file: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            integrity_policy: "block".into(),
            key_cache_capacity: 100,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl IdsealConfig {
    /// Parse a TOML config string. Unknown keys are ignored, missing
    /// sections fall back to defaults.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("parsing config: {e}"))
    }
}
