use std::env;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use unison_config::constants::{
    UNISON_EXEC_TIMEOUT_SECS, UNISON_SANDBOX_IMAGE, UNISON_SANDBOX_STRATEGY, UNISON_STORE_BACKEND,
};
use unison_core::{sessions_dir, workspaces_dir, DEFAULT_EXEC_TIMEOUT_SECS, DEFAULT_SANDBOX_IMAGE};
use unison_sandbox::{SandboxSettings, StrategyPreference};
use unison_sessions::StoreBackend;

const MAX_EXEC_TIMEOUT_SECS: u64 = 3600;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid execution timeout: {0}")]
    InvalidTimeout(#[from] ParseIntError),
    #[error("Execution timeout {0}s is out of valid range (1-3600)")]
    TimeoutOutOfRange(u64),
    #[error("Invalid store backend: {0}")]
    InvalidStoreBackend(String),
    #[error("Invalid sandbox strategy: {0}")]
    InvalidSandboxStrategy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Json,
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StoreKind::Sqlite),
            "json" => Ok(StoreKind::Json),
            _ => Err(ConfigError::InvalidStoreBackend(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub workspace_root: PathBuf,
    pub storage_path: PathBuf,
    pub store_kind: StoreKind,
    pub exec_timeout_secs: u64,
    pub sandbox: SandboxSettings,
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let exec_timeout_secs = env::var(UNISON_EXEC_TIMEOUT_SECS)
            .unwrap_or_else(|_| DEFAULT_EXEC_TIMEOUT_SECS.to_string())
            .trim()
            .parse::<u64>()?;

        if exec_timeout_secs == 0 || exec_timeout_secs > MAX_EXEC_TIMEOUT_SECS {
            return Err(ConfigError::TimeoutOutOfRange(exec_timeout_secs));
        }

        let store_kind = env::var(UNISON_STORE_BACKEND)
            .unwrap_or_else(|_| "sqlite".to_string())
            .parse::<StoreKind>()?;

        let strategy_str = env::var(UNISON_SANDBOX_STRATEGY).unwrap_or_else(|_| "auto".to_string());
        let strategy = strategy_str
            .parse::<StrategyPreference>()
            .map_err(|_| ConfigError::InvalidSandboxStrategy(strategy_str.clone()))?;

        let image = env::var(UNISON_SANDBOX_IMAGE)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SANDBOX_IMAGE.to_string());

        Ok(OrchestratorConfig {
            workspace_root: workspaces_dir(),
            storage_path: sessions_dir(),
            store_kind,
            exec_timeout_secs,
            sandbox: SandboxSettings { strategy, image },
        })
    }

    /// Everything under `root`, local-process sandbox, SQLite store
    pub fn under(root: &Path) -> Self {
        OrchestratorConfig {
            workspace_root: root.join("workspaces"),
            storage_path: root.join("sessions"),
            store_kind: StoreKind::Sqlite,
            exec_timeout_secs: DEFAULT_EXEC_TIMEOUT_SECS,
            sandbox: SandboxSettings {
                strategy: StrategyPreference::Local,
                image: DEFAULT_SANDBOX_IMAGE.to_string(),
            },
        }
    }

    pub fn store_backend(&self) -> StoreBackend {
        match self.store_kind {
            StoreKind::Sqlite => StoreBackend::Sqlite {
                path: self.storage_path.join("sessions.db"),
            },
            StoreKind::Json => StoreBackend::Json {
                dir: self.storage_path.clone(),
            },
        }
    }
}
