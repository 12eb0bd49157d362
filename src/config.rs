use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub auth: AuthConfig,

    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    /// Base URL used to build verification links handed to the mailer.
    pub app_url: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/retropodo.db".to_string(),
            app_url: "http://localhost:8000".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Failed password attempts before the account is locked.
    pub max_login_attempts: u32,

    /// Lock duration once the attempt threshold is reached.
    pub lockout_minutes: i64,

    /// Lifetime of email-verification tokens.
    pub verify_token_ttl_minutes: i64,

    /// Sliding session lifetime, refreshed on every authenticated lookup.
    pub session_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: 5,
            lockout_minutes: 15,
            verify_token_ttl_minutes: 60,
            session_ttl_minutes: 1440,
        }
    }
}

/// Which scheme new password hashes are produced with. Verification is
/// self-describing and accepts all of them regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordAlgorithm {
    Argon2id,
    Argon2i,
    Bcrypt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub password_algorithm: PasswordAlgorithm,

    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            password_algorithm: PasswordAlgorithm::Argon2id,
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;

        // The database URL is the one setting deployments override per
        // environment; `.env` / environment wins over the file.
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.general.database_path = url;
            }
        }

        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("retropodo").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".retropodo").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.app_url.is_empty() {
            anyhow::bail!("app_url cannot be empty");
        }

        if self.auth.max_login_attempts == 0 {
            anyhow::bail!("max_login_attempts must be > 0");
        }

        if self.auth.lockout_minutes <= 0 {
            anyhow::bail!("lockout_minutes must be > 0");
        }

        if self.auth.verify_token_ttl_minutes <= 0 {
            anyhow::bail!("verify_token_ttl_minutes must be > 0");
        }

        if self.auth.session_ttl_minutes <= 0 {
            anyhow::bail!("session_ttl_minutes must be > 0");
        }

        if self.security.argon2_memory_cost_kib == 0
            || self.security.argon2_time_cost == 0
            || self.security.argon2_parallelism == 0
        {
            anyhow::bail!("Argon2 cost parameters must be > 0");
        }

        Ok(())
    }
}
