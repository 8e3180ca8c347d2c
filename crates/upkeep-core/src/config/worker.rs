//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Background worker and coordination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the scheduler is started at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Identity recorded on acquired leases. Defaults to `<hostname>-<pid>`.
    #[serde(default)]
    pub holder_id: Option<String>,
    /// Coordination backend for job locks: `"postgres"`, `"redis"` or `"memory"`.
    #[serde(default = "default_lock_backend")]
    pub lock_backend: String,
    /// Redis URL used when `lock_backend = "redis"`.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Seconds to wait for in-flight runs on shutdown.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            holder_id: None,
            lock_backend: default_lock_backend(),
            redis_url: default_redis_url(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

impl WorkerConfig {
    /// Resolve the lease holder identity for this process.
    pub fn resolve_holder_id(&self) -> String {
        let configured = self.holder_id.as_deref().map(str::trim).unwrap_or("");
        if !configured.is_empty() {
            return configured.to_string();
        }
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "worker".to_string());
        format!("{}-{}", host, std::process::id())
    }
}

fn default_true() -> bool {
    true
}

fn default_lock_backend() -> String {
    "postgres".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_shutdown_grace() -> u64 {
    30
}
