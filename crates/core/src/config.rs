//! Configuration types shared across crates.

use crate::namespace::Namespace;
use crate::retry::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Upper bound on a buffered upload request body, in bytes.
    #[serde(default = "default_max_upload_body_bytes")]
    pub max_upload_body_bytes: usize,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_upload_body_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_body_bytes: default_max_upload_body_bytes(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("server.bind is not a socket address: {}", self.bind));
        }
        if self.max_upload_body_bytes == 0 {
            return Err("server.max_upload_body_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Credential validation configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC secret used to validate capability credentials.
    /// WARNING: Prefer PORTER_AUTH__SHARED_SECRET over storing it in a config file.
    pub shared_secret: String,
    /// How long an issued credential stays valid, in seconds (default: 7 days).
    #[serde(default = "default_credential_ttl_secs")]
    pub credential_ttl_secs: u64,
    /// Require the authenticated subject to equal `<namespace>/<entity>` for
    /// the resource being accessed (default: false).
    #[serde(default)]
    pub enforce_entity_match: bool,
}

fn default_credential_ttl_secs() -> u64 {
    3600 * 24 * 7
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("shared_secret", &"<redacted>")
            .field("credential_ttl_secs", &self.credential_ttl_secs)
            .field("enforce_entity_match", &self.enforce_entity_match)
            .finish()
    }
}

impl AuthConfig {
    /// Create a test configuration with a fixed secret.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            shared_secret: "test-shared-secret".to_string(),
            credential_ttl_secs: default_credential_ttl_secs(),
            enforce_entity_match: false,
        }
    }

    /// Credential lifetime as a Duration.
    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_secs)
    }

    /// Validate auth configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.shared_secret.is_empty() {
            return Err("auth.shared_secret must not be empty".to_string());
        }
        if self.credential_ttl_secs == 0 {
            return Err("auth.credential_ttl_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// Process-local memory (development and testing only).
    Memory,
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("filesystem storage requires a non-empty path".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Upload coordinator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CoordinatorConfig {
    /// Forward tus requests to an HTTP coordinator service.
    Http {
        /// Base URL of the coordinator service (e.g., "http://127.0.0.1:9000").
        base_url: String,
        /// TCP connect timeout in seconds.
        #[serde(default = "default_connect_timeout_secs")]
        connect_timeout_secs: u64,
    },
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl CoordinatorConfig {
    /// Validate coordinator configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            CoordinatorConfig::Http { base_url, .. } => {
                if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                    return Err(format!(
                        "coordinator base_url must be an http(s) URL, got {base_url}"
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Backends bound to a single namespace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Blob storage for reads.
    pub storage: StorageConfig,
    /// Coordinator for tus operations.
    pub coordinator: CoordinatorConfig,
}

/// The two namespace bindings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamespacesConfig {
    pub attachments: NamespaceConfig,
    pub backups: NamespaceConfig,
}

impl NamespacesConfig {
    /// Get the binding configuration for a namespace.
    pub fn get(&self, namespace: Namespace) -> &NamespaceConfig {
        match namespace {
            Namespace::Attachments => &self.attachments,
            Namespace::Backups => &self.backups,
        }
    }

    /// Validate every binding.
    pub fn validate(&self) -> Result<(), String> {
        for namespace in Namespace::ALL {
            let binding = self.get(namespace);
            binding
                .storage
                .validate()
                .map_err(|e| format!("namespaces.{namespace}.storage: {e}"))?;
            binding
                .coordinator
                .validate()
                .map_err(|e| format!("namespaces.{namespace}.coordinator: {e}"))?;
        }
        Ok(())
    }
}

/// A single retry policy as configured.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first (default: 4).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds (default: 100).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Cap on any single delay in milliseconds (default: 5000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy (default: exponential).
    #[serde(default)]
    pub backoff: Backoff,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    /// Build the runtime policy.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::exponential()
            .with_max_attempts(self.max_attempts)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_backoff(self.backoff)
    }

    /// Validate retry configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(format!(
                "initial_delay_ms {} exceeds max_delay_ms {}",
                self.initial_delay_ms, self.max_delay_ms
            ));
        }
        Ok(())
    }
}

/// Retry configuration for the resilient access layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Policy for blob storage reads and heads.
    #[serde(default)]
    pub storage: RetryConfig,
    /// Policy for coordinator dispatch.
    #[serde(default)]
    pub coordinator: RetryConfig,
    /// Per-attempt deadline for coordinator dispatch in seconds (default: 30 minutes).
    #[serde(default = "default_coordinator_deadline_secs")]
    pub coordinator_deadline_secs: u64,
}

fn default_coordinator_deadline_secs() -> u64 {
    60 * 30
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            storage: RetryConfig::default(),
            coordinator: RetryConfig::default(),
            coordinator_deadline_secs: default_coordinator_deadline_secs(),
        }
    }
}

impl RetrySettings {
    /// Coordinator deadline as a Duration.
    pub fn coordinator_deadline(&self) -> Duration {
        Duration::from_secs(self.coordinator_deadline_secs)
    }

    /// Validate both policies.
    pub fn validate(&self) -> Result<(), String> {
        self.storage
            .validate()
            .map_err(|e| format!("retry.storage: {e}"))?;
        self.coordinator
            .validate()
            .map_err(|e| format!("retry.coordinator: {e}"))?;
        if self.coordinator_deadline_secs == 0 {
            return Err("retry.coordinator_deadline_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Response cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable the read response cache (default: true).
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Maximum number of cached responses (default: 1024).
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    /// Entry lifetime in seconds (default: 300).
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Responses with larger bodies are not cached (default: 8 MiB).
    #[serde(default = "default_cache_max_object_bytes")]
    pub max_object_bytes: usize,
    /// Request headers that are part of the cache key (default: ["origin"]).
    #[serde(default = "default_cache_vary_headers")]
    pub vary_headers: Vec<String>,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_max_entries() -> usize {
    1024
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_max_object_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_cache_vary_headers() -> Vec<String> {
    vec!["origin".to_string()]
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_entries: default_cache_max_entries(),
            ttl_secs: default_cache_ttl_secs(),
            max_object_bytes: default_cache_max_object_bytes(),
            vary_headers: default_cache_vary_headers(),
        }
    }
}

impl CacheConfig {
    /// Entry lifetime as a Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Validate cache configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.max_entries == 0 {
            return Err("cache.max_entries must be greater than 0 when enabled".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Credential validation (required).
    pub auth: AuthConfig,
    /// Namespace bindings (required).
    pub namespaces: NamespacesConfig,
    /// Retry policies.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Response cache.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Create a test configuration with in-memory storage.
    ///
    /// **For testing only.** Coordinators point at a local address that is
    /// never contacted by tests that inject their own coordinator.
    pub fn for_testing() -> Self {
        let binding = NamespaceConfig {
            storage: StorageConfig::Memory,
            coordinator: CoordinatorConfig::Http {
                base_url: "http://127.0.0.1:9".to_string(),
                connect_timeout_secs: 1,
            },
        };
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::for_testing(),
            namespaces: NamespacesConfig {
                attachments: binding.clone(),
                backups: binding,
            },
            retry: RetrySettings::default(),
            cache: CacheConfig::default(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.auth.validate()?;
        self.namespaces.validate()?;
        self.retry.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}
