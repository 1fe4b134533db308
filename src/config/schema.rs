//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the catcher.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the request catcher.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CatcherConfig {
    /// Public capture listener (catch-all, counter, static blobs).
    pub capture: CaptureConfig,

    /// Management listener (history pages, live stream).
    pub management: ManagementConfig,

    /// On-disk layout for records and blobs.
    pub storage: StorageConfig,

    /// Live fan-out settings.
    pub broadcast: BroadcastConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Capture listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Base URL under which `/static` is reachable, without trailing slash.
    pub public_base_url: String,

    /// Largest body that will be buffered for inspection.
    pub max_body_bytes: usize,

    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    pub trust_forwarded_headers: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            trust_forwarded_headers: false,
        }
    }
}

/// Management listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagementConfig {
    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,

    /// Interval between keep-alive comments on open event streams.
    pub keep_alive_secs: u64,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
            keep_alive_secs: 15,
        }
    }
}

/// Storage directories.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// One JSON document per captured request.
    pub records_dir: String,

    /// Opaque bodies, served back under `/static`.
    pub blobs_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            records_dir: "./requests".to_string(),
            blobs_dir: "./static-files".to_string(),
        }
    }
}

/// Broadcast hub configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Capacity of each subscriber's delivery buffer.
    /// Records that do not fit are dropped for that subscriber only.
    pub subscriber_buffer: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 16,
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: CatcherConfig = toml::from_str("").unwrap();
        assert_eq!(config.capture.bind_address, "0.0.0.0:8080");
        assert_eq!(config.management.bind_address, "0.0.0.0:8081");
        assert_eq!(config.storage.records_dir, "./requests");
        assert_eq!(config.broadcast.subscriber_buffer, 16);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: CatcherConfig = toml::from_str(
            r#"
[capture]
bind_address = "127.0.0.1:9000"

[observability]
log_format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.capture.bind_address, "127.0.0.1:9000");
        assert_eq!(config.capture.public_base_url, "http://localhost:8080");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
    }
}
