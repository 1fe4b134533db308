//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, buffer sizes and directory layout
//! - Detect conflicting listeners
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CatcherConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::CatcherConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address `{value}`")]
    InvalidAddress { field: &'static str, value: String },
    #[error("capture and management listeners bind the same address `{0}`")]
    ListenerConflict(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("records_dir and blobs_dir must be different directories")]
    SharedStorageDir,
    #[error("capture.public_base_url must not end with `/`")]
    TrailingSlash,
    #[error("unknown log level `{0}`")]
    LogLevel(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &CatcherConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let capture = check_address("capture.bind_address", &config.capture.bind_address, &mut errors);
    let management = check_address(
        "management.bind_address",
        &config.management.bind_address,
        &mut errors,
    );
    if let (Some(a), Some(b)) = (capture, management) {
        if a == b {
            errors.push(ValidationError::ListenerConflict(a.to_string()));
        }
    }

    if config.capture.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("capture.max_body_bytes"));
    }
    if config.broadcast.subscriber_buffer == 0 {
        errors.push(ValidationError::Zero("broadcast.subscriber_buffer"));
    }

    if config.capture.public_base_url.is_empty() {
        errors.push(ValidationError::Empty("capture.public_base_url"));
    } else if config.capture.public_base_url.ends_with('/') {
        errors.push(ValidationError::TrailingSlash);
    }

    let storage = &config.storage;
    if storage.records_dir.trim().is_empty() {
        errors.push(ValidationError::Empty("storage.records_dir"));
    }
    if storage.blobs_dir.trim().is_empty() {
        errors.push(ValidationError::Empty("storage.blobs_dir"));
    }
    if !storage.records_dir.is_empty() && storage.records_dir == storage.blobs_dir {
        errors.push(ValidationError::SharedStorageDir);
    }

    let level = config.observability.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }
    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.to_string(),
            });
            None
        }
    }
}
