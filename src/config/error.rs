//! Configuration error types

use thiserror::Error;

use crate::domain::categories::CategoryRegistryError;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Category registry could not be loaded: {0}")]
    Categories(#[from] CategoryRegistryError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid timeout: {0} must be greater than zero")]
    InvalidTimeout(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Humanizer endpoint must be an http(s) URL")]
    InvalidHumanizerEndpoint,

    #[error("Humanizer max_polls must be at least 1")]
    InvalidMaxPolls,

    #[error("Disinterest thresholds must lie in [0, 1] with warn <= suspend")]
    InvalidThresholds,

    #[error("Invalid budget: {0} must be greater than zero")]
    InvalidBudget(&'static str),

    #[error("Invalid log level filter: {0}")]
    InvalidLogLevel(String),
}
