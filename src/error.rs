//! Error handling for the Quran read tracker

use quran_read_tracker_auth::AuthError;
use quran_read_tracker_postgrest::PostgrestError;
use std::fmt;
use thiserror::Error;

/// Unified error type for the tracker client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Database query errors
    #[error("Database error: {0}")]
    Database(#[from] PostgrestError),

    /// Platform geolocation errors
    #[error("Location error: {0}")]
    Location(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local input validation failures, raised before any remote call
    #[error("{0}")]
    Validation(String),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new location error
    pub fn location<T: fmt::Display>(msg: T) -> Self {
        Error::Location(msg.to_string())
    }

    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new validation error
    pub fn validation<T: fmt::Display>(msg: T) -> Self {
        Error::Validation(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }
}
