//! Error handling for the Firewatch console
//!
//! This module defines custom error types and a Result alias for use
//! throughout the application.

use thiserror::Error;

/// Main error type for Firewatch operations
#[derive(Error, Debug)]
pub enum FirewatchError {
    /// Errors raised while opening or reading the serial link
    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// Errors raised by the HTTP event-stream client
    #[error("Stream error: {0}")]
    Stream(#[from] reqwest::Error),

    /// Transport failures that carry no library source (mock scripts,
    /// protocol-level stream errors)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// The hosting environment has no usable local transport
    #[error("Unsupported environment: {0}")]
    Unsupported(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FirewatchError>,
    },
}

impl FirewatchError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FirewatchError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for Firewatch operations
pub type Result<T> = std::result::Result<T, FirewatchError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
