//! Application-wide error types.
//!
//! This module provides a unified error hierarchy for the crate.
//! Library modules use specific variants via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level error enum covering the full taxonomy
//! - Client-facing calls either succeed or fail with [`Error::Exhaustion`];
//!   every other variant is handled internally (retried, degraded, or
//!   logged and skipped) before it reaches the public boundary
//!
//! # Example
//!
//! ```ignore
//! use radio_engine::error::{Error, Result};
//!
//! async fn load(pool: &SqlitePool, id: &str) -> Result<Track> {
//!     db::find_track_by_external_id(pool, id)
//!         .await?
//!         .ok_or_else(|| Error::not_found(id))
//! }
//! ```

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unknown track id; surfaced to callers as an ordinary empty result
    #[error("Track not found: {0}")]
    NotFound(String),

    /// Network or rate-limit failure from the upstream provider.
    /// Retried with backoff, then degraded to a fallback.
    #[error("Transient provider error: {0}")]
    TransientProvider(String),

    /// Missing credentials or settings for a storage tier. The affected
    /// tier is disabled for the lifetime of the process, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed external id or undecodable record. The offending
    /// candidate/record is skipped and logged, never propagated.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Empty catalog and every fallback rung came up empty. The only
    /// fatal condition on the recommendation path.
    #[error("Catalog exhausted: no track available to recommend")]
    Exhaustion,

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a not-found error for a track id.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create a transient provider error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientProvider(message.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a data integrity error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity(message.into())
    }

    /// Whether this error is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientProvider(_))
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Database(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}
