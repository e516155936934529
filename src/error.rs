//! Application-wide error types.
//!
//! This module provides a unified error hierarchy for the client.
//! Library modules use specific variants via `thiserror`, while
//! the binary entry point uses `anyhow` for convenient propagation.
//!
//! # Propagation policy
//!
//! Failures that affect the user's immediate action (track resolution,
//! media loading) are surfaced at the point of action. Failures in
//! background/best-effort work (snapshot persistence, play analytics,
//! session restoration) are logged and swallowed - they must never
//! interrupt a foreground transport operation.

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Track id could not be resolved through any tier (list, cache, remote)
    #[error("track {0} could not be found")]
    Resolution(i64),

    /// Media file missing, unsupported, or failed to load
    #[error("playback error: {0}")]
    MediaLoad(String),

    /// Snapshot storage read/write failure (logged, never surfaced)
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Play-event recording failure (logged, always swallowed)
    #[error("analytics error: {0}")]
    Analytics(String),

    /// Session restoration abandoned (logged, session starts empty)
    #[error("restoration error: {0}")]
    Restoration(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a media load error.
    pub fn media_load(message: impl Into<String>) -> Self {
        Self::MediaLoad(message.into())
    }

    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Create a restoration error.
    pub fn restoration(message: impl Into<String>) -> Self {
        Self::Restoration(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Whether this failure belongs to background/best-effort work.
    ///
    /// Background failures are logged and swallowed rather than surfaced.
    pub fn is_background(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::Analytics(_) | Self::Restoration(_)
        )
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

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Resolution(42);
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::media_load("file unsupported").context("while starting track");
        let msg = err.to_string();
        assert!(msg.contains("while starting track"));
        assert!(msg.contains("file unsupported"));
    }

    #[test]
    fn test_background_classification() {
        assert!(Error::persistence("quota").is_background());
        assert!(Error::Analytics("timeout".into()).is_background());
        assert!(Error::restoration("no bulk data").is_background());
        assert!(!Error::Resolution(1).is_background());
        assert!(!Error::media_load("bad file").is_background());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::media_load("test"));
        let with_ctx = result.with_context("additional context");
        assert!(with_ctx.unwrap_err().to_string().contains("additional context"));
    }
}
