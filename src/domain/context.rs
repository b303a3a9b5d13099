//! Error context extension trait
//!
//! Adds `anyhow`-style `.context()` / `.with_context()` to
//! `Result<T, DistributorError>` while keeping the typed error. The wrapped
//! error keeps its classification, so a transient service failure stays
//! retryable after context has been attached.
//!
//! # Examples
//!
//! ```rust
//! use cohort_distributor::domain::Result;
//! use cohort_distributor::domain::context::ResultExt;
//!
//! fn read_rules(path: &str) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .context(format!("Failed to read allocation rules: {}", path))
//! }
//! ```

use crate::domain::errors::DistributorError;
use crate::domain::result::Result;

/// Extension trait for adding context to `Result` types
pub trait ResultExt<T> {
    /// Add context to an error (evaluated eagerly)
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Add context to an error using a closure (evaluated only on error)
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<DistributorError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| DistributorError::Context {
            context: context.to_string(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| DistributorError::Context {
            context: f().to_string(),
            source: Box::new(e.into()),
        })
    }
}
