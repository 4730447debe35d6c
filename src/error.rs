//! Error types for Plugdock
//!
//! This module defines all error types used throughout the plugin core.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! Every failure kind here is scoped to a single plugin: the host is expected
//! to catch, log, and continue with the remaining plugins. Nothing in this
//! taxonomy is process-fatal.

use thiserror::Error;

/// The primary error type for Plugdock operations.
#[derive(Error, Debug)]
pub enum PlugdockError {
    /// A capability probe failed. Callers should treat this as "plugin does
    /// not participate", not as an error to surface to users.
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// Duplicate route declaration within one plugin. Fails that plugin's
    /// activation; other plugins are unaffected.
    #[error("Route build error: {0}")]
    RouteBuild(String),

    /// A typed settings accessor could not coerce the stored value.
    /// Local to the call; the caller decides the fallback.
    #[error("Settings type error: {0}")]
    SettingsType(String),

    /// Unrecognized template slot type. Drops that plugin's slot list only.
    #[error("Unknown template slot type: {0}")]
    UnknownSlotType(String),

    /// The configuration store failed to load or persist a settings tree.
    /// Propagated to whoever invoked the write, never silently swallowed.
    #[error("Configuration store error: {0}")]
    ConfigurationIo(String),

    /// A plugin identity string failed validation.
    #[error("Invalid plugin identity: {0}")]
    InvalidIdentity(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for Plugdock operations.
pub type Result<T> = std::result::Result<T, PlugdockError>;
