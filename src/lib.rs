//! Plugdock - capability-based plugin contract for extensible hosts

pub mod assets;
pub mod capability;
pub mod error;
pub mod host;
pub mod identity;
pub mod routes;
pub mod settings;
pub mod templates;

pub use error::{PlugdockError, Result};
pub use identity::PluginIdentity;
