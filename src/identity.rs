//! Plugin identity for Plugdock
//!
//! Every loaded plugin is assigned exactly one [`PluginIdentity`] by the
//! plugin loader before it enters this core. The identity is an opaque,
//! process-unique textual key and is immutable for the plugin's lifetime.
//! It namespaces everything the plugin touches: HTTP routes, generated
//! endpoint names, settings storage keys, template variables, and asset URLs.
//! Two plugins can therefore declare identically named operations without
//! ever colliding.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{PlugdockError, Result};

/// Identities must be lowercase alphanumeric with underscores, starting with
/// an alphanumeric character, at most 64 characters.
static IDENTITY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_]{0,63}$").expect("hardcoded pattern is valid"));

/// The unique namespace key for a loaded plugin instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginIdentity(String);

impl PluginIdentity {
    /// Validate and wrap an identity string.
    ///
    /// # Errors
    /// `PlugdockError::InvalidIdentity` if the string does not match the
    /// identity pattern.
    pub fn new(identity: impl Into<String>) -> Result<Self> {
        let identity = identity.into();
        if !IDENTITY_PATTERN.is_match(&identity) {
            return Err(PlugdockError::InvalidIdentity(format!(
                "'{}' must be lowercase alphanumeric/underscore, start alphanumeric, max 64 chars",
                identity
            )));
        }
        Ok(Self(identity))
    }

    /// The raw identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL prefix under which all of this plugin's routes are mounted,
    /// e.g. `/plugin/demo`.
    pub fn route_prefix(&self) -> String {
        format!("/plugin/{}", self.0)
    }

    /// Prefix for generated endpoint names, e.g. `plugin.demo`.
    pub fn endpoint_prefix(&self) -> String {
        format!("plugin.{}", self.0)
    }

    /// Prefix applied to the plugin's template variables before they are
    /// handed to the rendering engine, e.g. `plugin_demo_`.
    pub fn template_var_prefix(&self) -> String {
        format!("plugin_{}_", self.0)
    }

    /// Base URL under which the plugin's static assets are published,
    /// e.g. `/plugin_assets/demo`.
    pub fn asset_base(&self) -> String {
        format!("/plugin_assets/{}", self.0)
    }
}

impl fmt::Display for PluginIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PluginIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identities() {
        for id in ["demo", "my_plugin", "plugin2", "a", "0led"] {
            assert!(PluginIdentity::new(id).is_ok(), "expected '{}' to be valid", id);
        }
    }

    #[test]
    fn test_invalid_identities() {
        for id in ["", "_leading", "UpperCase", "has-dash", "has space", "ümlaut"] {
            assert!(
                PluginIdentity::new(id).is_err(),
                "expected '{}' to be rejected",
                id
            );
        }
    }

    #[test]
    fn test_identity_length_limit() {
        let ok = "a".repeat(64);
        let too_long = "a".repeat(65);
        assert!(PluginIdentity::new(ok).is_ok());
        assert!(PluginIdentity::new(too_long).is_err());
    }

    #[test]
    fn test_namespace_prefixes() {
        let id = PluginIdentity::new("demo").unwrap();
        assert_eq!(id.route_prefix(), "/plugin/demo");
        assert_eq!(id.endpoint_prefix(), "plugin.demo");
        assert_eq!(id.template_var_prefix(), "plugin_demo_");
        assert_eq!(id.asset_base(), "/plugin_assets/demo");
    }

    #[test]
    fn test_display_and_as_str() {
        let id = PluginIdentity::new("demo").unwrap();
        assert_eq!(id.to_string(), "demo");
        assert_eq!(id.as_str(), "demo");
    }

    #[test]
    fn test_invalid_identity_error_variant() {
        let err = PluginIdentity::new("Bad Name").unwrap_err();
        assert!(matches!(err, PlugdockError::InvalidIdentity(_)));
        assert!(err.to_string().contains("Bad Name"));
    }
}
