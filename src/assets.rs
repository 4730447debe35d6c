//! Static asset bookkeeping for Plugdock
//!
//! Asset-capable plugins declare lists of static files (Javascript, CSS,
//! LESS) relative to their asset folder. The host records one
//! [`AssetBundle`] and asset folder per plugin identity; delivery of the
//! files themselves is an external collaborator's concern, so this module is
//! a flat pass-through lookup table.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::identity::PluginIdentity;

/// The static assets a plugin publishes, as paths relative to its asset
/// folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetBundle {
    /// Javascript files, such as additional view models.
    pub js: Vec<String>,
    /// CSS files with additional styles.
    pub css: Vec<String>,
    /// LESS source files, used instead of `css` when the host runs in LESS
    /// mode.
    pub less: Vec<String>,
}

impl AssetBundle {
    /// Whether the bundle declares no files at all.
    pub fn is_empty(&self) -> bool {
        self.js.is_empty() && self.css.is_empty() && self.less.is_empty()
    }

    /// Total number of declared files.
    pub fn len(&self) -> usize {
        self.js.len() + self.css.len() + self.less.len()
    }
}

#[derive(Debug, Clone)]
struct AssetRecord {
    bundle: AssetBundle,
    folder: PathBuf,
}

/// Per-identity lookup table of declared asset bundles and folders.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    records: HashMap<String, AssetRecord>,
}

impl AssetIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a plugin's bundle and asset folder, replacing any previous
    /// record for the same identity.
    pub fn insert(&mut self, identity: &PluginIdentity, bundle: AssetBundle, folder: PathBuf) {
        self.records
            .insert(identity.as_str().to_string(), AssetRecord { bundle, folder });
    }

    /// The bundle declared by a plugin, if any.
    pub fn bundle(&self, identity: &PluginIdentity) -> Option<&AssetBundle> {
        self.records.get(identity.as_str()).map(|r| &r.bundle)
    }

    /// The asset folder recorded for a plugin, if any.
    pub fn folder(&self, identity: &PluginIdentity) -> Option<&PathBuf> {
        self.records.get(identity.as_str()).map(|r| &r.folder)
    }

    /// The public URL for one of a plugin's asset files,
    /// e.g. `/plugin_assets/demo/js/demo.js`.
    pub fn asset_url(&self, identity: &PluginIdentity, path: &str) -> String {
        format!("{}/{}", identity.asset_base(), path.trim_start_matches('/'))
    }

    /// Drop a plugin's record.
    pub fn remove(&mut self, identity: &PluginIdentity) -> bool {
        self.records.remove(identity.as_str()).is_some()
    }

    /// Number of plugins with recorded assets.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> PluginIdentity {
        PluginIdentity::new("demo").unwrap()
    }

    fn bundle() -> AssetBundle {
        AssetBundle {
            js: vec!["js/demo.js".to_string()],
            css: vec!["css/demo.css".to_string()],
            less: vec![],
        }
    }

    #[test]
    fn test_bundle_deserialization_defaults() {
        let bundle: AssetBundle = serde_json::from_str("{}").unwrap();
        assert!(bundle.is_empty());
        assert_eq!(bundle.len(), 0);
    }

    #[test]
    fn test_bundle_deserialization() {
        let bundle: AssetBundle = serde_json::from_str(
            r#"{"js": ["js/a.js", "js/b.js"], "css": ["css/a.css"], "less": ["less/a.less"]}"#,
        )
        .unwrap();
        assert_eq!(bundle.js.len(), 2);
        assert_eq!(bundle.len(), 4);
        assert!(!bundle.is_empty());
    }

    #[test]
    fn test_index_insert_and_lookup() {
        let mut index = AssetIndex::new();
        index.insert(&demo(), bundle(), PathBuf::from("/plugins/demo/static"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.bundle(&demo()), Some(&bundle()));
        assert_eq!(
            index.folder(&demo()),
            Some(&PathBuf::from("/plugins/demo/static"))
        );
    }

    #[test]
    fn test_index_lookup_unknown_identity() {
        let index = AssetIndex::new();
        let other = PluginIdentity::new("other").unwrap();
        assert!(index.bundle(&other).is_none());
        assert!(index.folder(&other).is_none());
    }

    #[test]
    fn test_index_remove() {
        let mut index = AssetIndex::new();
        index.insert(&demo(), bundle(), PathBuf::from("/static"));
        assert!(index.remove(&demo()));
        assert!(!index.remove(&demo()));
        assert!(index.is_empty());
    }

    #[test]
    fn test_asset_url() {
        let index = AssetIndex::new();
        assert_eq!(
            index.asset_url(&demo(), "js/demo.js"),
            "/plugin_assets/demo/js/demo.js"
        );
        assert_eq!(
            index.asset_url(&demo(), "/js/demo.js"),
            "/plugin_assets/demo/js/demo.js"
        );
    }

    #[test]
    fn test_insert_replaces_previous_record() {
        let mut index = AssetIndex::new();
        index.insert(&demo(), bundle(), PathBuf::from("/old"));
        index.insert(&demo(), AssetBundle::default(), PathBuf::from("/new"));
        assert_eq!(index.len(), 1);
        assert!(index.bundle(&demo()).unwrap().is_empty());
        assert_eq!(index.folder(&demo()), Some(&PathBuf::from("/new")));
    }
}
