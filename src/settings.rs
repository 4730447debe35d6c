//! Settings resolution for Plugdock
//!
//! Each settings-capable plugin carries two trees: an immutable **default
//! tree** supplied once at registration (the schema) and a mutable **stored
//! tree** persisted by the external [`ConfigStore`]. This module owns the
//! merge algorithms between them:
//!
//! - merged reads are defaults-filled: the stored tree wins where both trees
//!   have a key, missing keys come from the defaults, and keys absent from
//!   the defaults never leak into a merged read;
//! - writes deep-merge mapping-into-mapping and replace everything else
//!   outright (sequences and scalars are never element-merged);
//! - the stored tree is kept minimal by pruning values that equal their
//!   default, so saving a loaded tree back is a no-op.
//!
//! A [`PluginSettings`] guards its stored tree with its own lock; settings
//! access for different plugins never contends.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PlugdockError, Result};
use crate::identity::PluginIdentity;

/// A nested mapping from string keys to scalars, sequences, or sub-mappings.
pub type SettingsTree = Map<String, Value>;

// ---------------------------------------------------------------------------
// Merge algorithms
// ---------------------------------------------------------------------------

/// Deep-merge `incoming` into `base` and return the result.
///
/// For each key in `incoming`: if both sides hold mappings the merge recurses,
/// otherwise the incoming value replaces the old value outright. Deterministic
/// and idempotent.
pub fn deep_merge(base: &SettingsTree, incoming: &SettingsTree) -> SettingsTree {
    let mut merged = base.clone();
    for (key, value) in incoming {
        match (merged.get(key), value) {
            (Some(Value::Object(old)), Value::Object(new)) => {
                merged.insert(key.clone(), Value::Object(deep_merge(old, new)));
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// Fill a stored tree with defaults for a read.
///
/// The result has exactly the defaults' shape: stored values win where both
/// trees have a key, defaults fill the gaps, and stored keys absent from the
/// defaults are dropped.
pub fn merge_with_defaults(defaults: &SettingsTree, stored: &SettingsTree) -> SettingsTree {
    let mut merged = SettingsTree::new();
    for (key, default) in defaults {
        let value = match (stored.get(key), default) {
            (Some(Value::Object(stored_sub)), Value::Object(default_sub)) => {
                Value::Object(merge_with_defaults(default_sub, stored_sub))
            }
            (Some(stored_value), _) => stored_value.clone(),
            (None, _) => default.clone(),
        };
        merged.insert(key.clone(), value);
    }
    merged
}

/// Strip values that equal their default, keeping the stored tree minimal.
///
/// Sub-mappings are pruned recursively and dropped entirely when they end up
/// empty. Keys with no counterpart in the defaults are kept as-is (writes may
/// introduce any keys the plugin explicitly sets).
pub fn prune_defaults(tree: &SettingsTree, defaults: &SettingsTree) -> SettingsTree {
    let mut pruned = SettingsTree::new();
    for (key, value) in tree {
        match (defaults.get(key), value) {
            (Some(Value::Object(default_sub)), Value::Object(sub)) => {
                let sub_pruned = prune_defaults(sub, default_sub);
                if !sub_pruned.is_empty() {
                    pruned.insert(key.clone(), Value::Object(sub_pruned));
                }
            }
            (Some(default), _) if default == value => {}
            _ => {
                pruned.insert(key.clone(), value.clone());
            }
        }
    }
    pruned
}

// ---------------------------------------------------------------------------
// Configuration store
// ---------------------------------------------------------------------------

/// External collaborator backing the stored trees.
///
/// Persistence format and file layout are out of scope for this core; a save
/// is assumed synchronous and a failed flush must surface to the caller.
pub trait ConfigStore: Send + Sync {
    /// Load the stored tree for a plugin, `None` when nothing was persisted.
    fn load(&self, identity: &PluginIdentity) -> Result<Option<SettingsTree>>;

    /// Persist the stored tree for a plugin.
    fn save(&self, identity: &PluginIdentity, tree: &SettingsTree) -> Result<()>;
}

/// In-memory [`ConfigStore`] used by tests and hosts without persistence.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    trees: RwLock<HashMap<String, SettingsTree>>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self, identity: &PluginIdentity) -> Result<Option<SettingsTree>> {
        Ok(read_lock(&self.trees).get(identity.as_str()).cloned())
    }

    fn save(&self, identity: &PluginIdentity, tree: &SettingsTree) -> Result<()> {
        write_lock(&self.trees).insert(identity.as_str().to_string(), tree.clone());
        Ok(())
    }
}

// A poisoned lock only means another settings call panicked mid-write; the
// tree itself is still a consistent JSON map, so recover the guard.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Per-plugin resolver
// ---------------------------------------------------------------------------

/// The settings resolver for one plugin.
///
/// Holds the plugin's immutable default tree and its mutable stored tree.
/// Reads and writes on the stored tree are mutually exclusive at the
/// granularity of a single call; each call observes a consistent snapshot.
pub struct PluginSettings {
    identity: PluginIdentity,
    defaults: SettingsTree,
    stored: RwLock<SettingsTree>,
    store: Arc<dyn ConfigStore>,
}

impl PluginSettings {
    /// Create the resolver for a plugin, loading any previously persisted
    /// stored tree from the configuration store.
    ///
    /// # Errors
    /// `PlugdockError::ConfigurationIo` if the store fails to load.
    pub fn new(
        identity: PluginIdentity,
        defaults: SettingsTree,
        store: Arc<dyn ConfigStore>,
    ) -> Result<Self> {
        let stored = store.load(&identity)?.unwrap_or_default();
        debug!(
            plugin = %identity,
            default_keys = defaults.len(),
            stored_keys = stored.len(),
            "Initialized plugin settings"
        );
        Ok(Self {
            identity,
            defaults,
            stored: RwLock::new(stored),
            store,
        })
    }

    /// The plugin this resolver belongs to.
    pub fn identity(&self) -> &PluginIdentity {
        &self.identity
    }

    /// The immutable default tree.
    pub fn defaults(&self) -> &SettingsTree {
        &self.defaults
    }

    /// A snapshot of the raw stored tree.
    pub fn stored_snapshot(&self) -> SettingsTree {
        read_lock(&self.stored).clone()
    }

    /// The full effective configuration: stored merged over defaults.
    pub fn effective(&self) -> SettingsTree {
        merge_with_defaults(&self.defaults, &read_lock(&self.stored))
    }

    /// Read the value at `path`. An empty path returns the whole tree.
    ///
    /// With `merged` set, missing keys are filled from the default tree
    /// (stored wins where both trees have a key); without it, only the
    /// stored tree is consulted.
    pub fn get(&self, path: &[&str], merged: bool) -> Option<Value> {
        let tree = if merged {
            self.effective()
        } else {
            self.stored_snapshot()
        };
        if path.is_empty() {
            return Some(Value::Object(tree));
        }
        lookup(&tree, path).cloned()
    }

    /// Read a boolean at `path` from the merged tree, coercing truthy and
    /// falsy strings.
    ///
    /// # Errors
    /// `PlugdockError::SettingsType` when the value is neither a boolean nor
    /// a recognized boolean string.
    pub fn get_bool(&self, path: &[&str]) -> Result<Option<bool>> {
        match self.get(path, true) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" | "on" => Ok(Some(true)),
                "false" | "no" | "n" | "0" | "off" => Ok(Some(false)),
                _ => Err(type_error(&self.identity, path, "boolean", &Value::String(s))),
            },
            Some(other) => Err(type_error(&self.identity, path, "boolean", &other)),
        }
    }

    /// Read an integer at `path` from the merged tree, coercing numeric
    /// strings.
    pub fn get_int(&self, path: &[&str]) -> Result<Option<i64>> {
        match self.get(path, true) {
            None => Ok(None),
            Some(Value::Number(n)) if n.as_i64().is_some() => Ok(n.as_i64()),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| type_error(&self.identity, path, "integer", &Value::String(s.clone()))),
            Some(other) => Err(type_error(&self.identity, path, "integer", &other)),
        }
    }

    /// Read a float at `path` from the merged tree, coercing numeric strings.
    pub fn get_float(&self, path: &[&str]) -> Result<Option<f64>> {
        match self.get(path, true) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| type_error(&self.identity, path, "float", &Value::String(s.clone()))),
            Some(other) => Err(type_error(&self.identity, path, "float", &other)),
        }
    }

    /// Read a string at `path` from the merged tree, stringifying scalars.
    pub fn get_string(&self, path: &[&str]) -> Result<Option<String>> {
        match self.get(path, true) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(other) => Err(type_error(&self.identity, path, "string", &other)),
        }
    }

    /// Write `value` at `path` in the stored tree, creating intermediate
    /// mappings as needed, then persist the tree.
    ///
    /// No validation against the default tree's shape is performed: replacing
    /// a mapping with a scalar (or vice versa) succeeds by replacement. An
    /// empty path replaces the whole stored tree and requires a mapping.
    ///
    /// # Errors
    /// `PlugdockError::SettingsType` when replacing the whole tree with a
    /// non-mapping; `PlugdockError::ConfigurationIo` when the flush fails.
    pub fn set(&self, path: &[&str], value: Value) -> Result<()> {
        let mut stored = write_lock(&self.stored);
        if path.is_empty() {
            let Value::Object(tree) = value else {
                return Err(PlugdockError::SettingsType(format!(
                    "plugin '{}': whole-tree write requires a mapping",
                    self.identity
                )));
            };
            *stored = tree;
        } else {
            insert_at(&mut stored, path, value);
        }
        self.store.save(&self.identity, &stored)
    }

    /// Default save behavior: deep-merge a partial tree into the current
    /// effective configuration, prune values equal to their default, and
    /// persist the result as the new stored tree.
    ///
    /// Idempotent: applying the same partial update twice yields the same
    /// stored tree as applying it once. Saving a freshly loaded tree back is
    /// a no-op.
    pub fn apply_save(&self, data: SettingsTree) -> Result<()> {
        let mut stored = write_lock(&self.stored);
        let effective = merge_with_defaults(&self.defaults, &stored);
        let merged = deep_merge(&effective, &data);
        *stored = prune_defaults(&merged, &self.defaults);
        self.store.save(&self.identity, &stored)
    }
}

fn lookup<'a>(tree: &'a SettingsTree, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let value = tree.get(*first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        Value::Object(sub) => lookup(sub, rest),
        _ => None,
    }
}

fn insert_at(tree: &mut SettingsTree, path: &[&str], value: Value) {
    let (first, rest) = match path.split_first() {
        Some(split) => split,
        None => return,
    };
    if rest.is_empty() {
        tree.insert(first.to_string(), value);
        return;
    }
    // Descend, replacing anything that is not a mapping along the way.
    let entry = tree
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(SettingsTree::new()));
    if !entry.is_object() {
        *entry = Value::Object(SettingsTree::new());
    }
    if let Value::Object(sub) = entry {
        insert_at(sub, rest, value);
    }
}

fn type_error(
    identity: &PluginIdentity,
    path: &[&str],
    wanted: &str,
    value: &Value,
) -> PlugdockError {
    PlugdockError::SettingsType(format!(
        "plugin '{}': cannot read '{}' as {} (found {})",
        identity,
        path.join("."),
        wanted,
        value
    ))
}
