//! Structural capability probing.
//!
//! Whether a plugin satisfies a capability is decided by probing the
//! instance's accessors, never by a fixed supertype chain. The probe runs
//! per plugin instance and is not cached globally: distinct instances of
//! different implementations may satisfy different capability sets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlugdockError, Result};

use super::traits::{
    AppExtension, AssetProvider, EventHandler, Plugin, ProgressListener, RouteProvider,
    SettingsHook, ShutdownHook, SimpleApi, SlicerHook, StartupHook, TemplateProvider,
};

/// A named, independently satisfiable extension interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Startup,
    Shutdown,
    Asset,
    Template,
    SimpleApi,
    Blueprint,
    Settings,
    EventHandler,
    Slicer,
    Progress,
    App,
}

impl Capability {
    /// All known capabilities, in probe order.
    pub fn all() -> [Capability; 11] {
        [
            Capability::Startup,
            Capability::Shutdown,
            Capability::Asset,
            Capability::Template,
            Capability::SimpleApi,
            Capability::Blueprint,
            Capability::Settings,
            Capability::EventHandler,
            Capability::Slicer,
            Capability::Progress,
            Capability::App,
        ]
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Startup => "startup",
            Capability::Shutdown => "shutdown",
            Capability::Asset => "asset",
            Capability::Template => "template",
            Capability::SimpleApi => "simple_api",
            Capability::Blueprint => "blueprint",
            Capability::Settings => "settings",
            Capability::EventHandler => "event_handler",
            Capability::Slicer => "slicer",
            Capability::Progress => "progress",
            Capability::App => "app",
        };
        f.write_str(s)
    }
}

/// A typed view of one engaged capability.
pub enum CapabilityView<'a> {
    Startup(&'a dyn StartupHook),
    Shutdown(&'a dyn ShutdownHook),
    Asset(&'a dyn AssetProvider),
    Template(&'a dyn TemplateProvider),
    SimpleApi(&'a dyn SimpleApi),
    Blueprint(&'a dyn RouteProvider),
    Settings(&'a dyn SettingsHook),
    EventHandler(&'a dyn EventHandler),
    Slicer(&'a dyn SlicerHook),
    Progress(&'a dyn ProgressListener),
    App(&'a dyn AppExtension),
}

/// Obtain the typed view of a capability on a plugin instance.
///
/// # Errors
/// `PlugdockError::UnsupportedCapability` when the instance does not opt
/// into the capability. Callers should treat this as "plugin does not
/// participate", not as an error to surface.
pub fn view<'a>(plugin: &'a dyn Plugin, capability: Capability) -> Result<CapabilityView<'a>> {
    let probed = match capability {
        Capability::Startup => plugin.startup().map(CapabilityView::Startup),
        Capability::Shutdown => plugin.shutdown().map(CapabilityView::Shutdown),
        Capability::Asset => plugin.assets().map(CapabilityView::Asset),
        Capability::Template => plugin.templates().map(CapabilityView::Template),
        Capability::SimpleApi => plugin.simple_api().map(CapabilityView::SimpleApi),
        Capability::Blueprint => plugin.routes().map(CapabilityView::Blueprint),
        Capability::Settings => plugin.settings().map(CapabilityView::Settings),
        Capability::EventHandler => plugin.events().map(CapabilityView::EventHandler),
        Capability::Slicer => plugin.slicer().map(CapabilityView::Slicer),
        Capability::Progress => plugin.progress().map(CapabilityView::Progress),
        Capability::App => plugin.apps().map(CapabilityView::App),
    };
    probed.ok_or_else(|| {
        PlugdockError::UnsupportedCapability(format!(
            "plugin '{}' does not implement capability '{}'",
            plugin.name().unwrap_or("<unnamed>"),
            capability
        ))
    })
}

/// Whether the plugin instance satisfies a capability.
pub fn satisfies(plugin: &dyn Plugin, capability: Capability) -> bool {
    view(plugin, capability).is_ok()
}

/// All capabilities the plugin instance satisfies, in probe order.
/// Stable across repeated calls absent plugin reconfiguration.
pub fn capabilities_of(plugin: &dyn Plugin) -> Vec<Capability> {
    Capability::all()
        .into_iter()
        .filter(|capability| satisfies(plugin, *capability))
        .collect()
}
