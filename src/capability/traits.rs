//! Capability traits and the plugin base trait.
//!
//! Each capability is a standalone trait with default method bodies, so a
//! plugin that opts in does not have to override every operation: merely not
//! overriding one still counts as satisfying the capability, because a
//! usable default exists. Opting in happens on the [`Plugin`] base trait by
//! overriding the capability's accessor to return `Some(self)`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assets::AssetBundle;
use crate::error::{PlugdockError, Result};
use crate::identity::PluginIdentity;
use crate::routes::{ApiRequest, Handler, RouteDeclarations, RouteTable};
use crate::settings::{PluginSettings, SettingsTree};

// ---------------------------------------------------------------------------
// Lifecycle capabilities
// ---------------------------------------------------------------------------

/// Hook into host startup, e.g. to start additional services.
pub trait StartupHook {
    /// Called just before the server launches. `host` may be `0.0.0.0`, so
    /// it cannot blindly be used to construct publicly reachable URLs. The
    /// plugin's own routes are not reachable yet at this point.
    fn on_startup(&self, _host: &str, _port: u16) {}

    /// Called once the server's listen loop is actually running.
    fn on_after_startup(&self) {}
}

/// Hook into host shutdown, usually to tear down what [`StartupHook`]
/// started.
pub trait ShutdownHook {
    /// Called upon imminent shutdown of the host.
    fn on_shutdown(&self) {}
}

/// React to host events.
pub trait EventHandler {
    /// Called for every dispatched host event.
    fn on_event(&self, _event: &str, _payload: &Value) {}
}

/// Receive progress reports for running print and slicing jobs, in minimally
/// 1% steps.
pub trait ProgressListener {
    /// Progress of a running print job, `progress` between 0 and 100.
    fn on_print_progress(&self, _storage: &str, _path: &str, _progress: u8) {}

    /// Progress of a running slicing job, `progress` between 0 and 100.
    fn on_slicing_progress(
        &self,
        _slicer: &str,
        _source_path: &str,
        _destination_path: &str,
        _progress: u8,
    ) {
    }
}

// ---------------------------------------------------------------------------
// Asset and template capabilities
// ---------------------------------------------------------------------------

/// Publish static assets (Javascript, CSS, LESS) to be embedded into pages
/// delivered by the host.
pub trait AssetProvider {
    /// Folder the plugin stores its static assets in. Defaults to the
    /// `static` subfolder of the plugin's base directory.
    fn asset_folder(&self, base: &Path) -> PathBuf {
        base.join("static")
    }

    /// The assets the plugin offers, as paths relative to
    /// [`AssetProvider::asset_folder`]. Defaults to none.
    fn assets(&self) -> AssetBundle {
        AssetBundle::default()
    }
}

/// Inject UI components into the host's web interface.
pub trait TemplateProvider {
    /// The plugin's declared slot configurations, one raw mapping per slot
    /// with a mandatory `type` field. Defaults to none, in which case a
    /// single implicit slot per type may still be synthesized from template
    /// files matching the default names.
    fn template_configs(&self) -> Vec<Value> {
        Vec::new()
    }

    /// Additional template variables for the rendering engine. Variable
    /// names get prefixed with `plugin_<identity>_`. Defaults to none.
    fn template_vars(&self) -> SettingsTree {
        SettingsTree::new()
    }

    /// Folder the plugin stores its templates in. Defaults to the
    /// `templates` subfolder of the plugin's base directory.
    fn template_folder(&self, base: &Path) -> PathBuf {
        base.join("templates")
    }
}

// ---------------------------------------------------------------------------
// HTTP capabilities
// ---------------------------------------------------------------------------

/// Answer simple API commands without a full route table.
pub trait SimpleApi {
    /// The commands this plugin accepts, mapping command name to its
    /// required parameter names. `None` means no commands.
    fn api_commands(&self) -> Option<SettingsTree> {
        None
    }

    /// Handle an API command. `None` means "not handled".
    fn on_api_command(&self, _command: &str, _data: &Value) -> Option<Value> {
        None
    }

    /// Handle a plain API GET request. `None` means "not handled".
    fn on_api_get(&self, _request: &ApiRequest) -> Option<Value> {
        None
    }
}

/// Declare full-fledged HTTP endpoints, mounted under
/// `/plugin/<identity>/`.
pub trait RouteProvider {
    /// Declaration phase: record this plugin's route declarations. Runs
    /// before and independent of the build pass. Defaults to declaring
    /// nothing.
    fn declare_routes(&self, _routes: &mut RouteDeclarations) {}

    /// Resolve an operation name to its handler. `None` marks the operation
    /// as gone; declarations referring to it are skipped during the build.
    fn handler(&self, _operation: &str) -> Option<Handler> {
        None
    }

    /// Override to bypass the builder entirely and supply a fully custom
    /// table. Called once per activation.
    fn custom_route_table(&self, _identity: &PluginIdentity) -> Option<RouteTable> {
        None
    }

    /// Whether a valid API key is needed to access the plugin's routes.
    /// Enforcement lives outside this core.
    fn is_protected(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Settings capability
// ---------------------------------------------------------------------------

/// Store and retrieve plugin settings within the host's configuration.
pub trait SettingsHook {
    /// The plugin's default settings tree; its shape is the schema the
    /// stored overrides are merged against. Supplied once at registration.
    fn settings_defaults(&self) -> SettingsTree {
        SettingsTree::new()
    }

    /// Load the plugin's settings. The default implementation returns the
    /// full effective configuration (stored merged with defaults). Override
    /// to inject additional properties not held in the host configuration.
    fn on_settings_load(&self, settings: &PluginSettings) -> Result<SettingsTree> {
        Ok(settings.effective())
    }

    /// Save a partial settings tree. The default implementation deep-merges
    /// `data` into the current effective tree and persists the result as the
    /// new stored tree. Override to react to settings changes on the fly.
    fn on_settings_save(&self, settings: &PluginSettings, data: SettingsTree) -> Result<()> {
        settings.apply_save(data)
    }
}

// ---------------------------------------------------------------------------
// Slicer and app capabilities
// ---------------------------------------------------------------------------

/// Properties describing a slicer implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicerProperties {
    /// Slicer type key, `None` while unconfigured.
    pub slicer_type: Option<String>,
    /// Human-readable slicer name.
    pub name: Option<String>,
    /// Whether slicing runs on the same device as the host.
    pub same_device: bool,
    /// Whether the slicer reports slicing progress.
    pub progress_report: bool,
}

impl Default for SlicerProperties {
    fn default() -> Self {
        Self {
            slicer_type: None,
            name: None,
            same_device: true,
            progress_report: false,
        }
    }
}

/// Integrate a slicer backend. All defaults report "unconfigured".
pub trait SlicerHook {
    /// Whether the slicer is configured and ready for use.
    fn is_configured(&self) -> bool {
        false
    }

    /// The slicer's properties. Defaults to unconfigured.
    fn properties(&self) -> SlicerProperties {
        SlicerProperties::default()
    }

    /// The options supported in slicing profiles, `None` when unsupported.
    fn profile_options(&self) -> Option<Value> {
        None
    }

    /// The slicer's default profile, `None` when unsupported.
    fn default_profile(&self) -> Option<Value> {
        None
    }

    /// Read a slicing profile from `path`. Defaults to unsupported.
    fn read_profile(&self, _path: &Path) -> Result<Value> {
        Err(PlugdockError::UnsupportedCapability(
            "slicer does not support reading profiles".to_string(),
        ))
    }

    /// Persist a slicing profile to `path`, overwriting any existing one.
    /// Defaults to unsupported.
    fn save_profile(&self, _path: &Path, _profile: &Value) -> Result<()> {
        Err(PlugdockError::UnsupportedCapability(
            "slicer does not support saving profiles".to_string(),
        ))
    }

    /// Slice `source_path` into machine code at `destination_path`, using
    /// the profile at `profile_path` when given. Defaults to unsupported.
    fn slice(
        &self,
        _source_path: &str,
        _destination_path: &str,
        _profile_path: Option<&str>,
    ) -> Result<()> {
        Err(PlugdockError::UnsupportedCapability(
            "slicer does not support slicing jobs".to_string(),
        ))
    }

    /// Cancel the slicing job producing `destination_path`. Default no-op.
    fn cancel_slicing(&self, _destination_path: &str) {}
}

/// Contribute additional companion-app definitions.
pub trait AppExtension {
    /// Additional app descriptors to expose. Defaults to none.
    fn additional_apps(&self) -> Vec<Value> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Plugin base trait
// ---------------------------------------------------------------------------

/// The base trait every plugin instance implements.
///
/// Each accessor opts the instance into one capability by returning
/// `Some(self)`; the default `None` means "does not participate". The host
/// probes these accessors per instance, so distinct implementations are free
/// to combine arbitrary capability subsets.
pub trait Plugin: Send + Sync {
    /// Human-readable display name. The unique identity is assigned by the
    /// host, not the plugin.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Startup lifecycle capability.
    fn startup(&self) -> Option<&dyn StartupHook> {
        None
    }

    /// Shutdown lifecycle capability.
    fn shutdown(&self) -> Option<&dyn ShutdownHook> {
        None
    }

    /// Static asset capability.
    fn assets(&self) -> Option<&dyn AssetProvider> {
        None
    }

    /// UI template injection capability.
    fn templates(&self) -> Option<&dyn TemplateProvider> {
        None
    }

    /// Simple API capability.
    fn simple_api(&self) -> Option<&dyn SimpleApi> {
        None
    }

    /// HTTP route capability.
    fn routes(&self) -> Option<&dyn RouteProvider> {
        None
    }

    /// Settings capability.
    fn settings(&self) -> Option<&dyn SettingsHook> {
        None
    }

    /// Event handling capability.
    fn events(&self) -> Option<&dyn EventHandler> {
        None
    }

    /// Slicer capability.
    fn slicer(&self) -> Option<&dyn SlicerHook> {
        None
    }

    /// Progress reporting capability.
    fn progress(&self) -> Option<&dyn ProgressListener> {
        None
    }

    /// Companion app capability.
    fn apps(&self) -> Option<&dyn AppExtension> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Defaults;
    impl StartupHook for Defaults {}
    impl ShutdownHook for Defaults {}
    impl AssetProvider for Defaults {}
    impl TemplateProvider for Defaults {}
    impl SimpleApi for Defaults {}
    impl RouteProvider for Defaults {}
    impl EventHandler for Defaults {}
    impl SlicerHook for Defaults {}
    impl ProgressListener for Defaults {}
    impl AppExtension for Defaults {}

    #[test]
    fn test_lifecycle_defaults_are_noops() {
        let plugin = Defaults;
        plugin.on_startup("0.0.0.0", 5000);
        plugin.on_after_startup();
        plugin.on_shutdown();
        plugin.on_event("connected", &json!({}));
        plugin.on_print_progress("local", "model.gcode", 50);
        plugin.on_slicing_progress("engine", "in.stl", "out.gcode", 10);
    }

    #[test]
    fn test_asset_defaults() {
        let plugin = Defaults;
        assert_eq!(
            plugin.asset_folder(Path::new("/plugins/demo")),
            PathBuf::from("/plugins/demo/static")
        );
        assert!(AssetProvider::assets(&plugin).is_empty());
    }

    #[test]
    fn test_template_defaults() {
        let plugin = Defaults;
        assert!(plugin.template_configs().is_empty());
        assert!(plugin.template_vars().is_empty());
        assert_eq!(
            plugin.template_folder(Path::new("/plugins/demo")),
            PathBuf::from("/plugins/demo/templates")
        );
    }

    #[test]
    fn test_simple_api_defaults_not_handled() {
        let plugin = Defaults;
        assert!(plugin.api_commands().is_none());
        assert!(plugin.on_api_command("anything", &json!({})).is_none());
        assert!(plugin.on_api_get(&ApiRequest::default()).is_none());
    }

    #[test]
    fn test_route_defaults() {
        let plugin = Defaults;
        let mut declarations = RouteDeclarations::new();
        plugin.declare_routes(&mut declarations);
        assert!(declarations.is_empty());
        assert!(plugin.handler("anything").is_none());
        assert!(plugin.is_protected());
    }

    #[test]
    fn test_slicer_defaults_unconfigured() {
        let plugin = Defaults;
        assert!(!plugin.is_configured());
        let props = plugin.properties();
        assert!(props.slicer_type.is_none());
        assert!(props.name.is_none());
        assert!(props.same_device);
        assert!(!props.progress_report);
        assert!(plugin.profile_options().is_none());
        assert!(plugin.default_profile().is_none());
    }

    #[test]
    fn test_slicer_lifecycle_defaults_unsupported() {
        let plugin = Defaults;
        assert!(matches!(
            plugin.read_profile(Path::new("/profiles/draft.profile")),
            Err(PlugdockError::UnsupportedCapability(_))
        ));
        assert!(matches!(
            plugin.save_profile(Path::new("/profiles/draft.profile"), &json!({})),
            Err(PlugdockError::UnsupportedCapability(_))
        ));
        assert!(matches!(
            plugin.slice("model.stl", "model.gcode", None),
            Err(PlugdockError::UnsupportedCapability(_))
        ));
        plugin.cancel_slicing("model.gcode");
    }

    #[test]
    fn test_app_defaults_empty() {
        let plugin = Defaults;
        assert!(plugin.additional_apps().is_empty());
    }

    #[test]
    fn test_plugin_base_defaults_opt_out_of_everything() {
        struct Bare;
        impl Plugin for Bare {}
        let plugin = Bare;
        assert!(plugin.name().is_none());
        assert!(plugin.startup().is_none());
        assert!(plugin.shutdown().is_none());
        assert!(Plugin::assets(&plugin).is_none());
        assert!(plugin.templates().is_none());
        assert!(plugin.simple_api().is_none());
        assert!(plugin.routes().is_none());
        assert!(plugin.settings().is_none());
        assert!(plugin.events().is_none());
        assert!(plugin.slicer().is_none());
        assert!(plugin.progress().is_none());
        assert!(plugin.apps().is_none());
    }

    #[test]
    fn test_slicer_properties_serde_defaults() {
        let props: SlicerProperties = serde_json::from_str("{}").unwrap();
        assert!(props.same_device);
        assert!(!props.progress_report);
    }
}
