//! Plugin activation and host-side bookkeeping for Plugdock
//!
//! The external plugin loader constructs plugin instances, assigns each a
//! unique identity, and hands them to [`PluginHost::activate`] exactly once
//! per load. Activation probes the instance's capabilities and runs the
//! per-capability resolvers: settings, route table, template slots, assets.
//! Everything produced is discarded wholesale on deactivation; only the
//! stored settings tree survives, inside the external [`ConfigStore`].
//!
//! Every activation failure is scoped to its plugin: the batch helper logs
//! and continues, so one broken plugin never takes down the rest of the
//! host.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::assets::AssetIndex;
use crate::capability::{capabilities_of, Capability, Plugin};
use crate::error::{PlugdockError, Result};
use crate::identity::PluginIdentity;
use crate::routes::{build_route_table, ApiRequest, HttpMount, RouteTable};
use crate::settings::{ConfigStore, MemoryConfigStore, PluginSettings, SettingsTree};
use crate::templates::{resolve_slots, SlotDescriptor};

/// Everything the loader supplies for one plugin activation.
pub struct PluginActivation {
    /// The unique identity assigned to this plugin.
    pub identity: PluginIdentity,
    /// The constructed plugin instance.
    pub plugin: Arc<dyn Plugin>,
    /// The plugin's base directory, used to compute default asset and
    /// template folders.
    pub base_dir: PathBuf,
    /// Template file names the plugin exposes, used to synthesize implicit
    /// slot descriptors. Scanning the folder is the loader's job.
    pub known_templates: Vec<String>,
}

/// The per-plugin state produced by activation.
///
/// Lives for the plugin's process lifetime and is discarded wholesale on
/// deactivation.
pub struct ActivatedPlugin {
    /// The plugin's unique identity.
    pub identity: PluginIdentity,
    /// The plugin instance itself.
    pub plugin: Arc<dyn Plugin>,
    /// Capabilities the instance satisfied at activation time.
    pub capabilities: Vec<Capability>,
    /// The plugin's base directory.
    pub base_dir: PathBuf,
    /// Settings resolver, present for settings-capable plugins.
    pub settings: Option<Arc<PluginSettings>>,
    /// Built route table, present for route-capable plugins.
    pub route_table: Option<RouteTable>,
    /// Resolved template slot descriptors, empty for plugins without the
    /// template capability.
    pub slots: Vec<SlotDescriptor>,
    /// Template variables re-keyed with the plugin's variable prefix.
    pub template_vars: SettingsTree,
}

impl ActivatedPlugin {
    /// The plugin's display name, falling back to its identity.
    pub fn display_name(&self) -> &str {
        self.plugin.name().unwrap_or_else(|| self.identity.as_str())
    }
}

/// Registry of activated plugins and the activation entry point.
pub struct PluginHost {
    plugins: HashMap<String, ActivatedPlugin>,
    store: Arc<dyn ConfigStore>,
    assets: AssetIndex,
}

impl PluginHost {
    /// Create a host backed by the given configuration store.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            plugins: HashMap::new(),
            store,
            assets: AssetIndex::new(),
        }
    }

    /// Create a host with a purely in-memory configuration store.
    pub fn with_memory_store() -> Self {
        Self::new(Arc::new(MemoryConfigStore::new()))
    }

    /// Activate one plugin. Called exactly once per load cycle; activating
    /// an identity again replaces the previous records wholesale (reload).
    ///
    /// # Errors
    /// Any per-plugin failure (`RouteBuild`, `UnknownSlotType`,
    /// `ConfigurationIo`). The host map stays unchanged for this identity on
    /// failure; other plugins are never affected.
    pub fn activate(&mut self, activation: PluginActivation) -> Result<()> {
        let PluginActivation {
            identity,
            plugin,
            base_dir,
            known_templates,
        } = activation;

        if self.plugins.contains_key(identity.as_str()) {
            warn!(plugin = %identity, "Identity already active, replacing records");
        }

        let capabilities = capabilities_of(plugin.as_ref());

        let settings = match plugin.settings() {
            Some(hook) => Some(Arc::new(PluginSettings::new(
                identity.clone(),
                hook.settings_defaults(),
                Arc::clone(&self.store),
            )?)),
            None => None,
        };

        let route_table = match plugin.routes() {
            Some(provider) => Some(build_route_table(&identity, provider)?),
            None => None,
        };

        let (slots, template_vars) = match plugin.templates() {
            Some(provider) => {
                // An unrecognized slot type costs the plugin its slot list,
                // not its activation.
                let slots = match resolve_slots(
                    &identity,
                    plugin.name(),
                    &provider.template_configs(),
                    &known_templates,
                ) {
                    Ok(slots) => slots,
                    Err(PlugdockError::UnknownSlotType(slot_type)) => {
                        warn!(
                            plugin = %identity,
                            slot_type = %slot_type,
                            "Unknown template slot type, dropping slot list"
                        );
                        Vec::new()
                    }
                    Err(other) => return Err(other),
                };
                let prefix = identity.template_var_prefix();
                let template_vars = provider
                    .template_vars()
                    .into_iter()
                    .map(|(key, value)| (format!("{}{}", prefix, key), value))
                    .collect();
                (slots, template_vars)
            }
            None => (Vec::new(), SettingsTree::new()),
        };

        if let Some(provider) = plugin.assets() {
            self.assets.insert(
                &identity,
                provider.assets(),
                provider.asset_folder(&base_dir),
            );
        }

        info!(
            plugin = %identity,
            capabilities = capabilities.len(),
            routes = route_table.as_ref().map(|t| t.routes.len()).unwrap_or(0),
            slots = slots.len(),
            "Activated plugin"
        );

        self.plugins.insert(
            identity.as_str().to_string(),
            ActivatedPlugin {
                identity,
                plugin,
                capabilities,
                base_dir,
                settings,
                route_table,
                slots,
                template_vars,
            },
        );
        Ok(())
    }

    /// Activate a batch of plugins, logging and skipping the ones that fail.
    /// Returns the per-plugin outcomes; a failure never aborts the batch.
    pub fn activate_all(
        &mut self,
        batch: Vec<PluginActivation>,
    ) -> Vec<(PluginIdentity, Result<()>)> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for activation in batch {
            let identity = activation.identity.clone();
            let outcome = self.activate(activation);
            if let Err(error) = &outcome {
                warn!(plugin = %identity, error = %error, "Failed to activate plugin, skipping");
            }
            outcomes.push((identity, outcome));
        }
        outcomes
    }

    /// Deactivate a plugin: run its shutdown hook and discard all records.
    /// Returns whether the identity was active.
    pub fn deactivate(&mut self, identity: &PluginIdentity) -> bool {
        let Some(activated) = self.plugins.remove(identity.as_str()) else {
            return false;
        };
        if let Some(hook) = activated.plugin.shutdown() {
            hook.on_shutdown();
        }
        self.assets.remove(identity);
        info!(plugin = %identity, "Deactivated plugin");
        true
    }

    // ---- lifecycle fan-out ----

    /// Notify startup-capable plugins that the server is about to launch.
    pub fn startup(&self, host: &str, port: u16) {
        for activated in self.plugins.values() {
            if let Some(hook) = activated.plugin.startup() {
                debug!(plugin = %activated.identity, "Running startup hook");
                hook.on_startup(host, port);
            }
        }
    }

    /// Notify startup-capable plugins that the listen loop is running.
    pub fn after_startup(&self) {
        for activated in self.plugins.values() {
            if let Some(hook) = activated.plugin.startup() {
                hook.on_after_startup();
            }
        }
    }

    /// Notify shutdown-capable plugins of the imminent shutdown.
    pub fn shutdown(&self) {
        for activated in self.plugins.values() {
            if let Some(hook) = activated.plugin.shutdown() {
                debug!(plugin = %activated.identity, "Running shutdown hook");
                hook.on_shutdown();
            }
        }
    }

    /// Dispatch a host event to every event-capable plugin.
    pub fn dispatch_event(&self, event: &str, payload: &Value) {
        for activated in self.plugins.values() {
            if let Some(handler) = activated.plugin.events() {
                handler.on_event(event, payload);
            }
        }
    }

    /// Report print progress to every progress-capable plugin.
    pub fn report_print_progress(&self, storage: &str, path: &str, progress: u8) {
        for activated in self.plugins.values() {
            if let Some(listener) = activated.plugin.progress() {
                listener.on_print_progress(storage, path, progress);
            }
        }
    }

    /// Report slicing progress to every progress-capable plugin.
    pub fn report_slicing_progress(
        &self,
        slicer: &str,
        source_path: &str,
        destination_path: &str,
        progress: u8,
    ) {
        for activated in self.plugins.values() {
            if let Some(listener) = activated.plugin.progress() {
                listener.on_slicing_progress(slicer, source_path, destination_path, progress);
            }
        }
    }

    // ---- HTTP ----

    /// Hand every built route table to the mount point. The host never
    /// talks to the network layer itself.
    pub fn mount_all(&self, mount: &mut dyn HttpMount) {
        for activated in self.plugins.values() {
            if let Some(table) = &activated.route_table {
                mount.mount(&table.namespace, &table.routes);
            }
        }
    }

    /// Dispatch a simple API command to one plugin. `Ok(None)` means the
    /// plugin did not handle the command.
    ///
    /// # Errors
    /// `PlugdockError::UnsupportedCapability` when the identity is unknown
    /// or the plugin has no simple-API capability.
    pub fn dispatch_api_command(
        &self,
        identity: &PluginIdentity,
        command: &str,
        data: &Value,
    ) -> Result<Option<Value>> {
        let api = self.simple_api(identity)?;
        Ok(api.on_api_command(command, data))
    }

    /// Dispatch a simple API GET request to one plugin.
    pub fn dispatch_api_get(
        &self,
        identity: &PluginIdentity,
        request: &ApiRequest,
    ) -> Result<Option<Value>> {
        let api = self.simple_api(identity)?;
        Ok(api.on_api_get(request))
    }

    fn simple_api(&self, identity: &PluginIdentity) -> Result<&dyn crate::capability::SimpleApi> {
        self.plugins
            .get(identity.as_str())
            .and_then(|activated| activated.plugin.simple_api())
            .ok_or_else(|| {
                PlugdockError::UnsupportedCapability(format!(
                    "plugin '{}' does not handle simple API requests",
                    identity
                ))
            })
    }

    // ---- lookups ----

    /// The activation record for an identity, if active.
    pub fn get(&self, identity: &PluginIdentity) -> Option<&ActivatedPlugin> {
        self.plugins.get(identity.as_str())
    }

    /// The settings resolver for an identity, if any.
    pub fn settings_for(&self, identity: &PluginIdentity) -> Option<Arc<PluginSettings>> {
        self.get(identity).and_then(|a| a.settings.clone())
    }

    /// The built route table for an identity, if any.
    pub fn routes_for(&self, identity: &PluginIdentity) -> Option<&RouteTable> {
        self.get(identity).and_then(|a| a.route_table.as_ref())
    }

    /// The resolved slot descriptors for an identity.
    pub fn slots_for(&self, identity: &PluginIdentity) -> &[SlotDescriptor] {
        self.get(identity).map(|a| a.slots.as_slice()).unwrap_or(&[])
    }

    /// The asset lookup table.
    pub fn asset_index(&self) -> &AssetIndex {
        &self.assets
    }

    /// Identities of all active plugins.
    pub fn identities(&self) -> Vec<&PluginIdentity> {
        self.plugins.values().map(|a| &a.identity).collect()
    }

    /// Number of active plugins.
    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is active.
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
