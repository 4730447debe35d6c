//! Capability system for Plugdock
//!
//! A plugin integrates with the host by satisfying **capabilities**: named,
//! independently satisfiable extension interfaces. Capabilities are not a
//! class hierarchy; a plugin may combine any subset of them, and the host
//! decides per instance which ones to engage.
//!
//! # Architecture
//!
//! - **traits**: one trait per capability with documented default behaviors,
//!   plus the [`Plugin`] base trait whose optional accessors are how an
//!   instance opts into each capability
//! - **probe**: the [`Capability`] enum and the structural probe
//!   ([`satisfies`], [`view`], [`capabilities_of`])
//!
//! # Example
//!
//! ```rust
//! use plugdock::capability::{satisfies, Capability, Plugin, StartupHook};
//!
//! struct HelloPlugin;
//!
//! impl StartupHook for HelloPlugin {
//!     fn on_after_startup(&self) {
//!         tracing::info!("hello plugin is up");
//!     }
//! }
//!
//! impl Plugin for HelloPlugin {
//!     fn startup(&self) -> Option<&dyn StartupHook> {
//!         Some(self)
//!     }
//! }
//!
//! let plugin = HelloPlugin;
//! assert!(satisfies(&plugin, Capability::Startup));
//! assert!(!satisfies(&plugin, Capability::Settings));
//! ```

mod probe;
mod traits;

pub use probe::{capabilities_of, satisfies, view, Capability, CapabilityView};
pub use traits::{
    AppExtension, AssetProvider, EventHandler, Plugin, ProgressListener, RouteProvider,
    SettingsHook, ShutdownHook, SimpleApi, SlicerHook, SlicerProperties, StartupHook,
    TemplateProvider,
};
