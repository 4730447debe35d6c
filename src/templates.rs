//! Template slot resolution for Plugdock
//!
//! Plugins inject UI components through typed slots: navbar entries, sidebar
//! sections, tabs, settings panes, and generic page fragments. A plugin
//! declares zero or more partial slot configurations (raw mappings with a
//! mandatory `type` field); [`resolve_slots`] turns them into fully
//! defaulted [`SlotDescriptor`]s:
//!
//! - template file names default to `<identity>_<type>.tmpl`
//!   (`<identity>.tmpl` for generic slots);
//! - element-ID suffixes are made unique per slot type in declaration order;
//! - generic `classes`/`styles` lists seed every visual sub-element of the
//!   slot, with sub-element-specific lists appended after them;
//! - a slot type with no explicit configuration but a template file matching
//!   its default name gets a single implicit all-defaults descriptor.
//!
//! Turning resolved descriptors into markup is the [`TemplateRenderer`]
//! collaborator's job.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PlugdockError, Result};
use crate::identity::PluginIdentity;

// ---------------------------------------------------------------------------
// Slot kinds and sub-elements
// ---------------------------------------------------------------------------

/// The injection points a plugin may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Navbar,
    Sidebar,
    Tab,
    Settings,
    Generic,
}

impl SlotKind {
    /// All kinds, in the order implicit descriptors are synthesized.
    pub fn all() -> [SlotKind; 5] {
        [
            SlotKind::Navbar,
            SlotKind::Sidebar,
            SlotKind::Tab,
            SlotKind::Settings,
            SlotKind::Generic,
        ]
    }

    /// The visual sub-elements styling applies to for this kind.
    pub fn sub_elements(&self) -> &'static [SubElement] {
        match self {
            SlotKind::Navbar => &[SubElement::Entry],
            SlotKind::Sidebar => &[SubElement::Wrapper, SubElement::Content],
            SlotKind::Tab | SlotKind::Settings => &[SubElement::Link, SubElement::Content],
            SlotKind::Generic => &[],
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotKind::Navbar => "navbar",
            SlotKind::Sidebar => "sidebar",
            SlotKind::Tab => "tab",
            SlotKind::Settings => "settings",
            SlotKind::Generic => "generic",
        };
        f.write_str(s)
    }
}

impl FromStr for SlotKind {
    type Err = PlugdockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "navbar" => Ok(SlotKind::Navbar),
            "sidebar" => Ok(SlotKind::Sidebar),
            "tab" => Ok(SlotKind::Tab),
            "settings" => Ok(SlotKind::Settings),
            "generic" => Ok(SlotKind::Generic),
            other => Err(PlugdockError::UnknownSlotType(other.to_string())),
        }
    }
}

/// A visual sub-element of a slot that class and style lists attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubElement {
    /// The single element of a navbar entry.
    Entry,
    /// The wrapper around a sidebar box.
    Wrapper,
    /// The content pane of a sidebar, tab, or settings slot.
    Content,
    /// The navigation link of a tab or settings slot.
    Link,
}

/// Class and style declaration lists for one sub-element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementAttrs {
    /// CSS class names, declaration order preserved, no de-duplication.
    pub classes: Vec<String>,
    /// CSS style declarations (e.g. `color: red`), order preserved.
    pub styles: Vec<String>,
}

// ---------------------------------------------------------------------------
// Plugin-declared configuration
// ---------------------------------------------------------------------------

/// The raw shape a plugin declares one slot with. Everything except `type`
/// is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawSlotConfig {
    #[serde(rename = "type")]
    kind: Option<String>,
    template: Option<String>,
    name: Option<String>,
    icon: Option<String>,
    suffix: Option<String>,
    custom_bindings: Option<bool>,
    data_bind: Option<String>,
    template_header: Option<String>,
    classes: Vec<String>,
    classes_wrapper: Vec<String>,
    classes_content: Vec<String>,
    classes_link: Vec<String>,
    styles: Vec<String>,
    styles_wrapper: Vec<String>,
    styles_content: Vec<String>,
    styles_link: Vec<String>,
}

/// A validated partial slot configuration.
#[derive(Debug, Clone)]
pub struct SlotConfig {
    /// The targeted injection point.
    pub kind: SlotKind,
    /// Template file override; defaults per kind when unset.
    pub template: Option<String>,
    /// Display name; falls back to the plugin's name, then its identity.
    pub name: Option<String>,
    /// Icon name for sidebar headers.
    pub icon: Option<String>,
    /// Explicit element-ID suffix; always wins over the generated one.
    pub suffix: Option<String>,
    /// Whether the plugin binds its own view model (default) or wants the
    /// host's default binding.
    pub custom_bindings: bool,
    /// Additional data-binding expression for the slot container.
    pub data_bind: Option<String>,
    /// Additional template included in the slot's header section.
    pub template_header: Option<String>,
    /// Classes applied to every sub-element.
    pub classes: Vec<String>,
    /// Classes applied only to the wrapper.
    pub classes_wrapper: Vec<String>,
    /// Classes applied only to the content pane.
    pub classes_content: Vec<String>,
    /// Classes applied only to the navigation link.
    pub classes_link: Vec<String>,
    /// Styles applied to every sub-element.
    pub styles: Vec<String>,
    /// Styles applied only to the wrapper.
    pub styles_wrapper: Vec<String>,
    /// Styles applied only to the content pane.
    pub styles_content: Vec<String>,
    /// Styles applied only to the navigation link.
    pub styles_link: Vec<String>,
}

impl SlotConfig {
    /// An all-defaults configuration for the given kind.
    pub fn new(kind: SlotKind) -> Self {
        Self {
            kind,
            template: None,
            name: None,
            icon: None,
            suffix: None,
            custom_bindings: true,
            data_bind: None,
            template_header: None,
            classes: Vec::new(),
            classes_wrapper: Vec::new(),
            classes_content: Vec::new(),
            classes_link: Vec::new(),
            styles: Vec::new(),
            styles_wrapper: Vec::new(),
            styles_content: Vec::new(),
            styles_link: Vec::new(),
        }
    }

    /// Parse a plugin-declared raw mapping.
    ///
    /// # Errors
    /// `PlugdockError::UnknownSlotType` when `type` is missing or not one of
    /// the recognized slot kinds.
    pub fn from_value(value: &Value) -> Result<Self> {
        let raw: RawSlotConfig = serde_json::from_value(value.clone())?;
        let kind = match raw.kind {
            Some(kind) => SlotKind::from_str(&kind)?,
            None => {
                return Err(PlugdockError::UnknownSlotType(
                    "(missing 'type' field)".to_string(),
                ))
            }
        };
        Ok(Self {
            kind,
            template: raw.template,
            name: raw.name,
            icon: raw.icon,
            suffix: raw.suffix,
            custom_bindings: raw.custom_bindings.unwrap_or(true),
            data_bind: raw.data_bind,
            template_header: raw.template_header,
            classes: raw.classes,
            classes_wrapper: raw.classes_wrapper,
            classes_content: raw.classes_content,
            classes_link: raw.classes_link,
            styles: raw.styles,
            styles_wrapper: raw.styles_wrapper,
            styles_content: raw.styles_content,
            styles_link: raw.styles_link,
        })
    }
}

// ---------------------------------------------------------------------------
// Resolved descriptors
// ---------------------------------------------------------------------------

/// A resolved, fully-defaulted description of one UI injection point.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDescriptor {
    /// The targeted injection point.
    pub kind: SlotKind,
    /// Template file to include.
    pub template: String,
    /// Display name of the slot.
    pub name: String,
    /// Icon for sidebar headers.
    pub icon: Option<String>,
    /// Element-ID suffix; empty for the first slot of a kind.
    pub suffix: String,
    /// Whether the plugin supplies its own view-model binding.
    pub custom_bindings: bool,
    /// Additional data-binding expression.
    pub data_bind: Option<String>,
    /// Additional header template.
    pub template_header: Option<String>,
    /// Merged class/style lists per sub-element.
    pub attrs: BTreeMap<SubElement, ElementAttrs>,
}

impl SlotDescriptor {
    /// The merged attributes for one sub-element, if the kind has it.
    pub fn attrs(&self, element: SubElement) -> Option<&ElementAttrs> {
        self.attrs.get(&element)
    }
}

/// External collaborator that turns resolved descriptors into markup.
pub trait TemplateRenderer {
    /// Render one descriptor with the given template variables.
    fn render(&self, descriptor: &SlotDescriptor, context: &Map<String, Value>) -> Result<String>;
}

/// The default template file name for a slot kind,
/// `<identity>_<kind>.tmpl` or `<identity>.tmpl` for generic slots.
pub fn default_template_name(identity: &PluginIdentity, kind: SlotKind) -> String {
    match kind {
        SlotKind::Generic => format!("{}.tmpl", identity),
        other => format!("{}_{}.tmpl", identity, other),
    }
}

fn element_attrs(config: &SlotConfig, element: SubElement) -> ElementAttrs {
    let (specific_classes, specific_styles) = match element {
        SubElement::Entry => (&[][..], &[][..]),
        SubElement::Wrapper => (&config.classes_wrapper[..], &config.styles_wrapper[..]),
        SubElement::Content => (&config.classes_content[..], &config.styles_content[..]),
        SubElement::Link => (&config.classes_link[..], &config.styles_link[..]),
    };
    let mut classes = config.classes.clone();
    classes.extend_from_slice(specific_classes);
    let mut styles = config.styles.clone();
    styles.extend_from_slice(specific_styles);
    ElementAttrs { classes, styles }
}

/// Resolve one plugin's declared slot configurations into descriptors.
///
/// `raw_configs` are the plugin's declared partial configurations in
/// declaration order; `known_templates` lists the template file names the
/// plugin exposes (used only to synthesize implicit descriptors for kinds
/// with no explicit configuration).
///
/// # Errors
/// `PlugdockError::UnknownSlotType` aborts resolution for this plugin's slot
/// list only, never the whole host.
pub fn resolve_slots(
    identity: &PluginIdentity,
    display_name: Option<&str>,
    raw_configs: &[Value],
    known_templates: &[String],
) -> Result<Vec<SlotDescriptor>> {
    let configs = raw_configs
        .iter()
        .map(SlotConfig::from_value)
        .collect::<Result<Vec<_>>>()?;

    let fallback_name = display_name.unwrap_or_else(|| identity.as_str());
    let mut counters: BTreeMap<SlotKind, usize> = BTreeMap::new();
    let mut descriptors = Vec::with_capacity(configs.len());

    for config in &configs {
        let index = counters.entry(config.kind).or_insert(0);
        *index += 1;
        descriptors.push(resolve_one(identity, fallback_name, config, *index));
    }

    // A kind with zero explicit configurations but a template file matching
    // its default name gets one implicit all-defaults descriptor.
    for kind in SlotKind::all() {
        if counters.contains_key(&kind) {
            continue;
        }
        let default_template = default_template_name(identity, kind);
        if known_templates.iter().any(|t| *t == default_template) {
            debug!(
                plugin = %identity,
                slot_type = %kind,
                template = %default_template,
                "Synthesizing implicit slot descriptor"
            );
            descriptors.push(resolve_one(identity, fallback_name, &SlotConfig::new(kind), 1));
        }
    }

    Ok(descriptors)
}

fn resolve_one(
    identity: &PluginIdentity,
    fallback_name: &str,
    config: &SlotConfig,
    index: usize,
) -> SlotDescriptor {
    let suffix = match &config.suffix {
        Some(explicit) => explicit.clone(),
        None if index > 1 => format!("_{}", index),
        None => String::new(),
    };
    let attrs = config
        .kind
        .sub_elements()
        .iter()
        .map(|element| (*element, element_attrs(config, *element)))
        .collect();
    SlotDescriptor {
        kind: config.kind,
        template: config
            .template
            .clone()
            .unwrap_or_else(|| default_template_name(identity, config.kind)),
        name: config.name.clone().unwrap_or_else(|| fallback_name.to_string()),
        icon: config.icon.clone(),
        suffix,
        custom_bindings: config.custom_bindings,
        data_bind: config.data_bind.clone(),
        template_header: config.template_header.clone(),
        attrs,
    }
}
