//! Route declaration and table building for Plugdock
//!
//! Plugins declare HTTP routes in a registration phase that runs before and
//! independent of any build pass: each declaration associates a URL pattern
//! and an options map with the *name* of the declaring operation, collected
//! in a [`RouteDeclarations`] registry. A later, pure build step
//! ([`build_route_table`]) resolves the declarations against the plugin
//! instance and produces an immutable [`RouteTable`] namespaced by the
//! plugin's identity.
//!
//! The builder performs no I/O and never talks to the network layer; mounting
//! the produced table is the [`HttpMount`] collaborator's responsibility.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::capability::RouteProvider;
use crate::error::{PlugdockError, Result};
use crate::identity::PluginIdentity;

// ---------------------------------------------------------------------------
// HTTP primitives
// ---------------------------------------------------------------------------

/// HTTP methods a route declaration may allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Default for Method {
    fn default() -> Self {
        Method::Get
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        };
        f.write_str(s)
    }
}

/// A minimal request carrier handed to route and simple-API handlers.
///
/// The actual HTTP server lives outside this core; it is expected to
/// translate its own request type into this one before invoking a handler.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    /// Request path relative to the plugin's namespace.
    pub path: String,
    /// HTTP method of the request.
    pub method: Method,
    /// Query string parameters.
    pub query: HashMap<String, String>,
    /// Parsed JSON body, `Value::Null` when absent.
    pub body: Value,
}

/// A minimal response carrier returned by route handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON response body.
    pub body: Value,
}

impl ApiResponse {
    /// A `200 OK` response with the given body.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// A response with the given status and an empty body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Value::Null,
        }
    }
}

/// A shared, callable handler bound to a route.
///
/// Multiple [`RouteDescriptor`]s may share one handler (the same operation
/// declared at several paths).
pub type Handler = Arc<dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync>;

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Options attached to a single route declaration.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    /// Explicit endpoint name. Defaults to the declaring operation's name.
    pub endpoint: Option<String>,
    /// Allowed HTTP methods. Empty means `GET` only.
    pub methods: Vec<Method>,
    /// Auxiliary options passed through to the mount point untouched.
    pub extras: Map<String, Value>,
}

impl RouteOptions {
    /// Options allowing only the given methods.
    pub fn methods(methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Override the generated endpoint name.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// The effective method set: declared methods, or `GET` when none given.
    pub fn effective_methods(&self) -> Vec<Method> {
        if self.methods.is_empty() {
            vec![Method::Get]
        } else {
            self.methods.clone()
        }
    }
}

/// Ordered registry of route declarations, keyed by operation name.
///
/// Declarations are recorded in registration order; a single operation may
/// carry multiple declarations (e.g. the same handler for GET at `/a` and
/// POST at `/b`). The registry is populated during the declaration phase and
/// consumed read-only by [`build_route_table`].
#[derive(Debug, Clone, Default)]
pub struct RouteDeclarations {
    entries: Vec<(String, String, RouteOptions)>,
}

impl RouteDeclarations {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a route: `operation` is the name of the handling operation,
    /// `pattern` the URL pattern relative to the plugin's namespace.
    pub fn route(&mut self, operation: &str, pattern: &str, options: RouteOptions) -> &mut Self {
        self.entries
            .push((operation.to_string(), pattern.to_string(), options));
        self
    }

    /// Number of recorded declarations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no declarations have been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate declarations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &RouteOptions)> {
        self.entries
            .iter()
            .map(|(op, pattern, options)| (op.as_str(), pattern.as_str(), options))
    }
}

// ---------------------------------------------------------------------------
// Built table
// ---------------------------------------------------------------------------

/// A resolved (pattern, methods, handler, endpoint-name) registration unit.
///
/// Built once per plugin activation, never mutated afterwards, and rebuilt
/// wholesale on plugin reload.
#[derive(Clone)]
pub struct RouteDescriptor {
    /// Full URL pattern including the plugin namespace prefix.
    pub pattern: String,
    /// Allowed HTTP methods.
    pub methods: Vec<Method>,
    /// Handler shared by every declaration of the originating operation.
    pub handler: Handler,
    /// Fully qualified endpoint name, e.g. `plugin.demo.echo`.
    pub endpoint: String,
    /// Auxiliary options passed through from the declaration.
    pub extras: Map<String, Value>,
    /// Name of the operation the declaration was attached to.
    pub operation: String,
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("endpoint", &self.endpoint)
            .field("operation", &self.operation)
            .finish()
    }
}

/// The per-plugin routing table produced by [`build_route_table`].
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// URL namespace all routes are mounted under, e.g. `/plugin/demo`.
    pub namespace: String,
    /// Whether the mount point should require a valid API key.
    pub protected: bool,
    /// Resolved routes in declaration order.
    pub routes: Vec<RouteDescriptor>,
}

/// External collaborator that mounts built route tables onto a live server.
pub trait HttpMount {
    /// Mount the given routes under the namespace. The builder guarantees
    /// namespaces of distinct plugins never collide.
    fn mount(&mut self, namespace: &str, routes: &[RouteDescriptor]);
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

// Method lists are compared as sets: declaration order never makes two
// otherwise identical routes distinct.
fn same_method_set(a: &[Method], b: &[Method]) -> bool {
    a.len() == b.len()
        && a.iter().all(|m| b.contains(m))
        && b.iter().all(|m| a.contains(m))
}

fn join_pattern(prefix: &str, pattern: &str) -> String {
    let trimmed = pattern.trim_start_matches('/');
    if trimmed.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, trimmed)
    }
}

/// Build the routing table for one plugin.
///
/// Runs exactly once per plugin activation. Collects the plugin's route
/// declarations and resolves each against the instance:
///
/// - operations whose name starts with `_` are private by convention and
///   skipped;
/// - declarations referring to operations the instance no longer resolves a
///   handler for are skipped with a warning;
/// - the endpoint name defaults to the operation's own name when the options
///   do not supply one;
/// - a repeated (pattern, methods, endpoint) triple from the *same* operation
///   replaces the earlier entry (override by re-declaration); the same triple
///   from a *different* operation fails the build for this plugin.
///
/// A plugin may bypass the builder entirely by returning a table from
/// [`RouteProvider::custom_route_table`].
///
/// # Errors
/// `PlugdockError::RouteBuild` on a duplicate declaration; fails this
/// plugin's activation only.
pub fn build_route_table(
    identity: &PluginIdentity,
    provider: &dyn RouteProvider,
) -> Result<RouteTable> {
    if let Some(table) = provider.custom_route_table(identity) {
        debug!(plugin = %identity, routes = table.routes.len(), "Plugin supplied a custom route table");
        return Ok(table);
    }

    let mut declarations = RouteDeclarations::new();
    provider.declare_routes(&mut declarations);

    let prefix = identity.route_prefix();
    let endpoint_prefix = identity.endpoint_prefix();
    let mut routes: Vec<RouteDescriptor> = Vec::new();

    for (operation, pattern, options) in declarations.iter() {
        if operation.starts_with('_') {
            debug!(plugin = %identity, operation, "Skipping private operation");
            continue;
        }

        let Some(handler) = provider.handler(operation) else {
            warn!(
                plugin = %identity,
                operation,
                pattern,
                "Route declaration refers to an unknown operation, skipping"
            );
            continue;
        };

        let local_endpoint = options
            .endpoint
            .clone()
            .unwrap_or_else(|| operation.to_string());
        let descriptor = RouteDescriptor {
            pattern: join_pattern(&prefix, pattern),
            methods: options.effective_methods(),
            handler,
            endpoint: format!("{}.{}", endpoint_prefix, local_endpoint),
            extras: options.extras.clone(),
            operation: operation.to_string(),
        };

        let existing = routes.iter().position(|r| {
            r.pattern == descriptor.pattern
                && same_method_set(&r.methods, &descriptor.methods)
                && r.endpoint == descriptor.endpoint
        });
        match existing {
            Some(pos) if routes[pos].operation == descriptor.operation => {
                // Re-declaration of the same operation: last registered wins.
                routes[pos] = descriptor;
            }
            Some(pos) => {
                return Err(PlugdockError::RouteBuild(format!(
                    "duplicate route {} {} (endpoint '{}') declared by both '{}' and '{}'",
                    descriptor
                        .methods
                        .iter()
                        .map(Method::to_string)
                        .collect::<Vec<_>>()
                        .join(","),
                    descriptor.pattern,
                    descriptor.endpoint,
                    routes[pos].operation,
                    descriptor.operation,
                )));
            }
            None => routes.push(descriptor),
        }
    }

    Ok(RouteTable {
        namespace: prefix,
        protected: provider.is_protected(),
        routes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Route provider with a fixed declaration list and handlers for the
    /// given operation names.
    struct TestProvider {
        declarations: Vec<(String, String, RouteOptions)>,
        operations: Vec<String>,
        custom: Option<RouteTable>,
    }

    impl TestProvider {
        fn new(declarations: Vec<(&str, &str, RouteOptions)>, operations: &[&str]) -> Self {
            Self {
                declarations: declarations
                    .into_iter()
                    .map(|(op, pattern, options)| (op.to_string(), pattern.to_string(), options))
                    .collect(),
                operations: operations.iter().map(|s| s.to_string()).collect(),
                custom: None,
            }
        }
    }

    impl RouteProvider for TestProvider {
        fn declare_routes(&self, routes: &mut RouteDeclarations) {
            for (op, pattern, options) in &self.declarations {
                routes.route(op, pattern, options.clone());
            }
        }

        fn handler(&self, operation: &str) -> Option<Handler> {
            if !self.operations.iter().any(|op| op == operation) {
                return None;
            }
            let name = operation.to_string();
            Some(Arc::new(move |_req| ApiResponse::ok(json!({ "op": name }))))
        }

        fn custom_route_table(&self, _identity: &PluginIdentity) -> Option<RouteTable> {
            self.custom.clone()
        }
    }

    fn demo() -> PluginIdentity {
        PluginIdentity::new("demo").unwrap()
    }

    #[test]
    fn test_build_empty_provider() {
        let provider = TestProvider::new(vec![], &[]);
        let table = build_route_table(&demo(), &provider).unwrap();
        assert_eq!(table.namespace, "/plugin/demo");
        assert!(table.routes.is_empty());
        assert!(table.protected);
    }

    #[test]
    fn test_two_declarations_share_handler() {
        let provider = TestProvider::new(
            vec![
                ("echo", "/a", RouteOptions::default()),
                ("echo", "/b", RouteOptions::methods([Method::Post])),
            ],
            &["echo"],
        );
        let table = build_route_table(&demo(), &provider).unwrap();
        assert_eq!(table.routes.len(), 2);
        assert_eq!(table.routes[0].pattern, "/plugin/demo/a");
        assert_eq!(table.routes[0].methods, vec![Method::Get]);
        assert_eq!(table.routes[1].pattern, "/plugin/demo/b");
        assert_eq!(table.routes[1].methods, vec![Method::Post]);
        // Both descriptors invoke the same operation.
        let req = ApiRequest::default();
        assert_eq!(
            (table.routes[0].handler)(&req),
            (table.routes[1].handler)(&req)
        );
    }

    #[test]
    fn test_endpoint_defaults_to_operation_name() {
        let provider = TestProvider::new(vec![("echo", "/echo", RouteOptions::default())], &["echo"]);
        let table = build_route_table(&demo(), &provider).unwrap();
        assert_eq!(table.routes[0].endpoint, "plugin.demo.echo");
    }

    #[test]
    fn test_explicit_endpoint_name() {
        let options = RouteOptions::default().endpoint("custom");
        let provider = TestProvider::new(vec![("echo", "/echo", options)], &["echo"]);
        let table = build_route_table(&demo(), &provider).unwrap();
        assert_eq!(table.routes[0].endpoint, "plugin.demo.custom");
    }

    #[test]
    fn test_private_operations_skipped() {
        let provider = TestProvider::new(
            vec![
                ("_internal", "/internal", RouteOptions::default()),
                ("public", "/public", RouteOptions::default()),
            ],
            &["_internal", "public"],
        );
        let table = build_route_table(&demo(), &provider).unwrap();
        assert_eq!(table.routes.len(), 1);
        assert_eq!(table.routes[0].operation, "public");
    }

    #[test]
    fn test_stale_declarations_skipped() {
        // Declaration left over for an operation the instance no longer has.
        let provider = TestProvider::new(
            vec![
                ("removed", "/gone", RouteOptions::default()),
                ("echo", "/echo", RouteOptions::default()),
            ],
            &["echo"],
        );
        let table = build_route_table(&demo(), &provider).unwrap();
        assert_eq!(table.routes.len(), 1);
        assert_eq!(table.routes[0].operation, "echo");
    }

    #[test]
    fn test_same_operation_redeclaration_last_wins() {
        let mut extras_v2 = Map::new();
        extras_v2.insert("version".to_string(), json!(2));
        let provider = TestProvider::new(
            vec![
                ("echo", "/echo", RouteOptions::default()),
                (
                    "echo",
                    "/echo",
                    RouteOptions {
                        extras: extras_v2,
                        ..Default::default()
                    },
                ),
            ],
            &["echo"],
        );
        let table = build_route_table(&demo(), &provider).unwrap();
        assert_eq!(table.routes.len(), 1);
        assert_eq!(table.routes[0].extras.get("version"), Some(&json!(2)));
    }

    #[test]
    fn test_duplicate_triple_from_different_operations_fails() {
        let provider = TestProvider::new(
            vec![
                ("first", "/same", RouteOptions::default().endpoint("shared")),
                ("second", "/same", RouteOptions::default().endpoint("shared")),
            ],
            &["first", "second"],
        );
        let err = build_route_table(&demo(), &provider).unwrap_err();
        assert!(matches!(err, PlugdockError::RouteBuild(_)));
        let msg = err.to_string();
        assert!(msg.contains("first"));
        assert!(msg.contains("second"));
    }

    #[test]
    fn test_duplicate_detection_ignores_method_order() {
        let provider = TestProvider::new(
            vec![
                (
                    "first",
                    "/same",
                    RouteOptions::methods([Method::Get, Method::Post]).endpoint("shared"),
                ),
                (
                    "second",
                    "/same",
                    RouteOptions::methods([Method::Post, Method::Get]).endpoint("shared"),
                ),
            ],
            &["first", "second"],
        );
        let err = build_route_table(&demo(), &provider).unwrap_err();
        assert!(matches!(err, PlugdockError::RouteBuild(_)));
    }

    #[test]
    fn test_build_is_deterministic() {
        let make = || {
            TestProvider::new(
                vec![
                    ("echo", "/a", RouteOptions::default()),
                    ("echo", "/b", RouteOptions::methods([Method::Post])),
                    ("status", "/status", RouteOptions::default()),
                ],
                &["echo", "status"],
            )
        };
        let a = build_route_table(&demo(), &make()).unwrap();
        let b = build_route_table(&demo(), &make()).unwrap();
        let triples = |t: &RouteTable| {
            t.routes
                .iter()
                .map(|r| (r.pattern.clone(), r.methods.clone(), r.endpoint.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(triples(&a), triples(&b));
    }

    #[test]
    fn test_custom_route_table_bypasses_builder() {
        let mut provider = TestProvider::new(
            vec![("echo", "/echo", RouteOptions::default())],
            &["echo"],
        );
        provider.custom = Some(RouteTable {
            namespace: "/plugin/demo".to_string(),
            protected: false,
            routes: vec![],
        });
        let table = build_route_table(&demo(), &provider).unwrap();
        assert!(table.routes.is_empty());
        assert!(!table.protected);
    }

    #[test]
    fn test_join_pattern_normalizes_slashes() {
        assert_eq!(join_pattern("/plugin/demo", "/echo"), "/plugin/demo/echo");
        assert_eq!(join_pattern("/plugin/demo", "echo"), "/plugin/demo/echo");
        assert_eq!(join_pattern("/plugin/demo", "/"), "/plugin/demo");
        assert_eq!(join_pattern("/plugin/demo", ""), "/plugin/demo");
    }

    #[test]
    fn test_method_display_and_default() {
        assert_eq!(Method::Get.to_string(), "GET");
        assert_eq!(Method::Post.to_string(), "POST");
        assert_eq!(Method::default(), Method::Get);
    }

    #[test]
    fn test_route_options_effective_methods() {
        assert_eq!(RouteOptions::default().effective_methods(), vec![Method::Get]);
        assert_eq!(
            RouteOptions::methods([Method::Post, Method::Put]).effective_methods(),
            vec![Method::Post, Method::Put]
        );
    }
}
