use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::handler::{RouteHandler, ServiceHandlerMap};
use crate::manifest::{ApplicationManifest, HttpMethod, ManifestError, PathPattern, RouteDefinition};

/// Configuration errors found while assembling the route table.
///
/// Every variant is fatal: no table is produced.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("manifest '{slug}' is invalid: {source}")]
    InvalidManifest {
        slug: String,
        #[source]
        source: ManifestError,
    },

    #[error("manifest '{slug}' declares {method} {path} -> {service}.{operation}, but no handler is registered for it")]
    MissingHandler {
        slug: String,
        path: String,
        method: HttpMethod,
        service: String,
        operation: String,
    },

    #[error("route {method} {path} is declared by both '{first}' ({first_path}) and '{second}'")]
    DuplicateRoute {
        method: HttpMethod,
        path: String,
        first: String,
        first_path: String,
        second: String,
    },

    #[error("manifest slug '{0}' is registered more than once")]
    DuplicateManifest(String),
}

/// A fully resolved route: declaration plus bound handler
#[derive(Clone)]
pub struct RouteEntry {
    pub package: String,
    pub path: PathPattern,
    pub method: HttpMethod,
    pub service: String,
    pub operation: String,
    pub secure: bool,
    pub roles: BTreeSet<String>,
    pub description: String,
    pub handler: Arc<dyn RouteHandler>,
}

impl RouteEntry {
    /// Roles imply authentication: an entry with required roles needs a session too
    pub fn requires_session(&self) -> bool {
        self.secure || !self.roles.is_empty()
    }

    pub fn target(&self) -> String {
        format!("{}.{}", self.service, self.operation)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("package", &self.package)
            .field("path", &self.path.as_str())
            .field("method", &self.method)
            .field("target", &self.target())
            .field("secure", &self.secure)
            .field("roles", &self.roles)
            .finish()
    }
}

/// Immutable, ordered route table. Entries keep manifest declaration order.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup by declared pattern text and request verb
    pub fn get(&self, path: &str, method: HttpMethod) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|e| e.path.as_str() == path && e.method.accepts(method))
    }

    /// First entry bound to `service.operation`
    pub fn find_operation(&self, service: &str, operation: &str) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|e| e.service == service && e.operation == operation)
    }

    pub fn for_package<'a>(&'a self, slug: &'a str) -> impl Iterator<Item = &'a RouteEntry> + 'a {
        self.entries.iter().filter(move |e| e.package == slug)
    }

    pub fn summaries(&self) -> Vec<RouteSummary> {
        self.entries.iter().map(RouteSummary::from).collect()
    }
}

/// Accumulates manifests and handler bindings, then resolves them in one step
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    manifests: Vec<ApplicationManifest>,
    handlers: ServiceHandlerMap,
}

impl RouteTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest(mut self, manifest: ApplicationManifest) -> Self {
        self.manifests.push(manifest);
        self
    }

    pub fn manifests<I>(mut self, manifests: I) -> Self
    where
        I: IntoIterator<Item = ApplicationManifest>,
    {
        self.manifests.extend(manifests);
        self
    }

    pub fn handlers(mut self, handlers: ServiceHandlerMap) -> Self {
        self.handlers.merge(handlers);
        self
    }

    pub fn handler(
        mut self,
        service: impl Into<String>,
        operation: impl Into<String>,
        handler: Arc<dyn RouteHandler>,
    ) -> Self {
        self.handlers.register(service, operation, handler);
        self
    }

    pub fn build(self) -> Result<RouteTable, BuildError> {
        build(&self.manifests, &self.handlers)
    }
}

/// Merge `manifests` into one route table, binding each route to its handler.
///
/// Fails on the first invalid manifest, cross-manifest route collision or
/// unbound `service.operation`.
pub fn build(manifests: &[ApplicationManifest], handlers: &ServiceHandlerMap) -> Result<RouteTable, BuildError> {
    let result = resolve(manifests, handlers);
    match &result {
        Ok(table) => tracing::debug!("Built route table: {} routes from {} manifests", table.len(), manifests.len()),
        Err(e) => tracing::error!("Route table build failed: {}", e),
    }
    result
}

fn resolve(manifests: &[ApplicationManifest], handlers: &ServiceHandlerMap) -> Result<RouteTable, BuildError> {
    let mut seen_slugs: Vec<&str> = Vec::with_capacity(manifests.len());
    // shape -> [(method, declaring slug, declared path)]
    let mut claimed: HashMap<String, Vec<(HttpMethod, &str, &str)>> = HashMap::new();
    let mut entries = Vec::new();

    for manifest in manifests {
        manifest.validate().map_err(|source| BuildError::InvalidManifest {
            slug: manifest.slug.clone(),
            source,
        })?;
        if seen_slugs.contains(&manifest.slug.as_str()) {
            return Err(BuildError::DuplicateManifest(manifest.slug.clone()));
        }
        seen_slugs.push(&manifest.slug);

        for route in &manifest.routes {
            for shape in route.path.shapes() {
                let claims = claimed.entry(shape).or_default();
                if let Some((_, first, first_path)) = claims.iter().find(|(m, _, _)| m.overlaps(route.method)) {
                    return Err(BuildError::DuplicateRoute {
                        method: route.method,
                        path: route.path.to_string(),
                        first: first.to_string(),
                        first_path: first_path.to_string(),
                        second: manifest.slug.clone(),
                    });
                }
                claims.push((route.method, &manifest.slug, route.path.as_str()));
            }

            let handler = handlers
                .get(&route.service, &route.operation)
                .ok_or_else(|| BuildError::MissingHandler {
                    slug: manifest.slug.clone(),
                    path: route.path.to_string(),
                    method: route.method,
                    service: route.service.clone(),
                    operation: route.operation.clone(),
                })?;

            entries.push(resolve_entry(&manifest.slug, route, handler.clone()));
        }
    }

    Ok(RouteTable { entries })
}

fn resolve_entry(slug: &str, route: &RouteDefinition, handler: Arc<dyn RouteHandler>) -> RouteEntry {
    RouteEntry {
        package: slug.to_string(),
        path: route.path.clone(),
        method: route.method,
        service: route.service.clone(),
        operation: route.operation.clone(),
        secure: route.secure,
        roles: route.role_set(),
        description: route.description.clone(),
        handler,
    }
}

/// Serializable view of one route for listings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub package: String,
    pub path: String,
    pub method: HttpMethod,
    pub service: String,
    pub operation: String,
    pub secure: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl RouteSummary {
    /// Summary of a declared (not yet resolved) route
    pub fn from_definition(package: &str, route: &RouteDefinition) -> Self {
        Self {
            package: package.to_string(),
            path: route.path.to_string(),
            method: route.method,
            service: route.service.clone(),
            operation: route.operation.clone(),
            secure: route.secure,
            roles: route.role_set().into_iter().collect(),
            description: route.description.clone(),
        }
    }
}

impl From<&RouteEntry> for RouteSummary {
    fn from(entry: &RouteEntry) -> Self {
        Self {
            package: entry.package.clone(),
            path: entry.path.to_string(),
            method: entry.method,
            service: entry.service.clone(),
            operation: entry.operation.clone(),
            secure: entry.secure,
            roles: entry.roles.iter().cloned().collect(),
            description: entry.description.clone(),
        }
    }
}

impl fmt::Display for RouteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<7} {:<32} {}.{}", self.method, self.path, self.service, self.operation)?;
        if self.secure {
            f.write_str(" [secure]")?;
        }
        if !self.roles.is_empty() {
            write!(f, " roles={}", self.roles.join(","))?;
        }
        write!(f, " ({})", self.package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{handlers_for, manifest, noop_handler, route};

    fn auth_and_api_manifests() -> Vec<ApplicationManifest> {
        vec![
            manifest(
                "auth",
                vec![
                    route("/api/auth/[...nextauth]", HttpMethod::Get, "auth", "nextauth"),
                    route("/api/auth/[...nextauth]", HttpMethod::Post, "auth", "nextauth"),
                ],
            ),
            manifest("api", vec![route("/api/dynamo/scan", HttpMethod::Post, "dynamo", "scan").secure()]),
        ]
    }

    #[test]
    fn builds_one_entry_per_route_in_declaration_order() {
        let manifests = auth_and_api_manifests();
        let table = build(&manifests, &handlers_for(&manifests)).unwrap();

        assert_eq!(table.len(), 3);
        let order: Vec<(&str, HttpMethod)> = table.entries().iter().map(|e| (e.package.as_str(), e.method)).collect();
        assert_eq!(
            order,
            vec![("auth", HttpMethod::Get), ("auth", HttpMethod::Post), ("api", HttpMethod::Post)]
        );

        let scan = table.get("/api/dynamo/scan", HttpMethod::Post).unwrap();
        assert!(scan.secure);
        assert!(scan.roles.is_empty());
        assert!(table.get("/api/dynamo/scan", HttpMethod::Get).is_none());
        assert_eq!(table.find_operation("auth", "nextauth").unwrap().method, HttpMethod::Get);
        assert_eq!(table.for_package("auth").count(), 2);
    }

    #[test]
    fn duplicate_route_across_manifests_names_both_slugs() {
        let manifests = vec![
            manifest("chat", vec![route("/api/chat/send", HttpMethod::Post, "chat", "send")]),
            manifest("chat-next", vec![route("/api/chat/send", HttpMethod::Post, "chat", "send")]),
        ];
        let err = build(&manifests, &handlers_for(&manifests)).unwrap_err();

        match &err {
            BuildError::DuplicateRoute { first, second, method, .. } => {
                assert_eq!(first, "chat");
                assert_eq!(second, "chat-next");
                assert_eq!(*method, HttpMethod::Post);
            }
            other => panic!("expected duplicate route, got {:?}", other),
        }
        let message = err.to_string();
        assert!(message.contains("'chat'") && message.contains("'chat-next'"));
    }

    #[test]
    fn collisions_compare_pattern_shape_and_all_verb() {
        let manifests = vec![
            manifest("a", vec![route("/api/items/[id]", HttpMethod::Get, "items", "get")]),
            manifest("b", vec![route("/api/items/[itemId]", HttpMethod::All, "items", "any")]),
        ];
        assert!(matches!(
            build(&manifests, &handlers_for(&manifests)),
            Err(BuildError::DuplicateRoute { .. })
        ));

        let manifests = vec![
            manifest("a", vec![route("/api/items/[id]", HttpMethod::Get, "items", "get")]),
            manifest("b", vec![route("/api/items/[id]", HttpMethod::Delete, "items", "delete")]),
        ];
        assert_eq!(build(&manifests, &handlers_for(&manifests)).unwrap().len(), 2);
    }

    #[test]
    fn optional_catch_all_collides_with_its_parent_path() {
        let manifests = vec![
            manifest("a", vec![route("/api/docs", HttpMethod::Get, "docs", "index")]),
            manifest("b", vec![route("/api/docs/[[...slug]]", HttpMethod::Get, "docs", "page")]),
        ];
        match build(&manifests, &handlers_for(&manifests)) {
            Err(BuildError::DuplicateRoute { first, first_path, second, .. }) => {
                assert_eq!((first.as_str(), first_path.as_str(), second.as_str()), ("a", "/api/docs", "b"));
            }
            other => panic!("expected duplicate route, got {:?}", other),
        }

        let manifests = vec![
            manifest("a", vec![route("/api/docs", HttpMethod::Get, "docs", "index")]),
            manifest("b", vec![route("/api/docs/[[...slug]]", HttpMethod::Post, "docs", "page")]),
        ];
        assert_eq!(build(&manifests, &handlers_for(&manifests)).unwrap().len(), 2);
    }

    #[test]
    fn catch_all_and_optional_catch_all_at_one_depth_collide() {
        let manifests = vec![
            manifest("a", vec![route("/api/files/[...path]", HttpMethod::Get, "files", "get")]),
            manifest("b", vec![route("/api/files/[[...prefix]]", HttpMethod::Get, "files", "list")]),
        ];
        assert!(matches!(
            build(&manifests, &handlers_for(&manifests)),
            Err(BuildError::DuplicateRoute { .. })
        ));
    }

    #[test]
    fn unbound_operation_fails_the_whole_build() {
        let manifests = auth_and_api_manifests();
        let handlers = ServiceHandlerMap::new().with("auth", "nextauth", noop_handler());

        match build(&manifests, &handlers) {
            Err(BuildError::MissingHandler { slug, service, operation, path, .. }) => {
                assert_eq!(slug, "api");
                assert_eq!((service.as_str(), operation.as_str()), ("dynamo", "scan"));
                assert_eq!(path, "/api/dynamo/scan");
            }
            other => panic!("expected missing handler, got {:?}", other),
        }
    }

    #[test]
    fn invalid_or_repeated_manifests_are_rejected() {
        let mut bad = manifest("api", vec![]);
        bad.version.clear();
        assert!(matches!(
            build(&[bad], &ServiceHandlerMap::new()),
            Err(BuildError::InvalidManifest { slug, .. }) if slug == "api"
        ));

        let twice = vec![manifest("core", vec![]), manifest("core", vec![])];
        assert!(matches!(
            build(&twice, &ServiceHandlerMap::new()),
            Err(BuildError::DuplicateManifest(slug)) if slug == "core"
        ));
    }

    #[test]
    fn builder_collects_manifests_and_handlers() {
        let table = RouteTableBuilder::new()
            .manifests(auth_and_api_manifests())
            .handler("auth", "nextauth", noop_handler())
            .handlers(ServiceHandlerMap::new().with("dynamo", "scan", noop_handler()))
            .build()
            .unwrap();
        assert_eq!(table.len(), 3);

        let listing: Vec<String> = table.summaries().iter().map(ToString::to_string).collect();
        assert!(listing[2].contains("dynamo.scan [secure] (api)"));
    }
}
