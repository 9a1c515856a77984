use std::sync::Arc;

use serde::Serialize;

use super::registry::{Component, PackageRegistry, RenderEnvironment};

pub const DEFAULT_ROUTE: &str = "home";

/// Outcome of a page lookup; `NotFound` renders as a 404-equivalent state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum PageResolution {
    Found {
        package: String,
        route: String,
        component: Component,
    },
    NotFound {
        package: String,
        route: String,
    },
}

impl PageResolution {
    pub fn is_found(&self) -> bool {
        matches!(self, PageResolution::Found { .. })
    }

    pub fn component(&self) -> Option<&Component> {
        match self {
            PageResolution::Found { component, .. } => Some(component),
            PageResolution::NotFound { .. } => None,
        }
    }

    pub fn not_found_message(&self) -> Option<String> {
        match self {
            PageResolution::NotFound { package, route } => {
                Some(format!("Page \"{}\" not found in package \"{}\"", route, package))
            }
            PageResolution::Found { .. } => None,
        }
    }
}

/// Maps `(package slug, route name)` to a renderable component
#[derive(Debug, Clone)]
pub struct PageRouter {
    registry: Arc<PackageRegistry>,
    environment: RenderEnvironment,
}

impl PageRouter {
    pub fn new(registry: Arc<PackageRegistry>, environment: RenderEnvironment) -> Self {
        Self { registry, environment }
    }

    pub fn registry(&self) -> &PackageRegistry {
        &self.registry
    }

    pub fn environment(&self) -> RenderEnvironment {
        self.environment
    }

    /// An empty `route` means the package's home page
    pub async fn resolve_page(&self, slug: &str, route: &str) -> PageResolution {
        let route = if route.is_empty() { DEFAULT_ROUTE } else { route };
        let not_found = || PageResolution::NotFound {
            package: slug.to_string(),
            route: route.to_string(),
        };

        let Some(resolver) = self.registry.load_package_registry(slug, self.environment).await else {
            return not_found();
        };

        match resolver.resolve_route(route).await {
            Some(component) => PageResolution::Found {
                package: slug.to_string(),
                route: route.to_string(),
                component,
            },
            None => not_found(),
        }
    }
}
