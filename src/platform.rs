//! Startup wiring: manifests, handlers, route table, resource and package
//! registries, all constructed explicitly and handed to the HTTP layer.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::api::RouteMatcher;
use crate::auth::JwtSettings;
use crate::config::AppConfig;
use crate::manifest::{
    builtin_manifests, load_manifest_dir, ApplicationManifest, ManifestError, ManifestSet, ResourceKind,
};
use crate::packages::{builtin_registry, install_discovered, PackageRegistry, PageRouter, RenderEnvironment};
use crate::resources::{ResourceHandlerRegistry, TableResourceHandler};
use crate::routing::{build, BuildError, Dispatcher, RouteTable, ServiceHandlerMap};
use crate::services::{service_handlers, InMemoryResourceClient, ResourceClient, ServiceContext};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Failed to scan package directory {}: {source}", path.display())]
    PackageDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct PlatformSettings {
    pub jwt: JwtSettings,
    pub allow_dev_login: bool,
    pub render_environment: RenderEnvironment,
}

impl PlatformSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            jwt: JwtSettings::from_config(config),
            allow_dev_login: config.security.allow_dev_login,
            render_environment: config.packages.render_environment,
        }
    }
}

/// Everything the host needs to serve requests. Immutable once assembled.
#[derive(Debug, Clone)]
pub struct Platform {
    pub manifests: Arc<ManifestSet>,
    pub dispatcher: Dispatcher,
    pub matcher: RouteMatcher,
    pub resources: Arc<ResourceHandlerRegistry>,
    pub pages: PageRouter,
    pub settings: PlatformSettings,
}

impl Platform {
    /// Built-in manifests and packages, plus whatever the configured
    /// directories add, over the in-memory resource client
    pub fn bootstrap(config: &AppConfig) -> Result<Self, BootstrapError> {
        let mut manifests = builtin_manifests()?;
        if let Some(dir) = &config.packages.manifest_dir {
            let extra = load_manifest_dir(dir)?;
            tracing::info!("Loaded {} manifests from {}", extra.len(), dir.display());
            manifests.extend(extra);
        }

        let mut packages = builtin_registry();
        if let Some(dir) = &config.packages.package_dir {
            install_discovered(&mut packages, dir).map_err(|source| BootstrapError::PackageDir {
                path: dir.clone(),
                source,
            })?;
        }

        Self::assemble(
            manifests,
            ServiceHandlerMap::new(),
            Arc::new(InMemoryResourceClient::new()),
            packages,
            PlatformSettings::from_config(config),
        )
    }

    /// Wire the given parts together. `extra_handlers` are bound alongside the
    /// built-in services and win on conflict.
    pub fn assemble(
        manifests: Vec<ApplicationManifest>,
        extra_handlers: ServiceHandlerMap,
        client: Arc<dyn ResourceClient>,
        packages: PackageRegistry,
        settings: PlatformSettings,
    ) -> Result<Self, BootstrapError> {
        let mut set = ManifestSet::new();
        set.extend(manifests)?;
        let manifests = Arc::new(set);

        let resources = Arc::new(table_resources(&manifests, &client));

        let ctx = ServiceContext {
            client,
            resources: resources.clone(),
            manifests: manifests.clone(),
            jwt: settings.jwt.clone(),
            allow_dev_login: settings.allow_dev_login,
        };
        let mut handlers = service_handlers(&ctx);
        handlers.merge(extra_handlers);

        let table: Arc<RouteTable> = Arc::new(build(manifests.as_slice(), &handlers)?);
        tracing::info!(
            "Route table ready: {} routes from {} manifests, {} resource types, {} packages",
            table.len(),
            manifests.len(),
            resources.len(),
            packages.len()
        );

        Ok(Self {
            dispatcher: Dispatcher::from_shared(table.clone()),
            matcher: RouteMatcher::new(table),
            pages: PageRouter::new(Arc::new(packages), settings.render_environment),
            manifests,
            resources,
            settings,
        })
    }

    pub fn table(&self) -> &RouteTable {
        self.dispatcher.table()
    }
}

/// One table resource handler per declared `dynamodb-table`, keyed by resource type
fn table_resources(manifests: &ManifestSet, client: &Arc<dyn ResourceClient>) -> ResourceHandlerRegistry {
    let mut registry = ResourceHandlerRegistry::new();
    for (slug, resource) in manifests.resources() {
        if resource.kind != ResourceKind::DynamodbTable {
            continue;
        }
        let key = resource.resource_key();
        tracing::debug!("Registering table resource {} -> {} ({})", key, resource.name, slug);
        registry.register(key, Arc::new(TableResourceHandler::new(key, &resource.name, client.clone())));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::HttpMethod;
    use crate::testing::{manifest, noop_handler, route};

    fn settings() -> PlatformSettings {
        PlatformSettings {
            jwt: JwtSettings::new("test-secret", 1),
            allow_dev_login: true,
            render_environment: RenderEnvironment::Browser,
        }
    }

    #[test]
    fn bootstrap_registers_declared_tables() {
        let platform = Platform::bootstrap(&AppConfig::development()).unwrap();
        assert_eq!(platform.resources.registered_types(), vec!["applications", "users"]);
        assert!(platform.table().get("/api/dynamo/scan", HttpMethod::Post).is_some());
        assert_eq!(platform.pages.registry().len(), 7);
    }

    #[test]
    fn unbound_manifest_route_fails_assembly() {
        let mut manifests = builtin_manifests().unwrap();
        manifests.push(manifest("rmf", vec![route("/api/rmf/controls", HttpMethod::Get, "rmf", "controls")]));

        let err = Platform::assemble(
            manifests,
            ServiceHandlerMap::new(),
            Arc::new(InMemoryResourceClient::new()),
            PackageRegistry::new(),
            settings(),
        )
        .unwrap_err();
        assert!(matches!(err, BootstrapError::Build(BuildError::MissingHandler { .. })));
    }

    #[test]
    fn extra_handlers_bind_package_routes() {
        let mut manifests = builtin_manifests().unwrap();
        manifests.push(manifest("rmf", vec![route("/api/rmf/controls", HttpMethod::Get, "rmf", "controls")]));

        let platform = Platform::assemble(
            manifests,
            ServiceHandlerMap::new().with("rmf", "controls", noop_handler()),
            Arc::new(InMemoryResourceClient::new()),
            PackageRegistry::new(),
            settings(),
        )
        .unwrap();
        assert!(platform.table().find_operation("rmf", "controls").is_some());
    }

    #[test]
    fn duplicate_slug_fails_assembly() {
        let mut manifests = builtin_manifests().unwrap();
        manifests.push(manifest("auth", Vec::new()));

        let err = Platform::assemble(
            manifests,
            ServiceHandlerMap::new(),
            Arc::new(InMemoryResourceClient::new()),
            PackageRegistry::new(),
            settings(),
        )
        .unwrap_err();
        assert!(matches!(err, BootstrapError::Manifest(ManifestError::DuplicateSlug(_))));
    }
}
