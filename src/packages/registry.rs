use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::error::panic_message;

pub type LoadFuture<T> = BoxFuture<'static, Result<T, LoadError>>;

/// Lazy import of a package module. `Ok(None)` is an empty module.
pub type PackageLoader = Arc<dyn Fn() -> LoadFuture<Option<PackageModule>> + Send + Sync>;

/// Lazy import of one page or component
pub type ComponentLoader = Arc<dyn Fn() -> LoadFuture<ComponentModule> + Send + Sync>;

pub type ComponentRegistry = BTreeMap<String, ComponentLoader>;

/// What a package exports: a page registry and/or a component registry
#[derive(Clone, Default)]
pub struct PackageModule {
    pub pages: Option<ComponentRegistry>,
    pub components: Option<ComponentRegistry>,
}

impl PackageModule {
    pub fn has_registries(&self) -> bool {
        self.pages.is_some() || self.components.is_some()
    }

    fn lookup(&self, route: &str) -> Option<&ComponentLoader> {
        self.pages
            .as_ref()
            .and_then(|pages| pages.get(route))
            .or_else(|| self.components.as_ref().and_then(|components| components.get(route)))
    }
}

impl fmt::Debug for PackageModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = |r: &Option<ComponentRegistry>| r.as_ref().map(|r| r.keys().cloned().collect::<Vec<_>>());
        f.debug_struct("PackageModule")
            .field("pages", &keys(&self.pages))
            .field("components", &keys(&self.components))
            .finish()
    }
}

/// Opaque renderable descriptor handed back to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub props: Value,
}

impl Component {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            props: Value::Null,
        }
    }
}

/// A loaded page module: either a module with a default export or the bare value
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentModule {
    Default(Component),
    Bare(Component),
}

impl ComponentModule {
    pub fn into_component(self) -> Component {
        match self {
            ComponentModule::Default(component) | ComponentModule::Bare(component) => component,
        }
    }
}

/// Where rendering happens. Package modules are only ever loaded for `Browser`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderEnvironment {
    Browser,
    Server,
}

impl fmt::Display for RenderEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderEnvironment::Browser => f.write_str("browser"),
            RenderEnvironment::Server => f.write_str("server"),
        }
    }
}

impl FromStr for RenderEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" | "client" => Ok(RenderEnvironment::Browser),
            "server" => Ok(RenderEnvironment::Server),
            other => Err(format!("unknown render environment '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("package module unavailable: {0}")]
    Unavailable(String),
    #[error("package module is empty")]
    EmptyModule,
    #[error("registry not found")]
    NoRegistries,
    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

type Slot = Arc<OnceCell<Result<Arc<PackageModule>, LoadError>>>;

/// Slug -> lazy package loader, with a per-slug single-flight cache.
///
/// Concurrent loads of one slug share a single loader invocation; the outcome,
/// including failure, is kept for the life of the registry.
#[derive(Default)]
pub struct PackageRegistry {
    loaders: HashMap<String, PackageLoader>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the loader for `slug`; returns true when it replaced one
    pub fn register(&mut self, slug: impl Into<String>, loader: PackageLoader) -> bool {
        let slug = slug.into();
        self.slots
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&slug);
        self.loaders.insert(slug, loader).is_some()
    }

    pub fn with_loader(mut self, slug: impl Into<String>, loader: PackageLoader) -> Self {
        self.register(slug, loader);
        self
    }

    /// Static lookup; `None` for slugs with no installed package
    pub fn get_package_loader(&self, slug: &str) -> Option<PackageLoader> {
        self.loaders.get(slug).cloned()
    }

    pub fn slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.loaders.keys().cloned().collect();
        slugs.sort();
        slugs
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    pub fn load_state(&self, slug: &str) -> LoadState {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        match slots.get(slug).map(|slot| slot.get()) {
            None => LoadState::NotLoaded,
            Some(None) => LoadState::Loading,
            Some(Some(Ok(_))) => LoadState::Loaded,
            Some(Some(Err(_))) => LoadState::Failed,
        }
    }

    fn slot(&self, slug: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(slug.to_string()).or_default().clone()
    }

    /// Resolve `slug` to a route resolver.
    ///
    /// Returns `None` outside the browser without touching any loader, and
    /// `None` for an unknown slug, a failed or empty module, or a module
    /// exporting neither registry. Failures are cached and warn only on the
    /// load that produced them.
    pub async fn load_package_registry(&self, slug: &str, environment: RenderEnvironment) -> Option<PageResolver> {
        if environment != RenderEnvironment::Browser {
            return None;
        }

        let Some(loader) = self.get_package_loader(slug) else {
            tracing::warn!("Package {} not supported yet", slug);
            return None;
        };

        let slot = self.slot(slug);
        let outcome = slot
            .get_or_init(|| async move {
                tracing::debug!("Loading package registry for: {}", slug);
                let loaded = AssertUnwindSafe(async move { loader().await })
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(LoadError::Unavailable(panic_message(payload.as_ref()))));
                let outcome = match loaded {
                    Ok(Some(module)) if module.has_registries() => Ok(Arc::new(module)),
                    Ok(Some(_)) => Err(LoadError::NoRegistries),
                    Ok(None) => Err(LoadError::EmptyModule),
                    Err(e) => Err(e),
                };
                // Cached, so this warns once per slug
                match &outcome {
                    Err(LoadError::NoRegistries) => tracing::warn!("Package {} registry not found", slug),
                    Err(e) => tracing::warn!("Failed to load package registry for {}: {}", slug, e),
                    Ok(_) => {}
                }
                outcome
            })
            .await;

        outcome.as_ref().ok().map(|module| PageResolver {
            slug: slug.to_string(),
            module: module.clone(),
        })
    }
}

impl fmt::Debug for PackageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageRegistry").field("slugs", &self.slugs()).finish()
    }
}

/// Route lookup over one loaded package module
#[derive(Debug, Clone)]
pub struct PageResolver {
    slug: String,
    module: Arc<PackageModule>,
}

impl PageResolver {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Pages first, then components. Misses and loader failures give `None`.
    pub async fn resolve_route(&self, route: &str) -> Option<Component> {
        let Some(loader) = self.module.lookup(route) else {
            tracing::warn!("Route {} not found in package {}", route, self.slug);
            return None;
        };

        let loader = loader.clone();
        match AssertUnwindSafe(async move { loader().await }).catch_unwind().await {
            Ok(Ok(module)) => Some(module.into_component()),
            Ok(Err(e)) => {
                tracing::warn!("Failed to load route {} of package {}: {}", route, self.slug, e);
                None
            }
            Err(payload) => {
                tracing::warn!(
                    "Loader for route {} of package {} panicked: {}",
                    route,
                    self.slug,
                    panic_message(payload.as_ref())
                );
                None
            }
        }
    }
}

/// Loader for an in-process module value
pub fn module_loader(module: Option<PackageModule>) -> PackageLoader {
    Arc::new(move || {
        let module = module.clone();
        async move { Ok::<_, LoadError>(module) }.boxed()
    })
}

/// Loader for an in-process component
pub fn component_loader(module: ComponentModule) -> ComponentLoader {
    Arc::new(move || {
        let module = module.clone();
        async move { Ok::<_, LoadError>(module) }.boxed()
    })
}
