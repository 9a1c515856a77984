//! Built-in service bindings for the host's own manifests.
//!
//! Every `service.operation` declared by `manifest::builtin` is bound here; the
//! AWS work itself goes through a `ResourceClient`.

pub mod auth;
pub mod captify;
pub mod chat;
pub mod client;
pub mod platform;
pub mod storage;

use std::sync::Arc;

use crate::auth::JwtSettings;
use crate::manifest::ManifestSet;
use crate::resources::ResourceHandlerRegistry;
use crate::routing::ServiceHandlerMap;

pub use client::{InMemoryResourceClient, ResourceClient};

/// Shared collaborators handed to every built-in handler
#[derive(Clone)]
pub struct ServiceContext {
    pub client: Arc<dyn ResourceClient>,
    pub resources: Arc<ResourceHandlerRegistry>,
    pub manifests: Arc<ManifestSet>,
    pub jwt: JwtSettings,
    pub allow_dev_login: bool,
}

/// Handler map for the `auth`, `api` and `platform` manifests
pub fn service_handlers(ctx: &ServiceContext) -> ServiceHandlerMap {
    let mut handlers = ServiceHandlerMap::new();
    auth::register(&mut handlers, ctx);
    storage::register(&mut handlers, ctx);
    chat::register(&mut handlers, ctx);
    captify::register(&mut handlers, ctx);
    platform::register(&mut handlers, ctx);
    tracing::debug!("Bound {} built-in service operations", handlers.len());
    handlers
}
