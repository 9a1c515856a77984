use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;

use super::ServiceContext;
use crate::manifest::ManifestSet;
use crate::routing::{handler_fn, HandlerContext, RouteSummary, ServiceHandlerMap, ServiceRequest};
use crate::types::ApiResponse;

/// Installed manifests plus the menu visible to the caller
pub fn manifests_overview(manifests: &ManifestSet, roles: &BTreeSet<String>) -> serde_json::Value {
    let packages: Vec<_> = manifests
        .iter()
        .map(|m| {
            json!({
                "slug": m.slug,
                "name": m.name,
                "version": m.version,
                "routes": m.routes.len(),
                "resources": m.resources,
            })
        })
        .collect();

    json!({
        "manifests": packages,
        "menu": manifests.menu_for(roles),
    })
}

/// Every declared route across installed manifests, in declaration order
pub fn route_listing(manifests: &ManifestSet) -> Vec<RouteSummary> {
    manifests
        .iter()
        .flat_map(|m| m.routes.iter().map(move |r| RouteSummary::from_definition(&m.slug, r)))
        .collect()
}

pub fn register(handlers: &mut ServiceHandlerMap, ctx: &ServiceContext) {
    let manifests = ctx.manifests.clone();
    handlers.register(
        "platform",
        "manifests",
        handler_fn(move |request: ServiceRequest, _context: HandlerContext| {
            let manifests = Arc::clone(&manifests);
            async move {
                let roles = request.session.map(|s| s.roles).unwrap_or_default();
                Ok(ApiResponse::success(manifests_overview(&manifests, &roles)))
            }
        }),
    );

    let manifests = ctx.manifests.clone();
    handlers.register(
        "platform",
        "routes",
        handler_fn(move |_request: ServiceRequest, _context: HandlerContext| {
            let manifests = Arc::clone(&manifests);
            async move {
                let listing = serde_json::to_value(route_listing(&manifests))?;
                Ok::<_, anyhow::Error>(ApiResponse::success(listing))
            }
        }),
    );
}
