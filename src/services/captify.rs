use std::sync::Arc;

use async_trait::async_trait;

use super::ServiceContext;
use crate::resources::ResourceHandlerRegistry;
use crate::routing::{HandlerContext, HandlerResult, RouteHandler, ServiceHandlerMap, ServiceRequest};
use crate::types::{ApiRequest, ApiResponse};

/// `captify.request`: `{ resource, operation, data, params }` routed through
/// the resource handler registry
pub struct CaptifyRequestHandler {
    resources: Arc<ResourceHandlerRegistry>,
}

#[async_trait]
impl RouteHandler for CaptifyRequestHandler {
    async fn call(&self, request: ServiceRequest, _context: HandlerContext) -> HandlerResult {
        let api_request: ApiRequest = match serde_json::from_value(request.body) {
            Ok(api_request) => api_request,
            Err(e) => return Ok(ApiResponse::failure(format!("Invalid request: {}", e))),
        };
        if api_request.resource.trim().is_empty() {
            return Ok(ApiResponse::failure("Resource is required"));
        }

        Ok(self.resources.handle(api_request.with_session(request.session)).await)
    }
}

pub fn register(handlers: &mut ServiceHandlerMap, ctx: &ServiceContext) {
    handlers.register(
        "captify",
        "request",
        Arc::new(CaptifyRequestHandler {
            resources: ctx.resources.clone(),
        }),
    );
}
