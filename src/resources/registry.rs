use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::panic_message;
use crate::types::{ApiRequest, ApiResponse, UserSession};

/// Uniform handler for "resource + verb" requests.
///
/// Only `handle` is required; the hooks default to allow-all and identity.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn resource_type(&self) -> &str;

    async fn handle(&self, request: ApiRequest) -> anyhow::Result<ApiResponse>;

    async fn validate_permissions(&self, _session: Option<&UserSession>, _operation: &str) -> bool {
        true
    }

    async fn transform_request(&self, request: ApiRequest) -> anyhow::Result<ApiRequest> {
        Ok(request)
    }

    async fn transform_response(&self, response: ApiResponse) -> anyhow::Result<ApiResponse> {
        Ok(response)
    }
}

/// Resource type -> handler.
///
/// Populated during startup, then shared read-only behind an `Arc`.
#[derive(Default, Clone)]
pub struct ResourceHandlerRegistry {
    handlers: HashMap<String, Arc<dyn ResourceHandler>>,
}

impl ResourceHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; last write wins
    pub fn register(&mut self, resource_type: impl Into<String>, handler: Arc<dyn ResourceHandler>) {
        let resource_type = resource_type.into();
        if self.handlers.insert(resource_type.clone(), handler).is_some() {
            tracing::debug!("Replaced resource handler for '{}'", resource_type);
        } else {
            tracing::debug!("Registered resource handler for '{}'", resource_type);
        }
    }

    /// Register under the handler's own `resource_type()`
    pub fn register_handler(&mut self, handler: Arc<dyn ResourceHandler>) {
        let resource_type = handler.resource_type().to_string();
        self.register(resource_type, handler);
    }

    /// Route `request` to the handler for `request.resource`.
    ///
    /// Never fails: a miss, a permission denial, an error or a panic in the
    /// handler all come back as `{ success: false, error }`.
    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        let Some(handler) = self.handlers.get(&request.resource) else {
            tracing::warn!("No handler registered for resource type: {}", request.resource);
            return ApiResponse::failure(format!("No handler registered for resource type: {}", request.resource));
        };

        let resource = request.resource.clone();
        let outcome = AssertUnwindSafe(Self::run(handler.as_ref(), request))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!("Resource handler '{}' failed: {:#}", resource, e);
                ApiResponse::failure(format!("{:#}", e))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Resource handler '{}' panicked: {}", resource, message);
                ApiResponse::failure(message)
            }
        }
    }

    async fn run(handler: &dyn ResourceHandler, request: ApiRequest) -> anyhow::Result<ApiResponse> {
        if !handler
            .validate_permissions(request.session.as_ref(), &request.operation)
            .await
        {
            tracing::debug!("Access denied for {} on resource '{}'", request.operation, request.resource);
            return Ok(ApiResponse::failure(format!(
                "Access denied for operation '{}' on resource '{}'",
                request.operation, request.resource
            )));
        }

        let request = handler.transform_request(request).await?;
        let response = handler.handle(request).await?;
        handler.transform_response(response).await
    }

    pub fn has_handler(&self, resource_type: &str) -> bool {
        self.handlers.contains_key(resource_type)
    }

    /// Registered resource types, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for ResourceHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandlerRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::LogCapture;
    use serde_json::{json, Value};

    struct Echo(&'static str);

    #[async_trait]
    impl ResourceHandler for Echo {
        fn resource_type(&self) -> &str {
            self.0
        }

        async fn handle(&self, request: ApiRequest) -> anyhow::Result<ApiResponse> {
            Ok(ApiResponse::success(json!({ "handler": self.0, "data": request.data })))
        }
    }

    struct Boom;

    #[async_trait]
    impl ResourceHandler for Boom {
        fn resource_type(&self) -> &str {
            "dynamo-table-x"
        }

        async fn handle(&self, _request: ApiRequest) -> anyhow::Result<ApiResponse> {
            anyhow::bail!("boom")
        }
    }

    struct Panics;

    #[async_trait]
    impl ResourceHandler for Panics {
        fn resource_type(&self) -> &str {
            "panics"
        }

        async fn handle(&self, _request: ApiRequest) -> anyhow::Result<ApiResponse> {
            panic!("handler exploded")
        }
    }

    /// Admin-only writes, uppercases `data.name` on the way in, tags the response
    struct Guarded;

    #[async_trait]
    impl ResourceHandler for Guarded {
        fn resource_type(&self) -> &str {
            "guarded"
        }

        async fn handle(&self, request: ApiRequest) -> anyhow::Result<ApiResponse> {
            Ok(ApiResponse::success(request.data))
        }

        async fn validate_permissions(&self, session: Option<&UserSession>, operation: &str) -> bool {
            operation == "get" || session.map_or(false, |s| s.roles.contains("admin"))
        }

        async fn transform_request(&self, mut request: ApiRequest) -> anyhow::Result<ApiRequest> {
            let upper = request.data.get("name").and_then(Value::as_str).map(str::to_uppercase);
            if let Some(name) = upper {
                request.data["name"] = json!(name);
            }
            Ok(request)
        }

        async fn transform_response(&self, response: ApiResponse) -> anyhow::Result<ApiResponse> {
            Ok(response.with_details("guarded"))
        }
    }

    #[tokio::test]
    async fn unregistered_type_is_a_failed_response() {
        let (logs, _guard) = LogCapture::install();
        let registry = ResourceHandlerRegistry::new();

        let response = registry.handle(ApiRequest::new("unregistered-type", "scan")).await;

        assert_eq!(
            response,
            ApiResponse::failure("No handler registered for resource type: unregistered-type")
        );
        assert_eq!(logs.count("WARN"), 1);
    }

    #[tokio::test]
    async fn handler_error_becomes_failure_with_its_message() {
        let mut registry = ResourceHandlerRegistry::new();
        registry.register_handler(Arc::new(Boom));

        let response = registry.handle(ApiRequest::new("dynamo-table-x", "scan")).await;
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({ "success": false, "error": "boom" }));
    }

    #[tokio::test]
    async fn handler_panic_is_contained() {
        let mut registry = ResourceHandlerRegistry::new();
        registry.register_handler(Arc::new(Panics));
        registry.register_handler(Arc::new(Echo("echo")));

        let response = registry.handle(ApiRequest::new("panics", "get")).await;
        assert_eq!(response.error.as_deref(), Some("handler exploded"));

        let response = registry.handle(ApiRequest::new("echo", "get")).await;
        assert!(response.success);
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let mut registry = ResourceHandlerRegistry::new();
        registry.register("users", Arc::new(Echo("first")));
        registry.register("users", Arc::new(Echo("second")));
        registry.register("apps", Arc::new(Echo("apps")));

        let response = registry.handle(ApiRequest::new("users", "scan")).await;
        assert_eq!(response.data.unwrap()["handler"], "second");
        assert_eq!(registry.registered_types(), vec!["apps", "users"]);
        assert!(registry.has_handler("apps"));
        assert!(!registry.has_handler("orgs"));
    }

    #[tokio::test]
    async fn hooks_gate_and_transform() {
        let mut registry = ResourceHandlerRegistry::new();
        registry.register_handler(Arc::new(Guarded));

        let denied = registry
            .handle(ApiRequest::new("guarded", "put").with_session(Some(UserSession::new("u1").with_roles(["user"]))))
            .await;
        assert!(!denied.success);
        assert!(denied.error.unwrap().starts_with("Access denied"));

        let allowed = registry
            .handle(
                ApiRequest::new("guarded", "put")
                    .with_data(json!({ "name": "alpha" }))
                    .with_session(Some(UserSession::new("u1").with_roles(["admin"]))),
            )
            .await;
        assert_eq!(allowed.data, Some(json!({ "name": "ALPHA" })));
        assert_eq!(allowed.details.as_deref(), Some("guarded"));
    }
}
