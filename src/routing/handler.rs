use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::manifest::HttpMethod;
use crate::types::{ApiResponse, UserSession};

/// Normalized inbound request handed to a service handler
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: BTreeMap<String, String>,
    /// Path parameters extracted by the host router; moved into
    /// `HandlerContext::params` at dispatch
    pub params: BTreeMap<String, String>,
    pub body: Value,
    /// Set by the dispatcher to the caller's session once it passed the access gate
    pub session: Option<UserSession>,
}

impl ServiceRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            params: BTreeMap::new(),
            body: Value::Null,
            session: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Look up a string field in the body, falling back to the query string
    pub fn field(&self, name: &str) -> Option<String> {
        self.body
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.query.get(name).cloned())
    }
}

/// Routing metadata for one invocation
#[derive(Debug, Clone, Default)]
pub struct HandlerContext {
    pub params: BTreeMap<String, String>,
    pub package: String,
    pub service: String,
    pub operation: String,
}

pub type HandlerResult = anyhow::Result<ApiResponse>;

/// A service operation bound into the route table.
///
/// Returning `Err` is the handler's way of failing; the dispatcher turns it
/// into `{ success: false, error }` and keeps serving.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn call(&self, request: ServiceRequest, context: HandlerContext) -> HandlerResult;
}

/// Adapter that lets an async closure act as a `RouteHandler`
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> RouteHandler for FnHandler<F>
where
    F: Fn(ServiceRequest, HandlerContext) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn call(&self, request: ServiceRequest, context: HandlerContext) -> HandlerResult {
        (self.0)(request, context).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn RouteHandler>
where
    F: Fn(ServiceRequest, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// `service -> operation -> handler`
#[derive(Clone, Default)]
pub struct ServiceHandlerMap {
    services: BTreeMap<String, BTreeMap<String, Arc<dyn RouteHandler>>>,
}

impl ServiceHandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler; returns the handler it replaced, if any
    pub fn register(
        &mut self,
        service: impl Into<String>,
        operation: impl Into<String>,
        handler: Arc<dyn RouteHandler>,
    ) -> Option<Arc<dyn RouteHandler>> {
        self.services
            .entry(service.into())
            .or_default()
            .insert(operation.into(), handler)
    }

    pub fn with(
        mut self,
        service: impl Into<String>,
        operation: impl Into<String>,
        handler: Arc<dyn RouteHandler>,
    ) -> Self {
        self.register(service, operation, handler);
        self
    }

    /// Absorb `other`; its bindings win on conflict
    pub fn merge(&mut self, other: ServiceHandlerMap) {
        for (service, ops) in other.services {
            self.services.entry(service).or_default().extend(ops);
        }
    }

    pub fn get(&self, service: &str, operation: &str) -> Option<&Arc<dyn RouteHandler>> {
        self.services.get(service)?.get(operation)
    }

    pub fn contains(&self, service: &str, operation: &str) -> bool {
        self.get(service, operation).is_some()
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn operations(&self, service: &str) -> Vec<&str> {
        self.services
            .get(service)
            .map(|ops| ops.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.services.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ServiceHandlerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: BTreeMap<&str, Vec<&str>> = self
            .services
            .iter()
            .map(|(service, ops)| (service.as_str(), ops.keys().map(String::as_str).collect()))
            .collect();
        f.debug_struct("ServiceHandlerMap").field("services", &keys).finish()
    }
}
