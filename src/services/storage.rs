// dynamo, s3 and neptune: thin pass-through to the resource client

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{ResourceClient, ServiceContext};
use crate::routing::{HandlerContext, HandlerResult, RouteHandler, ServiceHandlerMap, ServiceRequest};
use crate::types::ApiResponse;

const DYNAMO_OPERATIONS: [&str; 6] = ["scan", "query", "get", "put", "update", "delete"];

/// Forwards a request body (or query string) to one client operation.
///
/// `resource_field` names the body/query field that selects the table,
/// bucket or graph.
pub struct ClientOperation {
    client: Arc<dyn ResourceClient>,
    service: &'static str,
    operation: String,
    resource_field: &'static str,
    resource_required: bool,
}

impl ClientOperation {
    pub fn new(client: Arc<dyn ResourceClient>, service: &'static str, operation: impl Into<String>) -> Self {
        Self {
            client,
            service,
            operation: operation.into(),
            resource_field: "resource",
            resource_required: false,
        }
    }

    pub fn resource_field(mut self, field: &'static str, required: bool) -> Self {
        self.resource_field = field;
        self.resource_required = required;
        self
    }
}

#[async_trait]
impl RouteHandler for ClientOperation {
    async fn call(&self, request: ServiceRequest, _context: HandlerContext) -> HandlerResult {
        let resource = request.field(self.resource_field);
        if self.resource_required && resource.is_none() {
            return Ok(ApiResponse::failure(format!(
                "Missing required field '{}' for {}.{}",
                self.resource_field, self.service, self.operation
            )));
        }

        let payload = request_payload(&request);
        let result = self
            .client
            .execute(self.service, &self.operation, resource.as_deref(), payload)
            .await?;
        Ok(ApiResponse::success(result))
    }
}

/// JSON body for writes; query parameters fill in anything the body lacks
pub(crate) fn request_payload(request: &ServiceRequest) -> Value {
    let mut payload = match &request.body {
        Value::Object(body) => body.clone(),
        _ => Map::new(),
    };
    for (name, value) in &request.query {
        let value = value
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(value.clone()));
        payload.entry(name.clone()).or_insert(value);
    }
    Value::Object(payload)
}

pub fn register(handlers: &mut ServiceHandlerMap, ctx: &ServiceContext) {
    for operation in DYNAMO_OPERATIONS {
        handlers.register(
            "dynamo",
            operation,
            Arc::new(ClientOperation::new(ctx.client.clone(), "dynamo", operation).resource_field("table", true)),
        );
    }
    handlers.register(
        "s3",
        "upload",
        Arc::new(ClientOperation::new(ctx.client.clone(), "s3", "upload").resource_field("bucket", false)),
    );
    handlers.register(
        "s3",
        "download",
        Arc::new(ClientOperation::new(ctx.client.clone(), "s3", "download").resource_field("bucket", false)),
    );
    handlers.register(
        "neptune",
        "query",
        Arc::new(ClientOperation::new(ctx.client.clone(), "neptune", "query").resource_field("graph", false)),
    );
}
