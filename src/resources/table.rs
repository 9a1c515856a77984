use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::registry::ResourceHandler;
use crate::services::ResourceClient;
use crate::types::{ApiRequest, ApiResponse, UserSession};

/// Resource handler backed by one DynamoDB table.
///
/// Accepts the short verbs (`scan`, `get`, ...) and the `*Item` aliases the
/// web client sends. Writes need a valid session.
pub struct TableResourceHandler {
    resource_type: String,
    table: String,
    client: Arc<dyn ResourceClient>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableOperation {
    Scan,
    Query,
    Get,
    Put,
    Update,
    Delete,
}

impl TableOperation {
    fn parse(operation: &str) -> Option<Self> {
        match operation {
            "scan" | "list" => Some(Self::Scan),
            "query" => Some(Self::Query),
            "get" | "getItem" => Some(Self::Get),
            "put" | "putItem" | "create" => Some(Self::Put),
            "update" | "updateItem" => Some(Self::Update),
            "delete" | "deleteItem" => Some(Self::Delete),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Query => "query",
            Self::Get => "get",
            Self::Put => "put",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn is_write(&self) -> bool {
        matches!(self, Self::Put | Self::Update | Self::Delete)
    }
}

impl TableResourceHandler {
    pub fn new(resource_type: impl Into<String>, table: impl Into<String>, client: Arc<dyn ResourceClient>) -> Self {
        Self {
            resource_type: resource_type.into(),
            table: table.into(),
            client,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl ResourceHandler for TableResourceHandler {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    async fn validate_permissions(&self, session: Option<&UserSession>, operation: &str) -> bool {
        match TableOperation::parse(operation) {
            Some(op) if op.is_write() => session.map_or(false, |s| s.is_valid()),
            _ => true,
        }
    }

    async fn handle(&self, request: ApiRequest) -> anyhow::Result<ApiResponse> {
        let operation = TableOperation::parse(&request.operation).ok_or_else(|| {
            anyhow::anyhow!(
                "Unsupported operation '{}' for resource '{}'",
                request.operation,
                self.resource_type
            )
        })?;

        let mut payload = match request.params {
            Value::Object(params) => params,
            _ => Map::new(),
        };
        match (operation, request.data) {
            (_, Value::Null) => {}
            (TableOperation::Put, data) => {
                payload.insert("item".to_string(), data);
            }
            (TableOperation::Update, data) => {
                payload.insert("updates".to_string(), data);
            }
            (_, Value::Object(data)) => {
                for (field, value) in data {
                    payload.entry(field).or_insert(value);
                }
            }
            (_, other) => anyhow::bail!("Request data for '{}' must be an object, got {}", operation.as_str(), other),
        }

        let result = self
            .client
            .execute("dynamo", operation.as_str(), Some(&self.table), Value::Object(payload))
            .await?;
        Ok(ApiResponse::success(result))
    }
}
