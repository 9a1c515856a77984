use std::collections::HashMap;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Boundary to the AWS-backed services (DynamoDB, S3, Bedrock, Neptune).
///
/// `resource` is the table, bucket, model or graph the operation targets.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn execute(
        &self,
        service: &str,
        operation: &str,
        resource: Option<&str>,
        payload: Value,
    ) -> anyhow::Result<Value>;
}

#[derive(Debug, Clone)]
struct StoredObject {
    content: String,
    content_type: String,
}

/// Process-local stand-in for the AWS services, for development and tests
#[derive(Debug, Default)]
pub struct InMemoryResourceClient {
    tables: RwLock<HashMap<String, Vec<Map<String, Value>>>>,
    buckets: RwLock<HashMap<String, HashMap<String, StoredObject>>>,
    conversations: RwLock<HashMap<String, Vec<Value>>>,
}

const DEFAULT_BUCKET: &str = "captify-default";

impl InMemoryResourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn dynamo(&self, operation: &str, table: &str, payload: &Value) -> anyhow::Result<Value> {
        match operation {
            "scan" => {
                let tables = self.tables.read().await;
                let items = tables.get(table).map(Vec::as_slice).unwrap_or_default();
                Ok(page(items.iter(), payload))
            }
            "query" => {
                let condition = object_field(payload, "keyCondition")?;
                let tables = self.tables.read().await;
                let items = tables.get(table).map(Vec::as_slice).unwrap_or_default();
                Ok(page(items.iter().filter(|item| matches_key(item, condition)), payload))
            }
            "get" => {
                let key = object_field(payload, "key")?;
                let tables = self.tables.read().await;
                let item = tables
                    .get(table)
                    .and_then(|items| items.iter().find(|item| matches_key(item, key)));
                Ok(json!({ "item": item }))
            }
            "put" => {
                let mut item = object_field(payload, "item")?.clone();
                if !item.contains_key("id") {
                    item.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
                }
                let mut tables = self.tables.write().await;
                let items = tables.entry(table.to_string()).or_default();
                match items.iter_mut().find(|existing| existing.get("id") == item.get("id")) {
                    Some(existing) => *existing = item.clone(),
                    None => items.push(item.clone()),
                }
                Ok(json!({ "item": item }))
            }
            "update" => {
                let key = object_field(payload, "key")?;
                let updates = object_field(payload, "updates")?;
                let mut tables = self.tables.write().await;
                let item = tables
                    .get_mut(table)
                    .and_then(|items| items.iter_mut().find(|item| matches_key(item, key)))
                    .ok_or_else(|| anyhow!("Item not found in table '{}'", table))?;
                for (field, value) in updates {
                    item.insert(field.clone(), value.clone());
                }
                Ok(json!({ "item": item }))
            }
            "delete" => {
                let key = object_field(payload, "key")?;
                let mut tables = self.tables.write().await;
                let removed = tables.get_mut(table).map_or(0, |items| {
                    let before = items.len();
                    items.retain(|item| !matches_key(item, key));
                    before - items.len()
                });
                Ok(json!({ "deleted": removed > 0 }))
            }
            other => bail!("Unsupported DynamoDB operation: {}", other),
        }
    }

    async fn s3(&self, operation: &str, bucket: &str, payload: &Value) -> anyhow::Result<Value> {
        let key = string_field(payload, "key")?;
        match operation {
            "upload" => {
                let content = payload.get("content").and_then(Value::as_str).unwrap_or_default();
                let content_type = payload
                    .get("contentType")
                    .and_then(Value::as_str)
                    .unwrap_or("application/octet-stream");
                self.buckets.write().await.entry(bucket.to_string()).or_default().insert(
                    key.to_string(),
                    StoredObject {
                        content: content.to_string(),
                        content_type: content_type.to_string(),
                    },
                );
                Ok(json!({ "bucket": bucket, "key": key, "size": content.len() }))
            }
            "download" => {
                let buckets = self.buckets.read().await;
                let object = buckets
                    .get(bucket)
                    .and_then(|objects| objects.get(key))
                    .ok_or_else(|| anyhow!("NoSuchKey: The specified key does not exist: {}", key))?;
                Ok(json!({
                    "bucket": bucket,
                    "key": key,
                    "content": object.content,
                    "contentType": object.content_type,
                }))
            }
            other => bail!("Unsupported S3 operation: {}", other),
        }
    }

    async fn chat(&self, operation: &str, payload: &Value) -> anyhow::Result<Value> {
        let user_id = string_field(payload, "userId")?;
        match operation {
            "send" => {
                let content = string_field(payload, "message")?;
                let message = json!({
                    "id": Uuid::new_v4().to_string(),
                    "userId": user_id,
                    "role": "user",
                    "content": content,
                    "timestamp": Utc::now(),
                });
                self.conversations
                    .write()
                    .await
                    .entry(user_id.to_string())
                    .or_default()
                    .push(message.clone());
                Ok(json!({ "message": message }))
            }
            "history" => {
                let conversations = self.conversations.read().await;
                let messages = conversations.get(user_id).cloned().unwrap_or_default();
                let limit = payload.get("limit").and_then(Value::as_u64).map(|l| l as usize);
                let skip = limit.map_or(0, |l| messages.len().saturating_sub(l));
                let messages: Vec<Value> = messages.into_iter().skip(skip).collect();
                Ok(json!({ "messages": messages, "count": messages.len() }))
            }
            other => bail!("Unsupported chat operation: {}", other),
        }
    }
}

#[async_trait]
impl ResourceClient for InMemoryResourceClient {
    async fn execute(
        &self,
        service: &str,
        operation: &str,
        resource: Option<&str>,
        payload: Value,
    ) -> anyhow::Result<Value> {
        tracing::debug!("In-memory {}.{} on {:?}", service, operation, resource);
        match service {
            "dynamo" => {
                let table = resource.context("DynamoDB operations require a table name")?;
                self.dynamo(operation, table, &payload).await
            }
            "s3" => self.s3(operation, resource.unwrap_or(DEFAULT_BUCKET), &payload).await,
            "chat" => self.chat(operation, &payload).await,
            "bedrock" if operation == "invoke" => {
                let prompt = string_field(&payload, "prompt")?;
                Ok(json!({
                    "model": resource.unwrap_or("default"),
                    "completion": format!("Echo: {}", prompt),
                }))
            }
            "neptune" if operation == "query" => {
                let query = string_field(&payload, "query")?;
                Ok(json!({ "results": [], "query": query }))
            }
            _ => bail!("Unsupported operation: {}.{}", service, operation),
        }
    }
}

fn object_field<'a>(payload: &'a Value, name: &str) -> anyhow::Result<&'a Map<String, Value>> {
    payload
        .get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("Missing required object field '{}'", name))
}

fn string_field<'a>(payload: &'a Value, name: &str) -> anyhow::Result<&'a str> {
    payload
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("Missing required field '{}'", name))
}

fn matches_key(item: &Map<String, Value>, key: &Map<String, Value>) -> bool {
    key.iter().all(|(field, value)| item.get(field) == Some(value))
}

fn page<'a>(items: impl Iterator<Item = &'a Map<String, Value>>, payload: &Value) -> Value {
    let limit = payload
        .get("limit")
        .and_then(Value::as_u64)
        .map_or(usize::MAX, |l| l as usize);
    let items: Vec<&Map<String, Value>> = items.take(limit).collect();
    json!({ "items": items, "count": items.len() })
}
