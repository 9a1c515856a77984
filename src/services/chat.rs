use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::storage::request_payload;
use super::{ResourceClient, ServiceContext};
use crate::routing::{HandlerContext, HandlerResult, RouteHandler, ServiceHandlerMap, ServiceRequest};
use crate::types::ApiResponse;

#[derive(Debug, Clone, Copy)]
enum ChatOperation {
    Send,
    History,
    Llm,
}

/// Chat operations, always scoped to the calling user
pub struct ChatHandler {
    client: Arc<dyn ResourceClient>,
    operation: ChatOperation,
}

impl ChatHandler {
    fn new(client: Arc<dyn ResourceClient>, operation: ChatOperation) -> Self {
        Self { client, operation }
    }
}

#[async_trait]
impl RouteHandler for ChatHandler {
    async fn call(&self, request: ServiceRequest, _context: HandlerContext) -> HandlerResult {
        let user_id = request
            .session
            .as_ref()
            .map(|s| s.user_id.clone())
            .context("chat requires an authenticated session")?;

        let mut payload = request_payload(&request);
        payload["userId"] = json!(user_id);

        let result = match self.operation {
            ChatOperation::Send => {
                if payload.get("message").and_then(Value::as_str).map_or(true, str::is_empty) {
                    return Ok(ApiResponse::failure("message is required"));
                }
                self.client.execute("chat", "send", None, payload).await?
            }
            ChatOperation::History => self.client.execute("chat", "history", None, payload).await?,
            ChatOperation::Llm => {
                let Some(prompt) = last_user_prompt(&payload) else {
                    return Ok(ApiResponse::failure("messages must contain a user message"));
                };
                let model = payload.get("model").and_then(Value::as_str).map(str::to_string);
                let provider = payload.get("provider").and_then(Value::as_str).unwrap_or("bedrock");
                self.client
                    .execute(
                        "bedrock",
                        "invoke",
                        model.as_deref(),
                        json!({ "prompt": prompt, "provider": provider }),
                    )
                    .await?
            }
        };

        Ok(ApiResponse::success(result))
    }
}

/// `prompt` if given, otherwise the last `{ role: "user", content }` entry of `messages`
fn last_user_prompt(payload: &Value) -> Option<String> {
    if let Some(prompt) = payload.get("prompt").and_then(Value::as_str) {
        return Some(prompt.to_string());
    }
    payload
        .get("messages")?
        .as_array()?
        .iter()
        .rev()
        .find(|m| m.get("role").and_then(Value::as_str) == Some("user"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub fn register(handlers: &mut ServiceHandlerMap, ctx: &ServiceContext) {
    for (name, operation) in [
        ("send", ChatOperation::Send),
        ("history", ChatOperation::History),
        ("llm", ChatOperation::Llm),
    ] {
        handlers.register("chat", name, Arc::new(ChatHandler::new(ctx.client.clone(), operation)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::HttpMethod;
    use crate::services::InMemoryResourceClient;
    use crate::types::UserSession;

    fn as_user(user: &str, method: HttpMethod, body: Value) -> ServiceRequest {
        let mut request = ServiceRequest::new(method, "/api/chat").with_body(body);
        request.session = Some(UserSession::new(user));
        request
    }

    #[tokio::test]
    async fn history_only_returns_own_messages() {
        let client: Arc<dyn ResourceClient> = Arc::new(InMemoryResourceClient::new());
        let send = ChatHandler::new(client.clone(), ChatOperation::Send);
        let history = ChatHandler::new(client, ChatOperation::History);

        // a spoofed userId in the body is overwritten by the session
        send.call(
            as_user("alice", HttpMethod::Post, json!({ "message": "hi", "userId": "bob" })),
            HandlerContext::default(),
        )
        .await
        .unwrap();

        let bob = history
            .call(as_user("bob", HttpMethod::Get, Value::Null), HandlerContext::default())
            .await
            .unwrap();
        assert_eq!(bob.data.unwrap()["count"], 0);

        let alice = history
            .call(as_user("alice", HttpMethod::Get, Value::Null), HandlerContext::default())
            .await
            .unwrap();
        assert_eq!(alice.data.unwrap()["messages"][0]["content"], "hi");
    }

    #[tokio::test]
    async fn llm_uses_last_user_message() {
        let client: Arc<dyn ResourceClient> = Arc::new(InMemoryResourceClient::new());
        let llm = ChatHandler::new(client, ChatOperation::Llm);

        let response = llm
            .call(
                as_user(
                    "alice",
                    HttpMethod::Post,
                    json!({ "messages": [
                        { "role": "user", "content": "first" },
                        { "role": "assistant", "content": "reply" },
                        { "role": "user", "content": "second" }
                    ] }),
                ),
                HandlerContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(response.data.unwrap()["completion"], "Echo: second");
    }

    #[tokio::test]
    async fn missing_session_is_an_error() {
        let client: Arc<dyn ResourceClient> = Arc::new(InMemoryResourceClient::new());
        let send = ChatHandler::new(client, ChatOperation::Send);
        let request = ServiceRequest::new(HttpMethod::Post, "/api/chat/send").with_body(json!({ "message": "hi" }));
        assert!(send.call(request, HandlerContext::default()).await.is_err());
    }
}
