use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::ServiceContext;
use crate::auth::{issue_token, JwtSettings};
use crate::manifest::HttpMethod;
use crate::routing::{HandlerContext, HandlerResult, RouteHandler, ServiceHandlerMap, ServiceRequest};
use crate::types::{ApiResponse, UserSession};

/// Development identity posted to `POST /api/auth/signin`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest {
    user_id: String,
    email: Option<String>,
    org_id: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

/// `auth.nextauth`: the catch-all auth route.
///
/// Sessions are issued elsewhere; this only reports the caller's session and,
/// when enabled, mints development tokens.
pub struct NextAuthHandler {
    jwt: JwtSettings,
    allow_dev_login: bool,
}

impl NextAuthHandler {
    pub fn new(jwt: JwtSettings, allow_dev_login: bool) -> Self {
        Self { jwt, allow_dev_login }
    }

    fn session(&self, request: &ServiceRequest) -> ApiResponse {
        match &request.session {
            Some(session) => ApiResponse::success(json!({
                "user": {
                    "id": session.user_id,
                    "email": session.email,
                    "orgId": session.org_id,
                    "roles": session.roles,
                },
                "expires": session.expires_at,
            })),
            None => ApiResponse::success(json!({})),
        }
    }

    fn providers(&self) -> ApiResponse {
        if self.allow_dev_login {
            ApiResponse::success(json!({
                "credentials": { "id": "credentials", "name": "Development login", "type": "credentials" }
            }))
        } else {
            ApiResponse::success(json!({}))
        }
    }

    fn sign_in(&self, request: ServiceRequest) -> HandlerResult {
        if !self.allow_dev_login {
            return Ok(ApiResponse::failure("Development login is disabled"));
        }

        let sign_in: SignInRequest = match serde_json::from_value(request.body) {
            Ok(sign_in) => sign_in,
            Err(e) => return Ok(ApiResponse::failure(format!("Invalid sign-in request: {}", e))),
        };
        if sign_in.user_id.trim().is_empty() {
            return Ok(ApiResponse::failure("userId is required"));
        }

        let mut session = UserSession::new(sign_in.user_id).with_roles(sign_in.roles);
        session.email = sign_in.email;
        session.org_id = sign_in.org_id;

        let token = issue_token(&self.jwt, &session)?;
        tracing::info!("Issued development token for {}", session.user_id);
        Ok(ApiResponse::success(json!({ "token": token, "user": session })))
    }
}

#[async_trait]
impl RouteHandler for NextAuthHandler {
    async fn call(&self, request: ServiceRequest, context: HandlerContext) -> HandlerResult {
        let action = context
            .params
            .get("nextauth")
            .and_then(|rest| rest.split('/').next())
            .unwrap_or_default()
            .to_string();

        match (request.method, action.as_str()) {
            (HttpMethod::Get, "session") => Ok(self.session(&request)),
            (HttpMethod::Get, "providers") => Ok(self.providers()),
            (HttpMethod::Post, "signin") | (HttpMethod::Post, "callback") => self.sign_in(request),
            (HttpMethod::Post, "signout") => Ok(ApiResponse::success(json!({ "ok": true }))),
            (method, action) => Ok(ApiResponse::failure(format!("Unsupported auth action: {} {}", method, action))),
        }
    }
}

pub fn register(handlers: &mut ServiceHandlerMap, ctx: &ServiceContext) {
    handlers.register(
        "auth",
        "nextauth",
        Arc::new(NextAuthHandler::new(ctx.jwt.clone(), ctx.allow_dev_login)),
    );
}
