//! In-process router tests over `tower::ServiceExt::oneshot`

use std::sync::Arc;

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use captify::api::router;
use captify::auth::{issue_token, JwtSettings};
use captify::manifest::{builtin_manifests, ApplicationManifest, HttpMethod, RouteDefinition};
use captify::packages::{builtin_registry, RenderEnvironment};
use captify::platform::{Platform, PlatformSettings};
use captify::routing::{handler_fn, HandlerContext, ServiceHandlerMap, ServiceRequest};
use captify::services::InMemoryResourceClient;
use captify::types::{ApiResponse, UserSession};
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "router-secret";

fn platform(render_environment: RenderEnvironment) -> Result<Arc<Platform>> {
    let mut manifests = builtin_manifests()?;
    manifests.push(
        ApplicationManifest::new("rmf", "Risk Management", "0.1.0")
            .route(RouteDefinition::new("/api/rmf/controls/[id]", HttpMethod::Get, "rmf", "control")?.secure())
            .route(RouteDefinition::new("/api/rmf/explode", HttpMethod::Post, "rmf", "explode")?),
    );

    let handlers = ServiceHandlerMap::new()
        .with(
            "rmf",
            "control",
            handler_fn(|request: ServiceRequest, context: HandlerContext| async move {
                Ok::<_, anyhow::Error>(ApiResponse::success(json!({
                    "id": context.params.get("id"),
                    "user": request.session.map(|s| s.user_id),
                })))
            }),
        )
        .with(
            "rmf",
            "explode",
            handler_fn(|_request: ServiceRequest, _context: HandlerContext| async move {
                if true {
                    panic!("control catalog corrupted");
                }
                Ok::<_, anyhow::Error>(ApiResponse::success(Value::Null))
            }),
        );

    let platform = Platform::assemble(
        manifests,
        handlers,
        Arc::new(InMemoryResourceClient::new()),
        builtin_registry(),
        PlatformSettings {
            jwt: JwtSettings::new(SECRET, 1),
            allow_dev_login: false,
            render_environment,
        },
    )?;
    Ok(Arc::new(platform))
}

fn bearer(user: &str) -> String {
    let token = issue_token(&JwtSettings::new(SECRET, 1), &UserSession::new(user)).expect("token");
    format!("Bearer {}", token)
}

async fn send(app: axum::Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, body))
}

#[tokio::test]
async fn path_params_and_session_reach_the_handler() -> Result<()> {
    let app = router(platform(RenderEnvironment::Browser)?);

    let request = Request::get("/api/rmf/controls/AC-2")
        .header("authorization", bearer("auditor"))
        .body(Body::empty())?;
    let (status, body) = send(app, request).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "id": "AC-2", "user": "auditor" }));
    Ok(())
}

#[tokio::test]
async fn invalid_token_counts_as_anonymous() -> Result<()> {
    let app = router(platform(RenderEnvironment::Browser)?);

    let request = Request::get("/api/rmf/controls/AC-2")
        .header("authorization", "Bearer not-a-token")
        .body(Body::empty())?;
    let (status, _) = send(app, request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn panicking_handler_is_contained() -> Result<()> {
    let platform = platform(RenderEnvironment::Browser)?;

    let request = Request::post("/api/rmf/explode").body(Body::empty())?;
    let (status, body) = send(router(platform.clone()), request).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "control catalog corrupted");

    // the same platform keeps serving
    let request = Request::get("/api/platform/manifests").body(Body::empty())?;
    let (status, body) = send(router(platform), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["manifests"].as_array().map(Vec::len), Some(4));
    Ok(())
}

#[tokio::test]
async fn dev_login_can_be_disabled() -> Result<()> {
    let app = router(platform(RenderEnvironment::Browser)?);

    let request = Request::post("/api/auth/signin")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "userId": "u1" }).to_string()))?;
    let (status, body) = send(app, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Development login is disabled");
    Ok(())
}

#[tokio::test]
async fn server_rendering_resolves_no_pages() -> Result<()> {
    let app = router(platform(RenderEnvironment::Server)?);

    let request = Request::get("/app/core/home").body(Body::empty())?;
    let (status, body) = send(app, request).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Page \"home\" not found in package \"core\"");
    Ok(())
}

#[tokio::test]
async fn unmatched_paths_fall_back_to_json_404() -> Result<()> {
    let app = router(platform(RenderEnvironment::Browser)?);

    let (status, body) = send(app, Request::get("/nowhere").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
    Ok(())
}
