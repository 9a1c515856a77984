use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderValue, Method, Uri},
    middleware,
    response::Json,
    routing::{any, get},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use super::matcher::MatchOutcome;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::manifest::HttpMethod;
use crate::middleware::{session_middleware, ApiResult, Reply, RequestSession};
use crate::packages::{PageResolution, DEFAULT_ROUTE};
use crate::platform::Platform;
use crate::routing::ServiceRequest;
use crate::types::ApiResponse;

#[derive(Clone)]
pub struct AppState {
    pub platform: Arc<Platform>,
}

/// Routes plus session extraction; no transport layers
pub fn router(platform: Arc<Platform>) -> Router {
    let jwt = platform.settings.jwt.clone();

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Package-declared API, matched against the route table
        .route("/api/*path", any(dispatch_api))
        // Package pages
        .route("/app/:slug", get(package_home))
        .route("/app/:slug/:route", get(package_page))
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(jwt, session_middleware))
        .with_state(AppState { platform })
}

/// `router` with body limit, CORS and request tracing as configured
pub fn app(platform: Arc<Platform>, config: &AppConfig) -> Router {
    let mut app = router(platform).layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    if config.security.enable_cors {
        app = app.layer(cors_layer(&config.security.cors_origins));
    }
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Captify platform host",
            "version": version,
            "packages": state.platform.manifests.iter().map(|m| m.slug.as_str()).collect::<Vec<_>>(),
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "api": "/api/* (declared by package manifests)",
                "pages": "/app/:slug[/:route] (package pages)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let platform = &state.platform;

    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
            "routes": platform.table().len(),
            "manifests": platform.manifests.len(),
            "packages": platform.pages.registry().len(),
            "resources": platform.resources.len(),
        }
    }))
}

async fn dispatch_api(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    RequestSession(session): RequestSession,
    Query(query): Query<BTreeMap<String, String>>,
    body: Bytes,
) -> ApiResult {
    let path = uri.path();
    let method: HttpMethod = method
        .as_str()
        .parse()
        .map_err(|_| ApiError::method_not_allowed(path, Vec::new()))?;

    let (entry, params) = match state.platform.matcher.resolve(path, method) {
        MatchOutcome::Matched { entry, params } => (entry, params),
        MatchOutcome::MethodNotAllowed { allowed } => return Err(ApiError::method_not_allowed(path, allowed)),
        MatchOutcome::NotFound => return Err(ApiError::not_found(format!("No route for {} {}", method, path))),
    };

    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::invalid_json(format!("Invalid JSON body: {}", e)))?
    };

    let request = ServiceRequest::new(method, path)
        .with_body(body)
        .with_query(query)
        .with_params(params);

    let response = state
        .platform
        .dispatcher
        .dispatch(entry, request, session.as_ref())
        .await?;
    Ok(Reply::new(response))
}

async fn package_home(State(state): State<AppState>, Path(slug): Path<String>) -> ApiResult {
    resolve_page(&state, &slug, DEFAULT_ROUTE).await
}

async fn package_page(State(state): State<AppState>, Path((slug, route)): Path<(String, String)>) -> ApiResult {
    resolve_page(&state, &slug, &route).await
}

async fn resolve_page(state: &AppState, slug: &str, route: &str) -> ApiResult {
    let pages = &state.platform.pages;

    match pages.resolve_page(slug, route).await {
        PageResolution::Found { package, route, component } => Ok(Reply::new(ApiResponse::success(json!({
            "package": package,
            "route": route,
            "environment": pages.environment(),
            "component": component,
        })))),
        missing => Err(ApiError::not_found(missing.not_found_message().unwrap_or_default())),
    }
}

async fn fallback(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}
