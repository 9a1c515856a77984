//! Test doubles shared by unit tests across the crate

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::manifest::{ApplicationManifest, HttpMethod, RouteDefinition};
use crate::routing::{HandlerContext, HandlerResult, RouteHandler, ServiceHandlerMap, ServiceRequest};
use crate::types::ApiResponse;

/// Handler that counts invocations and answers with a fixed payload
pub struct SpyHandler {
    calls: AtomicUsize,
    payload: Value,
}

impl SpyHandler {
    pub fn new(payload: Value) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            payload,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteHandler for SpyHandler {
    async fn call(&self, _request: ServiceRequest, _context: HandlerContext) -> HandlerResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ApiResponse::success(self.payload.clone()))
    }
}

/// Handler that always returns an error with the given message
pub struct FailingHandler(pub &'static str);

#[async_trait]
impl RouteHandler for FailingHandler {
    async fn call(&self, _request: ServiceRequest, _context: HandlerContext) -> HandlerResult {
        Err(anyhow::anyhow!(self.0))
    }
}

/// Handler that panics instead of returning
pub struct PanickingHandler(pub &'static str);

#[async_trait]
impl RouteHandler for PanickingHandler {
    async fn call(&self, _request: ServiceRequest, _context: HandlerContext) -> HandlerResult {
        panic!("{}", self.0)
    }
}

pub fn noop_handler() -> Arc<dyn RouteHandler> {
    SpyHandler::new(Value::Null)
}

pub fn route(path: &str, method: HttpMethod, service: &str, operation: &str) -> RouteDefinition {
    RouteDefinition::new(path, method, service, operation).unwrap()
}

pub fn manifest(slug: &str, routes: Vec<RouteDefinition>) -> ApplicationManifest {
    routes
        .into_iter()
        .fold(ApplicationManifest::new(slug, slug, "1.0.0"), |m, r| m.route(r))
}

/// Handler map binding every route of `manifests` to a no-op handler
pub fn handlers_for(manifests: &[ApplicationManifest]) -> ServiceHandlerMap {
    let mut map = ServiceHandlerMap::new();
    for route in manifests.iter().flat_map(|m| m.routes.iter()) {
        map.register(route.service.as_str(), route.operation.as_str(), noop_handler());
    }
    map
}

/// In-memory sink for `tracing` output.
///
/// Install with `LogCapture::install()` inside a current-thread test; the
/// returned guard keeps the subscriber active until dropped.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut buffer) = self.0.lock() {
            buffer.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let buffer = capture.buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || CaptureWriter(buffer.clone()))
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }

    /// Number of captured lines at `level` ("WARN", "ERROR", ...)
    pub fn count(&self, level: &str) -> usize {
        self.contents().lines().filter(|line| line.contains(level)).count()
    }
}
