use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;

use super::handler::{HandlerContext, ServiceRequest};
use super::table::{RouteEntry, RouteTable};
use crate::error::panic_message;
use crate::types::{ApiResponse, UserSession};

/// Per-request dispatch failures. None of these are fatal to the process.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("Authentication required")]
    Unauthorized { service: String, operation: String },

    #[error("Insufficient permissions: requires one of [{}]", .required.join(", "))]
    Forbidden {
        service: String,
        operation: String,
        required: Vec<String>,
    },

    #[error("Unknown operation: {service}.{operation}")]
    UnknownOperation { service: String, operation: String },

    #[error("{message}")]
    HandlerFailed {
        service: String,
        operation: String,
        message: String,
    },
}

impl DispatchError {
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::Unauthorized { .. } => 401,
            DispatchError::Forbidden { .. } => 403,
            DispatchError::UnknownOperation { .. } => 404,
            DispatchError::HandlerFailed { .. } => 500,
        }
    }

    /// `{ success: false, error }` envelope, stamped with timestamp and request id
    pub fn to_api_response(&self) -> ApiResponse {
        ApiResponse::failure(self.to_string()).stamped()
    }
}

/// Enforces the access gate of a route entry, then invokes its handler
#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: Arc<RouteTable>,
}

impl Dispatcher {
    pub fn new(table: RouteTable) -> Self {
        Self { table: Arc::new(table) }
    }

    pub fn from_shared(table: Arc<RouteTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Decide whether `session` may call `entry`.
    ///
    /// Expired or anonymous sessions count as absent. Returns the session the
    /// handler will see.
    pub fn check_access(
        entry: &RouteEntry,
        session: Option<&UserSession>,
    ) -> Result<Option<UserSession>, DispatchError> {
        let session = session.filter(|s| s.is_valid());

        if entry.requires_session() && session.is_none() {
            tracing::debug!("Denied {} {} ({}): no valid session", entry.method, entry.path, entry.target());
            return Err(DispatchError::Unauthorized {
                service: entry.service.clone(),
                operation: entry.operation.clone(),
            });
        }

        if let Some(session) = session {
            if !entry.roles.is_empty() && !session.has_any_role(&entry.roles) {
                tracing::debug!(
                    "Denied {} {} ({}): user {} lacks roles {:?}",
                    entry.method,
                    entry.path,
                    entry.target(),
                    session.user_id,
                    entry.roles
                );
                return Err(DispatchError::Forbidden {
                    service: entry.service.clone(),
                    operation: entry.operation.clone(),
                    required: entry.roles.iter().cloned().collect(),
                });
            }
        }

        Ok(session.cloned())
    }

    /// Gate and invoke an already matched entry.
    ///
    /// Handler errors and panics are contained here and reported as
    /// `HandlerFailed`; successful responses pass through unchanged.
    pub async fn dispatch(
        &self,
        entry: &RouteEntry,
        mut request: ServiceRequest,
        session: Option<&UserSession>,
    ) -> Result<ApiResponse, DispatchError> {
        request.session = Self::check_access(entry, session)?;

        let context = HandlerContext {
            params: std::mem::take(&mut request.params),
            package: entry.package.clone(),
            service: entry.service.clone(),
            operation: entry.operation.clone(),
        };

        let outcome = AssertUnwindSafe(entry.handler.call(request, context))
            .catch_unwind()
            .await;

        let message = match outcome {
            Ok(Ok(response)) => return Ok(response),
            Ok(Err(e)) => format!("{:#}", e),
            Err(payload) => panic_message(payload.as_ref()),
        };

        tracing::error!("Handler {} ({}) failed: {}", entry.target(), entry.package, message);
        Err(DispatchError::HandlerFailed {
            service: entry.service.clone(),
            operation: entry.operation.clone(),
            message,
        })
    }

    /// Dispatch by logical name to the first entry bound to `service.operation`
    pub async fn dispatch_operation(
        &self,
        service: &str,
        operation: &str,
        request: ServiceRequest,
        session: Option<&UserSession>,
    ) -> Result<ApiResponse, DispatchError> {
        let entry = self
            .table
            .find_operation(service, operation)
            .ok_or_else(|| DispatchError::UnknownOperation {
                service: service.to_string(),
                operation: operation.to_string(),
            })?;
        self.dispatch(entry, request, session).await
    }
}
