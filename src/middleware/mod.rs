pub mod auth;
pub mod response;

pub use auth::{session_middleware, RequestSession};
pub use response::{ApiResult, Reply};
