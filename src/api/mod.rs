//! Host HTTP layer: matches concrete requests against the route table and
//! serves package pages.

pub mod matcher;
pub mod server;

pub use matcher::{MatchOutcome, RouteMatcher};
pub use server::{app, router, AppState};
