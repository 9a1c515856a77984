pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod manifest;
pub mod middleware;
pub mod packages;
pub mod platform;
pub mod resources;
pub mod routing;
pub mod services;
pub mod types;

#[cfg(test)]
pub mod testing;
