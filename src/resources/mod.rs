//! "Resource + verb" dispatch keyed by resource type

pub mod registry;
pub mod table;

pub use registry::{ResourceHandler, ResourceHandlerRegistry};
pub use table::TableResourceHandler;
