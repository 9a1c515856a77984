//! Client-side package resolution: slug -> lazily loaded package module ->
//! page or component.

pub mod builtin;
pub mod discovery;
pub mod registry;
pub mod router;

pub use builtin::builtin_registry;
pub use discovery::{discover_packages, install_discovered, DiscoveredPackage};
pub use registry::{
    component_loader, module_loader, Component, ComponentLoader, ComponentModule, ComponentRegistry, LoadError,
    LoadFuture, LoadState, PackageLoader, PackageModule, PackageRegistry, PageResolver, RenderEnvironment,
};
pub use router::{PageResolution, PageRouter, DEFAULT_ROUTE};
