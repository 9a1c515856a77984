//! Package manifests: the declarative surface each package contributes
//! (routes, menu entries, AWS resource dependencies).

pub mod builtin;
pub mod error;
pub mod loader;
pub mod path;
pub mod schema;

pub use builtin::builtin_manifests;
pub use error::ManifestError;
pub use loader::{load_manifest_dir, load_manifest_file};
pub use path::{PathPattern, Segment};
pub use schema::{
    is_valid_slug, ApplicationManifest, HttpMethod, ManifestSet, MenuEntry, PackageMenuEntry,
    ResourceDeclaration, ResourceKind, RouteDefinition,
};
