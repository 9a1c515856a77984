//! Installed packages found on disk as `<package_dir>/<slug>/registry.json`.
//!
//! The registry file mirrors a package module's exports:
//!
//! ```json
//! {
//!   "pages": { "home": { "default": { "title": "Home" } } },
//!   "components": { "card": { "title": "Card", "props": { "size": "sm" } } }
//! }
//! ```
//!
//! A page entry is either a module with a `default` export or the bare
//! component. A file containing `null` is an empty module.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;

use super::registry::{
    component_loader, Component, ComponentModule, ComponentRegistry, LoadError, PackageLoader, PackageModule,
    PackageRegistry,
};
use crate::manifest::is_valid_slug;

pub const REGISTRY_FILE: &str = "registry.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPackage {
    pub slug: String,
    pub registry_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    pages: Option<BTreeMap<String, EntryFile>>,
    #[serde(default)]
    components: Option<BTreeMap<String, EntryFile>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntryFile {
    WithDefault { default: ComponentFile },
    Bare(ComponentFile),
}

#[derive(Debug, Deserialize)]
struct ComponentFile {
    #[serde(default)]
    id: Option<String>,
    title: String,
    #[serde(default)]
    props: Value,
}

impl ComponentFile {
    fn into_component(self, slug: &str, route: &str) -> Component {
        Component {
            id: self.id.unwrap_or_else(|| format!("{}/{}", slug, route)),
            title: self.title,
            props: self.props,
        }
    }
}

fn into_registry(slug: &str, entries: BTreeMap<String, EntryFile>) -> ComponentRegistry {
    entries
        .into_iter()
        .map(|(route, entry)| {
            let module = match entry {
                EntryFile::WithDefault { default } => ComponentModule::Default(default.into_component(slug, &route)),
                EntryFile::Bare(bare) => ComponentModule::Bare(bare.into_component(slug, &route)),
            };
            (route, component_loader(module))
        })
        .collect()
}

/// Parse a registry file body into a package module
fn parse_registry(slug: &str, path: &Path, content: &str) -> Result<Option<PackageModule>, LoadError> {
    let file: Option<RegistryFile> = serde_json::from_str(content).map_err(|e| LoadError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(file.map(|file| PackageModule {
        pages: file.pages.map(|pages| into_registry(slug, pages)),
        components: file.components.map(|components| into_registry(slug, components)),
    }))
}

/// Loader that reads and parses the registry file each time it is invoked
pub fn registry_loader(slug: impl Into<String>, path: PathBuf) -> PackageLoader {
    let slug = slug.into();
    Arc::new(move || {
        let slug = slug.clone();
        let path = path.clone();
        async move {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| LoadError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            parse_registry(&slug, &path, &content)
        }
        .boxed()
    })
}

/// List package directories under `dir`, sorted by slug.
///
/// Hidden and `_`-prefixed directories are skipped, as are names that are not
/// valid slugs. The registry file itself is only read when the package loads.
pub fn discover_packages(dir: &Path) -> io::Result<Vec<DiscoveredPackage>> {
    let mut packages = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('_') || name.starts_with('.') {
            continue;
        }
        if !is_valid_slug(&name) {
            tracing::warn!("Skipping package directory with invalid slug: {}", entry.path().display());
            continue;
        }

        packages.push(DiscoveredPackage {
            registry_path: entry.path().join(REGISTRY_FILE),
            slug: name,
        });
    }

    packages.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(packages)
}

/// Register every package found under `dir`; discovered slugs replace built-ins
pub fn install_discovered(registry: &mut PackageRegistry, dir: &Path) -> io::Result<usize> {
    let packages = discover_packages(dir)?;
    for package in &packages {
        let replaced = registry.register(
            package.slug.clone(),
            registry_loader(package.slug.clone(), package.registry_path.clone()),
        );
        if replaced {
            tracing::info!("Discovered package {} replaces the built-in package", package.slug);
        } else {
            tracing::info!("Discovered package {}", package.slug);
        }
    }
    Ok(packages.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::builtin::builtin_registry;
    use crate::packages::{LoadState, RenderEnvironment};
    use crate::testing::LogCapture;

    fn package(dir: &Path, slug: &str, registry: Option<&str>) {
        let package_dir = dir.join(slug);
        fs::create_dir_all(&package_dir).unwrap();
        if let Some(body) = registry {
            fs::write(package_dir.join(REGISTRY_FILE), body).unwrap();
        }
    }

    #[test]
    fn skips_hidden_private_and_invalid_directories() {
        let dir = tempfile::tempdir().unwrap();
        package(dir.path(), "rmf", Some("{}"));
        package(dir.path(), "ops", None);
        package(dir.path(), "_shared", Some("{}"));
        package(dir.path(), ".cache", Some("{}"));
        package(dir.path(), "Bad Name", Some("{}"));
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let slugs: Vec<String> = discover_packages(dir.path()).unwrap().into_iter().map(|p| p.slug).collect();
        assert_eq!(slugs, vec!["ops", "rmf"]);
    }

    #[tokio::test]
    async fn discovered_package_replaces_builtin() {
        let dir = tempfile::tempdir().unwrap();
        package(
            dir.path(),
            "mi",
            Some(r#"{ "pages": { "home": { "default": { "title": "Material Insights" } } } }"#),
        );

        let mut registry = builtin_registry();
        assert_eq!(install_discovered(&mut registry, dir.path()).unwrap(), 1);

        let resolver = registry
            .load_package_registry("mi", RenderEnvironment::Browser)
            .await
            .unwrap();
        let home = resolver.resolve_route("home").await.unwrap();
        assert_eq!(home.id, "mi/home");
        assert_eq!(home.title, "Material Insights");
    }

    #[tokio::test]
    async fn bare_components_resolve_after_pages() {
        let dir = tempfile::tempdir().unwrap();
        package(
            dir.path(),
            "pmbook",
            Some(
                r#"{
                    "pages": { "home": { "title": "PM Book" } },
                    "components": { "card": { "id": "pmbook/card-v2", "title": "Card", "props": { "size": "sm" } } }
                }"#,
            ),
        );

        let mut registry = PackageRegistry::new();
        install_discovered(&mut registry, dir.path()).unwrap();
        let resolver = registry
            .load_package_registry("pmbook", RenderEnvironment::Browser)
            .await
            .unwrap();

        let card = resolver.resolve_route("card").await.unwrap();
        assert_eq!(card.id, "pmbook/card-v2");
        assert_eq!(card.props["size"], "sm");
    }

    #[tokio::test]
    async fn missing_or_broken_registry_degrades_with_one_warning() {
        let dir = tempfile::tempdir().unwrap();
        package(dir.path(), "ops", None);
        package(dir.path(), "broken", Some("{ not json"));
        package(dir.path(), "empty", Some("null"));

        let mut registry = PackageRegistry::new();
        install_discovered(&mut registry, dir.path()).unwrap();

        for slug in ["ops", "broken", "empty"] {
            let (logs, _guard) = LogCapture::install();
            assert!(registry.load_package_registry(slug, RenderEnvironment::Browser).await.is_none());
            assert_eq!(logs.count("WARN"), 1, "{}", slug);
            assert_eq!(registry.load_state(slug), LoadState::Failed);
        }
    }
}
