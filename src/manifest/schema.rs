use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ManifestError;
use super::path::PathPattern;

/// HTTP verbs a route may declare. `All` matches any verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    All,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::All => "ALL",
        }
    }

    /// Whether a route declared with `self` serves a request made with `request`
    pub fn accepts(&self, request: HttpMethod) -> bool {
        *self == HttpMethod::All || *self == request
    }

    /// Whether two declarations would claim the same requests
    pub fn overlaps(&self, other: HttpMethod) -> bool {
        self.accepts(other) || other.accepts(*self)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "ALL" => Ok(HttpMethod::All),
            _ => Err(ManifestError::UnknownMethod(s.to_string())),
        }
    }
}

/// One route contributed by a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDefinition {
    pub path: PathPattern,
    pub method: HttpMethod,
    pub service: String,
    pub operation: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl RouteDefinition {
    pub fn new(
        path: &str,
        method: HttpMethod,
        service: impl Into<String>,
        operation: impl Into<String>,
    ) -> Result<Self, ManifestError> {
        Ok(Self {
            path: PathPattern::parse(path)?,
            method,
            service: service.into(),
            operation: operation.into(),
            secure: false,
            roles: Vec::new(),
            description: String::new(),
        })
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Roles as an ordered set (duplicates collapse)
    pub fn role_set(&self) -> BTreeSet<String> {
        self.roles.iter().cloned().collect()
    }
}

/// Navigation entry a package contributes to the shell menu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuEntry {
    pub id: String,
    pub label: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    DynamodbTable,
    S3Bucket,
    NeptuneGraph,
    BedrockAgent,
    LambdaFunction,
    #[serde(other)]
    Other,
}

/// AWS resource a package depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDeclaration {
    pub kind: ResourceKind,
    pub name: String,
    /// Key under which the resource is addressed through `/api/captify`;
    /// defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ResourceDeclaration {
    pub fn resource_key(&self) -> &str {
        self.resource_type.as_deref().unwrap_or(&self.name)
    }
}

/// Per-package registration artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationManifest {
    pub slug: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
    #[serde(default)]
    pub menu: Vec<MenuEntry>,
    #[serde(default)]
    pub resources: Vec<ResourceDeclaration>,
}

impl ApplicationManifest {
    pub fn new(slug: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            version: version.into(),
            routes: Vec::new(),
            menu: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn route(mut self, route: RouteDefinition) -> Self {
        self.routes.push(route);
        self
    }

    pub fn menu_entry(mut self, entry: MenuEntry) -> Self {
        self.menu.push(entry);
        self
    }

    pub fn resource(mut self, resource: ResourceDeclaration) -> Self {
        self.resources.push(resource);
        self
    }

    /// Reject manifests that cannot be registered.
    ///
    /// Paths are already parsed on construction; this checks identity fields,
    /// route targets and duplicate routes within the manifest.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if !is_valid_slug(&self.slug) {
            return Err(ManifestError::InvalidSlug(self.slug.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(ManifestError::MissingField { slug: self.slug.clone(), field: "name" });
        }
        if self.version.trim().is_empty() {
            return Err(ManifestError::MissingField { slug: self.slug.clone(), field: "version" });
        }

        let mut claimed: HashMap<String, Vec<HttpMethod>> = HashMap::new();
        for route in &self.routes {
            let invalid = |reason: &str| ManifestError::InvalidRoute {
                slug: self.slug.clone(),
                path: route.path.to_string(),
                method: route.method,
                reason: reason.to_string(),
            };

            if !is_identifier(&route.service) {
                return Err(invalid("service must be a non-empty identifier"));
            }
            if !is_identifier(&route.operation) {
                return Err(invalid("operation must be a non-empty identifier"));
            }
            if route.roles.iter().any(|r| r.trim().is_empty()) {
                return Err(invalid("roles must not be empty strings"));
            }

            for shape in route.path.shapes() {
                let methods = claimed.entry(shape).or_default();
                if methods.iter().any(|m| m.overlaps(route.method)) {
                    return Err(ManifestError::DuplicateRoute {
                        slug: self.slug.clone(),
                        path: route.path.to_string(),
                        method: route.method,
                    });
                }
                methods.push(route.method);
            }
        }

        Ok(())
    }
}

/// Menu entry tagged with the package that contributed it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMenuEntry {
    pub package: String,
    #[serde(flatten)]
    pub entry: MenuEntry,
}

/// All installed manifests, keyed by slug, in registration order
#[derive(Debug, Clone, Default)]
pub struct ManifestSet {
    manifests: Vec<ApplicationManifest>,
}

impl ManifestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a manifest; slugs must be unique
    pub fn insert(&mut self, manifest: ApplicationManifest) -> Result<(), ManifestError> {
        manifest.validate()?;
        if self.get(&manifest.slug).is_some() {
            return Err(ManifestError::DuplicateSlug(manifest.slug));
        }
        self.manifests.push(manifest);
        Ok(())
    }

    pub fn extend<I>(&mut self, manifests: I) -> Result<(), ManifestError>
    where
        I: IntoIterator<Item = ApplicationManifest>,
    {
        for manifest in manifests {
            self.insert(manifest)?;
        }
        Ok(())
    }

    pub fn get(&self, slug: &str) -> Option<&ApplicationManifest> {
        self.manifests.iter().find(|m| m.slug == slug)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApplicationManifest> {
        self.manifests.iter()
    }

    pub fn as_slice(&self) -> &[ApplicationManifest] {
        &self.manifests
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Menu entries from every package visible to `roles`, ordered by `order` then label
    pub fn menu_for(&self, roles: &BTreeSet<String>) -> Vec<PackageMenuEntry> {
        let mut entries: Vec<PackageMenuEntry> = self
            .manifests
            .iter()
            .flat_map(|m| {
                m.menu.iter().map(move |entry| PackageMenuEntry {
                    package: m.slug.clone(),
                    entry: entry.clone(),
                })
            })
            .filter(|e| e.entry.roles.is_empty() || e.entry.roles.iter().any(|r| roles.contains(r)))
            .collect();
        entries.sort_by(|a, b| a.entry.order.cmp(&b.entry.order).then_with(|| a.entry.label.cmp(&b.entry.label)));
        entries
    }

    /// Declared resources with their contributing package slug
    pub fn resources(&self) -> impl Iterator<Item = (&str, &ResourceDeclaration)> {
        self.manifests
            .iter()
            .flat_map(|m| m.resources.iter().map(move |r| (m.slug.as_str(), r)))
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn is_identifier(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
