use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ManifestError;

/// One `/`-separated piece of a route path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Static(String),
    /// `[id]`
    Param(String),
    /// `[...slug]` - one or more trailing segments
    CatchAll(String),
    /// `[[...slug]]` - zero or more trailing segments
    OptionalCatchAll(String),
}

impl Segment {
    fn rank(&self) -> u8 {
        match self {
            Segment::Static(_) => 0,
            Segment::Param(_) => 1,
            Segment::CatchAll(_) => 2,
            Segment::OptionalCatchAll(_) => 3,
        }
    }
}

/// A parsed route path such as `/api/auth/[...nextauth]`.
///
/// Parsing happens when a manifest is deserialized, so a `RouteDefinition`
/// never carries a malformed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let invalid = |reason: &str| ManifestError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let rest = raw.strip_prefix('/').ok_or_else(|| invalid("path must start with '/'"))?;
        if rest.is_empty() {
            return Ok(Self { raw: raw.to_string(), segments: Vec::new() });
        }

        let mut segments = Vec::new();
        let mut names = HashSet::new();
        let parts: Vec<&str> = rest.split('/').collect();

        for (index, part) in parts.iter().enumerate() {
            if part.is_empty() {
                return Err(invalid("empty path segment"));
            }

            let segment = if let Some(inner) = part.strip_prefix("[[...").and_then(|p| p.strip_suffix("]]")) {
                Segment::OptionalCatchAll(inner.to_string())
            } else if let Some(inner) = part.strip_prefix("[...").and_then(|p| p.strip_suffix(']')) {
                Segment::CatchAll(inner.to_string())
            } else if let Some(inner) = part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
                Segment::Param(inner.to_string())
            } else if part.contains('[') || part.contains(']') {
                return Err(invalid("unbalanced brackets in segment"));
            } else {
                Segment::Static(part.to_string())
            };

            match &segment {
                Segment::Param(name) | Segment::CatchAll(name) | Segment::OptionalCatchAll(name) => {
                    if !is_param_name(name) {
                        return Err(invalid("dynamic segment names must be alphanumeric"));
                    }
                    if !names.insert(name.clone()) {
                        return Err(invalid("duplicate dynamic segment name"));
                    }
                    let is_catch_all = !matches!(segment, Segment::Param(_));
                    if is_catch_all && index + 1 != parts.len() {
                        return Err(invalid("catch-all segment must be last"));
                    }
                }
                Segment::Static(_) => {}
            }

            segments.push(segment);
        }

        Ok(Self { raw: raw.to_string(), segments })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_dynamic(&self) -> bool {
        self.segments.iter().any(|s| !matches!(s, Segment::Static(_)))
    }

    /// The path with dynamic segment names erased.
    ///
    /// `/a/[id]` and `/a/[name]` share a shape and therefore claim the same
    /// URLs. Both catch-all forms erase to `/[...]`.
    pub fn shape(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Static(text) => format!("/{}", text),
                Segment::Param(_) => "/[]".to_string(),
                Segment::CatchAll(_) | Segment::OptionalCatchAll(_) => "/[...]".to_string(),
            })
            .collect()
    }

    /// Every shape this pattern claims. An optional catch-all also claims
    /// its parent path, so `/docs/[[...slug]]` collides with `/docs`.
    pub fn shapes(&self) -> Vec<String> {
        let mut shapes = vec![self.shape()];
        if let Some(Segment::OptionalCatchAll(_)) = self.segments.last() {
            let parent = Self {
                raw: String::new(),
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            };
            shapes.push(parent.shape());
        }
        shapes
    }

    /// Ordering key for most-specific-first matching (smaller is more specific)
    pub fn specificity(&self) -> Vec<u8> {
        self.segments.iter().map(Segment::rank).collect()
    }

    /// Match a concrete request path, returning extracted parameters.
    ///
    /// Catch-all values are the remaining segments re-joined with `/`.
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let rest = path.strip_prefix('/')?;
        let rest = rest.trim_end_matches('/');
        let parts: Vec<&str> = if rest.is_empty() { Vec::new() } else { rest.split('/').collect() };

        let mut params = BTreeMap::new();
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Static(text) => {
                    if parts.get(index) != Some(&text.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(index).filter(|p| !p.is_empty())?;
                    params.insert(name.clone(), (*value).to_string());
                }
                Segment::CatchAll(name) => {
                    let tail = parts.get(index..).filter(|t| !t.is_empty())?;
                    params.insert(name.clone(), tail.join("/"));
                    return Some(params);
                }
                Segment::OptionalCatchAll(name) => {
                    let tail = parts.get(index..).unwrap_or_default();
                    if !tail.is_empty() {
                        params.insert(name.clone(), tail.join("/"));
                    }
                    return Some(params);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

fn is_param_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl TryFrom<String> for PathPattern {
    type Error = ManifestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PathPattern> for String {
    fn from(pattern: PathPattern) -> Self {
        pattern.raw
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.raw)
    }
}
