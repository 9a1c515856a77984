use std::collections::BTreeMap;
use std::sync::Arc;

use crate::manifest::HttpMethod;
use crate::routing::{RouteEntry, RouteTable};

/// Result of matching a concrete request against the route table
#[derive(Debug)]
pub enum MatchOutcome<'a> {
    Matched {
        entry: &'a RouteEntry,
        params: BTreeMap<String, String>,
    },
    /// The path is known but no entry serves this verb
    MethodNotAllowed { allowed: Vec<HttpMethod> },
    NotFound,
}

/// Host-side path matching over a built route table.
///
/// Entries are tried most-specific-first: static segments before dynamic,
/// dynamic before catch-all, declaration order breaking ties.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    table: Arc<RouteTable>,
    order: Vec<usize>,
}

impl RouteMatcher {
    pub fn new(table: Arc<RouteTable>) -> Self {
        let mut order: Vec<usize> = (0..table.len()).collect();
        order.sort_by_key(|&i| table.entries()[i].path.specificity());
        Self { table, order }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    fn ordered(&self) -> impl Iterator<Item = &RouteEntry> {
        self.order.iter().filter_map(|&i| self.table.entries().get(i))
    }

    pub fn resolve(&self, path: &str, method: HttpMethod) -> MatchOutcome<'_> {
        let mut allowed = Vec::new();

        for entry in self.ordered() {
            let Some(params) = entry.path.matches(path) else {
                continue;
            };
            if entry.method.accepts(method) {
                return MatchOutcome::Matched { entry, params };
            }
            if !allowed.contains(&entry.method) {
                allowed.push(entry.method);
            }
        }

        if allowed.is_empty() {
            MatchOutcome::NotFound
        } else {
            allowed.sort();
            MatchOutcome::MethodNotAllowed { allowed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::build;
    use crate::testing::{handlers_for, manifest, route};

    fn matcher() -> RouteMatcher {
        let manifests = vec![
            manifest(
                "auth",
                vec![
                    route("/api/auth/[...nextauth]", HttpMethod::Get, "auth", "nextauth"),
                    route("/api/auth/[...nextauth]", HttpMethod::Post, "auth", "nextauth"),
                ],
            ),
            manifest(
                "files",
                vec![
                    route("/api/files/[[...prefix]]", HttpMethod::Get, "files", "list"),
                    route("/api/files/[id]", HttpMethod::Get, "files", "get"),
                    route("/api/files/recent", HttpMethod::Get, "files", "recent"),
                    route("/api/files/[id]", HttpMethod::Delete, "files", "remove"),
                ],
            ),
        ];
        let table = build(&manifests, &handlers_for(&manifests)).unwrap();
        RouteMatcher::new(Arc::new(table))
    }

    fn operation(outcome: MatchOutcome<'_>) -> String {
        match outcome {
            MatchOutcome::Matched { entry, .. } => entry.operation.clone(),
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn static_beats_dynamic_beats_catch_all() {
        let matcher = matcher();
        assert_eq!(operation(matcher.resolve("/api/files/recent", HttpMethod::Get)), "recent");
        assert_eq!(operation(matcher.resolve("/api/files/f-1", HttpMethod::Get)), "get");
        assert_eq!(operation(matcher.resolve("/api/files/a/b", HttpMethod::Get)), "list");
        assert_eq!(operation(matcher.resolve("/api/files", HttpMethod::Get)), "list");
    }

    #[test]
    fn catch_all_params_are_extracted() {
        match matcher().resolve("/api/auth/signin/credentials", HttpMethod::Post) {
            MatchOutcome::Matched { params, .. } => {
                assert_eq!(params.get("nextauth").map(String::as_str), Some("signin/credentials"));
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn wrong_verb_is_method_not_allowed() {
        match matcher().resolve("/api/auth/session", HttpMethod::Delete) {
            MatchOutcome::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![HttpMethod::Get, HttpMethod::Post]);
            }
            other => panic!("expected 405, got {:?}", other),
        }
    }

    #[test]
    fn unknown_path_is_not_found() {
        assert!(matches!(matcher().resolve("/api/nothing", HttpMethod::Get), MatchOutcome::NotFound));
    }
}
