//! Static route matching.
//!
//! Routes are tried in registration order and the first match wins. A request no route
//! matches goes to the application handler, so static routes always take precedence.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use regex::{NoExpand, Regex, RegexBuilder};
use tracing::trace;

use crate::ServerError;

/// A path pattern and the directory it serves.
#[derive(Debug, Clone)]
pub struct StaticRoute {
    pattern: Regex,
    content_dir: PathBuf,
}

impl StaticRoute {
    /// Compiles `pattern` as a case-insensitive regular expression, e.g. `^/static/`.
    pub fn new(pattern: &str, content_dir: impl Into<PathBuf>) -> Result<Self, ServerError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| ServerError::InvalidRoute { pattern: pattern.to_string(), source })?;
        Ok(Self { pattern: regex, content_dir: content_dir.into() })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// The request path relative to the content directory: `path` without the first match.
    pub fn strip<'a>(&self, path: &'a str) -> Cow<'a, str> {
        self.pattern.replacen(path, 1, NoExpand(""))
    }
}

/// The ordered static route table, read-only once the server starts.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<StaticRoute>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, route: StaticRoute) {
        self.routes.push(route);
    }

    /// Finds the first route matching `path`, `None` meaning the application handles it.
    pub fn route(&self, path: &str) -> Option<&StaticRoute> {
        let matched = self.routes.iter().find(|route| route.is_match(path));
        trace!(path, pattern = ?matched.map(StaticRoute::pattern), "routed request");
        matched
    }

    pub fn routes(&self) -> &[StaticRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
