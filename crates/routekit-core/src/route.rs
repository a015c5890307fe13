//! Routes and HTTP verbs.
//!
//! A route is either a path template (`/users/:id`, `/files/{name}`) or a raw
//! regular expression. Controller base routes and action routes are joined
//! with [`Route::join`]; adapters compile the result with [`Route::compile`].

use http::Method;
use regex::Regex;
use std::fmt;

/// HTTP verb an action answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Any method
    All,
}

impl Verb {
    /// Whether a request with `method` is served by this verb directly.
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            Verb::All => true,
            verb => verb.as_method().as_ref() == Some(method),
        }
    }

    pub fn as_method(&self) -> Option<Method> {
        match self {
            Verb::Get => Some(Method::GET),
            Verb::Post => Some(Method::POST),
            Verb::Put => Some(Method::PUT),
            Verb::Patch => Some(Method::PATCH),
            Verb::Delete => Some(Method::DELETE),
            Verb::Head => Some(Method::HEAD),
            Verb::Options => Some(Method::OPTIONS),
            Verb::All => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Head => "HEAD",
            Verb::Options => "OPTIONS",
            Verb::All => "ALL",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A route template or pattern.
#[derive(Clone)]
pub enum Route {
    Path(String),
    Pattern(Regex),
}

impl Route {
    pub fn path(path: impl Into<String>) -> Self {
        Route::Path(path.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Route::Path(path) if path.is_empty())
    }

    /// Append `route` to the base route `base`.
    ///
    /// Paths are concatenated. A pattern under a non-empty base becomes
    /// `^{base}{pattern}/?$`, with the base's trailing `$` and the pattern's
    /// leading `^` removed. A base without any `/` gets one prepended.
    pub fn join(base: &Route, route: &Route) -> Route {
        match (base, route) {
            (Route::Path(base), Route::Path(route)) => {
                Route::Path(format!("{}{}", normalize_base(base), route))
            }
            (Route::Path(base), Route::Pattern(pattern)) => {
                if base.is_empty() {
                    return Route::Pattern(pattern.clone());
                }
                let prefix = path_source(&normalize_base(base));
                combine(&prefix, strip_anchors(pattern.as_str()))
            }
            (Route::Pattern(base), Route::Path(route)) => {
                let base = base.as_str().trim_end_matches('$');
                if route.is_empty() {
                    return combine(strip_start(base), "");
                }
                combine(strip_start(base), &path_source(route))
            }
            (Route::Pattern(base), Route::Pattern(pattern)) => combine(
                strip_start(base.as_str().trim_end_matches('$')),
                strip_anchors(pattern.as_str()),
            ),
        }
    }

    /// Compile into an anchored, case-insensitive regex with named groups for
    /// path parameters. Patterns are returned unchanged.
    pub fn compile(&self) -> Result<Regex, regex::Error> {
        match self {
            Route::Path(path) => {
                let trimmed = path.trim_end_matches('/');
                Regex::new(&format!("(?i)^{}/?$", path_source(trimmed)))
            }
            Route::Pattern(pattern) => Ok(pattern.clone()),
        }
    }
}

impl Default for Route {
    fn default() -> Self {
        Route::Path(String::new())
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Path(path) => f.write_str(path),
            Route::Pattern(pattern) => write!(f, "/{}/", pattern.as_str()),
        }
    }
}

impl From<&str> for Route {
    fn from(path: &str) -> Self {
        Route::Path(path.to_string())
    }
}

impl From<String> for Route {
    fn from(path: String) -> Self {
        Route::Path(path)
    }
}

impl From<Regex> for Route {
    fn from(pattern: Regex) -> Self {
        Route::Pattern(pattern)
    }
}

fn normalize_base(base: &str) -> String {
    if !base.is_empty() && !base.contains('/') {
        format!("/{}", base)
    } else {
        base.to_string()
    }
}

fn segment_param(segment: &str) -> Option<&str> {
    if let Some(name) = segment.strip_prefix(':') {
        return Some(name).filter(|n| !n.is_empty());
    }
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|n| !n.is_empty())
}

/// Regex source for a path template, without anchors.
///
/// A parameter name repeated in the template is captured by its last
/// occurrence; earlier ones become unnamed groups.
fn path_source(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| match segment_param(segment) {
            Some(name) if segments[i + 1..].iter().any(|later| segment_param(later) == Some(name)) => {
                "([^/]+)".to_string()
            }
            Some(name) => format!("(?P<{}>[^/]+)", name),
            None => regex::escape(segment),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn strip_start(source: &str) -> &str {
    source.strip_prefix('^').unwrap_or(source)
}

fn strip_anchors(source: &str) -> &str {
    let source = strip_start(source);
    source.strip_suffix('$').unwrap_or(source)
}

fn combine(prefix: &str, pattern: &str) -> Route {
    let source = format!("^{}{}/?$", prefix, pattern);
    match Regex::new(&source) {
        Ok(regex) => Route::Pattern(regex),
        // Unparseable joins fall back to a literal path match
        Err(_) => Route::Path(source),
    }
}
