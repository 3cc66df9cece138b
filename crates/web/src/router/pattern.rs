//! Path patterns used by router entries.
//!
//! A pattern is a `/` separated list of segments. A segment is a literal, a `:name`
//! parameter matching one segment, or a final `*name` catch-all matching the rest of the
//! path. Matching ignores ASCII and Unicode case.

use std::fmt;

use regex::Regex;

use crate::error::RouteError;

#[derive(Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    names: Vec<String>,
    end: bool,
}

/// A successful match: how many bytes of the path were consumed and the captured params.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub len: usize,
    pub params: Vec<(String, String)>,
}

impl PathPattern {
    /// Compiles `pattern`. With `end` the whole path must match (one trailing slash is
    /// tolerated), otherwise the pattern matches a prefix ending at a `/` boundary.
    pub fn new(pattern: &str, end: bool) -> Result<Self, RouteError> {
        if !pattern.is_empty() && !pattern.starts_with('/') {
            return Err(RouteError::invalid_pattern(pattern, "must start with '/'"));
        }

        let trimmed = pattern.strip_suffix('/').unwrap_or(pattern);
        let mut expr = String::from("(?i)^");
        let mut names: Vec<String> = Vec::new();

        let segments: Vec<&str> = match trimmed.strip_prefix('/') {
            Some(rest) => rest.split('/').collect(),
            None => Vec::new(),
        };
        let last = segments.len().saturating_sub(1);

        for (i, segment) in segments.iter().enumerate() {
            expr.push('/');
            if let Some(name) = segment.strip_prefix(':') {
                check_name(pattern, name, &names)?;
                names.push(name.to_string());
                expr.push_str("([^/]+)");
            } else if let Some(name) = segment.strip_prefix('*') {
                check_name(pattern, name, &names)?;
                if i != last {
                    return Err(RouteError::invalid_pattern(pattern, "catch-all must be the last segment"));
                }
                names.push(name.to_string());
                expr.push_str("(.*)");
            } else if segment.is_empty() {
                return Err(RouteError::invalid_pattern(pattern, "empty segment"));
            } else {
                expr.push_str(&regex::escape(segment));
            }
        }

        if end {
            expr.push_str("/?$");
        }

        let regex = Regex::new(&expr).map_err(|e| RouteError::invalid_pattern(pattern, e))?;
        Ok(Self { source: pattern.to_string(), regex, names, end })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_end(&self) -> bool {
        self.end
    }

    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        let captures = self.regex.captures(path)?;
        let len = captures.get(0)?.end();

        if !self.end && len < path.len() && !path[len..].starts_with('/') && !path[..len].ends_with('/') {
            return None;
        }

        let params = self
            .names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| captures.get(i + 1).map(|value| (name.clone(), value.as_str().to_string())))
            .collect();

        Some(PathMatch { len, params })
    }
}

fn check_name(pattern: &str, name: &str, seen: &[String]) -> Result<(), RouteError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(RouteError::invalid_pattern(pattern, format!("invalid parameter name '{name}'")));
    }
    if seen.iter().any(|other| other == name) {
        return Err(RouteError::invalid_pattern(pattern, format!("duplicate parameter '{name}'")));
    }
    Ok(())
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPattern").field("pattern", &self.source).field("end", &self.end).finish()
    }
}
