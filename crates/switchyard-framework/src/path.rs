//! Path pattern compilation and matching.
//!
//! Patterns are compiled once, at registration, into an anchored regular
//! expression. The supported syntax:
//!
//! | Token          | Matches                                           |
//! |----------------|---------------------------------------------------|
//! | `/users`       | the literal text                                  |
//! | `:id`          | one segment, captured as `id`                     |
//! | `:id(\d+)`     | one segment matching the constraint               |
//! | `/:format?`    | an optional segment (the leading `/` is optional) |
//! | `*` / `*rest`  | everything to the end, captured as `0` / `rest`   |
//!
//! Exact matchers (routes) must consume the whole path. Prefix matchers
//! (middleware and mounted routers) match at a segment boundary and hand the
//! rest of the path to whatever runs below them.

use std::fmt;

use regex::Regex;
use switchyard_core::{HandlerError, Params, StatusCode};
use thiserror::Error;
use tracing::trace;

use crate::error::{FrameworkError, FrameworkResult};

/// Default constraint for a named parameter: one non-empty segment.
const SEGMENT: &str = "[^/]+?";

/// How much of the path a matcher must consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// The whole path (routes).
    Exact,
    /// A leading run of segments (middleware).
    Prefix,
    /// A leading run of segments; the remainder is dispatched by a mounted
    /// router.
    Nested,
}

impl MatchStrategy {
    /// Returns `true` for strategies that leave a remainder.
    pub fn is_prefix(self) -> bool {
        !matches!(self, Self::Exact)
    }
}

/// Options fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Exact or prefix matching.
    pub strategy: MatchStrategy,
    /// Whether literal text is compared case-sensitively.
    pub case_sensitive: bool,
    /// Whether a trailing slash is significant.
    pub strict: bool,
}

impl MatchOptions {
    /// Options for a route pattern.
    pub fn exact() -> Self {
        Self::with_strategy(MatchStrategy::Exact)
    }

    /// Options for a middleware pattern.
    pub fn prefix() -> Self {
        Self::with_strategy(MatchStrategy::Prefix)
    }

    /// Options for a mount pattern.
    pub fn nested() -> Self {
        Self::with_strategy(MatchStrategy::Nested)
    }

    fn with_strategy(strategy: MatchStrategy) -> Self {
        Self {
            strategy,
            case_sensitive: false,
            strict: false,
        }
    }

    /// Sets case sensitivity.
    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// Sets strict trailing-slash handling.
    pub fn strict(mut self, yes: bool) -> Self {
        self.strict = yes;
        self
    }
}

/// A successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    /// Decoded captures in pattern order.
    pub params: Params,
    /// The consumed part of the path, without a trailing slash.
    pub matched_prefix: String,
    /// What is left, always starting with `/`. `"/"` for exact matches.
    pub remainder: String,
}

/// A captured value is not valid percent-encoded UTF-8.
#[derive(Debug, Clone, Error)]
#[error("Failed to decode param '{value}'")]
pub struct ParamDecodeError {
    value: String,
}

impl ParamDecodeError {
    /// The raw captured text.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Converts into a `400 Bad Request` handler error.
    pub fn into_handler_error(self) -> HandlerError {
        HandlerError::new(self).with_status(StatusCode::BAD_REQUEST)
    }
}

#[derive(Clone)]
enum Compiled {
    /// `/` with a prefix strategy: everything matches, nothing is consumed.
    Everything,
    Pattern {
        regex: Regex,
        /// `(group name, param name)` in pattern order.
        captures: Vec<(String, String)>,
    },
}

/// A compiled path pattern.
#[derive(Clone)]
pub struct PathMatcher {
    pattern: String,
    options: MatchOptions,
    compiled: Compiled,
}

impl PathMatcher {
    /// Compiles `pattern`.
    pub fn compile(pattern: &str, options: MatchOptions) -> FrameworkResult<Self> {
        let normalized = if pattern.starts_with('/') {
            pattern.to_string()
        } else {
            format!("/{pattern}")
        };

        if normalized == "/" && options.strategy.is_prefix() {
            return Ok(Self {
                pattern: pattern.to_string(),
                options,
                compiled: Compiled::Everything,
            });
        }

        let (mut body, captures) = translate(pattern, &normalized)?;

        if !options.strict && body.len() > 1 && body.ends_with('/') {
            body.pop();
        }

        let mut source = String::with_capacity(body.len() + 16);
        if !options.case_sensitive {
            source.push_str("(?i)");
        }
        source.push('^');
        source.push_str(&body);
        match (options.strategy, options.strict) {
            (MatchStrategy::Exact, true) => source.push('$'),
            (MatchStrategy::Exact, false) if body == "/" => source.push('$'),
            (MatchStrategy::Exact, false) => source.push_str("/?$"),
            // a body ending in `/` already stops at a boundary
            _ if body.ends_with('/') => {}
            _ => source.push_str("(?:/|$)"),
        }

        let regex = Regex::new(&source).map_err(|source| FrameworkError::Regex {
            pattern: pattern.to_string(),
            source,
        })?;
        trace!(pattern, regex = %regex.as_str(), "Compiled path pattern");

        Ok(Self {
            pattern: pattern.to_string(),
            options,
            compiled: Compiled::Pattern { regex, captures },
        })
    }

    /// The pattern as registered.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The options the pattern was compiled with.
    pub fn options(&self) -> MatchOptions {
        self.options
    }

    /// Names of the parameters the pattern captures, in order.
    pub fn param_names(&self) -> Vec<&str> {
        match &self.compiled {
            Compiled::Everything => Vec::new(),
            Compiled::Pattern { captures, .. } => {
                captures.iter().map(|(_, name)| name.as_str()).collect()
            }
        }
    }

    /// Matches `path` (without query string).
    ///
    /// Returns `Ok(None)` if the path does not match and an error if a
    /// captured value fails to percent-decode.
    pub fn matches(&self, path: &str) -> Result<Option<PathMatch>, ParamDecodeError> {
        let (regex, captures) = match &self.compiled {
            Compiled::Everything => {
                return Ok(Some(PathMatch {
                    params: Params::new(),
                    matched_prefix: String::new(),
                    remainder: normalize_remainder(path),
                }));
            }
            Compiled::Pattern { regex, captures } => (regex, captures),
        };

        let Some(caps) = regex.captures(path) else {
            return Ok(None);
        };

        let mut params = Params::new();
        for (group, name) in captures {
            if let Some(m) = caps.name(group) {
                let decoded = urlencoding::decode(m.as_str()).map_err(|_| ParamDecodeError {
                    value: m.as_str().to_string(),
                })?;
                params.insert(name.clone(), decoded.into_owned());
            }
        }

        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if !self.options.strategy.is_prefix() {
            return Ok(Some(PathMatch {
                params,
                matched_prefix: whole.trim_end_matches('/').to_string(),
                remainder: "/".to_string(),
            }));
        }

        let consumed = if whole.len() > 1 && whole.ends_with('/') {
            whole.len() - 1
        } else {
            whole.len()
        };
        Ok(Some(PathMatch {
            params,
            matched_prefix: path[..consumed].trim_end_matches('/').to_string(),
            remainder: normalize_remainder(&path[consumed..]),
        }))
    }
}

/// Compiles and matches in one step.
pub fn match_path(
    pattern: &str,
    path: &str,
    options: MatchOptions,
) -> FrameworkResult<Option<PathMatch>> {
    Ok(PathMatcher::compile(pattern, options)?.matches(path)?)
}

impl fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathMatcher")
            .field("pattern", &self.pattern)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn normalize_remainder(rest: &str) -> String {
    if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{rest}")
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Translates the pattern syntax into a regex body plus capture names.
fn translate(original: &str, pattern: &str) -> FrameworkResult<(String, Vec<(String, String)>)> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut body = String::with_capacity(pattern.len() * 2);
    let mut captures: Vec<(String, String)> = Vec::new();
    let mut unnamed = 0usize;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ':' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && is_name_char(chars[j]) {
                    j += 1;
                }
                if j == start {
                    return Err(FrameworkError::invalid_pattern(
                        original,
                        "expected a parameter name after ':'",
                    ));
                }
                let name: String = chars[start..j].iter().collect();

                let mut constraint = SEGMENT.to_string();
                if chars.get(j) == Some(&'(') {
                    let close = find_closing_paren(&chars, j).ok_or_else(|| {
                        FrameworkError::invalid_pattern(original, "unbalanced '(' in constraint")
                    })?;
                    constraint = chars[j + 1..close].iter().collect();
                    if constraint.is_empty() {
                        return Err(FrameworkError::invalid_pattern(
                            original,
                            format!("empty constraint for ':{name}'"),
                        ));
                    }
                    j = close + 1;
                }

                let optional = chars.get(j) == Some(&'?');
                if optional {
                    j += 1;
                }

                let group = format!("g{}", captures.len());
                if optional && body.ends_with('/') {
                    body.pop();
                    body.push_str(&format!("(?:/(?P<{group}>{constraint}))?"));
                } else if optional {
                    body.push_str(&format!("(?P<{group}>{constraint})?"));
                } else {
                    body.push_str(&format!("(?P<{group}>{constraint})"));
                }
                captures.push((group, name));
                i = j;
            }
            '*' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && is_name_char(chars[j]) {
                    j += 1;
                }
                if j != chars.len() {
                    return Err(FrameworkError::invalid_pattern(
                        original,
                        "a wildcard must be the last token",
                    ));
                }
                let name = if j == start {
                    let n = unnamed.to_string();
                    unnamed += 1;
                    n
                } else {
                    chars[start..j].iter().collect()
                };
                let group = format!("g{}", captures.len());
                body.push_str(&format!("(?P<{group}>.*)"));
                captures.push((group, name));
                i = j;
            }
            c => {
                let mut buf = [0u8; 4];
                body.push_str(&regex::escape(c.encode_utf8(&mut buf)));
                i += 1;
            }
        }
    }

    Ok((body, captures))
}

fn find_closing_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut k = open;
    while k < chars.len() {
        match chars[k] {
            '\\' => k += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(k);
                }
            }
            _ => {}
        }
        k += 1;
    }
    None
}
