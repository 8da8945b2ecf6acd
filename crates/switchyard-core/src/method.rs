//! HTTP method filtering for route entries.

use http::Method;

/// Which request methods a route entry accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    /// Every method (`route.all(...)`).
    All,
    /// Exactly one method.
    Only(Method),
}

impl MethodFilter {
    /// Returns `true` if a request with `method` is accepted.
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            Self::All => true,
            Self::Only(m) => m == method,
        }
    }

    /// Returns the concrete method, if any.
    pub fn method(&self) -> Option<&Method> {
        match self {
            Self::All => None,
            Self::Only(m) => Some(m),
        }
    }
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        Self::Only(method)
    }
}

/// Renders an `Allow` header value, e.g. `GET,HEAD,POST`.
pub fn allow_header(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Appends `method` to `list` unless it is already present.
pub fn push_unique(list: &mut Vec<Method>, method: Method) {
    if !list.contains(&method) {
        list.push(method);
    }
}
