use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request matching conditions for a route.
///
/// A matcher without a path specifier matches every path; once a route is
/// resolved it is rendered as the `/` prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    #[serde(flatten)]
    pub path_specifier: Option<PathSpecifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderMatcher>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_parameters: Vec<QueryParameterMatcher>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PathSpecifier {
    Prefix(String),
    Exact(String),
    Regex(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeaderMatcher {
    pub name: String,
    /// When empty, the header only has to be present.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub invert_match: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterMatcher {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default)]
    pub regex: bool,
}

// === impl Matcher ===

impl Matcher {
    pub const DEFAULT_PREFIX: &'static str = "/";

    /// The catch-all `/` prefix matcher.
    pub fn default_prefix() -> Self {
        Self::prefix(Self::DEFAULT_PREFIX)
    }

    pub fn prefix(path: impl ToString) -> Self {
        Self {
            path_specifier: Some(PathSpecifier::Prefix(path.to_string())),
            ..Self::default()
        }
    }

    pub fn exact(path: impl ToString) -> Self {
        Self {
            path_specifier: Some(PathSpecifier::Exact(path.to_string())),
            ..Self::default()
        }
    }

    pub fn regex(pattern: impl ToString) -> Self {
        Self {
            path_specifier: Some(PathSpecifier::Regex(pattern.to_string())),
            ..Self::default()
        }
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.methods = methods.into_iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = HeaderMatcher>) -> Self {
        self.headers = headers.into_iter().collect();
        self
    }

    pub fn with_query_parameters(
        mut self,
        params: impl IntoIterator<Item = QueryParameterMatcher>,
    ) -> Self {
        self.query_parameters = params.into_iter().collect();
        self
    }

    pub fn prefix_str(&self) -> Option<&str> {
        match self.path_specifier {
            Some(PathSpecifier::Prefix(ref p)) => Some(p),
            _ => None,
        }
    }

    pub fn exact_str(&self) -> Option<&str> {
        match self.path_specifier {
            Some(PathSpecifier::Exact(ref p)) => Some(p),
            _ => None,
        }
    }

    pub fn regex_str(&self) -> Option<&str> {
        match self.path_specifier {
            Some(PathSpecifier::Regex(ref p)) => Some(p),
            _ => None,
        }
    }

    /// The path string regardless of its kind, or empty when unset.
    pub fn path_str(&self) -> &str {
        match self.path_specifier {
            Some(ref p) => p.as_str(),
            None => "",
        }
    }

    /// Sets the `/` prefix when no path specifier is present.
    pub fn or_default_prefix(mut self) -> Self {
        if self.path_specifier.is_none() {
            self.path_specifier = Some(PathSpecifier::Prefix(Self::DEFAULT_PREFIX.to_string()));
        }
        self
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path_specifier {
            Some(ref p) => fmt::Display::fmt(p, f)?,
            None => f.write_str("<no path>")?,
        }
        if self.case_sensitive == Some(false) {
            f.write_str(" (case-insensitive)")?;
        }
        if !self.methods.is_empty() {
            write!(f, " methods={}", self.methods.join(","))?;
        }
        for h in &self.headers {
            let op = match (h.regex, h.invert_match) {
                (false, false) => "=",
                (true, false) => "~",
                (false, true) => "!=",
                (true, true) => "!~",
            };
            write!(f, " header[{}{op}{}]", h.name, h.value)?;
        }
        for q in &self.query_parameters {
            let op = if q.regex { "~" } else { "=" };
            write!(f, " query[{}{op}{}]", q.name, q.value)?;
        }
        Ok(())
    }
}

// === impl PathSpecifier ===

impl PathSpecifier {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Prefix(p) | Self::Exact(p) | Self::Regex(p) => p,
        }
    }
}

impl fmt::Display for PathSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefix(p) => write!(f, "prefix:{p}"),
            Self::Exact(p) => write!(f, "exact:{p}"),
            Self::Regex(p) => write!(f, "regex:{p}"),
        }
    }
}

// === impl HeaderMatcher ===

impl HeaderMatcher {
    pub fn exact(name: impl ToString, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            ..Self::default()
        }
    }

    pub fn regex(name: impl ToString, pattern: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: pattern.to_string(),
            regex: true,
            ..Self::default()
        }
    }

    pub fn present(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert_match = true;
        self
    }
}

// === impl QueryParameterMatcher ===

impl QueryParameterMatcher {
    pub fn exact(name: impl ToString, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            regex: false,
        }
    }

    pub fn regex(name: impl ToString, pattern: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: pattern.to_string(),
            regex: true,
        }
    }
}
