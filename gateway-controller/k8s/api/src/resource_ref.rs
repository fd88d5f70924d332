use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A namespace-qualified reference to another resource.
///
/// References that omit a namespace resolve in the namespace of the resource
/// that holds them.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceRef {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
        }
    }

    /// Returns the referenced namespace, or `owner` when the reference omits it.
    pub fn namespace_or<'a>(&'a self, owner: &'a str) -> &'a str {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => owner,
        }
    }

    /// Fills in the namespace when it is absent.
    pub fn default_namespace(&mut self, owner: &str) {
        if !matches!(self.namespace.as_deref(), Some(ns) if !ns.is_empty()) {
            self.namespace = Some(owner.to_string());
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}",
            self.namespace.as_deref().unwrap_or_default(),
            self.name
        )
    }
}
