//! Option objects that are authored separately from the resources they
//! configure.

use crate::options::{HttpListenerOptions, ListenerOptions, RouteOptions, VirtualHostOptions};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Virtual host options referenced from a virtual service's
/// `optionsConfigRefs`.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.edgeproxy.io",
    version = "v1",
    kind = "VirtualHostOption",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHostOptionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<VirtualHostOptions>,
}

/// Route options referenced from a route's `optionsConfigRefs`.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.edgeproxy.io",
    version = "v1",
    kind = "RouteOption",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RouteOptionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<RouteOptions>,
}

/// Listener options attached to gateways through target references.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.edgeproxy.io",
    version = "v1",
    kind = "ListenerOption",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ListenerOptionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ListenerOptions>,
    #[serde(default)]
    pub target_refs: Vec<TargetRef>,
}

/// HTTP listener options attached to gateways through target references.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.edgeproxy.io",
    version = "v1",
    kind = "HttpListenerOption",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HttpListenerOptionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<HttpListenerOptions>,
    #[serde(default)]
    pub target_refs: Vec<TargetRef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Accepted for compatibility; listeners are not addressed individually.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

// === impl TargetRef ===

impl TargetRef {
    pub fn gateway(name: impl ToString) -> Self {
        Self {
            group: Some(crate::GROUP.to_string()),
            kind: "Gateway".to_string(),
            name: name.to_string(),
            namespace: None,
            section_name: None,
        }
    }

    /// Checks whether the target references the given resource type
    pub fn targets_kind<T>(&self) -> bool
    where
        T: kube::Resource,
        T::DynamicType: Default,
    {
        let dt = Default::default();
        self.group.as_deref().unwrap_or(crate::GROUP) == T::group(&dt)
            && *self.kind == *T::kind(&dt)
    }

    /// Checks whether the target references the given namespaced resource.
    /// Option objects only attach to resources in their own namespace.
    pub fn targets<T>(&self, resource: &T, local_ns: &str) -> bool
    where
        T: kube::Resource,
        T::DynamicType: Default,
    {
        if !self.targets_kind::<T>() {
            return false;
        }

        let tns = self.namespace.as_deref().unwrap_or(local_ns);
        if tns != local_ns {
            return false;
        }
        match resource.meta().namespace.as_deref() {
            Some(rns) if rns == tns => {}
            _ => return false,
        };

        resource.meta().name.as_deref() == Some(self.name.as_str())
    }
}
