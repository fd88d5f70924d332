use crate::{
    options::VirtualHostOptions,
    route::{DelegateOptionsRefs, Route},
    ssl::SslConfig,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Routes served for a set of domains.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.edgeproxy.io",
    version = "v1",
    kind = "VirtualService",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_host: Option<VirtualHost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_config: Option<SslConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHost {
    /// An empty list claims the default (empty) domain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<VirtualHostOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_config_refs: Option<DelegateOptionsRefs>,
}

impl VirtualServiceSpec {
    pub fn from_routes<I, S>(domains: I, routes: Vec<Route>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self {
            virtual_host: Some(VirtualHost {
                domains: domains.into_iter().map(|d| d.to_string()).collect(),
                routes,
                ..VirtualHost::default()
            }),
            ..Self::default()
        }
    }

    pub fn routes(&self) -> &[Route] {
        self.virtual_host
            .as_ref()
            .map(|vh| vh.routes.as_slice())
            .unwrap_or_default()
    }
}
