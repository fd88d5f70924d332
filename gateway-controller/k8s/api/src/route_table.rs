use crate::route::Route;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A reusable list of routes that other routes delegate to.
#[derive(Clone, Debug, Default, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.edgeproxy.io",
    version = "v1",
    kind = "RouteTable",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RouteTableSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    /// Tables selected together are processed in ascending weight order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

impl RouteTableSpec {
    pub fn weight(&self) -> i32 {
        self.weight.unwrap_or(0)
    }
}
