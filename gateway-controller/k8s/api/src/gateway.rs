use crate::{
    labels,
    options::{
        HttpConnectionManagerSettings, HttpListenerOptions, ListenerOptions,
        RouteConfigurationOptions, TcpListenerOptions,
    },
    resource_ref::ResourceRef,
    route::RouteAction,
    ssl::SslConfig,
};
use ipnet::IpNet;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Proxies gateways belong to when `proxyNames` is omitted.
pub const DEFAULT_PROXY_NAME: &str = "gateway-proxy";

pub const DEFAULT_BIND_ADDRESS: &str = "::";

/// Gateways carrying this annotation override the controller-wide choice of
/// whether virtual hosts are isolated by SSL config.
pub const ISOLATE_VIRTUAL_HOSTS_ANNOTATION: &str = "gateway.edgeproxy.io/isolate_vhost";

/// Describes a listener exposed by one or more proxies.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.edgeproxy.io",
    version = "v1",
    kind = "Gateway",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
    #[serde(default)]
    pub ssl: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    pub bind_port: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_proxy_proto: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ListenerOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_options: Option<RouteConfigurationOptions>,
    #[serde(default = "default_proxy_names")]
    pub proxy_names: Vec<String>,
    #[serde(flatten)]
    pub gateway_type: Option<GatewayType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum GatewayType {
    HttpGateway(HttpGateway),
    TcpGateway(TcpGateway),
    HybridGateway(HybridGateway),
}

/// Selects the virtual services served by an HTTP listener.
///
/// Expressions take precedence over the label selector, which takes
/// precedence over explicit references. With none of them set, every virtual
/// service in the allowed namespaces is selected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpGateway {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub virtual_services: Vec<ResourceRef>,
    #[serde(default, skip_serializing_if = "labels::Map::is_empty")]
    pub virtual_service_selector: labels::Map,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_service_expressions: Option<VirtualServiceExpressions>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub virtual_service_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<HttpListenerOptions>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceExpressions {
    #[serde(default)]
    pub expressions: labels::Expressions,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TcpGateway {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tcp_hosts: Vec<TcpHost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<TcpListenerOptions>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TcpHost {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_config: Option<SslConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<RouteAction>,
}

/// Multiplexes several HTTP and TCP listeners on one address, distinguished
/// by L4 properties of the connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HybridGateway {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_gateways: Vec<MatchedGateway>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_http_gateways: Option<DelegatedHttpGateway>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_tcp_gateways: Option<DelegatedTcpGateway>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatchedGateway {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<GatewayMatcher>,
    #[serde(flatten)]
    pub gateway_type: Option<MatchedGatewayType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum MatchedGatewayType {
    HttpGateway(HttpGateway),
    TcpGateway(TcpGateway),
}

/// Connection properties a matched listener applies to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GatewayMatcher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_config: Option<SslConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(with = "Vec<String>")]
    pub source_prefix_ranges: Vec<IpNet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passthrough_cipher_suites: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedHttpGateway {
    #[serde(flatten)]
    pub selection: Option<GatewaySelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_config: Option<SslConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_connection_manager_settings: Option<HttpConnectionManagerSettings>,
    /// Fields set here win over the selected gateways' own settings.
    #[serde(default)]
    pub prevent_child_overrides: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedTcpGateway {
    #[serde(flatten)]
    pub selection: Option<GatewaySelection>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum GatewaySelection {
    Ref(ResourceRef),
    Selector(labels::Selector),
}

/// An HTTP listener definition that hybrid gateways select by delegation.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.edgeproxy.io",
    version = "v1",
    kind = "MatchableHttpGateway",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MatchableHttpGatewaySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<GatewayMatcher>,
    #[serde(default)]
    pub http_gateway: HttpGateway,
}

/// A TCP listener definition that hybrid gateways select by delegation.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "gateway.edgeproxy.io",
    version = "v1",
    kind = "MatchableTcpGateway",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MatchableTcpGatewaySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<GatewayMatcher>,
    #[serde(default)]
    pub tcp_gateway: TcpGateway,
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_proxy_names() -> Vec<String> {
    vec![DEFAULT_PROXY_NAME.to_string()]
}

// === impl GatewaySpec ===

impl Default for GatewaySpec {
    fn default() -> Self {
        Self {
            ssl: false,
            bind_address: default_bind_address(),
            bind_port: 0,
            use_proxy_proto: None,
            options: None,
            route_options: None,
            proxy_names: default_proxy_names(),
            gateway_type: None,
        }
    }
}

impl GatewaySpec {
    pub fn http(bind_port: u32, http: HttpGateway) -> Self {
        Self {
            bind_port,
            gateway_type: Some(GatewayType::HttpGateway(http)),
            ..Self::default()
        }
    }

    pub fn tcp(bind_port: u32, tcp: TcpGateway) -> Self {
        Self {
            bind_port,
            gateway_type: Some(GatewayType::TcpGateway(tcp)),
            ..Self::default()
        }
    }

    pub fn hybrid(bind_port: u32, hybrid: HybridGateway) -> Self {
        Self {
            bind_port,
            gateway_type: Some(GatewayType::HybridGateway(hybrid)),
            ..Self::default()
        }
    }

    pub fn http_gateway(&self) -> Option<&HttpGateway> {
        match self.gateway_type {
            Some(GatewayType::HttpGateway(ref http)) => Some(http),
            _ => None,
        }
    }

    pub fn hybrid_gateway(&self) -> Option<&HybridGateway> {
        match self.gateway_type {
            Some(GatewayType::HybridGateway(ref hybrid)) => Some(hybrid),
            _ => None,
        }
    }

    /// The `address:port` pair listeners for this gateway bind to.
    pub fn bind_address_port(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}
