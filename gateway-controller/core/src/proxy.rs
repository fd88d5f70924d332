//! The resolved configuration handed to data-plane proxies.

use crate::SourceRef;
use gateway_controller_k8s_api::{
    self as k8s,
    route::{DirectResponseAction, RedirectAction},
    GatewayMatcher, HttpListenerOptions, ListenerOptions, Matcher, RouteConfigurationOptions,
    RouteOptions, SslConfig, TcpHost, TcpListenerOptions, VirtualHostOptions,
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Proxy {
    pub namespace: String,
    pub name: String,
    pub listeners: Vec<Listener>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listener {
    pub name: String,
    pub bind_address: String,
    pub bind_port: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_proxy_proto: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ListenerOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_options: Option<RouteConfigurationOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssl_configurations: Vec<SslConfig>,
    pub listener_type: ListenerType,
    pub sources: Vec<SourceRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListenerType {
    Http(HttpListener),
    Tcp(TcpListener),
    Hybrid(HybridListener),
    Aggregate(AggregateListener),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpListener {
    pub virtual_hosts: Vec<VirtualHost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<HttpListenerOptions>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpListener {
    pub tcp_hosts: Vec<TcpHost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<TcpListenerOptions>,
}

/// Several listeners sharing one address, selected by connection properties.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridListener {
    pub matched_listeners: Vec<MatchedListener>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedListener {
    pub matcher: GatewayMatcher,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssl_configurations: Vec<SslConfig>,
    pub listener_type: MatchedListenerType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchedListenerType {
    Http(HttpListener),
    Tcp(TcpListener),
}

/// An HTTP listener whose virtual hosts and options are pooled and referenced
/// by name from per-matcher filter chains.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateListener {
    pub http_resources: HttpResources,
    pub http_filter_chains: Vec<HttpFilterChain>,
    pub tcp_listeners: Vec<MatchedTcpListener>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResources {
    pub virtual_hosts: BTreeMap<String, VirtualHost>,
    pub http_options: BTreeMap<String, Option<HttpListenerOptions>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpFilterChain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher: Option<GatewayMatcher>,
    pub http_options_ref: String,
    pub virtual_host_refs: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedTcpListener {
    pub matcher: GatewayMatcher,
    pub tcp_listener: TcpListener,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHost {
    pub name: String,
    pub domains: Vec<String>,
    pub routes: Vec<Route>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<VirtualHostOptions>,
    pub sources: Vec<SourceRef>,
}

/// A fully resolved route.
///
/// `sources` lists every virtual service and route table the route passed
/// through, innermost first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub matchers: Vec<Matcher>,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<RouteOptions>,
    pub sources: Vec<SourceRef>,
}

/// The actions a resolved route may carry. Delegation never survives
/// translation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    RouteAction(k8s::RouteAction),
    RedirectAction(RedirectAction),
    DirectResponseAction(DirectResponseAction),
    GraphqlApiRef(k8s::ResourceRef),
}

// === impl Listener ===

impl Listener {
    pub fn http_listener(&self) -> Option<&HttpListener> {
        match self.listener_type {
            ListenerType::Http(ref http) => Some(http),
            _ => None,
        }
    }

    pub fn tcp_listener(&self) -> Option<&TcpListener> {
        match self.listener_type {
            ListenerType::Tcp(ref tcp) => Some(tcp),
            _ => None,
        }
    }

    pub fn hybrid_listener(&self) -> Option<&HybridListener> {
        match self.listener_type {
            ListenerType::Hybrid(ref hybrid) => Some(hybrid),
            _ => None,
        }
    }

    pub fn aggregate_listener(&self) -> Option<&AggregateListener> {
        match self.listener_type {
            ListenerType::Aggregate(ref aggregate) => Some(aggregate),
            _ => None,
        }
    }
}

// === impl MatchedListener ===

impl MatchedListener {
    pub fn http_listener(&self) -> Option<&HttpListener> {
        match self.listener_type {
            MatchedListenerType::Http(ref http) => Some(http),
            MatchedListenerType::Tcp(_) => None,
        }
    }

    pub fn tcp_listener(&self) -> Option<&TcpListener> {
        match self.listener_type {
            MatchedListenerType::Tcp(ref tcp) => Some(tcp),
            MatchedListenerType::Http(_) => None,
        }
    }
}

// === impl Proxy ===

impl Proxy {
    /// Iterates over every virtual host in the proxy regardless of listener
    /// type.
    pub fn virtual_hosts(&self) -> impl Iterator<Item = &VirtualHost> + '_ {
        self.listeners
            .iter()
            .flat_map(|l| -> Box<dyn Iterator<Item = &VirtualHost> + '_> {
                match l.listener_type {
                    ListenerType::Http(ref http) => Box::new(http.virtual_hosts.iter()),
                    ListenerType::Tcp(_) => Box::new(std::iter::empty()),
                    ListenerType::Hybrid(ref hybrid) => Box::new(
                        hybrid
                            .matched_listeners
                            .iter()
                            .filter_map(MatchedListener::http_listener)
                            .flat_map(|http| http.virtual_hosts.iter()),
                    ),
                    ListenerType::Aggregate(ref aggregate) => {
                        Box::new(aggregate.http_resources.virtual_hosts.values())
                    }
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serializes_listener_type_by_variant() {
        let listener = Listener {
            name: "listener-::-8080".to_string(),
            bind_address: "::".to_string(),
            bind_port: 8080,
            use_proxy_proto: None,
            options: None,
            route_options: None,
            ssl_configurations: vec![],
            listener_type: ListenerType::Tcp(TcpListener::default()),
            sources: vec![],
        };
        let json = serde_json::to_value(&listener).expect("listener must serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "name": "listener-::-8080",
                "bindAddress": "::",
                "bindPort": 8080,
                "listenerType": {"tcp": {"tcpHosts": []}},
                "sources": [],
            })
        );
    }
}
