#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Kubernetes resource definitions consumed by the gateway translator.
//!
//! Every user-authored input type is a namespaced `CustomResource` in the
//! [`GROUP`] API group. The value types shared between resources (matchers,
//! option bags, SSL configuration) live in their own modules so that the
//! translator's output model can reuse them verbatim.

pub mod duration;
pub mod gateway;
pub mod labels;
pub mod matchers;
pub mod options;
pub mod policy;
pub mod resource_ref;
pub mod route;
pub mod route_table;
pub mod ssl;
pub mod virtual_service;

pub use self::{
    duration::K8sDuration,
    gateway::{
        DelegatedHttpGateway, DelegatedTcpGateway, Gateway, GatewayMatcher, GatewaySelection,
        GatewaySpec, GatewayType, HttpGateway, HybridGateway, MatchableHttpGateway,
        MatchableHttpGatewaySpec, MatchableTcpGateway, MatchableTcpGatewaySpec, MatchedGateway,
        MatchedGatewayType, TcpGateway, TcpHost, VirtualServiceExpressions, DEFAULT_PROXY_NAME,
        ISOLATE_VIRTUAL_HOSTS_ANNOTATION,
    },
    labels::{Expression, Operator, Selector},
    matchers::{HeaderMatcher, Matcher, PathSpecifier, QueryParameterMatcher},
    options::{
        HttpConnectionManagerSettings, HttpListenerOptions, ListenerOptions,
        RouteConfigurationOptions, RouteOptions, TcpListenerOptions, VirtualHostOptions,
    },
    policy::{
        HttpListenerOption, HttpListenerOptionSpec, ListenerOption, ListenerOptionSpec,
        RouteOption, RouteOptionSpec, TargetRef, VirtualHostOption, VirtualHostOptionSpec,
    },
    resource_ref::ResourceRef,
    route::{
        Action, DelegateAction, DelegateOptionsRefs, Delegation, Destination, Route, RouteAction,
    },
    route_table::{RouteTable, RouteTableSpec},
    ssl::SslConfig,
    virtual_service::{VirtualHost, VirtualService, VirtualServiceSpec},
};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
pub use kube::core::{ObjectMeta, ResourceExt};
pub use kube::Resource;

/// The API group shared by every resource in this crate.
pub const GROUP: &str = "gateway.edgeproxy.io";
