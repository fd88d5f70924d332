//! Gateway translator
//!
//! Translates a snapshot of gateway resources into the proxies that serve them.
//! A proxy is built from the gateways naming it, one listener per gateway:
//!
//! - A `Gateway` with an `httpGateway` selects `VirtualService`s, each of which
//!   becomes a virtual host. Routes that delegate to `RouteTable`s are
//!   resolved recursively, inheriting matchers and options from the routes
//!   that delegate to them.
//! - A `Gateway` with a `tcpGateway` forwards TCP hosts as-is.
//! - A `Gateway` with a `hybridGateway` multiplexes several HTTP and TCP
//!   listeners, declared inline or delegated to `MatchableHttpGateway` and
//!   `MatchableTcpGateway` resources, each selected by connection properties.
//!
//! ```text
//! [ Gateway ] -> [ VirtualService ] -> [ RouteTable ] -> [ RouteTable ] ...
//! ```
//!
//! Translation is a pure function of its snapshot. Problems are recorded per
//! resource in [`ResourceReports`]; a malformed resource drops its own
//! contribution without failing the translation of unrelated resources.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod hash;
mod indexer;
pub mod listener;
mod merge;
pub mod reports;
mod route_converter;
mod selector;
mod short_circuit;
mod sort;
mod ssl;
mod translator;
mod virtual_service;

#[cfg(test)]
mod tests;

pub use self::{
    listener::{
        AggregateTranslator, HttpTranslator, HybridTranslator, ListenerTranslator, TcpTranslator,
    },
    merge::{merge_options, reconcile, Merge},
    reports::{Error, InvalidResources, Report, ResourceReports, Warning},
    translator::Translator,
};

/// Controls how gateways are translated.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// The namespace proxies are written to.
    pub write_namespace: String,

    /// Translate gateways from every namespace rather than only those in
    /// `write_namespace`.
    pub read_gateways_from_all_namespaces: bool,

    /// Report routes that can never match because earlier routes hide them.
    pub warn_on_route_short_circuiting: bool,

    /// Emit HTTP listeners even when the snapshot holds no virtual services.
    pub translate_empty_gateways: bool,

    /// Place each group of virtual hosts that share an SSL config in its own
    /// filter chain, producing aggregate listeners.
    pub isolate_virtual_hosts_by_ssl_config: bool,

    /// Applied to virtual service SSL configs that leave `oneWayTls` unset.
    pub virtual_service_one_way_tls: Option<bool>,
}
