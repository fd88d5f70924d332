//! Per-gateway-type listener translators.

mod aggregate;
mod http;
mod hybrid;
mod tcp;

pub use self::{
    aggregate::AggregateTranslator, http::HttpTranslator, hybrid::HybridTranslator,
    tcp::TcpTranslator,
};

use crate::{
    merge::merge_options, reports::ResourceReports, ssl::group_by_ssl_config,
    virtual_service::VirtualServiceTranslator,
};
use gateway_controller_core::{InputResource, Listener, ListenerType, Snapshot, VirtualHost};
use gateway_controller_k8s_api::{
    self as k8s, GatewayMatcher, HttpGateway, ResourceExt, SslConfig,
    ISOLATE_VIRTUAL_HOSTS_ANNOTATION,
};

/// Computes the listener a gateway contributes to a proxy, if any.
///
/// Every registered translator is offered every gateway; translators return
/// `None` for gateways they do not handle. Problems are recorded in `reports`.
pub trait ListenerTranslator: Send + Sync {
    fn name(&self) -> &'static str;

    fn compute_listener(
        &self,
        snapshot: &Snapshot,
        proxy_name: &str,
        gateway: &k8s::Gateway,
        reports: &mut ResourceReports,
    ) -> Option<Listener>;
}

/// Virtual hosts served under one connection matcher.
#[derive(Debug)]
pub(crate) struct HttpChain {
    pub(crate) matcher: GatewayMatcher,
    pub(crate) virtual_hosts: Vec<VirtualHost>,
    pub(crate) ssl_configurations: Vec<SslConfig>,
}

/// Whether the gateway's virtual hosts are isolated into filter chains per
/// SSL config. The gateway's annotation overrides the controller default.
pub(crate) fn isolates_virtual_hosts(gateway: &k8s::Gateway, default: bool) -> bool {
    match gateway
        .annotations()
        .get(ISOLATE_VIRTUAL_HOSTS_ANNOTATION)
        .map(|v| v.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("true") => true,
        Some("false") => false,
        _ => default,
    }
}

pub(crate) fn make_listener(gateway: &k8s::Gateway, listener_type: ListenerType) -> Listener {
    let spec = &gateway.spec;
    Listener {
        name: format!("listener-{}-{}", spec.bind_address, spec.bind_port),
        bind_address: spec.bind_address.clone(),
        bind_port: spec.bind_port,
        use_proxy_proto: spec.use_proxy_proto,
        options: spec.options.clone(),
        route_options: spec.route_options.clone(),
        ssl_configurations: Vec::new(),
        listener_type,
        sources: vec![gateway.source_ref()],
    }
}

/// Splits the virtual services an HTTP gateway selects into chains.
///
/// `base` carries the connection matcher and, for SSL gateways, the default
/// SSL config. Without isolation every virtual service shares one chain under
/// `base`. With isolation, SSL gateways get one chain per group of compatible
/// virtual service SSL configs, where the virtual service config overrides
/// the defaults.
#[allow(clippy::too_many_arguments)]
pub(crate) fn compute_http_chains(
    virtual_services: &VirtualServiceTranslator,
    snapshot: &Snapshot,
    gateway: &k8s::Gateway,
    http: &HttpGateway,
    base: &GatewayMatcher,
    isolate: bool,
    proxy_name: &str,
    reports: &mut ResourceReports,
) -> Vec<HttpChain> {
    let ssl = base.ssl_config.as_ref();
    let selected = virtual_services.select(
        &snapshot.virtual_services,
        gateway,
        http,
        ssl.is_some(),
        reports,
    );
    let ssl_configurations = |members: &[&k8s::VirtualService]| {
        members
            .iter()
            .filter_map(|vs| virtual_services.ssl_config(vs))
            .collect::<Vec<_>>()
    };

    let Some(defaults) = ssl.filter(|_| isolate) else {
        let virtual_hosts = virtual_services.compute_virtual_hosts(
            snapshot,
            gateway,
            &selected,
            proxy_name,
            reports,
        );
        return vec![HttpChain {
            matcher: base.clone(),
            ssl_configurations: ssl_configurations(&selected),
            virtual_hosts,
        }];
    };

    let configs = selected
        .iter()
        .filter_map(|vs| virtual_services.ssl_config(vs).map(|c| (*vs, c)))
        .collect::<Vec<_>>();
    group_by_ssl_config(configs)
        .into_iter()
        .map(|group| {
            let virtual_hosts = virtual_services.compute_virtual_hosts(
                snapshot,
                gateway,
                &group.virtual_services,
                proxy_name,
                reports,
            );
            HttpChain {
                matcher: GatewayMatcher {
                    ssl_config: merge_options(Some(group.config), Some(defaults)),
                    source_prefix_ranges: base.source_prefix_ranges.clone(),
                    passthrough_cipher_suites: Vec::new(),
                },
                ssl_configurations: ssl_configurations(&group.virtual_services),
                virtual_hosts,
            }
        })
        .collect()
}

/// Gateways with HTTP content are skipped when the snapshot holds no virtual
/// services at all.
pub(crate) fn lacks_virtual_services(snapshot: &Snapshot, gateway: &k8s::Gateway) -> bool {
    if snapshot.virtual_services.is_empty() {
        tracing::debug!(
            gateway = %gateway.id(),
            resources = snapshot.len(),
            "Snapshot has no virtual services"
        );
        return true;
    }
    false
}
