use super::{
    compute_http_chains, hybrid::SubListener, isolates_virtual_hosts, lacks_virtual_services,
    make_listener, HybridTranslator, ListenerTranslator,
};
use crate::{hash::stable_hash, reports::ResourceReports, Opts};
use gateway_controller_core::{
    AggregateListener, HttpFilterChain, Listener, ListenerType, MatchedTcpListener, Snapshot,
    VirtualHost,
};
use gateway_controller_k8s_api::{
    self as k8s, GatewayMatcher, GatewayType, HttpListenerOptions, SslConfig,
};

/// Translates HTTP and hybrid gateways whose virtual hosts are isolated by
/// SSL config into aggregate listeners.
///
/// Virtual hosts and HTTP options are pooled once per listener and referenced
/// by name from a filter chain per connection matcher.
#[derive(Clone, Debug, Default)]
pub struct AggregateTranslator {
    hybrid: HybridTranslator,
}

#[derive(Debug, Default)]
struct Builder {
    listener: AggregateListener,
}

// === impl AggregateTranslator ===

impl AggregateTranslator {
    pub fn new(opts: &Opts) -> Self {
        Self {
            hybrid: HybridTranslator::new(opts),
        }
    }

    fn http_gateway(
        &self,
        snapshot: &Snapshot,
        proxy_name: &str,
        gateway: &k8s::Gateway,
        http: &k8s::HttpGateway,
        reports: &mut ResourceReports,
    ) -> Option<AggregateListener> {
        if !self.hybrid.translate_empty_gateways && lacks_virtual_services(snapshot, gateway) {
            return None;
        }

        let ssl = gateway.spec.ssl;
        let base = GatewayMatcher {
            ssl_config: ssl.then(SslConfig::default),
            ..GatewayMatcher::default()
        };
        let chains = compute_http_chains(
            &self.hybrid.virtual_services,
            snapshot,
            gateway,
            http,
            &base,
            true,
            proxy_name,
            reports,
        );

        let mut builder = Builder::default();
        for chain in chains {
            builder.add_http_chain(
                ssl.then_some(chain.matcher),
                http.options.clone(),
                chain.virtual_hosts,
            );
        }
        Some(builder.build())
    }

    fn hybrid_gateway(
        &self,
        snapshot: &Snapshot,
        proxy_name: &str,
        gateway: &k8s::Gateway,
        hybrid: &k8s::HybridGateway,
        reports: &mut ResourceReports,
    ) -> Option<AggregateListener> {
        let subs = self
            .hybrid
            .sub_listeners(snapshot, proxy_name, gateway, hybrid, true, reports)?;

        let mut builder = Builder::default();
        for sub in subs {
            match sub {
                SubListener::Http { chain, options } => {
                    builder.add_http_chain(Some(chain.matcher), options, chain.virtual_hosts)
                }
                SubListener::Tcp { matcher, listener } => {
                    builder.listener.tcp_listeners.push(MatchedTcpListener {
                        matcher,
                        tcp_listener: listener,
                    })
                }
            }
        }
        Some(builder.build())
    }
}

impl ListenerTranslator for AggregateTranslator {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn compute_listener(
        &self,
        snapshot: &Snapshot,
        proxy_name: &str,
        gateway: &k8s::Gateway,
        reports: &mut ResourceReports,
    ) -> Option<Listener> {
        if !isolates_virtual_hosts(gateway, self.hybrid.isolate_virtual_hosts) {
            return None;
        }

        let aggregate = match gateway.spec.gateway_type {
            Some(GatewayType::HttpGateway(ref http)) => {
                self.http_gateway(snapshot, proxy_name, gateway, http, reports)?
            }
            Some(GatewayType::HybridGateway(ref hybrid)) => {
                self.hybrid_gateway(snapshot, proxy_name, gateway, hybrid, reports)?
            }
            _ => return None,
        };
        Some(make_listener(gateway, ListenerType::Aggregate(aggregate)))
    }
}

// === impl Builder ===

impl Builder {
    fn add_http_chain(
        &mut self,
        matcher: Option<GatewayMatcher>,
        options: Option<HttpListenerOptions>,
        virtual_hosts: Vec<VirtualHost>,
    ) {
        let resources = &mut self.listener.http_resources;

        let http_options_ref = stable_hash(&options).to_string();
        resources
            .http_options
            .entry(http_options_ref.clone())
            .or_insert(options);

        let mut virtual_host_refs = Vec::with_capacity(virtual_hosts.len());
        for vh in virtual_hosts {
            virtual_host_refs.push(vh.name.clone());
            resources.virtual_hosts.entry(vh.name.clone()).or_insert(vh);
        }

        self.listener.http_filter_chains.push(HttpFilterChain {
            matcher,
            http_options_ref,
            virtual_host_refs,
        });
    }

    fn build(mut self) -> AggregateListener {
        self.listener
            .http_filter_chains
            .sort_by_cached_key(|chain| stable_hash(&chain.matcher));
        self.listener
    }
}
