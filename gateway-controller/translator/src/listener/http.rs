use super::{isolates_virtual_hosts, lacks_virtual_services, make_listener, ListenerTranslator};
use crate::{reports::ResourceReports, virtual_service::VirtualServiceTranslator, Opts};
use gateway_controller_core::{HttpListener, Listener, ListenerType, Snapshot};
use gateway_controller_k8s_api as k8s;

/// Translates `httpGateway` gateways into a single HTTP listener whose virtual
/// hosts all share one filter chain.
#[derive(Clone, Debug, Default)]
pub struct HttpTranslator {
    virtual_services: VirtualServiceTranslator,
    isolate_virtual_hosts: bool,
    translate_empty_gateways: bool,
}

// === impl HttpTranslator ===

impl HttpTranslator {
    pub fn new(opts: &Opts) -> Self {
        Self {
            virtual_services: VirtualServiceTranslator::new(opts),
            isolate_virtual_hosts: opts.isolate_virtual_hosts_by_ssl_config,
            translate_empty_gateways: opts.translate_empty_gateways,
        }
    }
}

impl ListenerTranslator for HttpTranslator {
    fn name(&self) -> &'static str {
        "http"
    }

    fn compute_listener(
        &self,
        snapshot: &Snapshot,
        proxy_name: &str,
        gateway: &k8s::Gateway,
        reports: &mut ResourceReports,
    ) -> Option<Listener> {
        let http = gateway.spec.http_gateway()?;
        if isolates_virtual_hosts(gateway, self.isolate_virtual_hosts) {
            return None;
        }
        if !self.translate_empty_gateways && lacks_virtual_services(snapshot, gateway) {
            return None;
        }

        let selected = self.virtual_services.select(
            &snapshot.virtual_services,
            gateway,
            http,
            gateway.spec.ssl,
            reports,
        );
        let virtual_hosts = self.virtual_services.compute_virtual_hosts(
            snapshot,
            gateway,
            &selected,
            proxy_name,
            reports,
        );

        let mut listener = make_listener(
            gateway,
            ListenerType::Http(HttpListener {
                virtual_hosts,
                options: http.options.clone(),
            }),
        );
        listener.ssl_configurations = selected
            .iter()
            .filter_map(|vs| self.virtual_services.ssl_config(vs))
            .collect();
        Some(listener)
    }
}
