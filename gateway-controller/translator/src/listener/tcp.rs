use super::{make_listener, ListenerTranslator};
use crate::reports::{Error, ResourceReports};
use gateway_controller_core::{
    InputResource, Listener, ListenerType, ResourceId, Snapshot, TcpListener,
};
use gateway_controller_k8s_api::{self as k8s, GatewayType, SslConfig, TcpGateway};

/// Translates `tcpGateway` gateways into TCP listeners.
#[derive(Clone, Debug, Default)]
pub struct TcpTranslator(());

// === impl TcpTranslator ===

impl ListenerTranslator for TcpTranslator {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn compute_listener(
        &self,
        _snapshot: &Snapshot,
        _proxy_name: &str,
        gateway: &k8s::Gateway,
        reports: &mut ResourceReports,
    ) -> Option<Listener> {
        let Some(GatewayType::TcpGateway(ref tcp)) = gateway.spec.gateway_type else {
            return None;
        };
        validate_tcp_hosts(&gateway.id(), tcp, None, reports);
        Some(make_listener(
            gateway,
            ListenerType::Tcp(compute_tcp_listener(tcp)),
        ))
    }
}

pub(super) fn compute_tcp_listener(tcp: &TcpGateway) -> TcpListener {
    TcpListener {
        tcp_hosts: tcp.tcp_hosts.clone(),
        options: tcp.options.clone(),
    }
}

/// Checks that every TCP host can be forwarded and, under a matcher that
/// restricts server names, only claims names the matcher admits.
pub(super) fn validate_tcp_hosts(
    gateway: &ResourceId,
    tcp: &TcpGateway,
    matcher_ssl: Option<&SslConfig>,
    reports: &mut ResourceReports,
) {
    let admitted = matcher_ssl.map(|ssl| ssl.sni_domains.as_slice()).unwrap_or_default();
    for host in &tcp.tcp_hosts {
        if host.destination.is_none() {
            reports.add_error(gateway, Error::MissingTcpDestination(host.name.clone()));
        }

        if admitted.is_empty() {
            continue;
        }
        let domains = host
            .ssl_config
            .as_ref()
            .map(|ssl| ssl.sni_domains.as_slice())
            .unwrap_or_default();
        let unmatched = domains
            .iter()
            .filter(|d| !admitted.contains(d))
            .cloned()
            .collect::<Vec<_>>();
        if !unmatched.is_empty() {
            reports.add_error(
                gateway,
                Error::TcpHostSniMismatch {
                    host: host.name.clone(),
                    domains: unmatched,
                },
            );
        }
    }
}
