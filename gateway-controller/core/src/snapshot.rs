use crate::InputResource;
use gateway_controller_k8s_api::{self as k8s, ResourceExt};

/// A consistent view of every input resource for one translation pass.
///
/// Each list is kept sorted by namespace and name so that everything derived
/// from a snapshot is independent of watch delivery order.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub gateways: Vec<k8s::Gateway>,
    pub virtual_services: Vec<k8s::VirtualService>,
    pub route_tables: Vec<k8s::RouteTable>,
    pub virtual_host_options: Vec<k8s::VirtualHostOption>,
    pub route_options: Vec<k8s::RouteOption>,
    pub listener_options: Vec<k8s::ListenerOption>,
    pub http_listener_options: Vec<k8s::HttpListenerOption>,
    pub matchable_http_gateways: Vec<k8s::MatchableHttpGateway>,
    pub matchable_tcp_gateways: Vec<k8s::MatchableTcpGateway>,
}

// === impl Snapshot ===

impl Snapshot {
    /// Sorts every resource list by namespace and name.
    pub fn sort(&mut self) {
        sort_resources(&mut self.gateways);
        sort_resources(&mut self.virtual_services);
        sort_resources(&mut self.route_tables);
        sort_resources(&mut self.virtual_host_options);
        sort_resources(&mut self.route_options);
        sort_resources(&mut self.listener_options);
        sort_resources(&mut self.http_listener_options);
        sort_resources(&mut self.matchable_http_gateways);
        sort_resources(&mut self.matchable_tcp_gateways);
    }

    pub fn sorted(mut self) -> Self {
        self.sort();
        self
    }

    pub fn route_table(&self, namespace: &str, name: &str) -> Option<&k8s::RouteTable> {
        find(&self.route_tables, namespace, name)
    }

    pub fn virtual_host_option(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<&k8s::VirtualHostOption> {
        find(&self.virtual_host_options, namespace, name)
    }

    pub fn route_option(&self, namespace: &str, name: &str) -> Option<&k8s::RouteOption> {
        find(&self.route_options, namespace, name)
    }

    pub fn matchable_http_gateway(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<&k8s::MatchableHttpGateway> {
        find(&self.matchable_http_gateways, namespace, name)
    }

    pub fn matchable_tcp_gateway(
        &self,
        namespace: &str,
        name: &str,
    ) -> Option<&k8s::MatchableTcpGateway> {
        find(&self.matchable_tcp_gateways, namespace, name)
    }

    /// The total number of resources of every kind.
    pub fn len(&self) -> usize {
        self.gateways.len()
            + self.virtual_services.len()
            + self.route_tables.len()
            + self.virtual_host_options.len()
            + self.route_options.len()
            + self.listener_options.len()
            + self.http_listener_options.len()
            + self.matchable_http_gateways.len()
            + self.matchable_tcp_gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn find<'r, T: InputResource>(resources: &'r [T], namespace: &str, name: &str) -> Option<&'r T> {
    resources.iter().find(|r| {
        r.meta().namespace.as_deref() == Some(namespace) && r.meta().name.as_deref() == Some(name)
    })
}

fn sort_resources<T: InputResource>(resources: &mut [T]) {
    resources.sort_by(|a, b| {
        a.namespace()
            .cmp(&b.namespace())
            .then_with(|| a.name_any().cmp(&b.name_any()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn route_table(ns: &str, name: &str) -> k8s::RouteTable {
        let mut rt = k8s::RouteTable::new(name, Default::default());
        rt.metadata.namespace = Some(ns.to_string());
        rt
    }

    #[test]
    fn sorts_and_finds() {
        let snapshot = Snapshot {
            route_tables: vec![
                route_table("b", "rt"),
                route_table("a", "rt2"),
                route_table("a", "rt1"),
            ],
            ..Default::default()
        }
        .sorted();

        assert_eq!(
            snapshot
                .route_tables
                .iter()
                .map(|rt| rt.id().to_string())
                .collect::<Vec<_>>(),
            vec!["a.rt1", "a.rt2", "b.rt"]
        );
        assert!(snapshot.route_table("b", "rt").is_some());
        assert!(snapshot.route_table("a", "rt").is_none());
        assert_eq!(snapshot.len(), 3);
    }
}
