use crate::{
    listener::{
        AggregateTranslator, HttpTranslator, HybridTranslator, ListenerTranslator, TcpTranslator,
    },
    merge::merge_options,
    reports::{Error, ResourceReports},
    Opts,
};
use gateway_controller_core::{InputResource, Proxy, Snapshot};
use gateway_controller_k8s_api::{
    self as k8s, GatewayType, MatchedGatewayType, ObjectMeta, ResourceExt, TargetRef,
};
use std::collections::BTreeMap;

/// Translates the gateways of one proxy into its listeners.
pub struct Translator {
    read_gateways_from_all_namespaces: bool,
    listeners: Vec<Box<dyn ListenerTranslator>>,
}

// === impl Translator ===

impl Translator {
    /// Builds a translator that runs `listeners`, in order, over every
    /// gateway.
    pub fn new(opts: &Opts, listeners: Vec<Box<dyn ListenerTranslator>>) -> Self {
        Self {
            read_gateways_from_all_namespaces: opts.read_gateways_from_all_namespaces,
            listeners,
        }
    }

    /// Builds a translator with every listener type.
    pub fn with_defaults(opts: &Opts) -> Self {
        Self::new(
            opts,
            vec![
                Box::new(HttpTranslator::new(opts)),
                Box::new(TcpTranslator::default()),
                Box::new(HybridTranslator::new(opts)),
                Box::new(AggregateTranslator::new(opts)),
            ],
        )
    }

    pub fn listener_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.listeners.iter().map(|l| l.name())
    }

    /// Computes the proxy named `proxy_name` in `namespace` from the
    /// snapshot's gateways.
    ///
    /// Returns no proxy when no gateway applies or none produces a listener.
    /// The reports cover every gateway, virtual service and route table in the
    /// snapshot, whether or not it contributed.
    pub fn translate(
        &self,
        proxy_name: &str,
        namespace: &str,
        snapshot: &Snapshot,
    ) -> (Option<Proxy>, ResourceReports) {
        let mut reports = ResourceReports::default();
        reports.accept(&snapshot.gateways);
        reports.accept(&snapshot.virtual_services);
        reports.accept(&snapshot.route_tables);

        let gateways = snapshot
            .gateways
            .iter()
            .filter(|gw| gw.spec.proxy_names.iter().any(|p| p == proxy_name))
            .filter(|gw| {
                self.read_gateways_from_all_namespaces
                    || gw.namespace().as_deref() == Some(namespace)
            })
            .collect::<Vec<_>>();
        if gateways.is_empty() {
            tracing::debug!(proxy = %proxy_name, %namespace, "No gateways for proxy");
            return (None, reports);
        }

        validate_bind_addresses(&gateways, &mut reports);

        let mut listeners = Vec::new();
        for gateway in gateways {
            if gateway.spec.gateway_type.is_none() {
                reports.add_error(&gateway.id(), Error::MissingGatewayType);
                continue;
            }

            let gateway = with_attached_options(snapshot, gateway);
            for translator in &self.listeners {
                if let Some(listener) =
                    translator.compute_listener(snapshot, proxy_name, &gateway, &mut reports)
                {
                    tracing::trace!(
                        gateway = %gateway.id(),
                        translator = translator.name(),
                        listener = %listener.name,
                        "Computed listener"
                    );
                    listeners.push(listener);
                }
            }
        }

        if listeners.is_empty() {
            tracing::debug!(proxy = %proxy_name, "No listeners for proxy");
            return (None, reports);
        }

        let proxy = Proxy {
            namespace: namespace.to_string(),
            name: proxy_name.to_string(),
            listeners,
        };
        (Some(proxy), reports)
    }
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field(
                "read_gateways_from_all_namespaces",
                &self.read_gateways_from_all_namespaces,
            )
            .field("listeners", &self.listener_types().collect::<Vec<_>>())
            .finish()
    }
}

/// Records an error on every gateway that shares its address and port with
/// another gateway of the same proxy.
fn validate_bind_addresses(gateways: &[&k8s::Gateway], reports: &mut ResourceReports) {
    let mut by_address = BTreeMap::<String, Vec<&k8s::Gateway>>::new();
    for gw in gateways {
        by_address
            .entry(gw.spec.bind_address_port())
            .or_default()
            .push(gw);
    }

    for (address, gateways) in by_address {
        if gateways.len() < 2 {
            continue;
        }
        let ids = gateways.iter().map(|gw| gw.id()).collect::<Vec<_>>();
        for id in &ids {
            reports.add_error(
                id,
                Error::BindAddressNotUnique {
                    address: address.clone(),
                    gateways: ids.clone(),
                },
            );
        }
    }
}

/// A copy of the gateway whose unset listener options are filled from the
/// option objects that target it. Among several, the oldest wins.
fn with_attached_options(snapshot: &Snapshot, gateway: &k8s::Gateway) -> k8s::Gateway {
    let mut gateway = gateway.clone();

    for option in attached(&snapshot.listener_options, &gateway, |o| &o.spec.target_refs) {
        gateway.spec.options = merge_options(gateway.spec.options.take(), option.spec.options.as_ref());
    }

    let http_options = attached(&snapshot.http_listener_options, &gateway, |o| {
        &o.spec.target_refs
    })
    .into_iter()
    .filter_map(|o| o.spec.options.as_ref())
    .collect::<Vec<_>>();
    if http_options.is_empty() {
        return gateway;
    }

    let mut http_gateways = Vec::new();
    match gateway.spec.gateway_type {
        Some(GatewayType::HttpGateway(ref mut http)) => http_gateways.push(http),
        Some(GatewayType::HybridGateway(ref mut hybrid)) => {
            for matched in &mut hybrid.matched_gateways {
                if let Some(MatchedGatewayType::HttpGateway(ref mut http)) = matched.gateway_type {
                    http_gateways.push(http);
                }
            }
        }
        _ => {}
    }
    for http in http_gateways {
        for options in &http_options {
            http.options = merge_options(http.options.take(), Some(*options));
        }
    }

    gateway
}

/// The option objects targeting `gateway`, oldest first.
fn attached<'s, T: InputResource>(
    options: &'s [T],
    gateway: &k8s::Gateway,
    target_refs: impl Fn(&T) -> &Vec<TargetRef>,
) -> Vec<&'s T> {
    let mut attached = options
        .iter()
        .filter(|o| {
            let ns = o.namespace().unwrap_or_default();
            target_refs(o).iter().any(|t| t.targets(gateway, &ns))
        })
        .collect::<Vec<_>>();
    attached.sort_by(|a, b| age(a.meta()).cmp(&age(b.meta())));
    attached
}

fn age(meta: &ObjectMeta) -> (Option<&k8s::Time>, Option<&str>) {
    (meta.creation_timestamp.as_ref(), meta.name.as_deref())
}
