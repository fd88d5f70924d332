use super::{
    compute_http_chains, isolates_virtual_hosts, make_listener,
    tcp::{compute_tcp_listener, validate_tcp_hosts},
    HttpChain, ListenerTranslator,
};
use crate::{
    merge::reconcile,
    reports::{Error, ResourceReports, Warning},
    selector::select_gateways,
    virtual_service::VirtualServiceTranslator,
    Opts,
};
use gateway_controller_core::{
    HttpListener, HybridListener, InputResource, Listener, ListenerType, MatchedListener,
    MatchedListenerType, Snapshot, TcpListener,
};
use gateway_controller_k8s_api::{
    self as k8s, DelegatedHttpGateway, GatewayMatcher, HttpListenerOptions, HybridGateway,
    MatchedGatewayType, ResourceExt,
};

/// Translates `hybridGateway` gateways into listeners that multiplex several
/// HTTP and TCP listeners, each selected by connection properties.
#[derive(Clone, Debug, Default)]
pub struct HybridTranslator {
    pub(super) virtual_services: VirtualServiceTranslator,
    pub(super) isolate_virtual_hosts: bool,
    pub(super) translate_empty_gateways: bool,
}

/// A listener nested in a hybrid gateway, before it is laid out as a matched
/// listener or as aggregate filter chains.
#[derive(Debug)]
pub(super) enum SubListener {
    Http {
        chain: HttpChain,
        options: Option<HttpListenerOptions>,
    },
    Tcp {
        matcher: GatewayMatcher,
        listener: TcpListener,
    },
}

// === impl HybridTranslator ===

impl HybridTranslator {
    pub fn new(opts: &Opts) -> Self {
        Self {
            virtual_services: VirtualServiceTranslator::new(opts),
            isolate_virtual_hosts: opts.isolate_virtual_hosts_by_ssl_config,
            translate_empty_gateways: opts.translate_empty_gateways,
        }
    }

    /// Resolves the listeners a hybrid gateway multiplexes.
    ///
    /// Matched gateways take precedence over delegated ones. Returns `None`
    /// when the gateway has nothing to serve.
    pub(super) fn sub_listeners(
        &self,
        snapshot: &Snapshot,
        proxy_name: &str,
        gateway: &k8s::Gateway,
        hybrid: &HybridGateway,
        isolate: bool,
        reports: &mut ResourceReports,
    ) -> Option<Vec<SubListener>> {
        let serves_tcp = hybrid.delegated_tcp_gateways.is_some()
            || hybrid
                .matched_gateways
                .iter()
                .any(|m| matches!(m.gateway_type, Some(MatchedGatewayType::TcpGateway(_))));
        if !self.translate_empty_gateways && !serves_tcp && snapshot.virtual_services.is_empty() {
            tracing::debug!(gateway = %gateway.id(), "Skipping hybrid gateway without virtual services");
            return None;
        }

        if !hybrid.matched_gateways.is_empty() {
            let subs = self.matched(snapshot, proxy_name, gateway, hybrid, isolate, reports);
            if subs.is_empty() {
                reports.add_error(&gateway.id(), Error::EmptyHybridGateway);
                return None;
            }
            return Some(subs);
        }

        if hybrid.delegated_http_gateways.is_some() || hybrid.delegated_tcp_gateways.is_some() {
            let subs = self.delegated(snapshot, proxy_name, gateway, hybrid, isolate, reports);
            if subs.is_empty() {
                reports.add_warning(&gateway.id(), Warning::EmptyHybridGateway);
                return None;
            }
            return Some(subs);
        }

        None
    }

    fn matched(
        &self,
        snapshot: &Snapshot,
        proxy_name: &str,
        gateway: &k8s::Gateway,
        hybrid: &HybridGateway,
        isolate: bool,
        reports: &mut ResourceReports,
    ) -> Vec<SubListener> {
        let mut subs = Vec::new();
        for matched in &hybrid.matched_gateways {
            let matcher = matched.matcher.clone().unwrap_or_default();
            match matched.gateway_type {
                Some(MatchedGatewayType::HttpGateway(ref http)) => {
                    let chains = compute_http_chains(
                        &self.virtual_services,
                        snapshot,
                        gateway,
                        http,
                        &matcher,
                        isolate,
                        proxy_name,
                        reports,
                    );
                    subs.extend(chains.into_iter().map(|chain| SubListener::Http {
                        chain,
                        options: http.options.clone(),
                    }));
                }
                Some(MatchedGatewayType::TcpGateway(ref tcp)) => {
                    validate_tcp_hosts(&gateway.id(), tcp, matcher.ssl_config.as_ref(), reports);
                    subs.push(SubListener::Tcp {
                        matcher,
                        listener: compute_tcp_listener(tcp),
                    });
                }
                None => {}
            }
        }
        subs
    }

    fn delegated(
        &self,
        snapshot: &Snapshot,
        proxy_name: &str,
        gateway: &k8s::Gateway,
        hybrid: &HybridGateway,
        isolate: bool,
        reports: &mut ResourceReports,
    ) -> Vec<SubListener> {
        let gateway_id = gateway.id();
        let gateway_ns = gateway.namespace().unwrap_or_default();
        let mut subs = Vec::new();

        if let Some(ref delegated) = hybrid.delegated_http_gateways {
            let children = match select_gateways(
                &snapshot.matchable_http_gateways,
                delegated.selection.as_ref(),
                &gateway_ns,
            ) {
                Ok(children) => children,
                Err(error) => {
                    reports.add_error(&gateway_id, Error::InvalidGatewaySelector(error));
                    Vec::new()
                }
            };

            for child in children {
                let child_matcher = child.spec.matcher.clone().unwrap_or_default();
                if delegated.ssl_config.is_some() != child_matcher.ssl_config.is_some() {
                    reports.add_error(&gateway_id, Error::SslConfigMismatch(child.id()));
                    continue;
                }

                let http = &child.spec.http_gateway;
                let base = GatewayMatcher {
                    ssl_config: reconcile(
                        delegated.ssl_config.as_ref(),
                        child_matcher.ssl_config.as_ref(),
                        delegated.prevent_child_overrides,
                    ),
                    ..child_matcher
                };
                let options = reconcile_http_options(delegated, http.options.as_ref());
                let chains = compute_http_chains(
                    &self.virtual_services,
                    snapshot,
                    gateway,
                    http,
                    &base,
                    isolate,
                    proxy_name,
                    reports,
                );
                subs.extend(chains.into_iter().map(|chain| SubListener::Http {
                    chain,
                    options: options.clone(),
                }));
            }
        }

        if let Some(ref delegated) = hybrid.delegated_tcp_gateways {
            let children = match select_gateways(
                &snapshot.matchable_tcp_gateways,
                delegated.selection.as_ref(),
                &gateway_ns,
            ) {
                Ok(children) => children,
                Err(error) => {
                    reports.add_error(&gateway_id, Error::InvalidGatewaySelector(error));
                    Vec::new()
                }
            };

            for child in children {
                let matcher = child.spec.matcher.clone().unwrap_or_default();
                let tcp = &child.spec.tcp_gateway;
                validate_tcp_hosts(&gateway_id, tcp, matcher.ssl_config.as_ref(), reports);
                subs.push(SubListener::Tcp {
                    matcher,
                    listener: compute_tcp_listener(tcp),
                });
            }
        }

        subs
    }
}

impl ListenerTranslator for HybridTranslator {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn compute_listener(
        &self,
        snapshot: &Snapshot,
        proxy_name: &str,
        gateway: &k8s::Gateway,
        reports: &mut ResourceReports,
    ) -> Option<Listener> {
        let hybrid = gateway.spec.hybrid_gateway()?;
        if isolates_virtual_hosts(gateway, self.isolate_virtual_hosts) {
            return None;
        }

        let matched_listeners = self
            .sub_listeners(snapshot, proxy_name, gateway, hybrid, false, reports)?
            .into_iter()
            .map(|sub| match sub {
                SubListener::Http { chain, options } => MatchedListener {
                    matcher: chain.matcher,
                    ssl_configurations: chain.ssl_configurations,
                    listener_type: MatchedListenerType::Http(HttpListener {
                        virtual_hosts: chain.virtual_hosts,
                        options,
                    }),
                },
                SubListener::Tcp { matcher, listener } => MatchedListener {
                    matcher,
                    ssl_configurations: Vec::new(),
                    listener_type: MatchedListenerType::Tcp(listener),
                },
            })
            .collect();

        Some(make_listener(
            gateway,
            ListenerType::Hybrid(HybridListener { matched_listeners }),
        ))
    }
}

/// The child's HTTP options, with connection manager settings reconciled
/// against the parent's.
fn reconcile_http_options(
    parent: &DelegatedHttpGateway,
    child: Option<&HttpListenerOptions>,
) -> Option<HttpListenerOptions> {
    let mut options = child.cloned();
    let hcm = reconcile(
        parent.http_connection_manager_settings.as_ref(),
        child.and_then(|o| o.http_connection_manager_settings.as_ref()),
        parent.prevent_child_overrides,
    );
    if hcm.is_some() {
        options
            .get_or_insert_with(HttpListenerOptions::default)
            .http_connection_manager_settings = hcm;
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_controller_core::{Kind, ResourceId};
    use gateway_controller_k8s_api::{
        DelegatedTcpGateway, Expression, GatewaySelection, GatewaySpec, HttpConnectionManagerSettings,
        HttpGateway, MatchableHttpGatewaySpec, MatchableTcpGatewaySpec, MatchedGateway,
        Operator, ResourceRef, Selector, SslConfig, TcpGateway, VirtualServiceSpec,
    };
    use maplit::btreemap;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn gateway(hybrid: HybridGateway) -> k8s::Gateway {
        let mut gw = k8s::Gateway::new("gw", GatewaySpec::hybrid(8443, hybrid));
        gw.metadata.namespace = Some("gateway-system".to_string());
        gw
    }

    fn vs(name: &str, ssl: bool) -> k8s::VirtualService {
        let route = k8s::Route::default().with_action(k8s::Action::direct_response(200));
        let mut vs = k8s::VirtualService::new(
            name,
            VirtualServiceSpec::from_routes([format!("{name}.com")], vec![route]),
        );
        vs.metadata.namespace = Some("apps".to_string());
        if ssl {
            vs.spec.ssl_config = Some(SslConfig::from_secret(ResourceRef::new("apps", name)));
        }
        vs
    }

    fn matchable_http(name: &str, ssl: Option<SslConfig>) -> k8s::MatchableHttpGateway {
        let mut gw = k8s::MatchableHttpGateway::new(
            name,
            MatchableHttpGatewaySpec {
                matcher: Some(GatewayMatcher {
                    ssl_config: ssl,
                    ..GatewayMatcher::default()
                }),
                http_gateway: HttpGateway::default(),
            },
        );
        gw.metadata.namespace = Some("gateway-system".to_string());
        gw.metadata.labels = Some(btreemap! { "role".to_string() => "edge".to_string() });
        gw
    }

    fn matchable_tcp(name: &str) -> k8s::MatchableTcpGateway {
        let mut gw = k8s::MatchableTcpGateway::new(
            name,
            MatchableTcpGatewaySpec {
                matcher: None,
                tcp_gateway: TcpGateway::default(),
            },
        );
        gw.metadata.namespace = Some("gateway-system".to_string());
        gw
    }

    fn selector() -> Option<GatewaySelection> {
        Some(GatewaySelection::Selector(Selector::from_map(btreemap! {
            "role".to_string() => "edge".to_string(),
        })))
    }

    fn translate(gw: &k8s::Gateway, snapshot: &Snapshot) -> (Option<Listener>, ResourceReports) {
        let mut reports = ResourceReports::default();
        let listener =
            HybridTranslator::default().compute_listener(snapshot, "gateway-proxy", gw, &mut reports);
        (listener, reports)
    }

    fn gateway_report(reports: &ResourceReports) -> (Vec<Error>, Vec<Warning>) {
        let id = gateway(HybridGateway::default()).id();
        reports
            .get(&id)
            .map(|r| (r.errors.clone(), r.warnings.clone()))
            .unwrap_or_default()
    }

    fn matched_listeners(listener: &Listener) -> &[MatchedListener] {
        listener
            .hybrid_listener()
            .map(|h| h.matched_listeners.as_slice())
            .unwrap_or_default()
    }

    #[test]
    fn matched_gateways() {
        let ranges = GatewayMatcher {
            source_prefix_ranges: vec!["10.0.0.0/8".parse().expect("valid net")],
            ..GatewayMatcher::default()
        };
        let gw = gateway(HybridGateway {
            matched_gateways: vec![
                MatchedGateway {
                    matcher: Some(ranges.clone()),
                    gateway_type: Some(MatchedGatewayType::HttpGateway(HttpGateway::default())),
                },
                MatchedGateway {
                    matcher: None,
                    gateway_type: Some(MatchedGatewayType::TcpGateway(TcpGateway::default())),
                },
            ],
            ..HybridGateway::default()
        });
        let snapshot = Snapshot {
            virtual_services: vec![vs("a", false), vs("b", true)],
            ..Snapshot::default()
        };

        let (listener, _) = translate(&gw, &snapshot);
        let listener = listener.expect("listener");
        let matched = matched_listeners(&listener);
        assert_eq!(matched.len(), 2);
        assert_eq!(matched[0].matcher, ranges);
        assert_eq!(
            matched[0]
                .http_listener()
                .map(|h| h.virtual_hosts.iter().map(|vh| vh.name.clone()).collect::<Vec<_>>()),
            Some(vec!["apps.a".to_string()])
        );
        assert_eq!(matched[1].matcher, GatewayMatcher::default());
        assert!(matched[1].tcp_listener().is_some());
    }

    #[test]
    fn empty_matched_gateways_are_errors() {
        let gw = gateway(HybridGateway {
            matched_gateways: vec![MatchedGateway {
                matcher: None,
                gateway_type: None,
            }],
            ..HybridGateway::default()
        });
        let snapshot = Snapshot {
            virtual_services: vec![vs("a", false)],
            ..Snapshot::default()
        };
        let (listener, reports) = translate(&gw, &snapshot);
        assert_eq!(listener, None);
        assert_eq!(
            gateway_report(&reports),
            (vec![Error::EmptyHybridGateway], vec![])
        );
    }

    #[test]
    fn skipped_without_virtual_services_or_tcp() {
        let gw = gateway(HybridGateway {
            matched_gateways: vec![MatchedGateway {
                matcher: None,
                gateway_type: Some(MatchedGatewayType::HttpGateway(HttpGateway::default())),
            }],
            ..HybridGateway::default()
        });
        let (listener, reports) = translate(&gw, &Snapshot::default());
        assert_eq!(listener, None);
        assert!(reports.is_empty());
    }

    #[test]
    fn delegated_gateways() {
        let gw = gateway(HybridGateway {
            delegated_http_gateways: Some(DelegatedHttpGateway {
                selection: selector(),
                ..DelegatedHttpGateway::default()
            }),
            delegated_tcp_gateways: Some(DelegatedTcpGateway {
                selection: Some(GatewaySelection::Ref(ResourceRef {
                    name: "db".to_string(),
                    namespace: None,
                })),
            }),
            ..HybridGateway::default()
        });
        let snapshot = Snapshot {
            virtual_services: vec![vs("a", false)],
            matchable_http_gateways: vec![matchable_http("web", None)],
            matchable_tcp_gateways: vec![matchable_tcp("db"), matchable_tcp("other")],
            ..Snapshot::default()
        };

        let (listener, reports) = translate(&gw, &snapshot);
        let listener = listener.expect("listener");
        let matched = matched_listeners(&listener);
        assert_eq!(matched.len(), 2);
        assert!(matched[0].http_listener().is_some());
        assert!(matched[1].tcp_listener().is_some());
        assert_eq!(gateway_report(&reports), (vec![], vec![]));
    }

    #[test]
    fn empty_delegation_is_a_warning() {
        let gw = gateway(HybridGateway {
            delegated_tcp_gateways: Some(DelegatedTcpGateway {
                selection: selector(),
            }),
            ..HybridGateway::default()
        });
        let (listener, reports) = translate(&gw, &Snapshot::default());
        assert_eq!(listener, None);
        assert_eq!(
            gateway_report(&reports),
            (vec![], vec![Warning::EmptyHybridGateway])
        );
    }

    #[test]
    fn invalid_gateway_selector() {
        let gw = gateway(HybridGateway {
            delegated_tcp_gateways: Some(DelegatedTcpGateway {
                selection: Some(GatewaySelection::Selector(Selector::from_expressions(vec![
                    Expression::new("role", Operator::In, None::<&str>),
                ]))),
            }),
            ..HybridGateway::default()
        });
        let snapshot = Snapshot {
            matchable_tcp_gateways: vec![matchable_tcp("db")],
            ..Snapshot::default()
        };
        let (listener, reports) = translate(&gw, &snapshot);
        assert_eq!(listener, None);
        let (errors, warnings) = gateway_report(&reports);
        assert!(matches!(errors[..], [Error::InvalidGatewaySelector(_)]));
        assert_eq!(warnings, vec![Warning::EmptyHybridGateway]);
    }

    fn ssl(one_way_tls: Option<bool>) -> SslConfig {
        SslConfig {
            one_way_tls,
            ..SslConfig::from_secret(ResourceRef::new("gateway-system", "tls"))
        }
    }

    #[rstest]
    #[case(None, None, false, None)]
    #[case(Some(false), Some(true), false, Some(true))]
    #[case(Some(false), Some(true), true, Some(false))]
    #[case(None, Some(true), true, Some(true))]
    #[case(Some(true), None, false, Some(true))]
    fn reconciles_delegated_ssl(
        #[case] parent: Option<bool>,
        #[case] child: Option<bool>,
        #[case] prevent_child_overrides: bool,
        #[case] expected: Option<bool>,
    ) {
        let gw = gateway(HybridGateway {
            delegated_http_gateways: Some(DelegatedHttpGateway {
                selection: selector(),
                ssl_config: Some(ssl(parent)),
                prevent_child_overrides,
                ..DelegatedHttpGateway::default()
            }),
            ..HybridGateway::default()
        });
        let snapshot = Snapshot {
            virtual_services: vec![vs("a", true)],
            matchable_http_gateways: vec![matchable_http("web", Some(ssl(child)))],
            ..Snapshot::default()
        };

        let (listener, _) = translate(&gw, &snapshot);
        let listener = listener.expect("listener");
        let matched = matched_listeners(&listener);
        assert_eq!(
            matched[0].matcher.ssl_config.as_ref().and_then(|s| s.one_way_tls),
            expected
        );
        assert_eq!(matched[0].ssl_configurations.len(), 1);
    }

    #[test]
    fn ssl_must_be_set_on_both_sides() {
        let gw = gateway(HybridGateway {
            delegated_http_gateways: Some(DelegatedHttpGateway {
                selection: selector(),
                ssl_config: Some(ssl(None)),
                ..DelegatedHttpGateway::default()
            }),
            ..HybridGateway::default()
        });
        let snapshot = Snapshot {
            virtual_services: vec![vs("a", false)],
            matchable_http_gateways: vec![matchable_http("web", None)],
            ..Snapshot::default()
        };
        let (listener, reports) = translate(&gw, &snapshot);
        assert_eq!(listener, None);
        let child = ResourceId::new(Kind::MatchableHttpGateway, "gateway-system", "web");
        assert_eq!(
            gateway_report(&reports),
            (
                vec![Error::SslConfigMismatch(child)],
                vec![Warning::EmptyHybridGateway]
            )
        );
    }

    #[rstest]
    #[case(false, Some("child"))]
    #[case(true, Some("parent"))]
    fn reconciles_connection_manager_settings(
        #[case] prevent_child_overrides: bool,
        #[case] expected: Option<&str>,
    ) {
        let hcm = |via: &str| HttpConnectionManagerSettings {
            via: Some(via.to_string()),
            ..HttpConnectionManagerSettings::default()
        };
        let parent = DelegatedHttpGateway {
            http_connection_manager_settings: Some(hcm("parent")),
            prevent_child_overrides,
            ..DelegatedHttpGateway::default()
        };
        let child = HttpListenerOptions {
            http_connection_manager_settings: Some(hcm("child")),
            ..HttpListenerOptions::default()
        };
        let options = reconcile_http_options(&parent, Some(&child));
        assert_eq!(
            options
                .and_then(|o| o.http_connection_manager_settings)
                .and_then(|h| h.via)
                .as_deref(),
            expected
        );

        let inherited = reconcile_http_options(&parent, None);
        assert_eq!(
            inherited
                .and_then(|o| o.http_connection_manager_settings)
                .and_then(|h| h.via),
            Some("parent".to_string())
        );
    }
}
