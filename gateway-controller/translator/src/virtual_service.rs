use crate::{
    merge::merge_options,
    reports::{Error, ResourceReports, Warning},
    route_converter::RouteConverter,
    short_circuit, Opts,
};
use gateway_controller_core::{InputResource, Kind, ResourceId, Snapshot, VirtualHost};
use gateway_controller_k8s_api::{
    self as k8s,
    labels::{self, ALL_NAMESPACES},
    HttpGateway, ResourceExt, SslConfig,
};
use regex::Regex;
use std::collections::BTreeMap;

/// Turns the virtual services attached to an HTTP gateway into virtual hosts.
#[derive(Clone, Debug, Default)]
pub(crate) struct VirtualServiceTranslator {
    warn_on_route_short_circuiting: bool,
    one_way_tls: Option<bool>,
}

// === impl VirtualServiceTranslator ===

impl VirtualServiceTranslator {
    pub(crate) fn new(opts: &Opts) -> Self {
        Self {
            warn_on_route_short_circuiting: opts.warn_on_route_short_circuiting,
            one_way_tls: opts.virtual_service_one_way_tls,
        }
    }

    /// Selects the virtual services an HTTP gateway serves.
    ///
    /// Only virtual services whose SSL-ness matches `ssl` are considered.
    /// Expressions take precedence over the label selector, which takes
    /// precedence over explicit references.
    pub(crate) fn select<'s>(
        &self,
        virtual_services: &'s [k8s::VirtualService],
        gateway: &k8s::Gateway,
        http: &HttpGateway,
        ssl: bool,
        reports: &mut ResourceReports,
    ) -> Vec<&'s k8s::VirtualService> {
        let gateway_ns = gateway.namespace().unwrap_or_default();
        let in_namespaces = |vs: &k8s::VirtualService| {
            let namespaces = &http.virtual_service_namespaces;
            let ns = vs.namespace().unwrap_or_default();
            namespaces.is_empty() || namespaces.iter().any(|n| n == ALL_NAMESPACES || *n == ns)
        };
        let candidates = virtual_services
            .iter()
            .filter(|vs| vs.spec.ssl_config.is_some() == ssl);

        if let Some(ref selector) = http.virtual_service_expressions {
            let expressions = &selector.expressions;
            if let Some(error) = expressions.iter().find_map(|e| e.validate().err()) {
                reports.add_error(&gateway.id(), Error::InvalidVirtualServiceSelector(error));
                return Vec::new();
            }
            return candidates
                .filter(|vs| {
                    labels::matches_expressions(expressions, vs.labels()).unwrap_or(false)
                        && in_namespaces(vs)
                })
                .collect();
        }

        if !http.virtual_service_selector.is_empty() {
            return candidates
                .filter(|vs| {
                    labels::matches_exact(&http.virtual_service_selector, vs.labels())
                        && in_namespaces(vs)
                })
                .collect();
        }

        if http.virtual_services.is_empty() {
            return candidates.filter(|vs| in_namespaces(vs)).collect();
        }

        candidates
            .filter(|vs| {
                let id = vs.id();
                http.virtual_services
                    .iter()
                    .any(|r| r.name == id.name && r.namespace_or(&gateway_ns) == id.namespace)
            })
            .collect()
    }

    /// The virtual service's SSL config, with the controller-wide one-way TLS
    /// default applied.
    pub(crate) fn ssl_config(&self, vs: &k8s::VirtualService) -> Option<SslConfig> {
        let mut config = vs.spec.ssl_config.clone()?;
        if config.one_way_tls.is_none() {
            config.one_way_tls = self.one_way_tls;
        }
        Some(config)
    }

    /// Builds one virtual host per virtual service after checking that no
    /// domain is claimed twice.
    pub(crate) fn compute_virtual_hosts(
        &self,
        snapshot: &Snapshot,
        gateway: &k8s::Gateway,
        virtual_services: &[&k8s::VirtualService],
        proxy_name: &str,
        reports: &mut ResourceReports,
    ) -> Vec<VirtualHost> {
        validate_domains(&gateway.id(), virtual_services, reports);

        let gateway_name = gateway.name_any();
        let converter = RouteConverter::new(snapshot, &gateway_name, proxy_name);
        virtual_services
            .iter()
            .map(|vs| self.virtual_host(snapshot, &converter, vs, reports))
            .collect()
    }

    fn virtual_host(
        &self,
        snapshot: &Snapshot,
        converter: &RouteConverter<'_>,
        vs: &k8s::VirtualService,
        reports: &mut ResourceReports,
    ) -> VirtualHost {
        let id = vs.id();
        let spec = vs.spec.virtual_host.as_ref();

        let mut options = spec.and_then(|vh| vh.options.clone());
        let refs = spec
            .and_then(|vh| vh.options_config_refs.as_ref())
            .map(|r| r.delegate_options.as_slice())
            .unwrap_or_default();
        for reference in refs {
            let namespace = reference.namespace_or(&id.namespace);
            match snapshot.virtual_host_option(namespace, &reference.name) {
                Some(option) => options = merge_options(options, option.spec.options.as_ref()),
                None => reports.add_warning(
                    &id,
                    Warning::OptionMissing {
                        kind: Kind::VirtualHostOption,
                        reference: format!("{namespace}.{}", reference.name),
                    },
                ),
            }
        }

        let vh = VirtualHost {
            name: id.to_string(),
            domains: spec.map(|vh| vh.domains.clone()).unwrap_or_default(),
            routes: converter.convert_virtual_service(vs, reports),
            options,
            sources: vec![vs.source_ref()],
        };

        validate_regexes(&id, &vh, reports);
        if self.warn_on_route_short_circuiting {
            short_circuit::validate(&id, &vh, reports);
        }
        vh
    }
}

/// Every domain, including the default empty domain, may be claimed by at
/// most one virtual service per gateway.
fn validate_domains(
    gateway: &ResourceId,
    virtual_services: &[&k8s::VirtualService],
    reports: &mut ResourceReports,
) {
    let mut by_domain = BTreeMap::<&str, Vec<ResourceId>>::new();
    for vs in virtual_services {
        let Some(ref vh) = vs.spec.virtual_host else {
            reports.add_warning(&vs.id(), Warning::NoVirtualHost(vs.id()));
            continue;
        };
        if vh.domains.is_empty() {
            by_domain.entry("").or_default().push(vs.id());
        }
        for domain in &vh.domains {
            by_domain.entry(domain).or_default().push(vs.id());
        }
    }

    let mut conflicting = Vec::new();
    for (domain, claims) in by_domain {
        if claims.len() < 2 {
            continue;
        }
        for (i, id) in claims.iter().enumerate() {
            let others = claims
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| other.clone())
                .collect();
            reports.add_error(
                id,
                Error::DomainInOtherVirtualServices {
                    domain: domain.to_string(),
                    others,
                },
            );
        }
        conflicting.push(domain.to_string());
    }

    if !conflicting.is_empty() {
        reports.add_error(gateway, Error::GatewayHasConflictingVirtualServices(conflicting));
    }
}

fn validate_regexes(vs: &ResourceId, vh: &VirtualHost, reports: &mut ResourceReports) {
    for route in &vh.routes {
        let options = route.options.as_ref();
        let patterns = options
            .and_then(|o| o.host_rewrite_path_regex.as_ref())
            .into_iter()
            .chain(options.and_then(|o| o.regex_rewrite.as_ref()))
            .map(|rewrite| rewrite.pattern.as_str())
            .chain(route.matchers.iter().filter_map(|m| m.regex_str()));
        for pattern in patterns {
            if let Err(error) = Regex::new(pattern) {
                reports.add_error(
                    vs,
                    Error::InvalidRegex {
                        virtual_service: vs.clone(),
                        error: error.to_string(),
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_controller_k8s_api::{
        options::RegexRewrite, Expression, GatewaySpec, Matcher, Operator, ResourceRef,
        RouteOptions, VirtualHostOption, VirtualHostOptionSpec, VirtualHostOptions,
        VirtualServiceExpressions, VirtualServiceSpec,
    };
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    fn gateway(http: HttpGateway) -> k8s::Gateway {
        let mut gw = k8s::Gateway::new("gw", GatewaySpec::http(8080, http));
        gw.metadata.namespace = Some("gloo".to_string());
        gw
    }

    fn vs(ns: &str, name: &str, domains: &[&str]) -> k8s::VirtualService {
        let route = k8s::Route::default().with_action(k8s::Action::direct_response(200));
        let mut vs = k8s::VirtualService::new(
            name,
            VirtualServiceSpec::from_routes(domains.iter().copied(), vec![route]),
        );
        vs.metadata.namespace = Some(ns.to_string());
        vs
    }

    fn labeled(mut vs: k8s::VirtualService, team: &str) -> k8s::VirtualService {
        vs.metadata.labels = Some(btreemap! { "team".to_string() => team.to_string() });
        vs
    }

    fn with_ssl(mut vs: k8s::VirtualService) -> k8s::VirtualService {
        vs.spec.ssl_config = Some(SslConfig::from_secret(ResourceRef::new("ns", "tls")));
        vs
    }

    fn names(selected: Vec<&k8s::VirtualService>) -> Vec<String> {
        selected.into_iter().map(|vs| vs.id().to_string()).collect()
    }

    fn select(http: HttpGateway, vss: &[k8s::VirtualService], ssl: bool) -> Vec<String> {
        let gw = gateway(http.clone());
        let mut reports = ResourceReports::default();
        let selected = VirtualServiceTranslator::default().select(vss, &gw, &http, ssl, &mut reports);
        names(selected)
    }

    fn virtual_services() -> Vec<k8s::VirtualService> {
        vec![
            labeled(vs("a", "vs1", &["a.com"]), "x"),
            labeled(vs("b", "vs2", &["b.com"]), "y"),
            with_ssl(labeled(vs("a", "vs3", &["c.com"]), "x")),
        ]
    }

    #[test]
    fn selects_everything_by_default() {
        assert_eq!(
            select(HttpGateway::default(), &virtual_services(), false),
            vec!["a.vs1", "b.vs2"]
        );
        assert_eq!(
            select(HttpGateway::default(), &virtual_services(), true),
            vec!["a.vs3"]
        );
    }

    #[test]
    fn selects_by_namespace() {
        let http = HttpGateway {
            virtual_service_namespaces: vec!["b".to_string()],
            ..HttpGateway::default()
        };
        assert_eq!(select(http, &virtual_services(), false), vec!["b.vs2"]);

        let http = HttpGateway {
            virtual_service_namespaces: vec!["*".to_string()],
            ..HttpGateway::default()
        };
        assert_eq!(
            select(http, &virtual_services(), false),
            vec!["a.vs1", "b.vs2"]
        );
    }

    #[test]
    fn selects_by_labels() {
        let http = HttpGateway {
            virtual_service_selector: btreemap! { "team".to_string() => "y".to_string() },
            ..HttpGateway::default()
        };
        assert_eq!(select(http, &virtual_services(), false), vec!["b.vs2"]);
    }

    #[test]
    fn expressions_take_precedence() {
        let http = HttpGateway {
            virtual_service_selector: btreemap! { "team".to_string() => "y".to_string() },
            virtual_service_expressions: Some(VirtualServiceExpressions {
                expressions: vec![Expression::new("team", Operator::In, ["x"])],
            }),
            ..HttpGateway::default()
        };
        assert_eq!(select(http, &virtual_services(), false), vec!["a.vs1"]);
    }

    #[test]
    fn invalid_expressions_select_nothing() {
        let http = HttpGateway {
            virtual_service_expressions: Some(VirtualServiceExpressions {
                expressions: vec![Expression::new("team", Operator::Exists, ["x"])],
            }),
            ..HttpGateway::default()
        };
        let gw = gateway(http.clone());
        let vss = virtual_services();
        let mut reports = ResourceReports::default();
        let selected =
            VirtualServiceTranslator::default().select(&vss, &gw, &http, false, &mut reports);
        assert!(selected.is_empty());
        let report = reports.get(&gw.id()).expect("gateway must be reported");
        assert!(matches!(
            report.errors.as_slice(),
            [Error::InvalidVirtualServiceSelector(_)]
        ));
    }

    #[test]
    fn selects_by_refs() {
        let http = HttpGateway {
            virtual_services: vec![ResourceRef::new("b", "vs2"), ResourceRef::new("b", "vs1")],
            ..HttpGateway::default()
        };
        assert_eq!(select(http, &virtual_services(), false), vec!["b.vs2"]);
    }

    #[test]
    fn domain_conflicts() {
        let gw = gateway(HttpGateway::default());
        let vs1 = vs("ns", "vs1", &["d1.com"]);
        let vs2 = vs("ns", "vs2", &["d1.com", "d2.com"]);
        let snapshot = Snapshot::default();
        let mut reports = ResourceReports::default();
        let vhosts = VirtualServiceTranslator::default().compute_virtual_hosts(
            &snapshot,
            &gw,
            &[&vs1, &vs2],
            "proxy",
            &mut reports,
        );
        assert_eq!(vhosts.len(), 2);

        let errors = |id: &ResourceId| reports.get(id).expect("must be reported").errors.clone();
        assert_eq!(
            errors(&vs1.id()),
            vec![Error::DomainInOtherVirtualServices {
                domain: "d1.com".to_string(),
                others: vec![vs2.id()],
            }]
        );
        assert_eq!(
            errors(&vs2.id()),
            vec![Error::DomainInOtherVirtualServices {
                domain: "d1.com".to_string(),
                others: vec![vs1.id()],
            }]
        );
        assert_eq!(
            errors(&gw.id()),
            vec![Error::GatewayHasConflictingVirtualServices(vec![
                "d1.com".to_string()
            ])]
        );
    }

    #[test]
    fn empty_domains_conflict() {
        let gw = gateway(HttpGateway::default());
        let vs1 = vs("ns", "vs1", &[]);
        let vs2 = vs("ns", "vs2", &[]);
        let mut reports = ResourceReports::default();
        VirtualServiceTranslator::default().compute_virtual_hosts(
            &Snapshot::default(),
            &gw,
            &[&vs1, &vs2],
            "proxy",
            &mut reports,
        );
        assert_eq!(
            reports.get(&gw.id()).map(|r| r.errors.clone()),
            Some(vec![Error::GatewayHasConflictingVirtualServices(vec![
                String::new()
            ])])
        );
    }

    #[test]
    fn missing_virtual_host_is_a_warning() {
        let gw = gateway(HttpGateway::default());
        let mut vs1 = vs("ns", "vs1", &[]);
        vs1.spec.virtual_host = None;
        let mut reports = ResourceReports::default();
        let vhosts = VirtualServiceTranslator::default().compute_virtual_hosts(
            &Snapshot::default(),
            &gw,
            &[&vs1],
            "proxy",
            &mut reports,
        );
        assert_eq!(vhosts.len(), 1);
        assert!(vhosts[0].routes.is_empty());
        assert_eq!(
            reports.get(&vs1.id()).map(|r| r.warnings.clone()),
            Some(vec![Warning::NoVirtualHost(vs1.id())])
        );
    }

    #[test]
    fn merges_virtual_host_options() {
        let gw = gateway(HttpGateway::default());
        let mut vs1 = vs("ns", "vs1", &["a.com"]);
        if let Some(vh) = vs1.spec.virtual_host.as_mut() {
            vh.options = Some(VirtualHostOptions {
                include_request_attempt_count: Some(true),
                ..VirtualHostOptions::default()
            });
            vh.options_config_refs = Some(k8s::DelegateOptionsRefs {
                delegate_options: vec![
                    ResourceRef {
                        name: "vho".to_string(),
                        namespace: None,
                    },
                    ResourceRef::new("ns", "missing"),
                ],
            });
        }
        let mut vho = VirtualHostOption::new(
            "vho",
            VirtualHostOptionSpec {
                options: Some(VirtualHostOptions {
                    include_request_attempt_count: Some(false),
                    include_attempt_count_in_response: Some(true),
                    ..VirtualHostOptions::default()
                }),
            },
        );
        vho.metadata.namespace = Some("ns".to_string());
        let snapshot = Snapshot {
            virtual_host_options: vec![vho],
            ..Snapshot::default()
        };

        let mut reports = ResourceReports::default();
        let vhosts = VirtualServiceTranslator::default().compute_virtual_hosts(
            &snapshot,
            &gw,
            &[&vs1],
            "proxy",
            &mut reports,
        );
        assert_eq!(
            vhosts[0].options,
            Some(VirtualHostOptions {
                include_request_attempt_count: Some(true),
                include_attempt_count_in_response: Some(true),
                ..VirtualHostOptions::default()
            })
        );
        assert_eq!(
            reports.get(&vs1.id()).map(|r| r.warnings.clone()),
            Some(vec![Warning::OptionMissing {
                kind: Kind::VirtualHostOption,
                reference: "ns.missing".to_string(),
            }])
        );
    }

    #[test]
    fn invalid_regexes_are_errors() {
        let gw = gateway(HttpGateway::default());
        let route = k8s::Route::default()
            .with_matchers([Matcher::regex("/(unclosed")])
            .with_options(RouteOptions {
                regex_rewrite: Some(RegexRewrite {
                    pattern: "[".to_string(),
                    substitution: String::new(),
                }),
                ..RouteOptions::default()
            })
            .with_action(k8s::Action::direct_response(200));
        let mut vs1 = k8s::VirtualService::new(
            "vs1",
            VirtualServiceSpec::from_routes(["a.com"], vec![route]),
        );
        vs1.metadata.namespace = Some("ns".to_string());

        let mut reports = ResourceReports::default();
        VirtualServiceTranslator::default().compute_virtual_hosts(
            &Snapshot::default(),
            &gw,
            &[&vs1],
            "proxy",
            &mut reports,
        );
        let errors = &reports.get(&vs1.id()).expect("must be reported").errors;
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, Error::InvalidRegex { virtual_service, .. } if *virtual_service == vs1.id())));
    }

    #[test]
    fn applies_one_way_tls_default() {
        let translator = VirtualServiceTranslator {
            one_way_tls: Some(true),
            ..VirtualServiceTranslator::default()
        };
        let vs1 = with_ssl(vs("ns", "vs1", &[]));
        assert_eq!(
            translator.ssl_config(&vs1).and_then(|c| c.one_way_tls),
            Some(true)
        );

        let mut vs2 = with_ssl(vs("ns", "vs2", &[]));
        if let Some(c) = vs2.spec.ssl_config.as_mut() {
            c.one_way_tls = Some(false);
        }
        assert_eq!(
            translator.ssl_config(&vs2).and_then(|c| c.one_way_tls),
            Some(false)
        );
        assert_eq!(translator.ssl_config(&vs("ns", "vs3", &[])), None);
    }
}
