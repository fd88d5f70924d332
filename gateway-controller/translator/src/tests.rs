use super::*;
use gateway_controller_core::{InputResource, Kind, Proxy, ResourceId, Route, Snapshot};
use gateway_controller_k8s_api::{
    self as k8s, GatewaySpec, HttpGateway, Matcher, ResourceRef, SslConfig, VirtualServiceSpec,
};
use maplit::btreemap;
use pretty_assertions::assert_eq;


const NS: &str = "gateway-system";
const PROXY: &str = "gateway-proxy";

/// Translating the same snapshot always produces the same proxy and reports,
/// regardless of the order in which resources were observed.
#[test]
fn translation_is_deterministic() {
    for opts in [opts(), isolated_opts()] {
        let translator = Translator::with_defaults(&opts);
        let snapshot = mixed_snapshot().sorted();
        let (proxy, reports) = translator.translate(PROXY, NS, &snapshot);
        assert!(proxy.is_some());

        for i in 0..100 {
            let mut shuffled = mixed_snapshot();
            shuffled.virtual_services.rotate_left(i % 7);
            shuffled.route_tables.rotate_right(i % 5);
            if i % 2 == 0 {
                shuffled.virtual_services.reverse();
            }
            let (again, again_reports) = translator.translate(PROXY, NS, &shuffled.sorted());
            assert_eq!(again, proxy);
            assert_eq!(again_reports, reports);
        }
    }
}

#[test]
fn reports_cover_every_resource() {
    let snapshot = mixed_snapshot().sorted();
    let (_, reports) = Translator::with_defaults(&opts()).translate(PROXY, NS, &snapshot);
    for vs in &snapshot.virtual_services {
        assert!(reports.get(&vs.id()).is_some(), "{} has no report", vs.id());
    }
    for rt in &snapshot.route_tables {
        assert!(reports.get(&rt.id()).is_some(), "{} has no report", rt.id());
    }
    for gw in &snapshot.gateways {
        assert!(reports.get(&gw.id()).is_some(), "{} has no report", gw.id());
    }
}

#[test]
fn debug_lists_listener_types() {
    let translator = Translator::with_defaults(&opts());
    assert_eq!(
        translator.listener_types().collect::<Vec<_>>(),
        vec!["http", "tcp", "hybrid", "aggregate"]
    );
}

/// A snapshot exercising delegation, weights, SSL and plain virtual services.
fn mixed_snapshot() -> Snapshot {
    let mut virtual_services = Vec::new();
    let mut route_tables = Vec::new();
    for i in 0..7 {
        let ns = format!("team-{}", i % 3);
        let table = format!("rt-{i}");
        let leaves = (0..3)
            .map(|j| direct(200 + j).with_matchers([Matcher::prefix(format!("/app-{i}/{j}"))]))
            .collect();
        route_tables.push(mk_weighted_rt(&ns, &table, (i as i32 % 3) - 1, leaves));

        let mut vs = mk_vs(
            &ns,
            &format!("vs-{i}"),
            &[&format!("app-{i}.example.com")],
            vec![
                delegate_to(&ns, &table).with_matchers([Matcher::prefix(format!("/app-{i}"))]),
                direct(404),
            ],
        );
        if i % 2 == 1 {
            vs.spec.ssl_config = Some(
                SslConfig::from_secret(ResourceRef::new(&ns, format!("tls-{}", i % 4)))
                    .with_sni_domains([format!("app-{i}.example.com")]),
            );
        }
        virtual_services.push(vs);
    }

    Snapshot {
        gateways: vec![
            mk_gateway(NS, "http", GatewaySpec::http(8080, HttpGateway::default())),
            mk_gateway(
                NS,
                "https",
                GatewaySpec {
                    ssl: true,
                    ..GatewaySpec::http(8443, HttpGateway::default())
                },
            ),
        ],
        virtual_services,
        route_tables,
        ..Snapshot::default()
    }
}

// === helpers ===

fn opts() -> Opts {
    Opts {
        write_namespace: NS.to_string(),
        ..Opts::default()
    }
}

fn isolated_opts() -> Opts {
    Opts {
        isolate_virtual_hosts_by_ssl_config: true,
        ..opts()
    }
}

fn translate(snapshot: Snapshot) -> (Option<Proxy>, ResourceReports) {
    Translator::with_defaults(&opts()).translate(PROXY, NS, &snapshot.sorted())
}

fn mk_gateway(ns: &str, name: &str, spec: GatewaySpec) -> k8s::Gateway {
    let mut gw = k8s::Gateway::new(name, spec);
    gw.metadata.namespace = Some(ns.to_string());
    gw
}

fn mk_http_gateway(name: &str, port: u32) -> k8s::Gateway {
    mk_gateway(NS, name, GatewaySpec::http(port, HttpGateway::default()))
}

fn mk_vs(ns: &str, name: &str, domains: &[&str], routes: Vec<k8s::Route>) -> k8s::VirtualService {
    let mut vs = k8s::VirtualService::new(
        name,
        VirtualServiceSpec::from_routes(domains.iter().copied(), routes),
    );
    vs.metadata.namespace = Some(ns.to_string());
    vs
}

fn mk_rt(ns: &str, name: &str, routes: Vec<k8s::Route>) -> k8s::RouteTable {
    let mut rt = k8s::RouteTable::new(
        name,
        k8s::RouteTableSpec {
            routes,
            weight: None,
        },
    );
    rt.metadata.namespace = Some(ns.to_string());
    rt
}

fn mk_weighted_rt(ns: &str, name: &str, weight: i32, routes: Vec<k8s::Route>) -> k8s::RouteTable {
    let mut rt = mk_rt(ns, name, routes);
    rt.spec.weight = Some(weight);
    rt.metadata.labels = Some(btreemap! { "delegated".to_string() => "true".to_string() });
    rt
}

fn direct(status: u16) -> k8s::Route {
    k8s::Route::default().with_action(k8s::Action::direct_response(status))
}

fn delegate_to(ns: &str, table: &str) -> k8s::Route {
    k8s::Route::default().with_action(k8s::Action::delegate_ref(ResourceRef::new(ns, table)))
}

fn gateway_id(name: &str) -> ResourceId {
    ResourceId::new(Kind::Gateway, NS, name)
}

fn vs_id(ns: &str, name: &str) -> ResourceId {
    ResourceId::new(Kind::VirtualService, ns, name)
}

fn rt_id(ns: &str, name: &str) -> ResourceId {
    ResourceId::new(Kind::RouteTable, ns, name)
}

fn errors(reports: &ResourceReports, id: &ResourceId) -> Vec<Error> {
    reports
        .get(id)
        .map(|r| r.errors.clone())
        .unwrap_or_default()
}

fn warnings(reports: &ResourceReports, id: &ResourceId) -> Vec<Warning> {
    reports
        .get(id)
        .map(|r| r.warnings.clone())
        .unwrap_or_default()
}

/// The routes of the named virtual host, wherever it is in the proxy.
fn routes(proxy: &Proxy, virtual_host: &str) -> Vec<Route> {
    proxy
        .virtual_hosts()
        .find(|vh| vh.name == virtual_host)
        .map(|vh| vh.routes.clone())
        .unwrap_or_default()
}

fn paths(routes: &[Route]) -> Vec<String> {
    routes
        .iter()
        .map(|r| {
            r.matchers
                .first()
                .map(|m| m.path_str().to_string())
                .unwrap_or_default()
        })
        .collect()
}
