//! Flattens the route tree rooted at a virtual service.
//!
//! Delegate actions are resolved depth first into the routes of the route
//! tables they select. Each level validates its routes against the delegating
//! route, inherits matchers and options from it, and records itself as a
//! source of every route it produced.

use crate::{
    indexer::RouteTableIndex,
    merge::{inherit_transformations, merge_options},
    reports::{Error, ResourceReports, Warning},
    selector::select_route_tables,
    sort::sort_routes_by_path,
};
use gateway_controller_core::{Action, InputResource, Kind, ResourceId, Route, Snapshot, SourceRef};
use gateway_controller_k8s_api::{self as k8s, Matcher, PathSpecifier, RouteOptions};

pub(crate) struct RouteConverter<'s> {
    snapshot: &'s Snapshot,
    gateway_name: &'s str,
    proxy_name: &'s str,
}

/// What a delegated route table inherits from the route that selected it.
#[derive(Clone, Debug)]
struct RouteInfo {
    matcher: Matcher,
    options: Option<RouteOptions>,
    name: String,
    inheritable_matchers: bool,
    inheritable_path_matchers: bool,
}

#[derive(Copy, Clone)]
enum Node<'s> {
    VirtualService(&'s k8s::VirtualService),
    RouteTable(&'s k8s::RouteTable),
}

/// Records problems on the resource where they were found and, for route
/// tables, also on the virtual service at the root of the traversal.
struct Reporter<'r> {
    reports: &'r mut ResourceReports,
    root: ResourceId,
}

// === impl RouteConverter ===

impl<'s> RouteConverter<'s> {
    pub(crate) fn new(snapshot: &'s Snapshot, gateway_name: &'s str, proxy_name: &'s str) -> Self {
        Self {
            snapshot,
            gateway_name,
            proxy_name,
        }
    }

    /// Never fails: every problem is recorded in `reports` and the offending
    /// branch is dropped.
    pub(crate) fn convert_virtual_service(
        &self,
        vs: &'s k8s::VirtualService,
        reports: &mut ResourceReports,
    ) -> Vec<Route> {
        let mut reporter = Reporter {
            reports,
            root: vs.id(),
        };
        self.visit(Node::VirtualService(vs), None, &[], &mut reporter)
    }

    fn visit(
        &self,
        node: Node<'s>,
        parent: Option<&RouteInfo>,
        visited: &[ResourceId],
        reporter: &mut Reporter<'_>,
    ) -> Vec<Route> {
        let id = node.id();
        let mut routes = Vec::new();

        for (index, route) in node.routes().iter().enumerate() {
            let mut route = route.clone();
            let name = self.route_name(node, &route, parent, index);

            self.merge_delegated_options(&mut route, &id, reporter);

            if let Some(parent) = parent {
                if let Err(warnings) = validate_and_merge(&mut route, parent) {
                    for warning in warnings {
                        reporter.warning(&id, warning);
                    }
                    continue;
                }
            }

            let action = match route.action.take() {
                None => {
                    reporter.error(&id, Error::NoAction);
                    continue;
                }

                Some(k8s::Action::DelegateAction(delegate)) => {
                    let matcher = match delegate_matcher(&route.matchers) {
                        Ok(matcher) => matcher,
                        Err(error) => {
                            reporter.error(&id, error);
                            continue;
                        }
                    };
                    let tables = match select_route_tables(
                        &self.snapshot.route_tables,
                        delegate.delegation.as_ref(),
                        &id,
                    ) {
                        Ok(tables) => tables,
                        Err(warning) => {
                            reporter.warning(&id, warning);
                            continue;
                        }
                    };
                    let info = RouteInfo {
                        matcher,
                        options: route.options,
                        name,
                        inheritable_matchers: route.inheritable_matchers.unwrap_or(false),
                        inheritable_path_matchers: route
                            .inheritable_path_matchers
                            .unwrap_or(false),
                    };
                    routes.extend(self.delegate(&tables, &info, visited, reporter));
                    continue;
                }

                Some(k8s::Action::RouteAction(mut action)) => {
                    if let Some(destination) = action.destination.as_mut() {
                        destination.default_namespaces(&id.namespace);
                    }
                    Action::RouteAction(action)
                }
                Some(k8s::Action::RedirectAction(action)) => Action::RedirectAction(action),
                Some(k8s::Action::DirectResponseAction(action)) => {
                    Action::DirectResponseAction(action)
                }
                Some(k8s::Action::GraphqlApiRef(mut api)) => {
                    api.default_namespace(&id.namespace);
                    Action::GraphqlApiRef(api)
                }
            };

            let matchers = if route.matchers.is_empty() {
                vec![Matcher::default_prefix()]
            } else {
                route
                    .matchers
                    .into_iter()
                    .map(Matcher::or_default_prefix)
                    .collect()
            };
            routes.push(Route {
                name,
                matchers,
                action,
                options: route.options,
                sources: Vec::new(),
            });
        }

        let source = node.source_ref();
        for route in &mut routes {
            route.sources.push(source.clone());
        }
        routes
    }

    /// Visits the selected tables in ascending weight order. Routes from
    /// tables that share a weight are sorted together by path.
    fn delegate(
        &self,
        tables: &[&'s k8s::RouteTable],
        info: &RouteInfo,
        visited: &[ResourceId],
        reporter: &mut Reporter<'_>,
    ) -> Vec<Route> {
        let mut routes = Vec::new();
        let index = RouteTableIndex::new(tables.iter().copied());
        for (weight, tier) in index.tiers() {
            let mut tier_routes = Vec::new();
            for &table in tier {
                let table_id = table.id();
                let mut path = visited.to_vec();
                path.push(table_id.clone());

                // The table about to be re-entered is the one that closes the
                // cycle.
                if visited.contains(&table_id) {
                    reporter.error(&table_id, Error::DelegationCycle(path));
                    continue;
                }

                tracing::trace!(table = %table_id, weight, "Visiting route table");
                tier_routes.extend(self.visit(Node::RouteTable(table), Some(info), &path, reporter));
            }
            if tier.len() > 1 {
                sort_routes_by_path(&mut tier_routes);
            }
            routes.extend(tier_routes);
        }
        routes
    }

    /// Fills gaps in the route's options from the `RouteOption` objects it
    /// references. The route's own options win.
    fn merge_delegated_options(
        &self,
        route: &mut k8s::Route,
        owner: &ResourceId,
        reporter: &mut Reporter<'_>,
    ) {
        let Some(refs) = route.options_config_refs.as_ref() else {
            return;
        };
        for reference in &refs.delegate_options {
            let namespace = reference.namespace_or(&owner.namespace);
            match self.snapshot.route_option(namespace, &reference.name) {
                Some(option) => {
                    route.options = merge_options(route.options.take(), option.spec.options.as_ref());
                }
                None => reporter.warning(
                    owner,
                    Warning::OptionMissing {
                        kind: Kind::RouteOption,
                        reference: format!("{namespace}.{}", reference.name),
                    },
                ),
            }
        }
    }

    /// Builds a name unique within the proxy, such as
    /// `vs:gw_proxy_ns_vs_route:<unnamed-0>_rt:ns_rt_route:login`.
    fn route_name(
        &self,
        node: Node<'_>,
        route: &k8s::Route,
        parent: Option<&RouteInfo>,
        index: usize,
    ) -> String {
        let mut name = String::new();
        if let Some(parent) = parent {
            name.push_str(&parent.name);
            name.push('_');
        }
        match node {
            Node::VirtualService(_) => {
                name.push_str("vs:");
                name.push_str(self.gateway_name);
                name.push('_');
                name.push_str(self.proxy_name);
                name.push('_');
            }
            Node::RouteTable(_) => name.push_str("rt:"),
        }
        let id = node.id();
        name.push_str(&id.namespace);
        name.push('_');
        name.push_str(&id.name);
        name.push_str("_route:");

        match route.name.as_deref() {
            Some(route_name) if !route_name.is_empty() => name.push_str(route_name),
            _ => name.push_str(&format!("<unnamed-{index}>")),
        }
        name
    }
}

// === impl Node ===

impl<'s> Node<'s> {
    fn id(&self) -> ResourceId {
        match self {
            Self::VirtualService(vs) => vs.id(),
            Self::RouteTable(rt) => rt.id(),
        }
    }

    fn source_ref(&self) -> SourceRef {
        match self {
            Self::VirtualService(vs) => vs.source_ref(),
            Self::RouteTable(rt) => rt.source_ref(),
        }
    }

    fn routes(&self) -> &'s [k8s::Route] {
        match self {
            Self::VirtualService(vs) => vs.spec.routes(),
            Self::RouteTable(rt) => &rt.spec.routes,
        }
    }
}

// === impl Reporter ===

impl Reporter<'_> {
    fn error(&mut self, resource: &ResourceId, error: Error) {
        if resource.kind == Kind::RouteTable {
            self.reports.add_error(resource, error.clone());
            self.reports
                .add_error(&self.root, error.on_route_table(resource));
        } else {
            self.reports.add_error(resource, error);
        }
    }

    fn warning(&mut self, resource: &ResourceId, warning: Warning) {
        if resource.kind == Kind::RouteTable {
            self.reports.add_warning(resource, warning.clone());
            self.reports
                .add_warning(&self.root, warning.on_route_table(resource));
        } else {
            self.reports.add_warning(resource, warning);
        }
    }
}

/// The matcher offered to delegated route tables. Only a single prefix is
/// allowed; an omitted matcher or path means `/`.
fn delegate_matcher(matchers: &[Matcher]) -> Result<Matcher, Error> {
    match matchers {
        [] => Ok(Matcher::default_prefix()),
        [matcher] => {
            if !matcher.headers.is_empty() {
                return Err(Error::DelegateHasHeaders);
            }
            if !matcher.methods.is_empty() {
                return Err(Error::DelegateHasMethods);
            }
            if !matcher.query_parameters.is_empty() {
                return Err(Error::DelegateHasQueryParameters);
            }
            match matcher.path_specifier {
                None => Ok(Matcher::default_prefix()),
                Some(PathSpecifier::Prefix(ref prefix)) if !prefix.is_empty() => Ok(matcher.clone()),
                Some(_) => Err(Error::DelegateMissingPrefix),
            }
        }
        _ => Err(Error::DelegateMatcherCount),
    }
}

/// Applies inheritance from the delegating route and checks that the child
/// stays within what the parent matched, with one warning per violated
/// constraint.
fn validate_and_merge(child: &mut k8s::Route, parent: &RouteInfo) -> Result<(), Vec<Warning>> {
    let inheritable_path_matchers = *child
        .inheritable_path_matchers
        .get_or_insert(parent.inheritable_path_matchers);
    let inheritable_matchers = *child
        .inheritable_matchers
        .get_or_insert(parent.inheritable_matchers);

    if inheritable_path_matchers {
        for matcher in &mut child.matchers {
            matcher.path_specifier = parent.matcher.path_specifier.clone();
            matcher.case_sensitive = parent.matcher.case_sensitive;
        }
        if child.matchers.is_empty() {
            child.matchers.push(Matcher {
                path_specifier: parent.matcher.path_specifier.clone(),
                case_sensitive: parent.matcher.case_sensitive,
                ..Matcher::default()
            });
        }
    }

    if child.matchers.is_empty() {
        child.matchers.push(Matcher::default_prefix());
    }
    for matcher in &mut child.matchers {
        if matcher.path_specifier.is_none() {
            matcher.path_specifier = Some(PathSpecifier::Prefix(Matcher::DEFAULT_PREFIX.to_string()));
        }
    }

    if inheritable_matchers {
        for matcher in &mut child.matchers {
            prepend(&mut matcher.headers, &parent.matcher.headers);
            prepend(&mut matcher.methods, &parent.matcher.methods);
            prepend(&mut matcher.query_parameters, &parent.matcher.query_parameters);
        }
    }

    inherit_transformations(
        &mut child.options,
        parent
            .options
            .as_ref()
            .and_then(|o| o.staged_transformations.as_ref()),
    );

    let warnings = validate_child_matchers(&parent.matcher, &child.matchers);
    if !warnings.is_empty() {
        return Err(warnings);
    }

    child.options = merge_options(child.options.take(), parent.options.as_ref());
    Ok(())
}

fn validate_child_matchers(parent: &Matcher, children: &[Matcher]) -> Vec<Warning> {
    let mut warnings = Vec::new();

    let required = parent.prefix_str().unwrap_or_default();
    if let Some(path) = children
        .iter()
        .map(Matcher::path_str)
        .find(|path| !path.starts_with(required))
    {
        warnings.push(Warning::InvalidPrefix {
            required: required.to_string(),
            prefix: path.to_string(),
        });
    }

    if children
        .iter()
        .any(|c| c.case_sensitive != parent.case_sensitive)
    {
        warnings.push(Warning::InvalidCaseSensitivity);
    }

    let headers_present = children.iter().all(|child| {
        parent.headers.iter().all(|p| {
            child
                .headers
                .iter()
                .rfind(|c| c.name == p.name)
                .is_some_and(|c| c == p)
        })
    });
    if !headers_present {
        warnings.push(Warning::InvalidHeaders);
    }

    let params_present = children.iter().all(|child| {
        parent.query_parameters.iter().all(|p| {
            child
                .query_parameters
                .iter()
                .rfind(|c| c.name == p.name)
                .is_some_and(|c| c == p)
        })
    });
    if !params_present {
        warnings.push(Warning::InvalidQueryParameters);
    }

    let methods_present = children
        .iter()
        .all(|child| parent.methods.iter().all(|m| child.methods.contains(m)));
    if !methods_present {
        warnings.push(Warning::InvalidMethods);
    }

    warnings
}

fn prepend<T: Clone>(items: &mut Vec<T>, parent: &[T]) {
    if parent.is_empty() {
        return;
    }
    let own = std::mem::take(items);
    items.extend(parent.iter().cloned());
    items.extend(own);
}
