use gateway_controller_core::{InputResource, Kind, ResourceId};
use gateway_controller_k8s_api::{labels::InvalidExpression, Matcher};
use std::{collections::BTreeMap, fmt};

/// Problems found on each input resource during a translation pass.
///
/// This is the only channel through which validation failures are surfaced;
/// translation of one resource never aborts the pass for the others.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceReports(BTreeMap<ResourceId, Report>);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub errors: Vec<Error>,
    pub warnings: Vec<Warning>,
}

/// Returned by [`ResourceReports::validate`] when resources carry problems.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{}", describe(.0))]
pub struct InvalidResources(Vec<(ResourceId, Report)>);

/// A problem that drops the offending resource's contribution.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid route: route must specify an action")]
    NoAction,

    #[error("invalid route: routes with delegate actions must omit or specify a single matcher")]
    DelegateMatcherCount,

    #[error("invalid route: routes with delegate actions must use a prefix matcher")]
    DelegateMissingPrefix,

    #[error("invalid route: routes with delegate actions cannot use header matchers")]
    DelegateHasHeaders,

    #[error("invalid route: routes with delegate actions cannot use method matchers")]
    DelegateHasMethods,

    #[error("invalid route: routes with delegate actions cannot use query matchers")]
    DelegateHasQueryParameters,

    #[error("invalid route: delegation cycle detected: {}", cycle_path(.0))]
    DelegationCycle(Vec<ResourceId>),

    #[error("on sub route table {table}: {source}")]
    OnRouteTable { table: ResourceId, source: Box<Error> },

    #[error("virtual service [{virtual_service}] has a regex matcher with invalid regex, {error}")]
    InvalidRegex {
        virtual_service: ResourceId,
        error: String,
    },

    #[error("{}", domain_conflict(.domain, .others))]
    DomainInOtherVirtualServices {
        domain: String,
        others: Vec<ResourceId>,
    },

    #[error(
        "domain conflict: the following domains are present in more than one of the virtual services associated with this gateway: [{}]",
        logged_domains(.0)
    )]
    GatewayHasConflictingVirtualServices(Vec<String>),

    #[error("the virtual service selector expression is invalid: {0}")]
    InvalidVirtualServiceSelector(InvalidExpression),

    #[error("the gateway selector expression is invalid: {0}")]
    InvalidGatewaySelector(InvalidExpression),

    #[error("invalid gateway: gateway must contain gatewayType")]
    MissingGatewayType,

    #[error("bind-address {address} is not unique in a proxy. gateways: {}", join(.gateways, ","))]
    BindAddressNotUnique {
        address: String,
        gateways: Vec<ResourceId>,
    },

    #[error("hybrid gateway does not have any populated matched gateways")]
    EmptyHybridGateway,

    #[error("invalid tcp host [{0}]: a destination must be specified")]
    MissingTcpDestination(String),

    #[error("tcp host [{host}] serves sni domains [{}] not matched by its gateway", .domains.join(","))]
    TcpHostSniMismatch { host: String, domains: Vec<String> },

    #[error("matchable http gateway {0} and its parent gateway must either both or neither specify an ssl config")]
    SslConfigMismatch(ResourceId),
}

/// A problem that still allows a best-effort result to be emitted.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Warning {
    #[error("invalid route: route table matchers must begin with the prefix of their parent route's matcher: required prefix: {required}, prefix: {prefix}")]
    InvalidPrefix { required: String, prefix: String },

    #[error("invalid route: route table matchers must have the same case sensitivity of their parent route's matcher")]
    InvalidCaseSensitivity,

    #[error("invalid route: route table matchers must have all headers that were specified on their parent route's matcher")]
    InvalidHeaders,

    #[error("invalid route: route table matchers must have all query params that were specified on their parent route's matcher")]
    InvalidQueryParameters,

    #[error("invalid route: route table matchers must have all methods that were specified on their parent route's matcher")]
    InvalidMethods,

    #[error("route table {0} missing")]
    RouteTableMissing(String),

    #[error("no route table matches the given selector")]
    NoMatchingRouteTables,

    #[error("cannot determine delegation target for {kind} {resource}: you must specify a route table either via a resource reference or a selector")]
    MissingRefAndSelector { kind: Kind, resource: ResourceId },

    #[error("cannot use both labels and expressions within the same selector")]
    AmbiguousRouteTableSelector,

    #[error("the route table selector expression is invalid: {0}")]
    InvalidRouteTableSelector(InvalidExpression),

    #[error("{kind} {reference} not found")]
    OptionMissing { kind: Kind, reference: String },

    #[error("virtual service [{0}] does not specify a virtual host")]
    NoVirtualHost(ResourceId),

    #[error("virtual host [{virtual_host}] has conflicting matcher: {matcher}")]
    ConflictingMatcher {
        virtual_host: String,
        matcher: Matcher,
    },

    #[error("virtual host [{virtual_host}] has unordered prefix routes, earlier prefix [{prefix}] short-circuited later route [{matcher}]")]
    UnorderedPrefix {
        virtual_host: String,
        prefix: String,
        matcher: Matcher,
    },

    #[error("virtual host [{virtual_host}] has unordered regex routes, earlier regex [{regex}] short-circuited later route [{matcher}]")]
    UnorderedRegex {
        virtual_host: String,
        regex: String,
        matcher: Matcher,
    },

    #[error("hybrid gateway does not have any populated matched gateways")]
    EmptyHybridGateway,

    #[error("on sub route table {table}: {source}")]
    OnRouteTable {
        table: ResourceId,
        source: Box<Warning>,
    },
}

// === impl ResourceReports ===

impl ResourceReports {
    /// Ensures every resource has an entry, even when nothing is reported.
    pub fn accept<'r, T, I>(&mut self, resources: I)
    where
        T: InputResource + 'r,
        I: IntoIterator<Item = &'r T>,
    {
        for resource in resources {
            self.0.entry(resource.id()).or_default();
        }
    }

    pub fn add_error(&mut self, id: &ResourceId, error: Error) {
        tracing::debug!(resource = %id, kind = %id.kind, %error, "Invalid resource");
        self.entry(id).errors.push(error);
    }

    pub fn add_warning(&mut self, id: &ResourceId, warning: Warning) {
        tracing::debug!(resource = %id, kind = %id.kind, %warning, "Resource warning");
        self.entry(id).warnings.push(warning);
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Report> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &Report)> + '_ {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resources that carry at least one error.
    pub fn invalid(&self) -> impl Iterator<Item = (&ResourceId, &Report)> + '_ {
        self.0.iter().filter(|(_, r)| !r.errors.is_empty())
    }

    /// Fails if any resource carries an error.
    pub fn validate(&self) -> Result<(), InvalidResources> {
        self.collect(|r| !r.errors.is_empty())
    }

    /// Fails if any resource carries an error or a warning.
    pub fn validate_strict(&self) -> Result<(), InvalidResources> {
        self.collect(|r| !r.is_clean())
    }

    /// Folds another set of reports into this one.
    pub fn extend(&mut self, other: ResourceReports) {
        for (id, report) in other.0 {
            let entry = self.0.entry(id).or_default();
            entry.errors.extend(report.errors);
            entry.warnings.extend(report.warnings);
        }
    }

    fn entry(&mut self, id: &ResourceId) -> &mut Report {
        self.0.entry(id.clone()).or_default()
    }

    fn collect(&self, failed: impl Fn(&Report) -> bool) -> Result<(), InvalidResources> {
        let invalid = self
            .0
            .iter()
            .filter(|(_, r)| failed(r))
            .map(|(id, r)| (id.clone(), r.clone()))
            .collect::<Vec<_>>();
        if invalid.is_empty() {
            return Ok(());
        }
        Err(InvalidResources(invalid))
    }
}

impl IntoIterator for ResourceReports {
    type Item = (ResourceId, Report);
    type IntoIter = std::collections::btree_map::IntoIter<ResourceId, Report>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// === impl Report ===

impl Report {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

// === impl InvalidResources ===

impl InvalidResources {
    pub fn resources(&self) -> impl Iterator<Item = &ResourceId> + '_ {
        self.0.iter().map(|(id, _)| id)
    }
}

// === impl Error ===

impl Error {
    /// Attributes a problem found on a route table to the virtual service
    /// at the root of the traversal.
    pub(crate) fn on_route_table(self, table: &ResourceId) -> Self {
        Self::OnRouteTable {
            table: table.clone(),
            source: Box::new(self),
        }
    }
}

// === impl Warning ===

impl Warning {
    pub(crate) fn on_route_table(self, table: &ResourceId) -> Self {
        Self::OnRouteTable {
            table: table.clone(),
            source: Box::new(self),
        }
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

fn cycle_path(tables: &[ResourceId]) -> String {
    tables
        .iter()
        .map(|id| format!("[{id}]"))
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn domain_conflict(domain: &str, others: &[ResourceId]) -> String {
    let others = join(others, " ");
    if domain.is_empty() {
        return format!(
            "domain conflict: other virtual services that belong to the same Gateway as this one don't specify a domain (and thus default to '*'): [{others}]"
        );
    }
    format!(
        "domain conflict: the [{domain}] domain is present in other virtual services that belong to the same Gateway as this one: [{others}]"
    )
}

fn logged_domains(domains: &[String]) -> String {
    domains
        .iter()
        .map(|d| if d.is_empty() { "EMPTY_DOMAIN" } else { d.as_str() })
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe(invalid: &[(ResourceId, Report)]) -> String {
    let mut lines = Vec::new();
    for (id, report) in invalid {
        for error in &report.errors {
            lines.push(format!("{} {id}: error: {error}", id.kind));
        }
        for warning in &report.warnings {
            lines.push(format!("{} {id}: warning: {warning}", id.kind));
        }
    }
    lines.join("\n")
}
