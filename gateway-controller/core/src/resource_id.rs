use gateway_controller_k8s_api::{self as k8s, ResourceExt};
use serde::Serialize;
use std::fmt;

/// The kinds of input resources the translator reads.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Kind {
    Gateway,
    VirtualService,
    RouteTable,
    VirtualHostOption,
    RouteOption,
    ListenerOption,
    HttpListenerOption,
    MatchableHttpGateway,
    MatchableTcpGateway,
}

/// Identifies an input resource within a snapshot.
///
/// Ordering is by kind, then namespace, then name, so that collections keyed
/// by `ResourceId` iterate deterministically.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ResourceId {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
}

/// Records an input resource that contributed to a piece of output.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
    pub observed_generation: i64,
}

/// Implemented by every resource type a snapshot carries.
pub trait InputResource: k8s::Resource<DynamicType = ()> + Sized {
    const KIND: Kind;

    fn id(&self) -> ResourceId {
        ResourceId::new(
            Self::KIND,
            self.namespace().unwrap_or_default(),
            self.name_any(),
        )
    }

    fn source_ref(&self) -> SourceRef {
        let ResourceId {
            kind,
            namespace,
            name,
        } = self.id();
        SourceRef {
            kind,
            namespace,
            name,
            observed_generation: self.meta().generation.unwrap_or_default(),
        }
    }
}

// === impl Kind ===

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Gateway => "Gateway",
            Self::VirtualService => "VirtualService",
            Self::RouteTable => "RouteTable",
            Self::VirtualHostOption => "VirtualHostOption",
            Self::RouteOption => "RouteOption",
            Self::ListenerOption => "ListenerOption",
            Self::HttpListenerOption => "HttpListenerOption",
            Self::MatchableHttpGateway => "MatchableHttpGateway",
            Self::MatchableTcpGateway => "MatchableTcpGateway",
        };
        f.write_str(kind)
    }
}

// === impl ResourceId ===

impl ResourceId {
    pub fn new(kind: Kind, namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn to_ref(&self) -> k8s::ResourceRef {
        k8s::ResourceRef::new(&self.namespace, &self.name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

// === impl InputResource ===

impl InputResource for k8s::Gateway {
    const KIND: Kind = Kind::Gateway;
}

impl InputResource for k8s::VirtualService {
    const KIND: Kind = Kind::VirtualService;
}

impl InputResource for k8s::RouteTable {
    const KIND: Kind = Kind::RouteTable;
}

impl InputResource for k8s::VirtualHostOption {
    const KIND: Kind = Kind::VirtualHostOption;
}

impl InputResource for k8s::RouteOption {
    const KIND: Kind = Kind::RouteOption;
}

impl InputResource for k8s::ListenerOption {
    const KIND: Kind = Kind::ListenerOption;
}

impl InputResource for k8s::HttpListenerOption {
    const KIND: Kind = Kind::HttpListenerOption;
}

impl InputResource for k8s::MatchableHttpGateway {
    const KIND: Kind = Kind::MatchableHttpGateway;
}

impl InputResource for k8s::MatchableTcpGateway {
    const KIND: Kind = Kind::MatchableTcpGateway;
}
