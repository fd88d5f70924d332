use gateway_controller_core::{InputResource, Kind, ResourceId, Snapshot};
use gateway_controller_k8s_api::{self as k8s, ObjectMeta, Resource as _};
use serde::Serialize;
use std::collections::BTreeMap;

/// A change observed by a watch.
#[derive(Clone, Debug)]
pub enum Update {
    /// Replaces every resource of `kind`, in `namespace` or in all namespaces
    /// when unset, with `resources`.
    Reset {
        kind: Kind,
        namespace: Option<String>,
        resources: Vec<Resource>,
    },

    Apply(Resource),

    Delete(ResourceId),
}

/// The parts of a resource that translation depends on.
#[derive(Serialize)]
struct Fingerprint<'r, S> {
    namespace: Option<&'r str>,
    name: Option<&'r str>,
    labels: Option<&'r BTreeMap<String, String>>,
    annotations: Option<&'r BTreeMap<String, String>>,
    generation: Option<i64>,
    spec: &'r S,
}

macro_rules! resources {
    ($($kind:ident => $field:ident),+ $(,)?) => {
        /// An input resource of any kind.
        #[derive(Clone, Debug)]
        pub enum Resource {
            $($kind(k8s::$kind)),+
        }

        impl Resource {
            pub fn id(&self) -> ResourceId {
                match self {
                    $(Self::$kind(r) => r.id()),+
                }
            }

            /// A hash of everything about the resource that can change the
            /// outcome of a translation.
            pub(crate) fn fingerprint(&self) -> u64 {
                match self {
                    $(Self::$kind(r) => fingerprint(r.meta(), &r.spec)),+
                }
            }

            pub(crate) fn add_to(self, snapshot: &mut Snapshot) {
                match self {
                    $(Self::$kind(r) => snapshot.$field.push(r)),+
                }
            }
        }

        $(
            impl From<k8s::$kind> for Resource {
                fn from(resource: k8s::$kind) -> Self {
                    Self::$kind(resource)
                }
            }
        )+
    };
}

resources! {
    Gateway => gateways,
    VirtualService => virtual_services,
    RouteTable => route_tables,
    VirtualHostOption => virtual_host_options,
    RouteOption => route_options,
    ListenerOption => listener_options,
    HttpListenerOption => http_listener_options,
    MatchableHttpGateway => matchable_http_gateways,
    MatchableTcpGateway => matchable_tcp_gateways,
}

// === impl Resource ===

impl Resource {
    pub fn kind(&self) -> Kind {
        self.id().kind
    }
}

fn fingerprint<S: Serialize>(meta: &ObjectMeta, spec: &S) -> u64 {
    let fingerprint = Fingerprint {
        namespace: meta.namespace.as_deref(),
        name: meta.name.as_deref(),
        labels: meta.labels.as_ref(),
        annotations: meta.annotations.as_ref(),
        generation: meta.generation,
        spec,
    };
    match serde_json::to_vec(&fingerprint) {
        Ok(json) => crate::index::stable_hash(&json),
        Err(error) => {
            // Falls back to the resource version, which changes on every write.
            tracing::warn!(%error, name = ?meta.name, "Failed to serialize resource");
            crate::index::stable_hash(&meta.resource_version)
        }
    }
}
