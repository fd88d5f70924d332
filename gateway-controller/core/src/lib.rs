#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod proxy;
mod resource_id;
mod snapshot;

pub use self::{
    proxy::{
        Action, AggregateListener, HttpFilterChain, HttpListener, HttpResources, HybridListener,
        Listener, ListenerType, MatchedListener, MatchedListenerType, MatchedTcpListener, Proxy,
        Route, TcpListener, VirtualHost,
    },
    resource_id::{InputResource, Kind, ResourceId, SourceRef},
    snapshot::Snapshot,
};
pub use gateway_controller_k8s_api as k8s;
