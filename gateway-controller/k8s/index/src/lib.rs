//! Gateway resource index
//!
//! Watches on every input resource type feed a single [`Index`] that owns the
//! current view of the cluster:
//!
//! ```text
//! [ watch ] --\
//! [ watch ] ---> (mpsc) -> [ Index ] -> (watch) -> Arc<Snapshot>
//! [ watch ] --/
//! ```
//!
//! Each watch runs in its own task, converting watch events into [`Update`]s
//! with [`forward`]. The index applies updates in the order they arrive and
//! republishes a [`Snapshot`](gateway_controller_core::Snapshot) only when the
//! resources it holds have changed in a way that matters to translation:
//! status and resource version changes are ignored.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod forward;
mod index;
mod metrics;
mod resource;


pub use self::{
    forward::forward,
    index::{Index, SnapshotRx},
    metrics::IndexMetrics,
    resource::{Resource, Update},
};
