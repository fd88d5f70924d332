use crate::{
    metrics::IndexMetrics,
    resource::{Resource, Update},
};
use ahash::RandomState;
use gateway_controller_core::{ResourceId, Snapshot};
use std::{
    collections::BTreeMap,
    hash::{BuildHasher, Hash, Hasher},
    sync::Arc,
};
use tokio::sync::{mpsc, watch};

/// Observes published snapshots.
pub type SnapshotRx = watch::Receiver<Arc<Snapshot>>;

const SEEDS: [u64; 4] = [
    0x2c6e_81f4_97a0_3bd5,
    0xa13f_5d08_e6c2_947b,
    0x7b90_c4e2_15fd_68a3,
    0x04d8_b6a7_3e91_cf52,
];

/// Holds every observed input resource and publishes snapshots of them.
///
/// Owned by a single task; updates are funneled to it over a channel so that
/// no locking is needed.
#[derive(Debug)]
pub struct Index {
    resources: BTreeMap<ResourceId, Indexed>,
    published: Option<u64>,
    tx: watch::Sender<Arc<Snapshot>>,
    metrics: IndexMetrics,
}

#[derive(Debug)]
struct Indexed {
    resource: Resource,
    fingerprint: u64,
}

// === impl Index ===

impl Index {
    pub fn new(metrics: IndexMetrics) -> (Self, SnapshotRx) {
        let (tx, rx) = watch::channel(Arc::default());
        let index = Self {
            resources: BTreeMap::new(),
            published: None,
            tx,
            metrics,
        };
        (index, rx)
    }

    /// Applies updates until every watch has stopped or shutdown is signaled,
    /// publishing after each batch of updates that is ready at once.
    pub async fn run(mut self, mut updates: mpsc::Receiver<Update>, drain: drain::Watch) {
        tokio::pin! {
            let shutdown = drain.signaled();
        }

        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Some(update) => {
                        self.apply(update);
                        while let Ok(update) = updates.try_recv() {
                            self.apply(update);
                        }
                        self.publish();
                    }
                    None => {
                        tracing::debug!("Watches closed");
                        return;
                    }
                },

                _ = (&mut shutdown) => {
                    tracing::debug!("Shutdown");
                    return;
                }
            }
        }
    }

    pub fn apply(&mut self, update: Update) {
        match update {
            Update::Reset {
                kind,
                namespace,
                resources,
            } => {
                self.metrics.update(kind, "reset");
                self.resources.retain(|id, _| {
                    id.kind != kind || namespace.as_ref().is_some_and(|ns| *ns != id.namespace)
                });
                for resource in resources {
                    self.insert(resource);
                }
                tracing::debug!(%kind, namespace = ?namespace, "Reset");
            }

            Update::Apply(resource) => {
                self.metrics.update(resource.kind(), "apply");
                tracing::trace!(kind = %resource.kind(), resource = %resource.id(), "Apply");
                self.insert(resource);
            }

            Update::Delete(id) => {
                self.metrics.update(id.kind, "delete");
                tracing::trace!(kind = %id.kind, resource = %id, "Delete");
                self.resources.remove(&id);
            }
        }
    }

    /// Publishes a snapshot of the index unless it is unchanged since the
    /// last one published. Returns whether a snapshot was published.
    pub fn publish(&mut self) -> bool {
        let hash = self.hash();
        if self.published == Some(hash) {
            self.metrics.unchanged();
            return false;
        }

        let snapshot = self.snapshot();
        tracing::debug!(hash, resources = snapshot.len(), "Publishing snapshot");
        self.metrics.published(snapshot.len());
        self.published = Some(hash);
        self.tx.send_replace(Arc::new(snapshot));
        true
    }

    /// A hash of every indexed resource, independent of the order in which
    /// updates were applied.
    pub fn hash(&self) -> u64 {
        let mut hasher = RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3])
            .build_hasher();
        for (id, indexed) in &self.resources {
            id.hash(&mut hasher);
            indexed.fingerprint.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Resources are ordered by namespace and name within each kind.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for indexed in self.resources.values() {
            indexed.resource.clone().add_to(&mut snapshot);
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn insert(&mut self, resource: Resource) {
        let fingerprint = resource.fingerprint();
        self.resources.insert(
            resource.id(),
            Indexed {
                resource,
                fingerprint,
            },
        );
    }
}

pub(crate) fn stable_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]).hash_one(value)
}
