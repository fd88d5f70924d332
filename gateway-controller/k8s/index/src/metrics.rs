use gateway_controller_core::Kind;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct IndexMetrics {
    updates: Family<UpdateLabels, Counter>,
    snapshots_published: Counter,
    snapshots_unchanged: Counter,
    index_size: Gauge,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct UpdateLabels {
    kind: String,
    op: String,
}

// === impl IndexMetrics ===

impl IndexMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let updates = Family::default();
        prom.register(
            "updates",
            "Count of watch updates applied to the index",
            updates.clone(),
        );

        let snapshots_published = Counter::default();
        prom.register(
            "snapshots_published",
            "Count of snapshots published for translation",
            snapshots_published.clone(),
        );

        let snapshots_unchanged = Counter::default();
        prom.register(
            "snapshots_unchanged",
            "Count of update batches that left the snapshot unchanged",
            snapshots_unchanged.clone(),
        );

        let index_size = Gauge::default();
        prom.register(
            "size",
            "Gauge of the number of resources in the index",
            index_size.clone(),
        );

        Self {
            updates,
            snapshots_published,
            snapshots_unchanged,
            index_size,
        }
    }

    pub(crate) fn update(&self, kind: Kind, op: &str) {
        self.updates
            .get_or_create(&UpdateLabels {
                kind: kind.to_string(),
                op: op.to_string(),
            })
            .inc();
    }

    pub(crate) fn published(&self, size: usize) {
        self.snapshots_published.inc();
        self.index_size.set(size as i64);
    }

    pub(crate) fn unchanged(&self) {
        self.snapshots_unchanged.inc();
    }
}
