use crate::{
    core::{Proxy, ResourceId, Snapshot},
    index::SnapshotRx,
    metrics::TranslationMetrics,
    translator::{ResourceReports, Translator},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{info_span, Instrument};

/// Observes the result of each translation pass.
pub type TranslationRx = watch::Receiver<Arc<Translation>>;

/// Translates each published snapshot into the proxies it configures.
#[derive(Debug)]
pub struct EventLoop {
    translator: Translator,
    namespace: String,
    tx: watch::Sender<Arc<Translation>>,
    metrics: TranslationMetrics,
}

/// The outcome of translating one snapshot.
#[derive(Debug, Default)]
pub struct Translation {
    /// Proxies that have at least one listener, each with the reports gathered
    /// while translating it.
    pub proxies: Vec<(Proxy, ResourceReports)>,

    /// Reports for proxy names that produced no listeners.
    pub invalid: BTreeMap<String, ResourceReports>,
}

// === impl EventLoop ===

impl EventLoop {
    pub fn new(translator: Translator, namespace: String, metrics: TranslationMetrics) -> Self {
        let (tx, _) = watch::channel(Arc::default());
        Self {
            translator,
            namespace,
            tx,
            metrics,
        }
    }

    pub fn subscribe(&self) -> TranslationRx {
        self.tx.subscribe()
    }

    /// Translates every proxy named by a gateway in the snapshot.
    pub fn translate(&self, snapshot: &Snapshot) -> Translation {
        let proxy_names = snapshot
            .gateways
            .iter()
            .flat_map(|gw| gw.spec.proxy_names.iter().map(String::as_str))
            .collect::<BTreeSet<_>>();

        let mut translation = Translation::default();
        for name in proxy_names {
            match self.translator.translate(name, &self.namespace, snapshot) {
                (Some(proxy), reports) => translation.proxies.push((proxy, reports)),
                (None, reports) => {
                    translation.invalid.insert(name.to_string(), reports);
                }
            }
        }
        translation
    }

    /// Translates snapshots as they are published until the index stops or
    /// shutdown is signaled.
    ///
    /// Applying a translation runs in its own task; a newer snapshot aborts
    /// the task applying the previous one.
    pub async fn run(self, mut snapshots: SnapshotRx, drain: drain::Watch) {
        tokio::pin! {
            let shutdown = drain.signaled();
        }

        let mut applying: Option<JoinHandle<()>> = None;
        loop {
            tokio::select! {
                res = snapshots.changed() => {
                    if res.is_err() {
                        tracing::debug!("Index stopped");
                        break;
                    }

                    let snapshot = snapshots.borrow_and_update().clone();
                    let translation = Arc::new(self.translate(&snapshot));
                    tracing::info!(
                        resources = snapshot.len(),
                        proxies = translation.proxies.len(),
                        without_listeners = translation.invalid.len(),
                        "Translated snapshot"
                    );

                    if let Some(task) = applying.take() {
                        task.abort();
                    }
                    applying = Some(tokio::spawn(
                        apply(translation, self.tx.clone(), self.metrics.clone())
                            .instrument(info_span!("apply")),
                    ));
                }

                _ = (&mut shutdown) => {
                    tracing::debug!("Shutdown");
                    break;
                }
            }
        }

        if let Some(task) = applying {
            task.abort();
        }
    }
}

// === impl Translation ===

impl Translation {
    /// The number of distinct resources that accumulated errors.
    pub fn invalid_resources(&self) -> usize {
        self.reports()
            .flat_map(|reports| reports.invalid().map(|(id, _)| id))
            .collect::<BTreeSet<&ResourceId>>()
            .len()
    }

    fn reports(&self) -> impl Iterator<Item = &ResourceReports> + '_ {
        self.proxies
            .iter()
            .map(|(_, reports)| reports)
            .chain(self.invalid.values())
    }
}

async fn apply(
    translation: Arc<Translation>,
    tx: watch::Sender<Arc<Translation>>,
    metrics: TranslationMetrics,
) {
    for (proxy, reports) in &translation.proxies {
        tracing::debug!(
            proxy = %proxy.name,
            listeners = proxy.listeners.len(),
            "Proxy configured"
        );
        log_reports(&proxy.name, reports);
    }
    for (name, reports) in &translation.invalid {
        tracing::debug!(proxy = %name, "Proxy has no listeners");
        log_reports(name, reports);
    }

    metrics.record(&translation);
    tx.send_replace(translation);
}

fn log_reports(proxy: &str, reports: &ResourceReports) {
    for (id, report) in reports.invalid() {
        let errors = report
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        tracing::warn!(%proxy, kind = %id.kind, resource = %id, %errors, "Invalid resource");
    }
}
