use crate::event_loop::Translation;
use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug)]
pub struct TranslationMetrics {
    translations: Counter,
    proxies: Gauge,
    proxies_without_listeners: Gauge,
    invalid_resources: Gauge,
}

// === impl TranslationMetrics ===

impl TranslationMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let translations = Counter::default();
        prom.register(
            "passes",
            "Count of snapshots translated",
            translations.clone(),
        );

        let proxies = Gauge::default();
        prom.register(
            "proxies",
            "Gauge of the number of proxies produced by the last translation",
            proxies.clone(),
        );

        let proxies_without_listeners = Gauge::default();
        prom.register(
            "proxies_without_listeners",
            "Gauge of the number of proxy names that produced no listeners in the last translation",
            proxies_without_listeners.clone(),
        );

        let invalid_resources = Gauge::default();
        prom.register(
            "invalid_resources",
            "Gauge of the number of resources with errors in the last translation",
            invalid_resources.clone(),
        );

        Self {
            translations,
            proxies,
            proxies_without_listeners,
            invalid_resources,
        }
    }

    pub(crate) fn record(&self, translation: &Translation) {
        self.translations.inc();
        self.proxies.set(translation.proxies.len() as i64);
        self.proxies_without_listeners
            .set(translation.invalid.len() as i64);
        self.invalid_resources
            .set(translation.invalid_resources() as i64);
    }
}
