use crate::{
    core::InputResource,
    index::{self, IndexMetrics, Resource, Update},
    k8s,
    translator::{Opts, Translator},
    EventLoop, TranslationMetrics,
};
use anyhow::{bail, Result};
use clap::Parser;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "gateway",
    about = "Translates gateway resources into proxy configurations"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "gateway=info,warn",
        env = "GATEWAY_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The namespace proxies are written to.
    ///
    /// Gateways in other namespaces are ignored unless
    /// `--read-gateways-from-all-namespaces` is set.
    #[clap(long, default_value = "gateway-system")]
    write_namespace: String,

    #[clap(long)]
    read_gateways_from_all_namespaces: bool,

    /// Namespaces to watch, separated by commas. All namespaces are watched
    /// when unset.
    #[clap(long, value_delimiter = ',')]
    watch_namespaces: Vec<String>,

    /// Reports routes that are never matched because an earlier route
    /// matches a superset of their requests.
    #[clap(long)]
    warn_route_short_circuiting: bool,

    /// Emits HTTP listeners even when there are no virtual services.
    #[clap(long)]
    translate_empty_gateways: bool,

    /// Serves the virtual hosts of each SSL config from a separate filter
    /// chain.
    #[clap(long)]
    isolate_virtual_hosts_by_ssl_config: bool,

    /// The `oneWayTls` setting for virtual service SSL configs that leave it
    /// unset.
    #[clap(long)]
    virtual_service_one_way_tls: Option<bool>,

    /// The number of watch updates buffered ahead of the index.
    #[clap(long, default_value = "256")]
    snapshot_buffer: usize,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            write_namespace,
            read_gateways_from_all_namespaces,
            watch_namespaces,
            warn_route_short_circuiting,
            translate_empty_gateways,
            isolate_virtual_hosts_by_ssl_config,
            virtual_service_one_way_tls,
            snapshot_buffer,
        } = self;

        if snapshot_buffer == 0 {
            bail!("--snapshot-buffer must be greater than zero");
        }

        let opts = Opts {
            write_namespace,
            read_gateways_from_all_namespaces,
            warn_on_route_short_circuiting: warn_route_short_circuiting,
            translate_empty_gateways,
            isolate_virtual_hosts_by_ssl_config,
            virtual_service_one_way_tls,
        };
        let watch_namespaces = watch_namespaces
            .into_iter()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .collect::<Vec<_>>();

        let mut prom = <Registry>::default();
        let index_metrics = IndexMetrics::register(prom.sub_registry_with_prefix("index"));
        let translation_metrics =
            TranslationMetrics::register(prom.sub_registry_with_prefix("translation"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        tracing::info!(
            namespace = %opts.write_namespace,
            watch_namespaces = ?watch_namespaces,
            "Starting gateway controller"
        );

        // Spawn resource watches, each feeding the index.
        let (updates_tx, updates_rx) = mpsc::channel(snapshot_buffer);
        let mut watches = Watches {
            runtime: &mut runtime,
            namespaces: &watch_namespaces,
            updates: &updates_tx,
        };
        watches.spawn::<k8s::Gateway>("gateways");
        watches.spawn::<k8s::VirtualService>("virtualservices");
        watches.spawn::<k8s::RouteTable>("routetables");
        watches.spawn::<k8s::VirtualHostOption>("virtualhostoptions");
        watches.spawn::<k8s::RouteOption>("routeoptions");
        watches.spawn::<k8s::ListenerOption>("listeneroptions");
        watches.spawn::<k8s::HttpListenerOption>("httplisteneroptions");
        watches.spawn::<k8s::MatchableHttpGateway>("matchablehttpgateways");
        watches.spawn::<k8s::MatchableTcpGateway>("matchabletcpgateways");
        drop(updates_tx);

        let (index, snapshots) = index::Index::new(index_metrics);
        tokio::spawn(
            index
                .run(updates_rx, runtime.shutdown_handle())
                .instrument(info_span!("index")),
        );

        let event_loop = EventLoop::new(
            Translator::with_defaults(&opts),
            opts.write_namespace.clone(),
            translation_metrics,
        );
        tokio::spawn(
            event_loop
                .run(snapshots, runtime.shutdown_handle())
                .instrument(info_span!("translate")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

struct Watches<'a, S> {
    runtime: &'a mut kubert::Runtime<S>,
    namespaces: &'a [String],
    updates: &'a mpsc::Sender<Update>,
}

impl<S: 'static> Watches<'_, S> {
    /// Watches `T` cluster-wide, or once per namespace when namespaces are
    /// configured.
    fn spawn<T>(&mut self, name: &'static str)
    where
        T: InputResource + Into<Resource> + Clone + DeserializeOwned + std::fmt::Debug,
        T: kube::Resource<Scope = NamespaceResourceScope>,
        T: Send + Sync + 'static,
    {
        if self.namespaces.is_empty() {
            let events = self.runtime.watch_all::<T>(watcher::Config::default());
            tokio::spawn(
                index::forward(None, events, self.updates.clone()).instrument(info_span!("watch", %name)),
            );
            return;
        }

        for ns in self.namespaces {
            let events = self
                .runtime
                .watch_namespaced::<T>(ns.clone(), watcher::Config::default());
            tokio::spawn(
                index::forward(Some(ns.clone()), events, self.updates.clone())
                    .instrument(info_span!("watch", %name, namespace = %ns)),
            );
        }
    }
}
