use crate::resource::{Resource, Update};
use futures::prelude::*;
use gateway_controller_core::InputResource;
use kube::runtime::watcher;
use tokio::sync::mpsc;

/// Converts the events of a watch on `T`, scoped to `namespace` or to the
/// whole cluster, into index updates.
///
/// Resources listed while a watch (re)initializes are buffered and sent as a
/// single reset once the listing completes. Returns when the watch ends or
/// the index stops receiving.
pub async fn forward<T>(
    namespace: Option<String>,
    events: impl Stream<Item = watcher::Event<T>>,
    updates: mpsc::Sender<Update>,
) where
    T: InputResource + Into<Resource>,
{
    tokio::pin!(events);

    let mut init = Vec::new();
    while let Some(event) = events.next().await {
        let update = match event {
            watcher::Event::Init => {
                init.clear();
                continue;
            }
            watcher::Event::InitApply(resource) => {
                init.push(resource.into());
                continue;
            }
            watcher::Event::InitDone => Update::Reset {
                kind: T::KIND,
                namespace: namespace.clone(),
                resources: std::mem::take(&mut init),
            },
            watcher::Event::Apply(resource) => Update::Apply(resource.into()),
            watcher::Event::Delete(resource) => Update::Delete(resource.id()),
        };

        if updates.send(update).await.is_err() {
            tracing::debug!(kind = %T::KIND, "Index stopped");
            return;
        }
    }

    tracing::debug!(kind = %T::KIND, "Watch ended");
}
