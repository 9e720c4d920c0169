use std::{future::Future, sync::Arc};

use shared::domain::{AccountId, ItemId};
use tracing::{debug, info, warn};

use crate::{
    error::{CoreError, GatewayError},
    gateway::RemoteGateway,
    notify::{Notification, NotificationSink},
    queue::{EntityPhase, EntityQueues},
    store::CatalogStore,
    transfer::{DownloadRequest, DownloadTrigger},
};

#[derive(Debug, Clone)]
pub enum MutationOutcome {
    /// The remote call succeeded and the local patch was applied (or the
    /// item had meanwhile been dropped by a reload).
    Committed,
    /// Nothing changed locally.
    Failed(CoreError),
    /// The item was not in the snapshot when the mutation reached the front
    /// of its queue; no remote call was made.
    Skipped,
}

impl MutationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}

/// Runs like/download/view mutations against the remote store and patches
/// the local snapshot after each success.
///
/// Mutations on the same item run one at a time in the order they were
/// requested; the local patch always follows the remote success, so there
/// is never anything to roll back.
#[derive(Clone)]
pub struct MutationCoordinator {
    store: Arc<CatalogStore>,
    gateway: Arc<dyn RemoteGateway>,
    notifier: Arc<dyn NotificationSink>,
    downloads: Arc<dyn DownloadTrigger>,
    queues: EntityQueues,
}

impl MutationCoordinator {
    pub fn new(
        store: Arc<CatalogStore>,
        gateway: Arc<dyn RemoteGateway>,
        notifier: Arc<dyn NotificationSink>,
        downloads: Arc<dyn DownloadTrigger>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            downloads,
            queues: EntityQueues::default(),
        }
    }

    pub fn phase(&self, id: ItemId) -> EntityPhase {
        self.queues.phase(id)
    }

    /// Mutations for `id` that are running or waiting.
    pub fn queued(&self, id: ItemId) -> usize {
        self.queues.queued(id)
    }

    /// Likes the item if the viewer has not liked it yet, unlikes it
    /// otherwise.
    ///
    /// The request takes its place in the item's queue when this is called;
    /// the returned future only waits for its turn and the round trip.
    pub fn toggle_like(&self, id: ItemId) -> impl Future<Output = MutationOutcome> + Send + 'static {
        let slot = if self.store.viewer().is_some() {
            Some(self.queues.enqueue(id))
        } else {
            self.report_auth_required();
            None
        };
        let this = self.clone();
        async move {
            let Some(mut slot) = slot else {
                return MutationOutcome::Failed(CoreError::AuthRequired);
            };
            slot.ready().await;
            this.toggle_like_now(id).await
        }
    }

    /// Counts a download and, only once the count is accepted, hands the
    /// file to the [`DownloadTrigger`].
    pub fn record_download(
        &self,
        id: ItemId,
    ) -> impl Future<Output = MutationOutcome> + Send + 'static {
        let mut slot = self.queues.enqueue(id);
        let this = self.clone();
        async move {
            slot.ready().await;
            this.record_download_now(id).await
        }
    }

    /// Best-effort view counting. Failures are logged, never notified.
    pub fn record_view(&self, id: ItemId) -> impl Future<Output = MutationOutcome> + Send + 'static {
        let mut slot = self.queues.enqueue(id);
        let this = self.clone();
        async move {
            slot.ready().await;
            this.record_view_now(id).await
        }
    }

    async fn toggle_like_now(&self, id: ItemId) -> MutationOutcome {
        // The viewer may have changed while this request was queued.
        let Some(viewer) = self.store.viewer() else {
            self.report_auth_required();
            return MutationOutcome::Failed(CoreError::AuthRequired);
        };
        let Some(item) = self.store.get(id) else {
            debug!(item_id = %id, "catalog: like target vanished before it was dequeued");
            return MutationOutcome::Skipped;
        };

        let was_liked = item.is_liked_by_viewer;
        match self.send_like(viewer, id, was_liked).await {
            Ok(()) => {
                self.store.patch(id, |item| item.apply_like_toggle(was_liked));
                info!(item_id = %id, liked = !was_liked, "catalog: like toggled");
                MutationOutcome::Committed
            }
            Err(err) => {
                warn!(item_id = %id, error = %err, "catalog: like toggle failed");
                self.notifier.notify(Notification::error(
                    "Failed to update like",
                    err.user_message(),
                ));
                MutationOutcome::Failed(err.into())
            }
        }
    }

    async fn send_like(
        &self,
        viewer: AccountId,
        id: ItemId,
        was_liked: bool,
    ) -> Result<(), GatewayError> {
        if was_liked {
            self.gateway.delete_like(viewer, id).await
        } else {
            self.gateway.insert_like(viewer, id).await
        }
    }

    async fn record_download_now(&self, id: ItemId) -> MutationOutcome {
        let Some(item) = self.store.get(id) else {
            debug!(item_id = %id, "catalog: download target vanished before it was dequeued");
            return MutationOutcome::Skipped;
        };
        let request = DownloadRequest::for_item(&item);

        if let Err(err) = self.gateway.increment_downloads(id).await {
            warn!(item_id = %id, error = %err, "catalog: download not counted; transfer withheld");
            self.notifier
                .notify(Notification::error("Download failed", err.user_message()));
            return MutationOutcome::Failed(err.into());
        }

        self.store.patch(id, |item| {
            item.downloads_count = item.downloads_count.saturating_add(1);
        });
        info!(item_id = %id, filename = %request.suggested_filename, "catalog: download started");
        self.downloads.begin_download(request);
        self.notifier.notify(Notification::success(
            "Download started",
            "Your model download has begun",
        ));
        MutationOutcome::Committed
    }

    async fn record_view_now(&self, id: ItemId) -> MutationOutcome {
        match self.gateway.increment_views(id).await {
            Ok(()) => {
                self.store.patch(id, |item| {
                    item.views_count = item.views_count.saturating_add(1);
                });
                MutationOutcome::Committed
            }
            Err(err) => {
                debug!(item_id = %id, error = %err, "catalog: failed to count view");
                MutationOutcome::Failed(err.into())
            }
        }
    }

    fn report_auth_required(&self) {
        self.notifier.notify(Notification::error(
            "Authentication required",
            "Please sign in to like models",
        ));
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
