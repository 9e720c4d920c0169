use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::{
    domain::{AccountId, CatalogItem, ItemId},
    protocol::ItemRecord,
};
use tracing::{debug, info, warn};

use crate::{
    error::CoreError,
    gateway::RemoteGateway,
    notify::{Notification, NotificationSink},
    store::CatalogStore,
};

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Applied {
        item_count: usize,
        /// `false` when the liked set could not be fetched and every item
        /// was shown as not liked.
        likes_resolved: bool,
    },
    /// A load started later finished first; this result was dropped.
    Superseded,
    /// The listing failed; the previous snapshot is untouched.
    Failed(CoreError),
}

/// Fetch, join and replace. Each run is a full refresh of the store.
pub struct CatalogLoader {
    store: Arc<CatalogStore>,
    gateway: Arc<dyn RemoteGateway>,
    notifier: Arc<dyn NotificationSink>,
    tickets: AtomicU64,
}

impl CatalogLoader {
    pub fn new(
        store: Arc<CatalogStore>,
        gateway: Arc<dyn RemoteGateway>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            tickets: AtomicU64::new(0),
        }
    }

    pub async fn load(&self, viewer: Option<AccountId>) -> LoadOutcome {
        let ticket = self.tickets.fetch_add(1, Ordering::AcqRel) + 1;
        let _loading = self.store.begin_load();

        let records = match self.gateway.fetch_public_items().await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "catalog: load failed; keeping previous snapshot");
                self.notifier.notify(Notification::error(
                    "Failed to load models",
                    err.user_message(),
                ));
                return LoadOutcome::Failed(err.into());
            }
        };

        let (liked, likes_resolved) = match viewer {
            None => (HashSet::new(), true),
            Some(viewer) => match self.gateway.fetch_liked_ids(viewer).await {
                Ok(liked) => (liked, true),
                Err(err) => {
                    warn!(viewer = %viewer, error = %err, "catalog: liked set unavailable; showing no likes");
                    (HashSet::new(), false)
                }
            },
        };

        let items = join_records(records, viewer, &liked);
        let item_count = items.len();
        if !self.store.replace_from_load(ticket, viewer, items) {
            debug!(ticket, "catalog: load superseded by a newer one");
            return LoadOutcome::Superseded;
        }

        info!(item_count, likes_resolved, "catalog: loaded");
        LoadOutcome::Applied {
            item_count,
            likes_resolved,
        }
    }
}

/// Resolves viewer-relative flags, keeping the remote order.
pub fn join_records(
    records: Vec<ItemRecord>,
    viewer: Option<AccountId>,
    liked: &HashSet<ItemId>,
) -> Vec<CatalogItem> {
    records
        .into_iter()
        .map(|record| {
            let is_liked = liked.contains(&record.id);
            record.into_catalog_item(viewer, is_liked)
        })
        .collect()
}
