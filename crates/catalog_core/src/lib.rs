//! Client-side catalog synchronization: an in-memory snapshot of published
//! assets kept in step with the remote store through serialized mutations
//! and full refreshes.

use std::{future::Future, sync::Arc};

use shared::domain::{AccountId, CatalogItem, ItemId};

pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod notify;
mod queue;
pub mod refresh;
pub mod store;
pub mod transfer;

pub use coordinator::{MutationCoordinator, MutationOutcome};
pub use error::{CoreError, GatewayError};
pub use gateway::{GatewayConfig, MissingRemoteGateway, RemoteGateway, RestGateway};
pub use notify::{Notification, NotificationKind, NotificationSink};
pub use queue::EntityPhase;
pub use refresh::{CatalogLoader, LoadOutcome};
pub use store::{CatalogEvent, CatalogSnapshot, CatalogStore};
pub use transfer::{DownloadRequest, DownloadTrigger};

/// Store, loader and coordinator wired to the same collaborators.
pub struct CatalogClient {
    store: Arc<CatalogStore>,
    loader: CatalogLoader,
    coordinator: MutationCoordinator,
}

impl CatalogClient {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        notifier: Arc<dyn NotificationSink>,
        downloads: Arc<dyn DownloadTrigger>,
    ) -> Self {
        let store = Arc::new(CatalogStore::new());
        Self {
            loader: CatalogLoader::new(store.clone(), gateway.clone(), notifier.clone()),
            coordinator: MutationCoordinator::new(store.clone(), gateway, notifier, downloads),
            store,
        }
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    /// Full refresh for `viewer` (`None` when signed out).
    pub async fn load(&self, viewer: Option<AccountId>) -> LoadOutcome {
        self.loader.load(viewer).await
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.store.snapshot()
    }

    pub fn search(&self, query: &str) -> Vec<CatalogItem> {
        self.store.search(query)
    }

    pub fn toggle_like(&self, id: ItemId) -> impl Future<Output = MutationOutcome> + Send + 'static {
        self.coordinator.toggle_like(id)
    }

    pub fn record_download(
        &self,
        id: ItemId,
    ) -> impl Future<Output = MutationOutcome> + Send + 'static {
        self.coordinator.record_download(id)
    }

    pub fn record_view(&self, id: ItemId) -> impl Future<Output = MutationOutcome> + Send + 'static {
        self.coordinator.record_view(id)
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
