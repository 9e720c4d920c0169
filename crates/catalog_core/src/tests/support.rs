//! Hand-rolled collaborators shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex as StdMutex},
};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use shared::{
    domain::{AccountId, ItemId, UploaderProfile},
    error::{ApiError, ErrorCode},
    protocol::{ItemRecord, ProfileEmbed},
};
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use crate::{
    error::GatewayError,
    gateway::{GatewayResult, RemoteGateway},
    notify::{Notification, NotificationKind, NotificationSink},
    transfer::{DownloadRequest, DownloadTrigger},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FetchItems,
    FetchLiked,
    InsertLike,
    DeleteLike,
    IncrementDownloads,
    IncrementViews,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub item_id: Option<ItemId>,
}

/// In-memory stand-in for the backend. Likes are kept as a unique set per
/// viewer, so inserting a like twice is rejected the way a unique key would.
pub struct TestGateway {
    records: Mutex<Vec<ItemRecord>>,
    likes: Mutex<HashSet<(AccountId, ItemId)>>,
    failures: Mutex<HashMap<Op, GatewayError>>,
    calls: Mutex<Vec<Call>>,
    gate: Option<Arc<Semaphore>>,
    held_listing: Mutex<Option<Arc<Semaphore>>>,
}

impl TestGateway {
    pub fn with_records(records: Vec<ItemRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            likes: Mutex::new(HashSet::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
            held_listing: Mutex::new(None),
        }
    }

    /// Mutating calls wait for a permit on `gate` before answering.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// The next listing reads the records right away but answers only once
    /// `gate` has a permit.
    pub async fn hold_next_listing(&self, gate: Arc<Semaphore>) {
        *self.held_listing.lock().await = Some(gate);
    }

    pub async fn set_records(&self, records: Vec<ItemRecord>) {
        *self.records.lock().await = records;
    }

    pub async fn add_like(&self, viewer: AccountId, item_id: ItemId) {
        self.likes.lock().await.insert((viewer, item_id));
    }

    pub async fn fail(&self, op: Op, error: GatewayError) {
        self.failures.lock().await.insert(op, error);
    }

    pub async fn recover(&self, op: Op) {
        self.failures.lock().await.remove(&op);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn count(&self, op: Op) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.op == op)
            .count()
    }

    pub async fn remote_likes(&self, item_id: ItemId) -> u64 {
        self.records
            .lock()
            .await
            .iter()
            .find(|record| record.id == item_id)
            .map_or(0, |record| record.likes_count)
    }

    async fn enter(&self, op: Op, item_id: Option<ItemId>) -> GatewayResult<()> {
        self.calls.lock().await.push(Call { op, item_id });
        if !matches!(op, Op::FetchItems | Op::FetchLiked) {
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate closed").forget();
            }
        }
        match self.failures.lock().await.get(&op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn bump(&self, item_id: ItemId, f: impl FnOnce(&mut ItemRecord)) {
        if let Some(record) = self
            .records
            .lock()
            .await
            .iter_mut()
            .find(|record| record.id == item_id)
        {
            f(record);
        }
    }
}

#[async_trait]
impl RemoteGateway for TestGateway {
    async fn fetch_public_items(&self) -> GatewayResult<Vec<ItemRecord>> {
        self.enter(Op::FetchItems, None).await?;
        let records = self.records.lock().await.clone();
        let held = self.held_listing.lock().await.take();
        if let Some(gate) = held {
            gate.acquire().await.expect("gate closed").forget();
        }
        Ok(records)
    }

    async fn fetch_liked_ids(&self, viewer: AccountId) -> GatewayResult<HashSet<ItemId>> {
        self.enter(Op::FetchLiked, None).await?;
        Ok(self
            .likes
            .lock()
            .await
            .iter()
            .filter(|(liker, _)| *liker == viewer)
            .map(|(_, item_id)| *item_id)
            .collect())
    }

    async fn insert_like(&self, viewer: AccountId, item_id: ItemId) -> GatewayResult<()> {
        self.enter(Op::InsertLike, Some(item_id)).await?;
        if !self.likes.lock().await.insert((viewer, item_id)) {
            return Err(rejected(409, "duplicate key value violates unique constraint"));
        }
        self.bump(item_id, |record| record.likes_count += 1).await;
        Ok(())
    }

    async fn delete_like(&self, viewer: AccountId, item_id: ItemId) -> GatewayResult<()> {
        self.enter(Op::DeleteLike, Some(item_id)).await?;
        if self.likes.lock().await.remove(&(viewer, item_id)) {
            self.bump(item_id, |record| {
                record.likes_count = record.likes_count.saturating_sub(1)
            })
            .await;
        }
        Ok(())
    }

    async fn increment_downloads(&self, item_id: ItemId) -> GatewayResult<()> {
        self.enter(Op::IncrementDownloads, Some(item_id)).await?;
        self.bump(item_id, |record| record.downloads_count += 1).await;
        Ok(())
    }

    async fn increment_views(&self, item_id: ItemId) -> GatewayResult<()> {
        self.enter(Op::IncrementViews, Some(item_id)).await?;
        self.bump(item_id, |record| record.views_count += 1).await;
        Ok(())
    }
}

pub fn rejected(status: u16, message: &str) -> GatewayError {
    GatewayError::Rejected {
        status,
        error: ApiError::new(ErrorCode::from_status(status), message),
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: StdMutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().expect("notifier lock").clone()
    }

    pub fn errors(&self) -> Vec<Notification> {
        self.all()
            .into_iter()
            .filter(|notification| notification.kind == NotificationKind::Error)
            .collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .expect("notifier lock")
            .push(notification);
    }
}

#[derive(Default)]
pub struct RecordingDownloads {
    requests: StdMutex<Vec<DownloadRequest>>,
}

impl RecordingDownloads {
    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.requests.lock().expect("downloads lock").clone()
    }
}

impl DownloadTrigger for RecordingDownloads {
    fn begin_download(&self, request: DownloadRequest) {
        self.requests.lock().expect("downloads lock").push(request);
    }
}

pub fn account() -> AccountId {
    AccountId(Uuid::new_v4())
}

/// A public record created `age_hours` before a fixed reference time.
pub fn record(title: &str, owner: AccountId, likes: u64, age_hours: i64) -> ItemRecord {
    let reference = Utc
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("reference time");
    let created_at = reference - Duration::hours(age_hours);
    ItemRecord {
        id: ItemId(Uuid::new_v4()),
        title: title.to_string(),
        description: Some(format!("{title} description")),
        tags: Some(vec!["sci-fi".to_string(), "character".to_string()]),
        file_url: format!("https://cdn.example/models/{}.glb", title.to_lowercase()),
        file_size: Some(1024),
        file_type: Some("model/gltf-binary".to_string()),
        thumbnail_url: None,
        downloads_count: 0,
        likes_count: likes,
        views_count: 0,
        created_at,
        updated_at: created_at,
        user_id: owner,
        profiles: Some(ProfileEmbed::One(UploaderProfile {
            username: Some("techdesigner".to_string()),
            display_name: None,
        })),
    }
}
