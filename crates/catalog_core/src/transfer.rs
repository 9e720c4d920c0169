use shared::domain::{CatalogItem, ItemId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub item_id: ItemId,
    pub url: String,
    pub suggested_filename: String,
}

impl DownloadRequest {
    pub fn for_item(item: &CatalogItem) -> Self {
        Self {
            item_id: item.id,
            url: item.file.url.clone(),
            suggested_filename: item.suggested_filename(),
        }
    }
}

/// Starts the actual file transfer once a download has been counted.
pub trait DownloadTrigger: Send + Sync {
    fn begin_download(&self, request: DownloadRequest);
}
