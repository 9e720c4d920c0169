use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, CatalogItem, FileRef, ItemId, UploaderProfile};

/// A row of the public `models` listing, with the uploader profile embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: ItemId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub file_url: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub downloads_count: u64,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub views_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: AccountId,
    #[serde(default)]
    pub profiles: Option<ProfileEmbed>,
}

/// The backend embeds a to-one relation either as an object or as a
/// single-element array depending on how the foreign key is declared.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileEmbed {
    One(UploaderProfile),
    Many(Vec<UploaderProfile>),
}

impl ProfileEmbed {
    pub fn into_profile(self) -> Option<UploaderProfile> {
        match self {
            Self::One(profile) => Some(profile),
            Self::Many(profiles) => profiles.into_iter().next(),
        }
    }
}

impl ItemRecord {
    /// Builds the local entity with viewer-relative flags already resolved.
    pub fn into_catalog_item(self, viewer: Option<AccountId>, liked: bool) -> CatalogItem {
        let is_owned_by_viewer = viewer.is_some_and(|viewer| viewer == self.user_id);
        CatalogItem {
            id: self.id,
            title: self.title,
            description: self.description,
            tags: self.tags.unwrap_or_default(),
            owner_id: self.user_id,
            file: FileRef {
                url: self.file_url,
                size_bytes: self.file_size,
                media_type: self.file_type,
            },
            thumbnail_url: self.thumbnail_url,
            uploader: self.profiles.and_then(ProfileEmbed::into_profile),
            downloads_count: self.downloads_count,
            likes_count: self.likes_count,
            views_count: self.views_count,
            is_liked_by_viewer: viewer.is_some() && liked,
            is_owned_by_viewer,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeRecord {
    pub user_id: AccountId,
    pub model_id: ItemId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikedItemRow {
    pub model_id: ItemId,
}

/// Arguments of the counter increment procedures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterArgs {
    pub model_id: ItemId,
}
