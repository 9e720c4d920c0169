use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

id_newtype!(ItemId);
id_newtype!(AccountId);

const FALLBACK_EXTENSION: &str = "glb";
const UNKNOWN_AUTHOR: &str = "Unknown";

/// Reference to the binary payload of a published asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    pub size_bytes: Option<u64>,
    pub media_type: Option<String>,
}

impl FileRef {
    /// Extension derived from the media subtype, `glb` when unknown.
    pub fn extension(&self) -> &str {
        self.media_type
            .as_deref()
            .and_then(|media_type| media_type.split('/').nth(1))
            .map(str::trim)
            .filter(|subtype| !subtype.is_empty())
            .unwrap_or(FALLBACK_EXTENSION)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploaderProfile {
    pub username: Option<String>,
    pub display_name: Option<String>,
}

/// One published asset as seen by the current viewer.
///
/// Only the three counters and `is_liked_by_viewer` are ever changed locally;
/// everything else is replaced wholesale on the next load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub owner_id: AccountId,
    pub file: FileRef,
    pub thumbnail_url: Option<String>,
    pub uploader: Option<UploaderProfile>,
    pub downloads_count: u64,
    pub likes_count: u64,
    pub views_count: u64,
    pub is_liked_by_viewer: bool,
    pub is_owned_by_viewer: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    pub fn author_label(&self) -> &str {
        let Some(profile) = &self.uploader else {
            return UNKNOWN_AUTHOR;
        };
        non_blank(&profile.display_name)
            .or_else(|| non_blank(&profile.username))
            .unwrap_or(UNKNOWN_AUTHOR)
    }

    pub fn suggested_filename(&self) -> String {
        format!("{}.{}", self.title, self.file.extension())
    }

    /// Case-insensitive substring match on title, author and tags.
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        self.title.to_lowercase().contains(&needle)
            || self.author_label().to_lowercase().contains(&needle)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&needle))
    }

    /// Flips the liked flag and moves `likes_count` with it.
    ///
    /// `was_liked` is the flag observed before the remote call; the counter
    /// saturates at zero.
    pub fn apply_like_toggle(&mut self, was_liked: bool) {
        if was_liked {
            self.is_liked_by_viewer = false;
            self.likes_count = self.likes_count.saturating_sub(1);
        } else {
            self.is_liked_by_viewer = true;
            self.likes_count = self.likes_count.saturating_add(1);
        }
    }
}

fn non_blank(name: &Option<String>) -> Option<&str> {
    name.as_deref().filter(|name| !name.trim().is_empty())
}
