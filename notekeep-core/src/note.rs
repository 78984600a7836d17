use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A single note as stored in the `notes` collection.
///
/// A blank `id` means the note has never been persisted. Mutation helpers
/// return a new value and leave the id untouched; only the store assigns one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Note {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, rename = "favorite")]
    pub is_favorite: bool,
    #[serde(default, rename = "completed")]
    pub is_completed: bool,
    #[serde(default, rename = "imageUrls")]
    pub image_urls: Vec<String>,
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl Note {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            timestamp: now_millis(),
            ..Self::default()
        }
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// True when either the title or the content carries non-whitespace text.
    pub fn has_text(&self) -> bool {
        !self.title.trim().is_empty() || !self.content.trim().is_empty()
    }

    pub fn with_id(self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self
        }
    }

    pub fn with_favorite_toggled(&self) -> Self {
        Self {
            is_favorite: !self.is_favorite,
            ..self.clone()
        }
    }

    pub fn with_completed_toggled(&self) -> Self {
        Self {
            is_completed: !self.is_completed,
            ..self.clone()
        }
    }

    /// Replaces the editable fields and restamps the note; flags are kept.
    pub fn edited(
        &self,
        title: impl Into<String>,
        content: impl Into<String>,
        image_urls: Vec<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            image_urls,
            timestamp,
            ..self.clone()
        }
    }
}
