use tracing::{debug, info, warn};

use crate::error::{NoteError, NoteResult};
use crate::filter::{FilterKey, FilterState};
use crate::image::ImageUpload;
use crate::note::{now_millis, Note};
use crate::search;
use crate::store::NoteStore;

/// What the editor submits. A blank `note_id` creates a new note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveRequest {
    pub note_id: String,
    pub title: String,
    pub content: String,
    /// `None` keeps whatever images the stored note already has.
    pub image_urls: Option<Vec<String>>,
}

impl SaveRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn for_note(mut self, note_id: impl Into<String>) -> Self {
        self.note_id = note_id.into();
        self
    }

    pub fn with_images(mut self, image_urls: Vec<String>) -> Self {
        self.image_urls = Some(image_urls);
        self
    }

    fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(Note),
    /// Title and content were both blank; nothing was written.
    Skipped,
}

/// State behind the notes screen: filters, search query, the last fetched
/// notes and the list currently shown.
///
/// Every mutation re-fetches the whole collection and recomputes the visible
/// list. Failures come back as `NoteError`; the session itself never panics
/// and keeps its last good state.
pub struct NoteSession<S: NoteStore> {
    store: S,
    filters: FilterState,
    query: String,
    notes: Vec<Note>,
    visible: Vec<Note>,
}

impl<S: NoteStore> NoteSession<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            filters: FilterState::new(),
            query: String::new(),
            notes: Vec::new(),
            visible: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: FilterState) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Builds a session and performs the initial fetch.
    pub async fn open(store: S) -> NoteResult<Self> {
        let mut session = Self::new(store);
        session.refresh().await?;
        Ok(session)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn visible(&self) -> &[Note] {
        &self.visible
    }

    fn recompute(&mut self) {
        self.visible = search::apply(&self.notes, &self.filters, &self.query);
    }

    /// Re-fetches every note. On failure the current filters are still
    /// re-applied to the notes from the last successful fetch.
    pub async fn refresh(&mut self) -> NoteResult<&[Note]> {
        match self.store.fetch_all().await {
            Ok(notes) => {
                self.notes = notes;
                self.recompute();
                debug!(
                    total = self.notes.len(),
                    visible = self.visible.len(),
                    "refreshed notes"
                );
                Ok(&self.visible)
            }
            Err(err) => {
                warn!(error = %err, "note refresh failed, keeping previous notes");
                self.recompute();
                Err(err)
            }
        }
    }

    // The mutation already landed; a failed refresh only leaves the list stale.
    async fn refresh_after_mutation(&mut self) {
        if let Err(err) = self.refresh().await {
            warn!(error = %err, "refresh after mutation failed");
        }
    }

    pub async fn toggle_filter(&mut self, key: FilterKey) -> NoteResult<&[Note]> {
        self.filters.toggle(key);
        self.refresh().await
    }

    pub async fn set_query(&mut self, query: impl Into<String>) -> NoteResult<&[Note]> {
        self.query = query.into();
        self.refresh().await
    }

    pub async fn note(&self, id: &str) -> NoteResult<Option<Note>> {
        self.store.fetch_by_id(id).await
    }

    /// The stored note a request edits, or `None` for a new note.
    async fn existing_note(&self, request: &SaveRequest) -> NoteResult<Option<Note>> {
        let id = request.note_id.trim();
        if id.is_empty() {
            return Ok(None);
        }
        self.store
            .fetch_by_id(id)
            .await?
            .map(Some)
            .ok_or_else(|| NoteError::NotFound(format!("note {}", id)))
    }

    async fn write_note(
        &mut self,
        request: SaveRequest,
        existing: Option<Note>,
    ) -> NoteResult<Note> {
        let now = now_millis();
        let note = match existing {
            None => Note {
                title: request.title,
                content: request.content,
                timestamp: now,
                image_urls: request.image_urls.unwrap_or_default(),
                ..Note::default()
            },
            Some(existing) => {
                let image_urls = request
                    .image_urls
                    .unwrap_or_else(|| existing.image_urls.clone());
                existing.edited(request.title, request.content, image_urls, now)
            }
        };

        let saved = self.store.upsert(note).await?;
        info!(note_id = %saved.id, "saved note");
        self.refresh_after_mutation().await;
        Ok(saved)
    }

    /// Creates or edits a note from the editor's fields.
    ///
    /// Editing keeps the favorite and completed flags of the stored note and
    /// restamps it with the current time. Without `image_urls` the stored
    /// images are kept.
    pub async fn save_note(&mut self, request: SaveRequest) -> NoteResult<SaveOutcome> {
        if request.is_blank() {
            debug!(note_id = %request.note_id, "skipping save of blank note");
            return Ok(SaveOutcome::Skipped);
        }
        let existing = self.existing_note(&request).await?;
        let saved = self.write_note(request, existing).await?;
        Ok(SaveOutcome::Saved(saved))
    }

    /// Save flow for an edit that picked new images: upload the new images,
    /// save the note pointing at them, then drop the stored note's images it
    /// no longer references. With no new images this is a plain save.
    ///
    /// Not atomic: a failed upload leaves earlier uploads orphaned and the
    /// note untouched, and failed image deletes are only logged.
    pub async fn save_with_images(
        &mut self,
        request: SaveRequest,
        new_images: Vec<ImageUpload>,
    ) -> NoteResult<SaveOutcome> {
        if request.is_blank() {
            debug!(note_id = %request.note_id, "skipping save of blank note");
            return Ok(SaveOutcome::Skipped);
        }
        if new_images.is_empty() {
            return self.save_note(request).await;
        }

        let existing = self.existing_note(&request).await?;
        let previous = existing
            .as_ref()
            .map(|note| note.image_urls.clone())
            .unwrap_or_default();
        let uploaded = self.store.upload_images(new_images).await?;
        let saved = self
            .write_note(request.with_images(uploaded), existing)
            .await?;

        for url in previous.iter().filter(|url| !saved.image_urls.contains(url)) {
            self.delete_image(url).await;
        }
        Ok(SaveOutcome::Saved(saved))
    }

    pub async fn toggle_favorite(&mut self, note: &Note) -> NoteResult<Note> {
        let saved = self.store.upsert(note.with_favorite_toggled()).await?;
        info!(note_id = %saved.id, favorite = saved.is_favorite, "toggled favorite");
        self.refresh_after_mutation().await;
        Ok(saved)
    }

    pub async fn toggle_complete(&mut self, note: &Note) -> NoteResult<Note> {
        let saved = self.store.upsert(note.with_completed_toggled()).await?;
        info!(note_id = %saved.id, completed = saved.is_completed, "toggled completed");
        self.refresh_after_mutation().await;
        Ok(saved)
    }

    /// Deletes the note, then makes a best-effort pass over its images.
    pub async fn delete_note(&mut self, id: &str) -> NoteResult<()> {
        let image_urls = match self.store.fetch_by_id(id).await {
            Ok(Some(note)) => note.image_urls,
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(note_id = id, error = %err, "could not look up images of deleted note");
                Vec::new()
            }
        };

        self.store.delete(id).await?;
        info!(note_id = id, images = image_urls.len(), "deleted note");

        for url in &image_urls {
            self.delete_image(url).await;
        }
        self.refresh_after_mutation().await;
        Ok(())
    }

    /// Best-effort; `false` when the blob could not be removed.
    pub async fn delete_image(&self, url: &str) -> bool {
        match self.store.delete_image(url).await {
            Ok(()) => true,
            Err(err) => {
                warn!(url, error = %err, "image delete failed");
                false
            }
        }
    }
}
