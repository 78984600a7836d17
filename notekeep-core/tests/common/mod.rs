use _notekeep_core::config::StoreConfig;
use _notekeep_core::error::{NoteError, NoteResult};
use _notekeep_core::image::ImageUpload;
use _notekeep_core::note::Note;
use _notekeep_core::store::{NoteStore, OpendalNoteStore};
use anyhow::Result;
use async_trait::async_trait;
use opendal::services::Memory;
use opendal::Operator;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[allow(dead_code)]
pub fn setup_operator() -> Result<Operator> {
    let builder = Memory::default();
    let op = Operator::new(builder)?.finish();
    Ok(op)
}

#[allow(dead_code)]
pub async fn setup_store() -> Result<OpendalNoteStore> {
    let op = setup_operator()?;
    Ok(OpendalNoteStore::open(op, StoreConfig::new("memory://")).await?)
}

#[allow(dead_code)]
pub fn note(title: &str, favorite: bool, completed: bool, timestamp: i64) -> Note {
    Note {
        title: title.to_string(),
        timestamp,
        is_favorite: favorite,
        is_completed: completed,
        ..Note::default()
    }
}

/// Wraps a real store and fails selected calls on demand.
#[allow(dead_code)]
pub struct FlakyStore {
    pub inner: OpendalNoteStore,
    pub fail_fetch_all: AtomicBool,
    pub fail_upsert: AtomicBool,
    /// Upload succeeds for this many images, then fails.
    pub uploads_before_failure: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: OpendalNoteStore) -> Self {
        Self {
            inner,
            fail_fetch_all: AtomicBool::new(false),
            fail_upsert: AtomicBool::new(false),
            uploads_before_failure: AtomicUsize::new(usize::MAX),
        }
    }
}

fn unavailable() -> NoteError {
    NoteError::RemoteUnavailable("injected failure".to_string())
}

#[async_trait]
impl NoteStore for FlakyStore {
    async fn fetch_all(&self) -> NoteResult<Vec<Note>> {
        if self.fail_fetch_all.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.fetch_all().await
    }

    async fn fetch_by_id(&self, id: &str) -> NoteResult<Option<Note>> {
        self.inner.fetch_by_id(id).await
    }

    async fn upsert(&self, note: Note) -> NoteResult<Note> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.upsert(note).await
    }

    async fn delete(&self, id: &str) -> NoteResult<()> {
        self.inner.delete(id).await
    }

    async fn upload_images(&self, images: Vec<ImageUpload>) -> NoteResult<Vec<String>> {
        let allowed = self.uploads_before_failure.load(Ordering::SeqCst);
        if images.len() <= allowed {
            return self.inner.upload_images(images).await;
        }
        let head: Vec<ImageUpload> = images.into_iter().take(allowed).collect();
        let uploaded = self.inner.upload_images(head).await?;
        Err(NoteError::PartialUploadFailure {
            uploaded,
            message: "injected failure".to_string(),
        })
    }

    async fn delete_image(&self, url: &str) -> NoteResult<()> {
        self.inner.delete_image(url).await
    }
}
