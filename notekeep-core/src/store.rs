use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{EntryMode, ErrorKind, Operator};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{NoteError, NoteResult};
use crate::image::{self, ImageUpload};
use crate::note::{now_millis, Note};

/// Remote persistence for notes and their images.
///
/// Implementations report every failure; deciding how a failure degrades is
/// left to the caller.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Every note in the collection, in no particular order.
    async fn fetch_all(&self) -> NoteResult<Vec<Note>>;

    /// `Ok(None)` when no note has this id.
    async fn fetch_by_id(&self, id: &str) -> NoteResult<Option<Note>>;

    /// Inserts under a fresh id when `note.id` is blank, otherwise overwrites
    /// the note stored under that id. Returns the note as stored.
    async fn upsert(&self, note: Note) -> NoteResult<Note>;

    /// Removing a note that does not exist is not an error.
    async fn delete(&self, id: &str) -> NoteResult<()>;

    /// Uploads in order and returns one durable URL per image. A failure part
    /// way through yields `PartialUploadFailure` with the URLs already stored.
    async fn upload_images(&self, images: Vec<ImageUpload>) -> NoteResult<Vec<String>>;

    async fn delete_image(&self, url: &str) -> NoteResult<()>;
}

/// `NoteStore` over any OpenDAL backend: one JSON document per note under
/// `notes/<id>.json`, image blobs under `images/<timestamp>_<name>`.
#[derive(Clone, Debug)]
pub struct OpendalNoteStore {
    op: Operator,
    config: StoreConfig,
}

impl OpendalNoteStore {
    pub async fn open(op: Operator, config: StoreConfig) -> NoteResult<Self> {
        op.create_dir(&format!("{}/", config.notes_dir)).await?;
        op.create_dir(&format!("{}/", config.images_dir)).await?;
        Ok(Self { op, config })
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn note_path(&self, id: &str) -> NoteResult<String> {
        let id = id.trim();
        if id.is_empty() || id.contains('/') {
            return Err(NoteError::InvalidInput(format!("invalid note id: {:?}", id)));
        }
        Ok(format!("{}/{}.json", self.config.notes_dir, id))
    }

    async fn read_note(&self, path: &str, id: &str) -> NoteResult<Note> {
        let bytes = self.op.read(path).await?;
        let note: Note = serde_json::from_slice(&bytes.to_vec())?;
        // The document key wins over whatever id the body carries.
        Ok(note.with_id(id))
    }
}

fn upload_failed(uploaded: Vec<String>, path: &str, err: opendal::Error) -> NoteError {
    warn!(
        path,
        stored = uploaded.len(),
        error = %err,
        "image upload failed, earlier uploads are left in place"
    );
    NoteError::PartialUploadFailure {
        uploaded,
        message: err.to_string(),
    }
}

#[async_trait]
impl NoteStore for OpendalNoteStore {
    async fn fetch_all(&self) -> NoteResult<Vec<Note>> {
        let dir = format!("{}/", self.config.notes_dir);
        let mut lister = match self.op.lister(&dir).await {
            Ok(lister) => lister,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };

        let mut notes = Vec::new();
        while let Some(entry) = lister.try_next().await? {
            if entry.metadata().mode() != EntryMode::FILE {
                continue;
            }
            let name = entry.name().split('/').next_back().unwrap_or("");
            let Some(id) = name.strip_suffix(".json") else {
                continue;
            };
            if id.is_empty() {
                continue;
            }
            match self.read_note(entry.path(), id).await {
                Ok(note) => notes.push(note),
                Err(NoteError::InvalidDocument(reason)) => {
                    warn!(note_id = id, %reason, "skipping undecodable note document");
                }
                Err(err) => return Err(err),
            }
        }

        notes.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(count = notes.len(), "fetched notes");
        Ok(notes)
    }

    async fn fetch_by_id(&self, id: &str) -> NoteResult<Option<Note>> {
        let path = self.note_path(id)?;
        if !self.op.exists(&path).await? {
            return Ok(None);
        }
        match self.read_note(&path, id.trim()).await {
            Ok(note) => Ok(Some(note)),
            Err(NoteError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn upsert(&self, note: Note) -> NoteResult<Note> {
        let note = if note.is_persisted() {
            let id = note.id.trim().to_string();
            note.with_id(id)
        } else {
            note.with_id(Uuid::new_v4().simple().to_string())
        };
        let path = self.note_path(&note.id)?;
        self.op
            .write(&path, serde_json::to_vec_pretty(&note)?)
            .await?;
        debug!(note_id = %note.id, "stored note");
        Ok(note)
    }

    async fn delete(&self, id: &str) -> NoteResult<()> {
        let path = self.note_path(id)?;
        self.op.delete(&path).await?;
        Ok(())
    }

    async fn upload_images(&self, images: Vec<ImageUpload>) -> NoteResult<Vec<String>> {
        let mut uploaded = Vec::with_capacity(images.len());
        for upload in images {
            let mut stamp = now_millis();
            let mut path = image::blob_path(&self.config.images_dir, stamp, &upload.name);
            // Same name within the same millisecond would overwrite a sibling.
            loop {
                match self.op.exists(&path).await {
                    Ok(false) => break,
                    Ok(true) => {
                        stamp += 1;
                        path = image::blob_path(&self.config.images_dir, stamp, &upload.name);
                    }
                    Err(err) => return Err(upload_failed(uploaded, &path, err)),
                }
            }
            let url = image::public_url(&self.config.public_url, &path)?;
            if let Err(err) = self.op.write(&path, upload.bytes).await {
                return Err(upload_failed(uploaded, &path, err));
            }
            debug!(path = %path, "uploaded image");
            uploaded.push(url);
        }
        Ok(uploaded)
    }

    async fn delete_image(&self, url: &str) -> NoteResult<()> {
        let path =
            image::blob_path_from_url(&self.config.public_url, &self.config.images_dir, url)?;
        self.op.delete(&path).await?;
        debug!(path = %path, "deleted image");
        Ok(())
    }
}
