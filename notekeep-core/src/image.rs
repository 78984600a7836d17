use crate::error::{NoteError, NoteResult};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use url::Url;

/// A local image waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, bytes))
    }
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex"))
}

/// Last path segment of `name` with anything outside `[A-Za-z0-9._-]`
/// replaced, so the blob key never needs percent-encoding.
pub fn sanitize_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned = unsafe_chars().replace_all(last, "_");
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn blob_path(images_dir: &str, timestamp: i64, name: &str) -> String {
    format!("{}/{}_{}", images_dir, timestamp, sanitize_name(name))
}

pub fn public_url(base: &str, blob_path: &str) -> NoteResult<String> {
    let base = Url::parse(base).map_err(|e| NoteError::InvalidInput(e.to_string()))?;
    let url = base
        .join(blob_path)
        .map_err(|e| NoteError::InvalidInput(e.to_string()))?;
    Ok(url.to_string())
}

/// Maps a durable image URL back to its blob key.
pub fn blob_path_from_url(base: &str, images_dir: &str, url: &str) -> NoteResult<String> {
    let path = url
        .strip_prefix(base)
        .ok_or_else(|| NoteError::InvalidInput(format!("not an image url of this store: {url}")))?;
    let name = path
        .strip_prefix(images_dir)
        .and_then(|rest| rest.strip_prefix('/'))
        .ok_or_else(|| NoteError::InvalidInput(format!("not an image url of this store: {url}")))?;
    if name.is_empty() || name.contains('/') {
        return Err(NoteError::InvalidInput(format!("malformed image url: {url}")));
    }
    Ok(path.to_string())
}
