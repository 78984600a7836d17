use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const STORAGE_URI_ENV: &str = "NOTEKEEP_STORAGE_URI";

fn default_public_url() -> String {
    "notekeep://blob/".to_string()
}

fn default_notes_dir() -> String {
    "notes".to_string()
}

fn default_images_dir() -> String {
    "images".to_string()
}

/// Where notes and images live, and how image URLs are minted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    #[serde(default)]
    pub uri: String,
    /// Prefix of every durable image URL; blob paths are joined onto it.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_notes_dir")]
    pub notes_dir: String,
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
}

impl StoreConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            public_url: default_public_url(),
            notes_dir: default_notes_dir(),
            images_dir: default_images_dir(),
        }
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw).context("invalid store config")?;
        config.validated()
    }

    /// Reads a YAML file, then lets `NOTEKEEP_STORAGE_URI` override the uri.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid store config {}", path.display()))?;
        if let Ok(uri) = std::env::var(STORAGE_URI_ENV) {
            if !uri.trim().is_empty() {
                config.uri = uri;
            }
        }
        config.validated()
    }

    /// Checks required fields and normalizes paths and the URL prefix.
    pub fn validated(mut self) -> Result<Self> {
        if self.uri.trim().is_empty() {
            return Err(anyhow!("store config is missing 'uri'"));
        }
        if !self.public_url.ends_with('/') {
            self.public_url.push('/');
        }
        url::Url::parse(&self.public_url)
            .with_context(|| format!("invalid public_url: {}", self.public_url))?;
        self.notes_dir = self.notes_dir.trim_matches('/').to_string();
        self.images_dir = self.images_dir.trim_matches('/').to_string();
        if self.notes_dir.is_empty() || self.images_dir.is_empty() {
            return Err(anyhow!("notes_dir and images_dir must not be empty"));
        }
        Ok(self)
    }
}
