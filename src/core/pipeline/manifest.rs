//! Screenshot manifest - the list of 1 Hz screenshots captured for one video

use log::info;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("remote manifests are not supported: {0}")]
    RemoteUnsupported(String),
}

/// Missing, fractional or quoted timestamps are tolerated.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f.floor() as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f > 0.0)
            .map(|f| f.floor() as u64)
            .unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    /// Seconds since the start of the video.
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub timestamp: u64,
    #[serde(default)]
    pub full: String,
    #[serde(default)]
    pub thumb: Option<String>,
}

impl ManifestEntry {
    pub fn new(timestamp: u64, full: impl Into<String>) -> Self {
        Self {
            timestamp,
            full: full.into(),
            thumb: None,
        }
    }
}

/// Entries in timestamp order. Relative image paths resolve against `base_dir`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenshotManifest {
    entries: Vec<ManifestEntry>,
    base_dir: Option<PathBuf>,
}

impl ScreenshotManifest {
    pub fn from_entries(mut entries: Vec<ManifestEntry>) -> Self {
        entries.sort_by_key(|e| e.timestamp);
        Self {
            entries,
            base_dir: None,
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, ManifestError> {
        let entries: Vec<ManifestEntry> = serde_json::from_str(text)?;
        Ok(Self::from_entries(entries))
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Loads from a local path or a `file://` URL.
    pub fn load(source: &str) -> Result<Self, ManifestError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            return Err(ManifestError::RemoteUnsupported(source.to_string()));
        }

        let path = Path::new(source.strip_prefix("file://").unwrap_or(source));
        let manifest = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        info!("🖼️ Manifest: {} screenshots from {:?}", manifest.len(), path);

        Ok(match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => manifest.with_base_dir(dir),
            _ => manifest,
        })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Local path of the full-size screenshot, `None` when the entry has no image.
    pub fn image_path(&self, entry: &ManifestEntry) -> Option<PathBuf> {
        let full = entry.full.trim();
        if full.is_empty() {
            return None;
        }

        let path = Path::new(full.strip_prefix("file://").unwrap_or(full));
        match &self.base_dir {
            Some(base) if path.is_relative() => Some(base.join(path)),
            _ => Some(path.to_path_buf()),
        }
    }
}
