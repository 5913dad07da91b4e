//! JSON-backed corpus source.
//!
//! Reads a single `.json` file or every `.json` file below a directory (sorted
//! by path so the corpus order is stable across runs). Two layouts are
//! accepted: an array of corpus items, or a Google-Books style export with an
//! `items` array of volumes.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::traits::CorpusSource;
use crate::types::{BookRecord, CorpusItem};

#[derive(Debug, Clone)]
pub struct JsonCorpusSource {
    root: PathBuf,
}

impl JsonCorpusSource {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    /// Every `.json` file below the root, following symlinks. A directory or
    /// link that cannot be read fails the whole listing.
    fn list_json_files(&self) -> Result<Vec<PathBuf>> {
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.with_context(|| format!("scanning {}", self.root.display()))?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(path.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }
}

impl CorpusSource for JsonCorpusSource {
    fn items(&self) -> Result<Vec<CorpusItem>> {
        if !self.root.exists() {
            anyhow::bail!("corpus path {} does not exist", self.root.display());
        }
        let mut items = Vec::new();
        for path in self.list_json_files()? {
            let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            let parsed = parse_corpus_json(&raw).with_context(|| format!("parsing {}", path.display()))?;
            items.extend(parsed);
        }
        Ok(items)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusFile {
    Items(Vec<CorpusItem>),
    Volumes { items: Vec<Volume> },
}

#[derive(Deserialize)]
struct Volume {
    id: String,
    #[serde(rename = "volumeInfo")]
    info: VolumeInfo,
}

#[derive(Deserialize)]
struct VolumeInfo {
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Parse one corpus document. Volumes without a description are skipped.
pub fn parse_corpus_json(raw: &str) -> Result<Vec<CorpusItem>> {
    let file: CorpusFile = serde_json::from_str(raw)?;
    Ok(match file {
        CorpusFile::Items(items) => items,
        CorpusFile::Volumes { items } => items.into_iter().filter_map(volume_to_item).collect(),
    })
}

fn volume_to_item(volume: Volume) -> Option<CorpusItem> {
    let description = volume.info.description?;
    let title = match volume.info.subtitle.as_deref() {
        Some(sub) if !sub.is_empty() => format!("{} - {}", volume.info.title, sub),
        _ => volume.info.title,
    };
    Some(CorpusItem::new(BookRecord {
        id: volume.id,
        title,
        authors: volume.info.authors,
        processed_text: description.clone(),
        description,
    }))
}
