//! Offline reference lookup tables
//!
//! Documents without a PMCID, PMID or DOI are linked through two JSON files
//! produced by the ingestion pipeline:
//! - `pdf_url_mapping.json`: filename -> public URL
//! - `pdf_metadata_mapping.json`: filename -> { title, ... }
//!
//! Both are read once at startup and shared read-only.

use crate::config::ReferenceDataConfig;
use crate::errors::{AppError, Result};
use crate::models::EvidenceChunk;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Deserialize)]
struct MetadataEntry {
    #[serde(default)]
    title: Option<String>,
}

/// Title and filename lookup used to link evidence to its source PDF.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDirectory {
    url_by_filename: HashMap<String, String>,
    filename_by_title: HashMap<String, String>,
}

impl ReferenceDirectory {
    /// Load both tables. A missing file yields an empty table; a malformed
    /// file is a configuration error.
    pub fn load(config: &ReferenceDataConfig) -> Result<Self> {
        let url_by_filename: HashMap<String, String> =
            read_table(Path::new(&config.pdf_url_mapping_path))?.unwrap_or_default();

        let metadata: HashMap<String, MetadataEntry> =
            read_table(Path::new(&config.pdf_metadata_mapping_path))?.unwrap_or_default();

        let directory = Self::from_tables(
            url_by_filename,
            metadata
                .into_iter()
                .filter_map(|(filename, entry)| entry.title.map(|title| (filename, title))),
        );

        tracing::info!(
            urls = directory.url_by_filename.len(),
            titles = directory.filename_by_title.len(),
            "Reference data loaded"
        );

        Ok(directory)
    }

    /// Build from in-memory tables: filename -> URL, and (filename, title)
    /// pairs.
    pub fn from_tables(
        url_by_filename: HashMap<String, String>,
        titles: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let filename_by_title = titles
            .into_iter()
            .filter_map(|(filename, title)| {
                let key = normalize_title(&title);
                (!key.is_empty()).then_some((key, filename))
            })
            .collect();

        Self {
            url_by_filename,
            filename_by_title,
        }
    }

    /// Look up a PDF URL by document title.
    pub fn url_for_title(&self, title: &str) -> Option<&str> {
        self.filename_by_title
            .get(&normalize_title(title))
            .and_then(|filename| self.url_by_filename.get(filename))
            .map(String::as_str)
    }

    /// Link for a cited document, by priority: PMC article, PubMed record,
    /// DOI, PDF mapping. Empty when nothing matches.
    pub fn resolve_url(&self, chunk: &EvidenceChunk) -> String {
        if let Some(pmcid) = chunk.pmcid.as_deref().filter(|id| id.starts_with("PMC")) {
            return format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{}/", pmcid);
        }
        if let Some(pmid) = chunk.pmid.as_deref() {
            return format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid);
        }
        if let Some(doi) = chunk.doi.as_deref() {
            return format!("https://doi.org/{}", doi);
        }
        self.url_for_title(&chunk.title).unwrap_or_default().to_string()
    }
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

fn read_table<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Reference table not found, continuing without it");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| AppError::Configuration {
            message: format!("Invalid reference table {}: {}", path.display(), e),
        })
}
