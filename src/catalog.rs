use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{CollectionKey, is_genesets_file};
use crate::error::GenesetError;

/// Name of the catalog file inside the remote domain.
pub const CATALOG_FILENAME: &str = "index.json";

/// Snapshot of every gene set file on the remote store.
///
/// Always rebuilt from a full remote listing, never patched. `uploaded_at`
/// holds the revision stamp of every file uploaded through a registry; a
/// mirrored copy is current only when its sidecar carries the same stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub generated_at: Option<String>,
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub uploaded_at: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Flat(Vec<String>),
    Detailed(Catalog),
}

impl Catalog {
    pub fn from_listing<I, S>(filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut files = filenames
            .into_iter()
            .map(Into::into)
            .filter(|name| CollectionKey::parse_filename(name).is_some())
            .collect::<Vec<_>>();
        files.sort();
        files.dedup();
        Self {
            generated_at: Some(chrono::Utc::now().to_rfc3339()),
            files,
            uploaded_at: BTreeMap::new(),
        }
    }

    /// Keeps the stamps of an earlier catalog for files that are still listed.
    pub fn carry_stamps(mut self, previous: &Catalog) -> Self {
        for (filename, stamp) in &previous.uploaded_at {
            if self.files.contains(filename) {
                self.uploaded_at.insert(filename.clone(), stamp.clone());
            }
        }
        self
    }

    /// Marks `filename` as replaced on the server just now.
    pub fn stamp_upload(&mut self, filename: &str) {
        if self.files.iter().any(|name| name == filename) {
            self.uploaded_at
                .insert(filename.to_string(), chrono::Utc::now().to_rfc3339());
        }
    }

    pub fn stamp(&self, filename: &str) -> Option<&str> {
        self.uploaded_at.get(filename).map(String::as_str)
    }

    pub fn keys(&self) -> Vec<(CollectionKey, &str)> {
        self.files
            .iter()
            .filter(|name| is_genesets_file(name))
            .filter_map(|name| CollectionKey::parse_filename(name).map(|key| (key, name.as_str())))
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GenesetError> {
        serde_json::to_vec_pretty(self).map_err(|err| GenesetError::Serialization(err.to_string()))
    }

    /// Accepts both the current object form and a bare list of filenames.
    pub fn from_slice(content: &[u8]) -> Result<Self, GenesetError> {
        let parsed: CatalogFile = serde_json::from_slice(content)
            .map_err(|err| GenesetError::Serialization(err.to_string()))?;
        Ok(match parsed {
            CatalogFile::Flat(files) => Self {
                generated_at: None,
                files,
                uploaded_at: BTreeMap::new(),
            },
            CatalogFile::Detailed(catalog) => catalog,
        })
    }

    pub fn read(path: &Path) -> Result<Self, GenesetError> {
        let content = fs::read(path)
            .map_err(|err| GenesetError::Filesystem(format!("read {}: {err}", path.display())))?;
        Self::from_slice(&content)
    }
}
