use std::fs;
use std::io::{Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::domain::CollectionKey;
use crate::error::GenesetError;
use crate::geneset::GeneSets;

const COLLECTION_SCHEMA_VERSION: u32 = 1;

/// On-disk layout: registered collections under `gene_sets_local/`, the
/// mirror of the remote store under `bigfiles/<domain>/`.
#[derive(Debug, Clone)]
pub struct Store {
    local_root: Utf8PathBuf,
    mirror_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, GenesetError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("kira-genesets"))
                    .ok()
            })
            .ok_or_else(|| {
                GenesetError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Ok(Self::new_with_root(root))
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self::new_with_paths(root.join("gene_sets_local"), root.join("bigfiles"))
    }

    pub fn new_with_paths(local_root: Utf8PathBuf, mirror_root: Utf8PathBuf) -> Self {
        Self {
            local_root,
            mirror_root,
        }
    }

    pub fn local_root(&self) -> &Utf8Path {
        &self.local_root
    }

    pub fn mirror_root(&self) -> &Utf8Path {
        &self.mirror_root
    }

    pub fn local_path(&self, key: &CollectionKey) -> Utf8PathBuf {
        self.local_root.join(key.filename())
    }

    pub fn mirror_dir(&self, domain: &str) -> Utf8PathBuf {
        self.mirror_root.join(domain)
    }

    pub fn mirror_path(&self, domain: &str, filename: &str) -> Utf8PathBuf {
        self.mirror_dir(domain).join(filename)
    }

    pub fn mirror_info_path(&self, domain: &str, filename: &str) -> Utf8PathBuf {
        self.mirror_dir(domain).join(format!("{filename}.info"))
    }

    pub fn ensure_local_root(&self) -> Result<(), GenesetError> {
        fs::create_dir_all(self.local_root.as_std_path())
            .map_err(|err| GenesetError::Filesystem(err.to_string()))
    }

    pub fn ensure_mirror_dir(&self, domain: &str) -> Result<(), GenesetError> {
        fs::create_dir_all(self.mirror_dir(domain).as_std_path())
            .map_err(|err| GenesetError::Filesystem(err.to_string()))
    }

    /// File names directly under the local store.
    pub fn list_local_files(&self) -> Result<Vec<String>, GenesetError> {
        list_file_names(&self.local_root)
    }

    /// File names mirrored for `domain`, without `.info` sidecars.
    pub fn list_mirror_files(&self, domain: &str) -> Result<Vec<String>, GenesetError> {
        Ok(list_file_names(&self.mirror_dir(domain))?
            .into_iter()
            .filter(|name| !name.ends_with(".info"))
            .collect())
    }

    pub fn write_collection(path: &Utf8Path, genesets: &GeneSets) -> Result<(), GenesetError> {
        let content = encode_collection(genesets)?;
        Self::write_bytes_atomic(path, &content)
    }

    pub fn read_collection(path: &Utf8Path) -> Result<GeneSets, GenesetError> {
        let content = fs::read(path.as_std_path())
            .map_err(|err| GenesetError::Filesystem(format!("read {path}: {err}")))?;
        decode_collection(&content)
    }

    pub fn write_info(path: &Utf8Path, info: &MirrorInfo) -> Result<(), GenesetError> {
        let content = serde_json::to_vec_pretty(info)
            .map_err(|err| GenesetError::Serialization(err.to_string()))?;
        Self::write_bytes_atomic(path, &content)
    }

    /// Sidecar of a mirrored file; `None` when it was never written.
    pub fn read_info(path: &Utf8Path) -> Result<Option<MirrorInfo>, GenesetError> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read(path.as_std_path())
            .map_err(|err| GenesetError::Filesystem(format!("read {path}: {err}")))?;
        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|err| GenesetError::Serialization(err.to_string()))
    }

    /// Removes a mirrored file together with its sidecar.
    pub fn remove_mirrored(&self, domain: &str, filename: &str) -> Result<(), GenesetError> {
        for path in [
            self.mirror_path(domain, filename),
            self.mirror_info_path(domain, filename),
        ] {
            if path.as_std_path().exists() {
                fs::remove_file(path.as_std_path())
                    .map_err(|err| GenesetError::Filesystem(format!("remove {path}: {err}")))?;
            }
        }
        Ok(())
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), GenesetError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct CollectionFile {
    schema_version: u32,
    genesets: GeneSets,
}

/// Gzip-compressed JSON, the payload of every `gs_*.json.gz` file.
pub fn encode_collection(genesets: &GeneSets) -> Result<Vec<u8>, GenesetError> {
    let file = CollectionFile {
        schema_version: COLLECTION_SCHEMA_VERSION,
        genesets: genesets.clone(),
    };
    let json =
        serde_json::to_vec(&file).map_err(|err| GenesetError::Serialization(err.to_string()))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|err| GenesetError::Serialization(err.to_string()))?;
    encoder
        .finish()
        .map_err(|err| GenesetError::Serialization(err.to_string()))
}

pub fn decode_collection(content: &[u8]) -> Result<GeneSets, GenesetError> {
    let mut decoder = GzDecoder::new(content);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|err| GenesetError::Serialization(err.to_string()))?;
    let file: CollectionFile =
        serde_json::from_slice(&json).map_err(|err| GenesetError::Serialization(err.to_string()))?;
    if file.schema_version > COLLECTION_SCHEMA_VERSION {
        return Err(GenesetError::Serialization(format!(
            "unsupported collection schema version {}",
            file.schema_version
        )));
    }
    Ok(file.genesets)
}

/// Sidecar written next to every mirrored file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorInfo {
    pub domain: String,
    pub filename: String,
    pub downloaded_at: String,
    /// Catalog stamp of the server copy this file was downloaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
    pub tool: String,
}

impl MirrorInfo {
    pub fn new(domain: &str, filename: &str, uploaded_at: Option<&str>) -> Self {
        Self {
            domain: domain.to_string(),
            filename: filename.to_string(),
            downloaded_at: chrono::Utc::now().to_rfc3339(),
            uploaded_at: uploaded_at.map(str::to_string),
            tool: format!("kira-gs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

fn list_file_names(dir: &Utf8Path) -> Result<Vec<String>, GenesetError> {
    if !dir.as_std_path().exists() {
        return Ok(Vec::new());
    }
    let entries =
        fs::read_dir(dir.as_std_path()).map_err(|err| GenesetError::Filesystem(err.to_string()))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| GenesetError::Filesystem(err.to_string()))?;
        if !entry.path().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SERVER_DOMAIN;
    use crate::geneset::GeneSet;

    #[test]
    fn layout_paths() {
        let store = Store::new_with_root(Utf8PathBuf::from("/tmp/kira-gs"));
        let key: CollectionKey = "KEGG@9606".parse().unwrap();

        let local = store.local_path(&key);
        assert!(local.ends_with("gene_sets_local/gs_KEGG_._9606.json.gz"));

        let mirrored = store.mirror_path(SERVER_DOMAIN, "index.json");
        assert!(mirrored.ends_with("bigfiles/gene_sets/index.json"));
    }

    #[test]
    fn collection_file_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = root.join("gs_KEGG_._9606.json.gz");
        let genesets: GeneSets = [GeneSet::new("hsa00010", ["HK1", "GCK"]).with_name("Glycolysis")]
            .into_iter()
            .collect();

        Store::write_collection(&path, &genesets).unwrap();
        assert_eq!(Store::read_collection(&path).unwrap(), genesets);
        assert!(!path.with_extension("tmp").as_std_path().exists());
    }
}
