use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{CATALOG_FILENAME, Catalog};
use crate::domain::{CollectionKey, SERVER_DOMAIN, is_genesets_file};
use crate::error::GenesetError;
use crate::geneset::GeneSets;
use crate::providers::gmt;
use crate::serverfiles::{
    ServerFiles, download_to_mirror, localpath_download, mirror_is_current,
};
use crate::store::{MirrorInfo, Store, encode_collection};
use crate::taxonomy;

/// A listed collection and whether it is readable without touching the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub key: CollectionKey,
    pub local: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Local,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IndexStatus {
    Updated { files: usize },
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterOutcome {
    pub key: CollectionKey,
    pub filename: String,
    pub destination: String,
    pub genesets: usize,
    pub index: Option<IndexStatus>,
}

/// One input of [`Registry::collections`].
#[derive(Debug, Clone)]
pub enum CollectionSpec {
    GeneSets(GeneSets),
    Stored(CollectionKey),
    File(Utf8PathBuf),
}

impl FromStr for CollectionSpec {
    type Err = GenesetError;

    /// Existing files and `.gmt` / `.zip` names are files, anything else is a
    /// `hierarchy@organism` key.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let lower = trimmed.to_lowercase();
        if lower.ends_with(".gmt") || lower.ends_with(".zip") || Path::new(trimmed).is_file() {
            return Ok(CollectionSpec::File(Utf8PathBuf::from(trimmed)));
        }
        Ok(CollectionSpec::Stored(trimmed.parse()?))
    }
}

pub struct Registry<R: ServerFiles> {
    store: Store,
    remote: R,
}

impl<R: ServerFiles> Registry<R> {
    pub fn new(store: Store, remote: R) -> Self {
        Self { store, remote }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn list_local(&self) -> Result<Vec<Availability>, GenesetError> {
        let files = self.store.list_local_files()?;
        Ok(files
            .iter()
            .filter(|name| is_genesets_file(name))
            .filter_map(|name| CollectionKey::parse_filename(name))
            .map(|key| Availability { key, local: true })
            .collect())
    }

    /// Remote collections according to the catalog, downloaded afresh on
    /// every call.
    pub fn list_serverfiles(&self) -> Result<Vec<Availability>, GenesetError> {
        let catalog = self.fetch_catalog()?;
        Ok(self.tag_server_listing(&catalog))
    }

    /// Remote collections according to a live listing of the server.
    pub fn list_serverfiles_conn(&self) -> Result<Vec<Availability>, GenesetError> {
        let listing = Catalog::from_listing(self.remote.listfiles(SERVER_DOMAIN)?);
        Ok(self.tag_server_listing(&listing))
    }

    /// Current catalog from the server, mirrored for offline inspection.
    pub fn fetch_catalog(&self) -> Result<Catalog, GenesetError> {
        let path = download_to_mirror(
            &self.remote,
            &self.store,
            SERVER_DOMAIN,
            CATALOG_FILENAME,
            None,
        )?;
        Catalog::read(path.as_std_path())
    }

    /// A remote file counts as local only when its mirrored copy is current.
    fn tag_server_listing(&self, catalog: &Catalog) -> Vec<Availability> {
        catalog
            .keys()
            .into_iter()
            .map(|(key, filename)| {
                let stamp = catalog.stamp(filename);
                Availability {
                    local: mirror_is_current(&self.store, SERVER_DOMAIN, filename, stamp),
                    key,
                }
            })
            .collect()
    }

    /// Fetches the catalog and drops every mirrored collection it marks as
    /// replaced on the server. Returns the number of dropped files.
    pub fn refresh_catalog(&self) -> Result<usize, GenesetError> {
        let catalog = self.fetch_catalog()?;
        let mut dropped = 0;
        for filename in self.store.list_mirror_files(SERVER_DOMAIN)? {
            if !is_genesets_file(&filename) {
                continue;
            }
            let stamp = catalog.stamp(&filename);
            if !mirror_is_current(&self.store, SERVER_DOMAIN, &filename, stamp) {
                debug!(%filename, "dropping outdated mirrored collection");
                self.store.remove_mirrored(SERVER_DOMAIN, &filename)?;
                dropped += 1;
            }
        }
        info!(files = catalog.files.len(), dropped, "refreshed gene set catalog");
        Ok(dropped)
    }

    /// Local and remote listings merged per key. A key is local only when
    /// every observation of it is local.
    pub fn list_all(&self) -> Result<Vec<Availability>, GenesetError> {
        let mut observations = self.list_local()?;
        observations.extend(self.list_serverfiles()?);
        Ok(merge_availability(observations))
    }

    pub fn load_local(&self, requested: &CollectionKey) -> Result<GeneSets, GenesetError> {
        self.load_listed_local(&self.list_local()?, requested)
    }

    /// Loads the matching entries of an earlier local listing, skipping
    /// records removed since it was taken.
    pub fn load_listed_local(
        &self,
        listed: &[Availability],
        requested: &CollectionKey,
    ) -> Result<GeneSets, GenesetError> {
        let keys = listed.iter().map(|entry| entry.key.clone()).collect::<Vec<_>>();
        let mut out = GeneSets::new();
        for key in matching_keys(&keys, requested) {
            let path = self.store.local_path(key);
            if !path.as_std_path().exists() {
                warn!(%key, "registered collection disappeared before loading");
                continue;
            }
            debug!(%key, %path, "loading local collection");
            out.update(Store::read_collection(&path)?);
        }
        Ok(out)
    }

    /// Matching remote collections, re-downloading mirrored copies the
    /// catalog marks as replaced.
    pub fn load_serverfiles(&self, requested: &CollectionKey) -> Result<GeneSets, GenesetError> {
        let catalog = self.fetch_catalog()?;
        let entries = catalog.keys();
        let keys = entries.iter().map(|(key, _)| key.clone()).collect::<Vec<_>>();
        let mut out = GeneSets::new();
        for key in matching_keys(&keys, requested) {
            let filename = key.filename();
            let path = localpath_download(
                &self.remote,
                &self.store,
                SERVER_DOMAIN,
                &filename,
                catalog.stamp(&filename),
            )?;
            debug!(%key, %path, "loading mirrored collection");
            out.update(Store::read_collection(&path)?);
        }
        Ok(out)
    }

    /// Every collection at or below `requested.hierarchy` for the organism,
    /// local copies first, then the server.
    pub fn load(&self, requested: &CollectionKey) -> Result<GeneSets, GenesetError> {
        let mut out = self.load_local(requested)?;
        out.update(self.load_serverfiles(requested)?);
        Ok(out)
    }

    pub fn register_local(&self, genesets: &GeneSets) -> Result<RegisterOutcome, GenesetError> {
        let key = derive_key(genesets)?;
        self.store.ensure_local_root()?;
        let path = self.store.local_path(&key);
        Store::write_collection(&path, genesets)?;
        info!(%key, %path, genesets = genesets.len(), "registered collection locally");
        Ok(RegisterOutcome {
            filename: key.filename(),
            key,
            destination: "local".to_string(),
            genesets: genesets.len(),
            index: None,
        })
    }

    /// Uploads the collection, then rebuilds the remote catalog. The catalog
    /// is only touched after the data file is stored; its failure is reported
    /// in the outcome instead of failing the registration.
    pub fn register_serverfiles(
        &self,
        genesets: &GeneSets,
    ) -> Result<RegisterOutcome, GenesetError> {
        let key = derive_key(genesets)?;
        let filename = key.filename();
        let temp = write_temp(&encode_collection(genesets)?)?;

        let hierarchy = key.hierarchy.components().join(", ");
        let taxname = key.organism.as_ref().map(taxonomy::name);
        let title = match &taxname {
            Some(taxname) => format!("Gene sets: {hierarchy} ({taxname})"),
            None => format!("Gene sets: {hierarchy}"),
        };
        let mut tags = key.hierarchy.components().to_vec();
        tags.push("gene sets".to_string());
        if let Some(taxname) = taxname {
            tags.push(taxname);
        }
        if key.organism.as_ref().is_some_and(taxonomy::is_essential) {
            tags.push("essential".to_string());
        }

        info!(%key, %filename, "uploading collection");
        self.remote
            .upload(SERVER_DOMAIN, &filename, temp.path(), &title, &tags)?;
        self.remote.unprotect(SERVER_DOMAIN, &filename)?;
        drop(temp);
        self.store.remove_mirrored(SERVER_DOMAIN, &filename)?;

        let index = match self.rebuild_catalog(Some(&filename)) {
            Ok(catalog) => IndexStatus::Updated {
                files: catalog.files.len(),
            },
            Err(err) => {
                warn!(%key, error = %err, "collection uploaded but catalog rebuild failed");
                IndexStatus::Failed {
                    message: err.to_string(),
                }
            }
        };

        Ok(RegisterOutcome {
            key,
            filename,
            destination: "server".to_string(),
            genesets: genesets.len(),
            index: Some(index),
        })
    }

    /// Rebuilds the catalog from a full remote listing and uploads it.
    pub fn update_server_list(&self) -> Result<Catalog, GenesetError> {
        self.rebuild_catalog(None)
    }

    /// Stamps carry over from the current server catalog; `uploaded` gets a
    /// fresh one. The uploaded catalog replaces the mirrored copy.
    fn rebuild_catalog(&self, uploaded: Option<&str>) -> Result<Catalog, GenesetError> {
        let mut catalog = Catalog::from_listing(self.remote.listfiles(SERVER_DOMAIN)?);
        match self.fetch_catalog() {
            Ok(previous) => catalog = catalog.carry_stamps(&previous),
            Err(err) => debug!(error = %err, "no previous catalog, starting without stamps"),
        }
        if let Some(filename) = uploaded {
            catalog.stamp_upload(filename);
        }

        let content = catalog.to_bytes()?;
        let temp = write_temp(&content)?;
        let tags = ["gene sets", "index", "essential"]
            .iter()
            .map(|tag| tag.to_string())
            .collect::<Vec<_>>();
        self.remote.upload(
            SERVER_DOMAIN,
            CATALOG_FILENAME,
            temp.path(),
            "Gene sets: index",
            &tags,
        )?;
        self.remote.unprotect(SERVER_DOMAIN, CATALOG_FILENAME)?;
        Store::write_bytes_atomic(
            &self.store.mirror_path(SERVER_DOMAIN, CATALOG_FILENAME),
            &content,
        )?;
        Store::write_info(
            &self.store.mirror_info_path(SERVER_DOMAIN, CATALOG_FILENAME),
            &MirrorInfo::new(SERVER_DOMAIN, CATALOG_FILENAME, None),
        )?;
        info!(files = catalog.files.len(), "published gene set catalog");
        Ok(catalog)
    }

    pub fn register(
        &self,
        genesets: &GeneSets,
        destination: Destination,
    ) -> Result<RegisterOutcome, GenesetError> {
        match destination {
            Destination::Local => self.register_local(genesets),
            Destination::Server => self.register_serverfiles(genesets),
        }
    }

    pub fn collections(&self, specs: Vec<CollectionSpec>) -> Result<GeneSets, GenesetError> {
        let mut result = GeneSets::new();
        for spec in specs {
            match spec {
                CollectionSpec::GeneSets(genesets) => result.update(genesets),
                CollectionSpec::Stored(key) => result.update(self.load(&key)?),
                CollectionSpec::File(path) => result.update(gmt::load_collection_file(&path, None)?),
            }
        }
        Ok(result)
    }
}

/// Conservative merge: the first observation of a key starts at `true`, every
/// observation is ANDed in.
pub fn merge_availability(observations: Vec<Availability>) -> Vec<Availability> {
    let mut merged = BTreeMap::<CollectionKey, bool>::new();
    for observation in observations {
        let flag = merged.entry(observation.key).or_insert(true);
        *flag = *flag && observation.local;
    }
    merged
        .into_iter()
        .map(|(key, local)| Availability { key, local })
        .collect()
}

/// Stored keys for the same organism whose hierarchy starts with the requested one.
pub fn matching_keys<'a>(
    keys: &'a [CollectionKey],
    requested: &CollectionKey,
) -> Vec<&'a CollectionKey> {
    keys.iter()
        .filter(|key| {
            key.organism == requested.organism && key.hierarchy.starts_with(&requested.hierarchy)
        })
        .collect()
}

fn derive_key(genesets: &GeneSets) -> Result<CollectionKey, GenesetError> {
    let organism = genesets.common_org()?;
    let hierarchy = genesets.common_hierarchy()?;
    Ok(CollectionKey::new(hierarchy, organism))
}

fn write_temp(content: &[u8]) -> Result<tempfile::NamedTempFile, GenesetError> {
    let mut temp = tempfile::Builder::new()
        .prefix("kira-gs-upload")
        .tempfile()
        .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
    temp.flush()
        .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
    Ok(temp)
}
