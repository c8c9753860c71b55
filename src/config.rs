use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{CollectionKey, Hierarchy, TaxId};
use crate::error::GenesetError;
use crate::registry::CollectionSpec;
use crate::serverfiles::DEFAULT_SERVER_URL;

pub const CONFIG_FILENAME: &str = "kira-gs.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub store_root: Option<String>,
    #[serde(default)]
    pub organisms: Vec<String>,
    #[serde(default)]
    pub collections: Vec<CollectionEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CollectionEntry {
    Shorthand(String),
    Stored(StoredEntryObject),
    Gmt(GmtEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StoredEntryObject {
    pub hierarchy: Vec<String>,
    #[serde(default)]
    pub organism: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GmtEntryObject {
    pub gmt: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub server_url: String,
    pub username: Option<String>,
    pub store_root: Option<Utf8PathBuf>,
    pub organisms: Vec<TaxId>,
    pub collections: Vec<CollectionSpec>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            server_url: DEFAULT_SERVER_URL.to_string(),
            username: None,
            store_root: None,
            organisms: Vec::new(),
            collections: Vec::new(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `kira-gs.json` from the working directory. Without an
    /// explicit path a missing file yields defaults unless `required` is set.
    pub fn resolve(path: Option<&str>, required: bool) -> Result<ResolvedConfig, GenesetError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILENAME),
        };

        if path.is_none() && !config_path.exists() {
            if required {
                return Err(GenesetError::MissingConfig);
            }
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| GenesetError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| GenesetError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, GenesetError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let server = config.server.unwrap_or_default();

        let organisms = config
            .organisms
            .iter()
            .map(|value| value.parse())
            .collect::<Result<Vec<TaxId>, GenesetError>>()?;

        let collections = config
            .collections
            .into_iter()
            .map(|entry| match entry {
                CollectionEntry::Shorthand(value) => value.parse(),
                CollectionEntry::Stored(obj) => {
                    let organism = obj.organism.as_deref().map(str::parse::<TaxId>).transpose()?;
                    Ok(CollectionSpec::Stored(CollectionKey::new(
                        Hierarchy::new(obj.hierarchy)?,
                        organism,
                    )))
                }
                CollectionEntry::Gmt(obj) => Ok(CollectionSpec::File(Utf8PathBuf::from(obj.gmt))),
            })
            .collect::<Result<Vec<_>, GenesetError>>()?;

        Ok(ResolvedConfig {
            schema_version,
            server_url: server
                .url
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            username: server.username,
            store_root: config.store_root.map(Utf8PathBuf::from),
            organisms,
            collections,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_config_shorthand() {
        let config = Config {
            collections: vec![
                CollectionEntry::Shorthand("KEGG@9606".to_string()),
                CollectionEntry::Shorthand("c2.cp.gmt".to_string()),
            ],
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.server_url, DEFAULT_SERVER_URL);
        assert_matches!(&resolved.collections[0], CollectionSpec::Stored(key) if key.to_string() == "KEGG@9606");
        assert_matches!(&resolved.collections[1], CollectionSpec::File(_));
    }

    #[test]
    fn detailed_entries_from_json() {
        let config: Config = serde_json::from_str(
            r#"{
                "server": {"url": "http://localhost:9999", "username": "orange"},
                "organisms": ["9606", "10090"],
                "collections": [
                    {"hierarchy": ["GO", "biological_process"], "organism": "9606"},
                    {"gmt": "sets/custom.gmt"}
                ]
            }"#,
        )
        .unwrap();

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.server_url, "http://localhost:9999");
        assert_eq!(resolved.username.as_deref(), Some("orange"));
        assert_eq!(resolved.organisms.len(), 2);
        assert_matches!(&resolved.collections[0], CollectionSpec::Stored(key) if key.hierarchy.len() == 2);
        assert_matches!(&resolved.collections[1], CollectionSpec::File(path) if path.as_str() == "sets/custom.gmt");
    }

    #[test]
    fn invalid_organism_is_rejected() {
        let config = Config {
            organisms: vec!["human".to_string()],
            ..Config::default()
        };
        assert_matches!(
            ConfigLoader::resolve_config(config),
            Err(GenesetError::InvalidTaxId(_))
        );
    }
}
