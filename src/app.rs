use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::warn;

use crate::catalog::Catalog;
use crate::domain::{CollectionKey, TaxId};
use crate::error::GenesetError;
use crate::geneset::GeneSets;
use crate::providers::GeneSetSource;
use crate::providers::gmt::{self, GmtSource};
use crate::providers::go::{GoClient, GoSource};
use crate::providers::kegg::{KeggClient, KeggSource};
use crate::providers::omim::OmimSource;
use crate::registry::{Availability, CollectionSpec, Destination, RegisterOutcome, Registry};
use crate::serverfiles::ServerFiles;
use crate::store::Store;
use crate::taxonomy;

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub collections: Vec<ListEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub key: String,
    pub hierarchy: Vec<String>,
    pub organism: Option<String>,
    pub organism_name: Option<String>,
    pub filename: String,
    pub local: bool,
}

impl From<Availability> for ListEntry {
    fn from(value: Availability) -> Self {
        Self {
            key: value.key.to_string(),
            hierarchy: value.key.hierarchy.components().to_vec(),
            organism: value.key.organism.as_ref().map(TaxId::to_string),
            organism_name: value.key.organism.as_ref().map(taxonomy::name),
            filename: value.key.filename(),
            local: value.local,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadResult {
    pub key: String,
    pub count: usize,
    pub genesets: GeneSets,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResult {
    pub source: String,
    pub registered: Vec<RegisterOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishFailure {
    pub source: String,
    pub organism: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    pub registered: Vec<RegisterOutcome>,
    pub failures: Vec<PublishFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexResult {
    pub generated_at: Option<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectResult {
    pub count: usize,
    pub output: Option<String>,
    pub genesets: GeneSets,
}

/// Which adapter `build` runs.
#[derive(Debug, Clone)]
pub enum BuildSource {
    Kegg(TaxId),
    Go(TaxId),
    Omim(Utf8PathBuf),
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn emit(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}

pub struct App<R: ServerFiles, K: KeggClient + Clone, G: GoClient + Clone> {
    registry: Registry<R>,
    kegg: K,
    go: G,
}

impl<R: ServerFiles, K: KeggClient + Clone, G: GoClient + Clone> App<R, K, G> {
    pub fn new(store: Store, remote: R, kegg: K, go: G) -> Self {
        Self {
            registry: Registry::new(store, remote),
            kegg,
            go,
        }
    }

    pub fn registry(&self) -> &Registry<R> {
        &self.registry
    }

    /// Local collections only, or the merged local and remote view.
    pub fn list(
        &self,
        local_only: bool,
        refresh: bool,
        sink: &dyn ProgressSink,
    ) -> Result<ListResult, GenesetError> {
        emit(sink, "phase=Resolve; scanning stores".to_string());
        let entries = if local_only {
            self.registry.list_local()?
        } else {
            if refresh {
                emit(sink, "phase=Fetch; revalidating mirrored collections".to_string());
                let dropped = self.registry.refresh_catalog()?;
                emit(sink, format!("phase=Fetch; dropped {dropped} outdated mirrors"));
            }
            self.registry.list_all()?
        };
        Ok(ListResult {
            collections: entries.into_iter().map(ListEntry::from).collect(),
        })
    }

    pub fn show(
        &self,
        key: &CollectionKey,
        local_only: bool,
        sink: &dyn ProgressSink,
    ) -> Result<LoadResult, GenesetError> {
        emit(sink, format!("phase=Resolve; loading {key}"));
        let genesets = if local_only {
            self.registry.load_local(key)?
        } else {
            self.registry.load(key)?
        };
        if genesets.is_empty() {
            return Err(GenesetError::CollectionNotFound(key.to_string()));
        }
        Ok(LoadResult {
            key: key.to_string(),
            count: genesets.len(),
            genesets,
        })
    }

    pub fn register_gmt(
        &self,
        path: &Utf8Path,
        organism: Option<TaxId>,
        destination: Destination,
        sink: &dyn ProgressSink,
    ) -> Result<RegisterResult, GenesetError> {
        let source = GmtSource {
            path: path.to_path_buf(),
            organism,
        };
        self.register_source(&source, destination, sink)
    }

    pub fn build(
        &self,
        source: BuildSource,
        destination: Destination,
        sink: &dyn ProgressSink,
    ) -> Result<RegisterResult, GenesetError> {
        match source {
            BuildSource::Kegg(organism) => self.register_source(
                &KeggSource::new(self.kegg.clone(), organism),
                destination,
                sink,
            ),
            BuildSource::Go(organism) => self.register_source(
                &GoSource::new(self.go.clone(), organism),
                destination,
                sink,
            ),
            BuildSource::Omim(morbidmap) => {
                self.register_source(&OmimSource { morbidmap }, destination, sink)
            }
        }
    }

    /// KEGG and GO for every organism, uploaded to the server. A failing
    /// source is recorded and the run continues.
    pub fn publish(
        &self,
        organisms: &[TaxId],
        sink: &dyn ProgressSink,
    ) -> Result<PublishResult, GenesetError> {
        let mut registered = Vec::new();
        let mut failures = Vec::new();
        for organism in organisms {
            let kegg = KeggSource::new(self.kegg.clone(), organism.clone());
            let go = GoSource::new(self.go.clone(), organism.clone());
            let sources: [&dyn GeneSetSource; 2] = [&kegg, &go];
            for source in sources {
                match self.register_source(source, Destination::Server, sink) {
                    Ok(result) => registered.extend(result.registered),
                    Err(err) => {
                        warn!(source = %source.name(), error = %err, "publishing failed");
                        failures.push(PublishFailure {
                            source: source.name(),
                            organism: organism.to_string(),
                            message: err.to_string(),
                        });
                    }
                }
            }
        }
        Ok(PublishResult {
            registered,
            failures,
        })
    }

    pub fn index(&self, sink: &dyn ProgressSink) -> Result<IndexResult, GenesetError> {
        emit(sink, "phase=Upload; rebuilding remote catalog".to_string());
        let Catalog {
            generated_at,
            files,
            ..
        } = self.registry.update_server_list()?;
        Ok(IndexResult {
            generated_at,
            files,
        })
    }

    /// Merges the inputs and optionally writes them as one GMT file.
    pub fn collect(
        &self,
        specs: Vec<CollectionSpec>,
        output: Option<&Utf8Path>,
        sink: &dyn ProgressSink,
    ) -> Result<CollectResult, GenesetError> {
        emit(sink, format!("phase=Resolve; merging {} inputs", specs.len()));
        let genesets = self.registry.collections(specs)?;
        if let Some(path) = output {
            emit(sink, format!("phase=Store; writing {path}"));
            Store::write_bytes_atomic(path, gmt::write_gmt(&genesets).as_bytes())?;
        }
        Ok(CollectResult {
            count: genesets.len(),
            output: output.map(Utf8Path::to_string),
            genesets,
        })
    }

    fn register_source(
        &self,
        source: &dyn GeneSetSource,
        destination: Destination,
        sink: &dyn ProgressSink,
    ) -> Result<RegisterResult, GenesetError> {
        emit(sink, format!("phase=Fetch; producing {}", source.name()));
        let start = Instant::now();
        let genesets = source.produce()?;
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {} gene sets from {}", genesets.len(), source.name()),
            elapsed: Some(start.elapsed()),
        });

        let mut registered = Vec::new();
        for part in genesets.split_by_hierarchy() {
            emit(sink, format!("phase=Store; registering {} gene sets", part.len()));
            registered.push(self.registry.register(&part, destination)?);
        }
        Ok(RegisterResult {
            source: source.name(),
            registered,
        })
    }
}
