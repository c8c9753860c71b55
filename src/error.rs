use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Raised when an aggregate query cannot pick a single value for a collection.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum AggregateError {
    #[error("empty gene sets")]
    Empty,

    #[error("multiple organisms: {}", .0.join(", "))]
    MultipleOrganisms(Vec<String>),

    #[error("no common hierarchy: {}", .0.join("; "))]
    NoCommonHierarchy(Vec<String>),
}

#[derive(Debug, Error, Diagnostic)]
pub enum GenesetError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("invalid taxonomy id: {0}")]
    InvalidTaxId(String),

    #[error("invalid collection specifier: {0}")]
    InvalidCollection(String),

    #[error("collection files must be .gmt or a .zip bundle of .gmt files: {0}")]
    UnsupportedCollectionFile(String),

    #[error("no gene sets registered for {0}")]
    CollectionNotFound(String),

    #[error("organism not supported by this source: {0}")]
    UnknownOrganism(String),

    #[error("malformed GMT line {line}: {message}")]
    GmtParse { line: usize, message: String },

    #[error("missing required option: {0}")]
    MissingOption(String),

    #[error("missing config file kira-gs.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to (de)serialize gene sets: {0}")]
    Serialization(String),

    #[error("server files request failed: {0}")]
    ServerFilesHttp(String),

    #[error("server files returned status {status}: {message}")]
    ServerFilesStatus { status: u16, message: String },

    #[error("uploading to server files requires a username and KIRA_GS_PASSWORD")]
    MissingCredentials,

    #[error("KEGG request failed: {0}")]
    KeggHttp(String),

    #[error("KEGG returned status {status}: {message}")]
    KeggStatus { status: u16, message: String },

    #[error("Gene Ontology request failed: {0}")]
    GoHttp(String),

    #[error("Gene Ontology returned status {status}: {message}")]
    GoStatus { status: u16, message: String },
}
