use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_genesets::app::{App, BuildSource};
use kira_genesets::config::{ConfigLoader, ResolvedConfig};
use kira_genesets::domain::{CollectionKey, TaxId};
use kira_genesets::error::GenesetError;
use kira_genesets::output::{JsonOutput, OutputMode, TextOutput};
use kira_genesets::providers::go::{GoClient, GoHttpClient};
use kira_genesets::providers::kegg::{KeggClient, KeggHttpClient};
use kira_genesets::registry::{CollectionSpec, Destination};
use kira_genesets::serverfiles::{Credentials, ServerFilesHttpClient};
use kira_genesets::store::Store;
use kira_genesets::taxonomy;

#[derive(Parser)]
#[command(name = "kira-gs")]
#[command(about = "Gene set registry for KEGG, GO, OMIM and GMT collections")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Store root (defaults to ~/.cache/kira-genesets).
    #[arg(long, global = true)]
    root: Option<Utf8PathBuf>,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List registered collections")]
    List(ListArgs),
    #[command(about = "Show the gene sets of a collection, e.g. GO/biological_process@9606")]
    Show(ShowArgs),
    #[command(about = "Register a .gmt file or a .zip bundle of .gmt files")]
    Register(RegisterArgs),
    #[command(about = "Build collections from an annotation source")]
    Build(BuildArgs),
    #[command(about = "Build KEGG and GO collections and upload them to the server")]
    Publish(PublishArgs),
    #[command(about = "Rebuild the remote catalog")]
    Index,
    #[command(about = "Merge collections and files into one set of gene sets")]
    Collect(CollectArgs),
}

#[derive(Args)]
struct ListArgs {
    /// Only the local store; never contacts the server.
    #[arg(long)]
    local: bool,

    /// Drop mirrored collections that were replaced on the server.
    #[arg(long)]
    refresh: bool,
}

#[derive(Args)]
struct ShowArgs {
    key: String,

    #[arg(long)]
    local: bool,
}

#[derive(Args)]
struct RegisterArgs {
    file: Utf8PathBuf,

    #[arg(long)]
    organism: Option<String>,

    /// Upload to the server instead of the local store.
    #[arg(long)]
    server: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    Kegg,
    Go,
    Omim,
}

#[derive(Args)]
struct BuildArgs {
    source: SourceKind,

    #[arg(long)]
    organism: Option<String>,

    /// Local morbidmap.txt for the OMIM source.
    #[arg(long)]
    morbidmap: Option<Utf8PathBuf>,

    #[arg(long)]
    server: bool,
}

#[derive(Args)]
struct PublishArgs {
    /// Taxonomy ids; defaults to the config organisms, then the essential ones.
    #[arg(long = "organism")]
    organisms: Vec<String>,

    /// Every organism in the built-in taxonomy table.
    #[arg(long, conflicts_with = "organisms")]
    all: bool,
}

#[derive(Args)]
struct CollectArgs {
    /// Collection keys or .gmt/.zip files; defaults to the config collections.
    specs: Vec<String>,

    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<GenesetError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GenesetError) -> u8 {
    match error {
        GenesetError::CollectionNotFound(_) => 2,
        GenesetError::MissingConfig | GenesetError::MissingOption(_) => 2,
        GenesetError::Aggregate(_) => 2,
        GenesetError::ServerFilesHttp(_)
        | GenesetError::ServerFilesStatus { .. }
        | GenesetError::MissingCredentials
        | GenesetError::KeggHttp(_)
        | GenesetError::KeggStatus { .. }
        | GenesetError::GoHttp(_)
        | GenesetError::GoStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let requires_config = matches!(&cli.command, Commands::Collect(args) if args.specs.is_empty());
    let config = ConfigLoader::resolve(cli.config.as_deref(), requires_config)?;
    let store = match cli.root.clone().or_else(|| config.store_root.clone()) {
        Some(root) => Store::new_with_root(root),
        None => Store::new()?,
    };

    match cli.command {
        Commands::List(args) => {
            let app = build_app(store, &config, NopKegg, NopGo)?;
            match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.list(args.local, args.refresh, &JsonOutput)?;
                    JsonOutput::print_list(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.list(args.local, args.refresh, &TextOutput)?;
                    TextOutput::print_list(&result).into_diagnostic()
                }
            }
        }
        Commands::Show(args) => {
            let key = args.key.parse::<CollectionKey>()?;
            let app = build_app(store, &config, NopKegg, NopGo)?;
            match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.show(&key, args.local, &JsonOutput)?;
                    JsonOutput::print_show(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.show(&key, args.local, &TextOutput)?;
                    TextOutput::print_show(&result).into_diagnostic()
                }
            }
        }
        Commands::Register(args) => {
            let organism = args.organism.as_deref().map(str::parse::<TaxId>).transpose()?;
            let destination = destination(args.server);
            let app = build_app(store, &config, NopKegg, NopGo)?;
            match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.register_gmt(&args.file, organism, destination, &JsonOutput)?;
                    JsonOutput::print_register(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.register_gmt(&args.file, organism, destination, &TextOutput)?;
                    TextOutput::print_register(&result).into_diagnostic()
                }
            }
        }
        Commands::Build(args) => {
            let source = build_source(&args)?;
            let destination = destination(args.server);
            let app = build_app(store, &config, KeggHttpClient::new()?, GoHttpClient::new()?)?;
            match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.build(source, destination, &JsonOutput)?;
                    JsonOutput::print_register(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.build(source, destination, &TextOutput)?;
                    TextOutput::print_register(&result).into_diagnostic()
                }
            }
        }
        Commands::Publish(args) => {
            let organisms = if args.all {
                taxonomy::common_taxids()
            } else if !args.organisms.is_empty() {
                args.organisms
                    .iter()
                    .map(|value| value.parse::<TaxId>())
                    .collect::<Result<Vec<_>, _>>()?
            } else if !config.organisms.is_empty() {
                config.organisms.clone()
            } else {
                taxonomy::essential_taxids()
            };
            let app = build_app(store, &config, KeggHttpClient::new()?, GoHttpClient::new()?)?;
            match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.publish(&organisms, &JsonOutput)?;
                    JsonOutput::print_publish(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.publish(&organisms, &TextOutput)?;
                    TextOutput::print_publish(&result).into_diagnostic()
                }
            }
        }
        Commands::Index => {
            let app = build_app(store, &config, NopKegg, NopGo)?;
            match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.index(&JsonOutput)?;
                    JsonOutput::print_index(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.index(&TextOutput)?;
                    TextOutput::print_index(&result).into_diagnostic()
                }
            }
        }
        Commands::Collect(args) => {
            let specs = if args.specs.is_empty() {
                config.collections.clone()
            } else {
                args.specs
                    .iter()
                    .map(|value| value.parse::<CollectionSpec>())
                    .collect::<Result<Vec<_>, _>>()?
            };
            let app = build_app(store, &config, NopKegg, NopGo)?;
            let output = args.output.as_deref();
            match output_mode {
                OutputMode::NonInteractive => {
                    let result = app.collect(specs, output, &JsonOutput)?;
                    JsonOutput::print_collect(&result).into_diagnostic()
                }
                OutputMode::Interactive => {
                    let result = app.collect(specs, output, &TextOutput)?;
                    TextOutput::print_collect(&result).into_diagnostic()
                }
            }
        }
    }
}

fn build_app<K: KeggClient + Clone, G: GoClient + Clone>(
    store: Store,
    config: &ResolvedConfig,
    kegg: K,
    go: G,
) -> Result<App<ServerFilesHttpClient, K, G>, GenesetError> {
    let credentials = Credentials::from_env(config.username.as_deref());
    let remote = ServerFilesHttpClient::new(&config.server_url, credentials)?;
    Ok(App::new(store, remote, kegg, go))
}

fn destination(server: bool) -> Destination {
    if server {
        Destination::Server
    } else {
        Destination::Local
    }
}

fn build_source(args: &BuildArgs) -> Result<BuildSource, GenesetError> {
    let organism = || -> Result<TaxId, GenesetError> {
        args.organism
            .as_deref()
            .ok_or_else(|| GenesetError::MissingOption("--organism".to_string()))?
            .parse()
    };
    match args.source {
        SourceKind::Kegg => Ok(BuildSource::Kegg(organism()?)),
        SourceKind::Go => Ok(BuildSource::Go(organism()?)),
        SourceKind::Omim => {
            let morbidmap = args
                .morbidmap
                .clone()
                .ok_or_else(|| GenesetError::MissingOption("--morbidmap".to_string()))?;
            Ok(BuildSource::Omim(morbidmap))
        }
    }
}

#[derive(Clone, Copy)]
struct NopKegg;

#[derive(Clone, Copy)]
struct NopGo;

impl KeggClient for NopKegg {
    fn list_pathways(&self, _org: &str) -> Result<String, GenesetError> {
        Err(GenesetError::KeggHttp("KEGG client not configured".to_string()))
    }

    fn link_pathway_genes(&self, _org: &str) -> Result<String, GenesetError> {
        Err(GenesetError::KeggHttp("KEGG client not configured".to_string()))
    }

    fn list_genes(&self, _org: &str) -> Result<String, GenesetError> {
        Err(GenesetError::KeggHttp("KEGG client not configured".to_string()))
    }
}

impl GoClient for NopGo {
    fn download_ontology(&self) -> Result<String, GenesetError> {
        Err(GenesetError::GoHttp("GO client not configured".to_string()))
    }

    fn download_annotations(&self, _gaf_file: &str) -> Result<String, GenesetError> {
        Err(GenesetError::GoHttp("GO client not configured".to_string()))
    }
}
