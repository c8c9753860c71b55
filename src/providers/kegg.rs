use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::{Hierarchy, TaxId};
use crate::error::GenesetError;
use crate::geneset::{GeneSet, GeneSets};
use crate::providers::GeneSetSource;
use crate::taxonomy;

const KEGG_REST_BASE: &str = "https://rest.kegg.jp";
const KEGG_PATHWAY_LINK: &str = "https://www.kegg.jp/pathway";

pub trait KeggClient: Send + Sync {
    /// `list/pathway/<org>`: pathway id and title per line.
    fn list_pathways(&self, org: &str) -> Result<String, GenesetError>;
    /// `link/<org>/pathway`: pathway id and gene id per line.
    fn link_pathway_genes(&self, org: &str) -> Result<String, GenesetError>;
    /// `list/<org>`: gene id, symbols and description per line.
    fn list_genes(&self, org: &str) -> Result<String, GenesetError>;
}

#[derive(Clone)]
pub struct KeggHttpClient {
    client: Client,
}

impl KeggHttpClient {
    pub fn new() -> Result<Self, GenesetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-gs/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GenesetError::KeggHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| GenesetError::KeggHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn fetch_text(&self, path: &str) -> Result<String, GenesetError> {
        let response = self
            .client
            .get(format!("{KEGG_REST_BASE}/{path}"))
            .send()
            .map_err(|err| GenesetError::KeggHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "KEGG request failed".to_string());
            return Err(GenesetError::KeggStatus { status, message });
        }
        response
            .text()
            .map_err(|err| GenesetError::KeggHttp(err.to_string()))
    }
}

impl KeggClient for KeggHttpClient {
    fn list_pathways(&self, org: &str) -> Result<String, GenesetError> {
        self.fetch_text(&format!("list/pathway/{org}"))
    }

    fn link_pathway_genes(&self, org: &str) -> Result<String, GenesetError> {
        self.fetch_text(&format!("link/{org}/pathway"))
    }

    fn list_genes(&self, org: &str) -> Result<String, GenesetError> {
        self.fetch_text(&format!("list/{org}"))
    }
}

/// One gene set per KEGG pathway of the organism, hierarchy `KEGG`.
pub struct KeggSource<C: KeggClient> {
    client: C,
    organism: TaxId,
}

impl<C: KeggClient> KeggSource<C> {
    pub fn new(client: C, organism: TaxId) -> Self {
        Self { client, organism }
    }
}

impl<C: KeggClient> GeneSetSource for KeggSource<C> {
    fn name(&self) -> String {
        format!("kegg:{}", self.organism)
    }

    fn produce(&self) -> Result<GeneSets, GenesetError> {
        let org = taxonomy::lookup(&self.organism)
            .and_then(|organism| organism.kegg_code)
            .ok_or_else(|| GenesetError::UnknownOrganism(self.organism.to_string()))?;

        let pathways = parse_pathway_list(&self.client.list_pathways(org)?);
        let links = parse_pathway_links(&self.client.link_pathway_genes(org)?);
        let symbols = parse_gene_symbols(&self.client.list_genes(org)?);
        let hierarchy = Hierarchy::new(["KEGG"])?;

        let mut genesets = GeneSets::new();
        for (id, title) in pathways {
            let Some(gene_ids) = links.get(&id) else {
                continue;
            };
            let genes = gene_ids.iter().map(|gene_id| {
                symbols
                    .get(gene_id)
                    .cloned()
                    .unwrap_or_else(|| strip_db_prefix(gene_id).to_string())
            });
            let geneset = GeneSet::new(id.clone(), genes)
                .with_name(title)
                .with_link(format!("{KEGG_PATHWAY_LINK}/{}", strip_db_prefix(&id)))
                .with_organism(Some(self.organism.clone()))
                .with_hierarchy(hierarchy.clone());
            genesets.insert(geneset);
        }
        Ok(genesets)
    }
}

/// `(path:<id>, title)` pairs; the trailing ` - Organism (common name)` is dropped.
pub fn parse_pathway_list(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(id, title)| {
            let id = id.trim();
            let id = if id.starts_with("path:") {
                id.to_string()
            } else {
                format!("path:{id}")
            };
            (id, strip_organism_suffix(title.trim()).to_string())
        })
        .collect()
}

pub fn parse_pathway_links(text: &str) -> BTreeMap<String, Vec<String>> {
    let mut links = BTreeMap::<String, Vec<String>>::new();
    for (pathway, gene) in text.lines().filter_map(|line| line.split_once('\t')) {
        links
            .entry(pathway.trim().to_string())
            .or_default()
            .push(gene.trim().to_string());
    }
    links
}

/// Maps KEGG gene ids to their first listed symbol.
pub fn parse_gene_symbols(text: &str) -> HashMap<String, String> {
    let mut symbols = HashMap::new();
    for line in text.lines() {
        let mut columns = line.split('\t');
        let Some(id) = columns.next() else {
            continue;
        };
        let Some(annotation) = columns.last() else {
            continue;
        };
        let Some((names, _description)) = annotation.split_once(';') else {
            continue;
        };
        if let Some(symbol) = names.split(',').map(str::trim).find(|name| !name.is_empty()) {
            symbols.insert(id.trim().to_string(), symbol.to_string());
        }
    }
    symbols
}

fn strip_organism_suffix(title: &str) -> &str {
    match title.rsplit_once(" - ") {
        Some((head, tail)) if tail.ends_with(')') => head,
        _ => title,
    }
}

fn strip_db_prefix(id: &str) -> &str {
    id.split_once(':').map(|(_, rest)| rest).unwrap_or(id)
}
