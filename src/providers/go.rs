use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::{Hierarchy, TaxId};
use crate::error::GenesetError;
use crate::geneset::{GeneSet, GeneSets};
use crate::providers::GeneSetSource;
use crate::taxonomy;

const GO_ONTOLOGY_URL: &str = "http://purl.obolibrary.org/obo/go/go-basic.obo";
const GO_ANNOTATIONS_BASE: &str = "https://current.geneontology.org/annotations";
const AMIGO_TERM_LINK: &str = "http://amigo.geneontology.org/amigo/term";

pub trait GoClient: Send + Sync {
    fn download_ontology(&self) -> Result<String, GenesetError>;
    /// Decompressed GAF text of one annotation file, e.g. `goa_human.gaf.gz`.
    fn download_annotations(&self, gaf_file: &str) -> Result<String, GenesetError>;
}

#[derive(Clone)]
pub struct GoHttpClient {
    client: Client,
}

impl GoHttpClient {
    pub fn new() -> Result<Self, GenesetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-gs/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GenesetError::GoHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| GenesetError::GoHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, GenesetError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| GenesetError::GoHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "Gene Ontology request failed".to_string());
            return Err(GenesetError::GoStatus { status, message });
        }
        let bytes = response
            .bytes()
            .map_err(|err| GenesetError::GoHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl GoClient for GoHttpClient {
    fn download_ontology(&self) -> Result<String, GenesetError> {
        let bytes = self.fetch_bytes(GO_ONTOLOGY_URL)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn download_annotations(&self, gaf_file: &str) -> Result<String, GenesetError> {
        let bytes = self.fetch_bytes(&format!("{GO_ANNOTATIONS_BASE}/{gaf_file}"))?;
        let mut decoder = GzDecoder::new(bytes.as_slice());
        let mut text = String::new();
        decoder
            .read_to_string(&mut text)
            .map_err(|err| GenesetError::GoHttp(err.to_string()))?;
        Ok(text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoTerm {
    pub id: String,
    pub name: String,
    pub namespace: String,
    /// `is_a` and `part_of` targets.
    pub parents: Vec<String>,
    pub obsolete: bool,
}

/// `[Term]` stanzas of an OBO file.
pub fn parse_obo(text: &str) -> Vec<GoTerm> {
    let mut terms = Vec::new();
    let mut current: Option<GoTerm> = None;
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            if let Some(term) = current.take() {
                terms.push(term);
            }
            if line == "[Term]" {
                current = Some(GoTerm::default());
            }
            continue;
        }
        let Some(term) = current.as_mut() else {
            continue;
        };
        let Some((tag, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.split(" ! ").next().unwrap_or("").trim();
        match tag {
            "id" => term.id = value.to_string(),
            "name" => term.name = value.to_string(),
            "namespace" => term.namespace = value.to_string(),
            "is_a" => term.parents.push(value.to_string()),
            "relationship" => {
                if let Some(target) = value.strip_prefix("part_of ") {
                    term.parents.push(target.trim().to_string());
                }
            }
            "is_obsolete" => term.obsolete = value == "true",
            _ => {}
        }
    }
    if let Some(term) = current {
        terms.push(term);
    }
    terms.retain(|term| !term.id.is_empty());
    terms
}

/// `(symbol, GO id)` pairs from GAF text; negated annotations are dropped.
pub fn parse_gaf(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter(|line| !line.starts_with('!'))
        .filter_map(|line| {
            let columns = line.split('\t').collect::<Vec<_>>();
            if columns.len() < 5 {
                return None;
            }
            let symbol = columns[2].trim();
            let qualifier = columns[3];
            let term = columns[4].trim();
            if symbol.is_empty() || term.is_empty() || qualifier.contains("NOT") {
                return None;
            }
            Some((symbol.to_string(), term.to_string()))
        })
        .collect()
}

/// Genes per term, each annotation propagated to every ancestor.
pub fn propagate_annotations(
    terms: &[GoTerm],
    annotations: &[(String, String)],
) -> BTreeMap<String, BTreeSet<String>> {
    let parents = terms
        .iter()
        .map(|term| (term.id.as_str(), term.parents.as_slice()))
        .collect::<HashMap<_, _>>();
    let mut ancestors_cache = HashMap::<&str, BTreeSet<String>>::new();
    let mut genes = BTreeMap::<String, BTreeSet<String>>::new();

    for (symbol, term) in annotations {
        let ancestors = ancestors_cache
            .entry(term.as_str())
            .or_insert_with(|| ancestors_of(term, &parents));
        for ancestor in ancestors.iter() {
            genes
                .entry(ancestor.clone())
                .or_default()
                .insert(symbol.clone());
        }
    }
    genes
}

fn ancestors_of(term: &str, parents: &HashMap<&str, &[String]>) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![term.to_string()];
    while let Some(current) = stack.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }
        if let Some(next) = parents.get(current.as_str()) {
            stack.extend(next.iter().cloned());
        }
    }
    seen
}

/// One gene set per annotated GO term, hierarchy `GO/<namespace>`.
pub struct GoSource<C: GoClient> {
    client: C,
    organism: TaxId,
}

impl<C: GoClient> GoSource<C> {
    pub fn new(client: C, organism: TaxId) -> Self {
        Self { client, organism }
    }
}

impl<C: GoClient> GeneSetSource for GoSource<C> {
    fn name(&self) -> String {
        format!("go:{}", self.organism)
    }

    fn produce(&self) -> Result<GeneSets, GenesetError> {
        let gaf_file = taxonomy::lookup(&self.organism)
            .and_then(|organism| organism.gaf_file)
            .ok_or_else(|| GenesetError::UnknownOrganism(self.organism.to_string()))?;
        let terms = parse_obo(&self.client.download_ontology()?);
        let annotations = parse_gaf(&self.client.download_annotations(gaf_file)?);
        let mut genes = propagate_annotations(&terms, &annotations);

        let mut genesets = GeneSets::new();
        for term in terms.iter().filter(|term| !term.obsolete) {
            let Some(term_genes) = genes.remove(&term.id) else {
                continue;
            };
            if term.namespace.is_empty() {
                continue;
            }
            let geneset = GeneSet::new(term.id.clone(), term_genes)
                .with_name(term.name.clone())
                .with_link(format!("{AMIGO_TERM_LINK}/{}", term.id))
                .with_organism(Some(self.organism.clone()))
                .with_hierarchy(Hierarchy::new(["GO", term.namespace.as_str()])?);
            genesets.insert(geneset);
        }
        Ok(genesets)
    }
}
