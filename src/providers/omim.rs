use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::Utf8PathBuf;
use regex::Regex;

use crate::domain::{Hierarchy, TaxId};
use crate::error::GenesetError;
use crate::geneset::{GeneSet, GeneSets};
use crate::providers::GeneSetSource;

const OMIM_ENTRY_LINK: &str = "https://omim.org/entry";
const HUMAN_TAXID: &str = "9606";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disease {
    pub name: String,
    pub mim: Option<String>,
    pub genes: BTreeSet<String>,
}

/// Diseases from a local `morbidmap.txt` (OMIM downloads need a license key).
#[derive(Debug, Clone)]
pub struct OmimSource {
    pub morbidmap: Utf8PathBuf,
}

impl GeneSetSource for OmimSource {
    fn name(&self) -> String {
        "omim".to_string()
    }

    fn produce(&self) -> Result<GeneSets, GenesetError> {
        let text = fs::read_to_string(self.morbidmap.as_std_path()).map_err(|err| {
            GenesetError::Filesystem(format!("read {}: {err}", self.morbidmap))
        })?;
        let organism: TaxId = HUMAN_TAXID.parse()?;
        let hierarchy = Hierarchy::new(["OMIM"])?;

        let mut genesets = GeneSets::new();
        for disease in parse_morbidmap(&text) {
            let id = disease.mim.clone().unwrap_or_else(|| disease.name.clone());
            let mut geneset = GeneSet::new(id, disease.genes)
                .with_name(disease.name)
                .with_organism(Some(organism.clone()))
                .with_hierarchy(hierarchy.clone());
            if let Some(mim) = disease.mim {
                geneset = geneset.with_link(format!("{OMIM_ENTRY_LINK}/{mim}"));
            }
            genesets.insert(geneset);
        }
        Ok(genesets)
    }
}

/// Groups morbidmap rows by disease; accepts tab- and pipe-separated files.
pub fn parse_morbidmap(text: &str) -> Vec<Disease> {
    let disease_re = Regex::new(r"^(?P<name>.*?),?\s*(?P<mim>\d{6})?\s*\((?P<mapping>\d)\)\s*$")
        .expect("valid disease regex");

    let mut diseases = BTreeMap::<(String, Option<String>), BTreeSet<String>>::new();
    for line in text.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let separator = if line.contains('\t') { '\t' } else { '|' };
        let columns = line.split(separator).collect::<Vec<_>>();
        if columns.len() < 2 {
            continue;
        }
        let Some(captures) = disease_re.captures(columns[0].trim()) else {
            continue;
        };
        let name = captures["name"]
            .trim()
            .trim_start_matches(['{', '[', '?'])
            .trim_end_matches(['}', ']'])
            .to_string();
        let mim = captures.name("mim").map(|m| m.as_str().to_string());
        let genes = columns[1]
            .split(',')
            .map(str::trim)
            .filter(|gene| !gene.is_empty())
            .map(str::to_string);
        diseases.entry((name, mim)).or_default().extend(genes);
    }

    diseases
        .into_iter()
        .map(|((name, mim), genes)| Disease { name, mim, genes })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_rows_by_disease() {
        let text = "# Phenotype\tGene Symbols\tMIM Number\tCyto Location\n\
                    Alzheimer disease, 104300 (3)\tAPP, AAA, CVAP\t104760\t21q21.3\n\
                    Alzheimer disease, 104300 (3)\tPSEN1, AD3\t104311\t14q24.2\n\
                    {Deafness, autosomal dominant 12} (2)\tDFNA12\t601842\t11q\n";
        let diseases = parse_morbidmap(text);
        assert_eq!(diseases.len(), 2);

        let alzheimer = diseases.iter().find(|d| d.name == "Alzheimer disease").unwrap();
        assert_eq!(alzheimer.mim.as_deref(), Some("104300"));
        assert_eq!(alzheimer.genes.len(), 5);

        let deafness = diseases
            .iter()
            .find(|d| d.name == "Deafness, autosomal dominant 12")
            .unwrap();
        assert_eq!(deafness.mim, None);
    }

    #[test]
    fn accepts_pipe_separated_rows() {
        let diseases = parse_morbidmap("Cystic fibrosis, 219700 (3)|CFTR, ABCC7|602421|7q31.2\n");
        assert_eq!(diseases[0].mim.as_deref(), Some("219700"));
        assert!(diseases[0].genes.contains("CFTR"));
    }
}
