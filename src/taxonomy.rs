use crate::domain::TaxId;

#[derive(Debug, Clone, Copy)]
pub struct Organism {
    pub taxid: &'static str,
    pub name: &'static str,
    pub kegg_code: Option<&'static str>,
    pub gaf_file: Option<&'static str>,
    pub essential: bool,
}

const ORGANISMS: &[Organism] = &[
    Organism {
        taxid: "9606",
        name: "Homo sapiens",
        kegg_code: Some("hsa"),
        gaf_file: Some("goa_human.gaf.gz"),
        essential: true,
    },
    Organism {
        taxid: "10090",
        name: "Mus musculus",
        kegg_code: Some("mmu"),
        gaf_file: Some("mgi.gaf.gz"),
        essential: true,
    },
    Organism {
        taxid: "10116",
        name: "Rattus norvegicus",
        kegg_code: Some("rno"),
        gaf_file: Some("rgd.gaf.gz"),
        essential: false,
    },
    Organism {
        taxid: "4932",
        name: "Saccharomyces cerevisiae",
        kegg_code: Some("sce"),
        gaf_file: Some("sgd.gaf.gz"),
        essential: true,
    },
    Organism {
        taxid: "4896",
        name: "Schizosaccharomyces pombe",
        kegg_code: Some("spo"),
        gaf_file: Some("pombase.gaf.gz"),
        essential: false,
    },
    Organism {
        taxid: "7227",
        name: "Drosophila melanogaster",
        kegg_code: Some("dme"),
        gaf_file: Some("fb.gaf.gz"),
        essential: true,
    },
    Organism {
        taxid: "6239",
        name: "Caenorhabditis elegans",
        kegg_code: Some("cel"),
        gaf_file: Some("wb.gaf.gz"),
        essential: true,
    },
    Organism {
        taxid: "3702",
        name: "Arabidopsis thaliana",
        kegg_code: Some("ath"),
        gaf_file: Some("tair.gaf.gz"),
        essential: true,
    },
    Organism {
        taxid: "7955",
        name: "Danio rerio",
        kegg_code: Some("dre"),
        gaf_file: Some("zfin.gaf.gz"),
        essential: false,
    },
    Organism {
        taxid: "9913",
        name: "Bos taurus",
        kegg_code: Some("bta"),
        gaf_file: Some("goa_cow.gaf.gz"),
        essential: false,
    },
    Organism {
        taxid: "352472",
        name: "Dictyostelium discoideum",
        kegg_code: Some("ddi"),
        gaf_file: Some("dictybase.gaf.gz"),
        essential: true,
    },
    Organism {
        taxid: "562",
        name: "Escherichia coli",
        kegg_code: Some("eco"),
        gaf_file: Some("ecocyc.gaf.gz"),
        essential: false,
    },
    Organism {
        taxid: "8355",
        name: "Xenopus laevis",
        kegg_code: Some("xla"),
        gaf_file: Some("xenbase.gaf.gz"),
        essential: false,
    },
    Organism {
        taxid: "4530",
        name: "Oryza sativa",
        kegg_code: Some("osa"),
        gaf_file: None,
        essential: false,
    },
    Organism {
        taxid: "5833",
        name: "Plasmodium falciparum",
        kegg_code: Some("pfa"),
        gaf_file: None,
        essential: false,
    },
];

pub fn lookup(taxid: &TaxId) -> Option<&'static Organism> {
    ORGANISMS
        .iter()
        .find(|organism| organism.taxid == taxid.as_str())
}

/// Scientific name, or the raw id for organisms outside the table.
pub fn name(taxid: &TaxId) -> String {
    lookup(taxid)
        .map(|organism| organism.name.to_string())
        .unwrap_or_else(|| taxid.to_string())
}

pub fn common_taxids() -> Vec<TaxId> {
    ORGANISMS
        .iter()
        .filter_map(|organism| organism.taxid.parse().ok())
        .collect()
}

pub fn essential_taxids() -> Vec<TaxId> {
    ORGANISMS
        .iter()
        .filter(|organism| organism.essential)
        .filter_map(|organism| organism.taxid.parse().ok())
        .collect()
}

pub fn is_essential(taxid: &TaxId) -> bool {
    lookup(taxid).map(|organism| organism.essential).unwrap_or(false)
}
