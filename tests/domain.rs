use assert_matches::assert_matches;

use kira_genesets::domain::{CollectionKey, Hierarchy, TaxId, is_genesets_file};
use kira_genesets::error::GenesetError;
use kira_genesets::registry::CollectionSpec;

#[test]
fn parse_collection_key_with_organism() {
    let key: CollectionKey = "GO/biological_process@9606".parse().unwrap();
    assert_eq!(key.hierarchy.components(), ["GO", "biological_process"]);
    assert_eq!(key.organism.as_ref().map(TaxId::as_str), Some("9606"));
    assert_eq!(key.to_string(), "GO/biological_process@9606");
}

#[test]
fn parse_collection_key_without_organism() {
    let key: CollectionKey = "KEGG".parse().unwrap();
    assert_eq!(key.organism, None);
    assert_eq!(key.to_string(), "KEGG");
}

#[test]
fn parse_collection_key_invalid() {
    assert_matches!(
        "KEGG@human".parse::<CollectionKey>(),
        Err(GenesetError::InvalidTaxId(_))
    );
    assert_matches!(
        "GO//x@9606".parse::<CollectionKey>(),
        Err(GenesetError::InvalidCollection(_))
    );
}

#[test]
fn filename_uses_separator_and_empty_organism() {
    let key = CollectionKey::new(Hierarchy::new(["KEGG"]).unwrap(), None);
    assert_eq!(key.filename(), "gs_KEGG_._.json.gz");
    assert!(is_genesets_file(&key.filename()));
    assert_eq!(CollectionKey::parse_filename(&key.filename()), Some(key));
}

#[test]
fn filename_of_nested_hierarchy() {
    let key: CollectionKey = "GO/molecular_function@10090".parse().unwrap();
    assert_eq!(
        key.filename(),
        "gs_GO_._molecular_function_._10090.json.gz"
    );
}

#[test]
fn foreign_files_are_not_keys() {
    for name in ["index.json", "gs_.json", "KEGG_._9606.json.gz", "gs_KEGG_._9606.json.gz.info"] {
        assert!(CollectionKey::parse_filename(name).is_none(), "{name}");
    }
}

#[test]
fn collection_spec_routes_files_and_keys() {
    assert_matches!(
        "msigdb/c2.all.gmt".parse::<CollectionSpec>(),
        Ok(CollectionSpec::File(path)) if path.as_str() == "msigdb/c2.all.gmt"
    );
    assert_matches!(
        "bundle.ZIP".parse::<CollectionSpec>(),
        Ok(CollectionSpec::File(_))
    );
    assert_matches!(
        "OMIM@9606".parse::<CollectionSpec>(),
        Ok(CollectionSpec::Stored(key)) if key.to_string() == "OMIM@9606"
    );
}
