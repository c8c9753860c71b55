use std::fs;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use zip::ZipArchive;

use crate::domain::{Hierarchy, TaxId};
use crate::error::GenesetError;
use crate::geneset::{GeneSet, GeneSets};
use crate::providers::GeneSetSource;

/// Gene sets from a `.gmt` file or a `.zip` bundle of them.
#[derive(Debug, Clone)]
pub struct GmtSource {
    pub path: Utf8PathBuf,
    pub organism: Option<TaxId>,
}

impl GeneSetSource for GmtSource {
    fn name(&self) -> String {
        format!("gmt:{}", self.path)
    }

    fn produce(&self) -> Result<GeneSets, GenesetError> {
        load_collection_file(&self.path, self.organism.clone())
    }
}

/// Parses GMT text: one `id \t description \t gene...` record per non-empty line.
pub fn parse_gmt(
    contents: &str,
    hierarchy: &Hierarchy,
    organism: Option<TaxId>,
) -> Result<GeneSets, GenesetError> {
    let mut genesets = GeneSets::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields = line.split('\t').map(str::trim).collect::<Vec<_>>();
        if fields.len() < 2 || fields[0].is_empty() {
            return Err(GenesetError::GmtParse {
                line: index + 1,
                message: "expected at least an id and a description".to_string(),
            });
        }
        let genes = fields[2..].iter().filter(|gene| !gene.is_empty()).copied();
        let mut geneset = GeneSet::new(fields[0], genes)
            .with_hierarchy(hierarchy.clone())
            .with_organism(organism.clone());
        if !fields[1].is_empty() {
            geneset = geneset.with_description(fields[1]);
        }
        genesets.insert(geneset);
    }
    Ok(genesets)
}

/// Renders gene sets as GMT; the description column falls back to the name.
pub fn write_gmt(genesets: &GeneSets) -> String {
    let mut out = String::new();
    for geneset in genesets {
        let description = geneset
            .description
            .as_deref()
            .or(geneset.name.as_deref())
            .unwrap_or("");
        out.push_str(&geneset.id);
        out.push('\t');
        out.push_str(description);
        for gene in &geneset.genes {
            out.push('\t');
            out.push_str(gene);
        }
        out.push('\n');
    }
    out
}

pub fn load_collection_file(
    path: &Utf8Path,
    organism: Option<TaxId>,
) -> Result<GeneSets, GenesetError> {
    match path.extension().map(str::to_lowercase).as_deref() {
        Some("gmt") => {
            let contents = fs::read_to_string(path.as_std_path())
                .map_err(|err| GenesetError::Filesystem(format!("read {path}: {err}")))?;
            parse_gmt(&contents, &hierarchy_for(path.file_stem())?, organism)
        }
        Some("zip") => load_gmt_bundle(path, organism),
        _ => Err(GenesetError::UnsupportedCollectionFile(path.to_string())),
    }
}

/// Every `.gmt` entry of the archive, each under a hierarchy named after the entry.
fn load_gmt_bundle(path: &Utf8Path, organism: Option<TaxId>) -> Result<GeneSets, GenesetError> {
    let file = fs::File::open(path.as_std_path())
        .map_err(|err| GenesetError::Filesystem(format!("open zip {path}: {err}")))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| GenesetError::Filesystem(err.to_string()))?;

    let mut genesets = GeneSets::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let entry_path = entry.enclosed_name().ok_or_else(|| {
            GenesetError::Filesystem("zip entry path traversal detected".to_string())
        })?;
        let entry_path = Utf8PathBuf::from_path_buf(entry_path)
            .map_err(|_| GenesetError::Filesystem("non-utf8 zip entry name".to_string()))?;
        let is_gmt = entry_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gmt"));
        if !is_gmt {
            continue;
        }
        let mut contents = String::new();
        entry
            .read_to_string(&mut contents)
            .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
        genesets.update(parse_gmt(
            &contents,
            &hierarchy_for(entry_path.file_stem())?,
            organism.clone(),
        )?);
    }
    Ok(genesets)
}

fn hierarchy_for(stem: Option<&str>) -> Result<Hierarchy, GenesetError> {
    let stem = stem.ok_or_else(|| GenesetError::InvalidHierarchy(String::new()))?;
    Hierarchy::new([stem])
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const SAMPLE: &str = "KEGG_GLYCOLYSIS\thttp://example.org/glycolysis\tHK1\tGCK\tPFKM\n\n\
                          KEGG_TCA\t\tCS\tACO2 \n";

    #[test]
    fn parses_records_and_skips_blank_lines() {
        let hierarchy = Hierarchy::new(["c2.cp.kegg"]).unwrap();
        let genesets = parse_gmt(SAMPLE, &hierarchy, None).unwrap();
        assert_eq!(genesets.len(), 2);

        let glycolysis = genesets
            .iter()
            .find(|gs| gs.id == "KEGG_GLYCOLYSIS")
            .unwrap();
        assert_eq!(glycolysis.size(), 3);
        assert_eq!(
            glycolysis.description.as_deref(),
            Some("http://example.org/glycolysis")
        );
        assert_eq!(glycolysis.hierarchy, hierarchy);

        let tca = genesets.iter().find(|gs| gs.id == "KEGG_TCA").unwrap();
        assert!(tca.genes.contains("ACO2"));
        assert_eq!(tca.description, None);
    }

    #[test]
    fn rejects_line_without_description() {
        let err = parse_gmt("ONLY_ID\n", &Hierarchy::empty(), None).unwrap_err();
        assert_matches!(err, GenesetError::GmtParse { line: 1, .. });
    }

    #[test]
    fn write_then_parse_keeps_genes() {
        let hierarchy = Hierarchy::new(["custom"]).unwrap();
        let genesets = parse_gmt(SAMPLE, &hierarchy, None).unwrap();
        let reparsed = parse_gmt(&write_gmt(&genesets), &hierarchy, None).unwrap();
        assert_eq!(reparsed, genesets);
    }

    #[test]
    fn rejects_other_file_types() {
        let err = load_collection_file(Utf8Path::new("sets.txt"), None).unwrap_err();
        assert_matches!(err, GenesetError::UnsupportedCollectionFile(_));
    }
}
