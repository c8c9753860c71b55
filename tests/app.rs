use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use kira_genesets::app::{App, BuildSource};
use kira_genesets::domain::{SERVER_DOMAIN, TaxId};
use kira_genesets::error::GenesetError;
use kira_genesets::output::JsonOutput;
use kira_genesets::providers::go::GoClient;
use kira_genesets::providers::kegg::KeggClient;
use kira_genesets::registry::{CollectionSpec, Destination, IndexStatus};
use kira_genesets::serverfiles::ServerFiles;
use kira_genesets::store::Store;

#[derive(Default)]
struct MemoryServer {
    files: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl ServerFiles for MemoryServer {
    fn listfiles(&self, domain: &str) -> Result<Vec<String>, GenesetError> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|(d, _)| d == domain)
            .map(|(_, name)| name.clone())
            .collect())
    }

    fn download(
        &self,
        domain: &str,
        filename: &str,
        destination: &Path,
    ) -> Result<(), GenesetError> {
        let files = self.files.lock().unwrap();
        let content = files
            .get(&(domain.to_string(), filename.to_string()))
            .ok_or_else(|| GenesetError::ServerFilesStatus {
                status: 404,
                message: filename.to_string(),
            })?;
        fs::write(destination, content).map_err(|err| GenesetError::Filesystem(err.to_string()))
    }

    fn upload(
        &self,
        domain: &str,
        filename: &str,
        local_path: &Path,
        _title: &str,
        _tags: &[String],
    ) -> Result<(), GenesetError> {
        let content =
            fs::read(local_path).map_err(|err| GenesetError::Filesystem(err.to_string()))?;
        self.files
            .lock()
            .unwrap()
            .insert((domain.to_string(), filename.to_string()), content);
        Ok(())
    }

    fn unprotect(&self, _domain: &str, _filename: &str) -> Result<(), GenesetError> {
        Ok(())
    }
}

#[derive(Clone)]
struct MockKegg;

impl KeggClient for MockKegg {
    fn list_pathways(&self, org: &str) -> Result<String, GenesetError> {
        assert_eq!(org, "hsa");
        Ok("hsa00010\tGlycolysis / Gluconeogenesis - Homo sapiens (human)\n\
            hsa04010\tMAPK signaling pathway - Homo sapiens (human)\n\
            hsa99999\tUnlinked pathway - Homo sapiens (human)\n"
            .to_string())
    }

    fn link_pathway_genes(&self, _org: &str) -> Result<String, GenesetError> {
        Ok("path:hsa00010\thsa:3098\n\
            path:hsa00010\thsa:2645\n\
            path:hsa04010\thsa:5594\n"
            .to_string())
    }

    fn list_genes(&self, _org: &str) -> Result<String, GenesetError> {
        Ok("hsa:3098\tCDS\t10:69269984..69401884\tHK1, HK1-ta; hexokinase 1\n\
            hsa:5594\tCDS\t22:21759657..21867680\tMAPK1, ERK; mitogen-activated protein kinase 1\n"
            .to_string())
    }
}

#[derive(Clone)]
struct MockGo;

impl GoClient for MockGo {
    fn download_ontology(&self) -> Result<String, GenesetError> {
        Ok("[Term]\n\
            id: GO:0008150\n\
            name: biological_process\n\
            namespace: biological_process\n\
            \n\
            [Term]\n\
            id: GO:0006096\n\
            name: glycolytic process\n\
            namespace: biological_process\n\
            is_a: GO:0008150 ! biological_process\n\
            \n\
            [Term]\n\
            id: GO:0005575\n\
            name: cellular_component\n\
            namespace: cellular_component\n\
            \n\
            [Term]\n\
            id: GO:0005829\n\
            name: cytosol\n\
            namespace: cellular_component\n\
            relationship: part_of GO:0005575 ! cellular_component\n"
            .to_string())
    }

    fn download_annotations(&self, gaf_file: &str) -> Result<String, GenesetError> {
        assert_eq!(gaf_file, "goa_human.gaf.gz");
        Ok("!gaf-version: 2.2\n\
            UniProtKB\tP04406\tGAPDH\tinvolved_in\tGO:0006096\tPMID:1\tIDA\n\
            UniProtKB\tP04406\tGAPDH\tlocated_in\tGO:0005829\tPMID:1\tIDA\n\
            UniProtKB\tP19367\tHK1\tinvolved_in\tGO:0006096\tPMID:2\tIDA\n"
            .to_string())
    }
}

#[derive(Clone)]
struct FailingGo;

impl GoClient for FailingGo {
    fn download_ontology(&self) -> Result<String, GenesetError> {
        Err(GenesetError::GoStatus {
            status: 503,
            message: "unavailable".to_string(),
        })
    }

    fn download_annotations(&self, _gaf_file: &str) -> Result<String, GenesetError> {
        Err(GenesetError::GoHttp("unreachable".to_string()))
    }
}

fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

fn human() -> TaxId {
    "9606".parse().unwrap()
}

#[test]
fn build_kegg_registers_one_collection() {
    let (_temp, root) = temp_root();
    let app = App::new(
        Store::new_with_root(root),
        MemoryServer::default(),
        MockKegg,
        MockGo,
    );

    let result = app
        .build(BuildSource::Kegg(human()), Destination::Local, &JsonOutput)
        .unwrap();
    assert_eq!(result.source, "kegg:9606");
    assert_eq!(result.registered.len(), 1);
    assert_eq!(result.registered[0].filename, "gs_KEGG_._9606.json.gz");
    assert_eq!(result.registered[0].genesets, 2);

    let shown = app
        .show(&"KEGG@9606".parse().unwrap(), true, &JsonOutput)
        .unwrap();
    let glycolysis = shown
        .genesets
        .iter()
        .find(|gs| gs.id == "path:hsa00010")
        .unwrap();
    assert_eq!(glycolysis.name.as_deref(), Some("Glycolysis / Gluconeogenesis"));
    assert!(glycolysis.genes.contains("HK1"));
    assert!(glycolysis.genes.contains("2645"));
    assert_eq!(
        glycolysis.link.as_deref(),
        Some("https://www.kegg.jp/pathway/hsa00010")
    );
}

#[test]
fn build_go_splits_by_namespace() {
    let (_temp, root) = temp_root();
    let app = App::new(
        Store::new_with_root(root),
        MemoryServer::default(),
        MockKegg,
        MockGo,
    );

    let result = app
        .build(BuildSource::Go(human()), Destination::Local, &JsonOutput)
        .unwrap();
    let filenames = result
        .registered
        .iter()
        .map(|outcome| outcome.filename.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        filenames,
        vec![
            "gs_GO_._biological_process_._9606.json.gz",
            "gs_GO_._cellular_component_._9606.json.gz",
        ]
    );

    let root_term = app
        .show(&"GO/biological_process@9606".parse().unwrap(), true, &JsonOutput)
        .unwrap()
        .genesets
        .into_iter()
        .find(|gs| gs.id == "GO:0008150")
        .unwrap();
    assert_eq!(root_term.size(), 2);
}

#[test]
fn build_go_rejects_unknown_organism() {
    let (_temp, root) = temp_root();
    let app = App::new(
        Store::new_with_root(root),
        MemoryServer::default(),
        MockKegg,
        MockGo,
    );
    let err = app
        .build(
            BuildSource::Go("123456789".parse().unwrap()),
            Destination::Local,
            &JsonOutput,
        )
        .unwrap_err();
    assert_matches!(err, GenesetError::UnknownOrganism(_));
}

#[test]
fn build_omim_from_morbidmap() {
    let (_temp, root) = temp_root();
    let morbidmap = root.join("morbidmap.txt");
    fs::write(
        morbidmap.as_std_path(),
        "# Phenotype\tGene Symbols\tMIM Number\tCyto Location\n\
         Alzheimer disease, 104300 (3)\tAPP, AAA\t104760\t21q21.3\n\
         Alzheimer disease, 104300 (3)\tPSEN1\t104311\t14q24.2\n",
    )
    .unwrap();
    let app = App::new(
        Store::new_with_root(root.join("store")),
        MemoryServer::default(),
        MockKegg,
        MockGo,
    );

    let result = app
        .build(BuildSource::Omim(morbidmap), Destination::Local, &JsonOutput)
        .unwrap();
    assert_eq!(result.registered[0].filename, "gs_OMIM_._9606.json.gz");

    let disease = app
        .show(&"OMIM@9606".parse().unwrap(), true, &JsonOutput)
        .unwrap()
        .genesets
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(disease.id, "104300");
    assert_eq!(disease.size(), 3);
    assert_eq!(disease.link.as_deref(), Some("https://omim.org/entry/104300"));
}

#[test]
fn publish_records_failing_sources() {
    let (_temp, root) = temp_root();
    let app = App::new(
        Store::new_with_root(root),
        MemoryServer::default(),
        MockKegg,
        FailingGo,
    );

    let result = app.publish(&[human()], &JsonOutput).unwrap();
    assert_eq!(result.registered.len(), 1);
    assert_matches!(
        result.registered[0].index,
        Some(IndexStatus::Updated { files: 1 })
    );
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].source, "go:9606");
    assert_eq!(result.failures[0].organism, "9606");

    let listed = app.list(false, false, &JsonOutput).unwrap();
    assert_eq!(listed.collections.len(), 1);
    assert!(!listed.collections[0].local);
}

#[test]
fn index_lists_only_gene_set_files() {
    let (_temp, root) = temp_root();
    let server = MemoryServer::default();
    for name in ["gs_KEGG_._9606.json.gz", "gs_OMIM_._9606.json.gz", "notes.txt"] {
        server
            .files
            .lock()
            .unwrap()
            .insert((SERVER_DOMAIN.to_string(), name.to_string()), b"{}".to_vec());
    }
    let app = App::new(Store::new_with_root(root), server, MockKegg, MockGo);

    let result = app.index(&JsonOutput).unwrap();
    assert_eq!(
        result.files,
        vec!["gs_KEGG_._9606.json.gz", "gs_OMIM_._9606.json.gz"]
    );
    assert!(result.generated_at.is_some());
}

#[test]
fn collect_writes_gmt() {
    let (_temp, root) = temp_root();
    let gmt = root.join("c2.gmt");
    fs::write(gmt.as_std_path(), "SET_A\tfirst\tTP53\tEGFR\n").unwrap();
    let app = App::new(
        Store::new_with_root(root.join("store")),
        MemoryServer::default(),
        MockKegg,
        MockGo,
    );
    app.build(BuildSource::Kegg(human()), Destination::Local, &JsonOutput)
        .unwrap();

    let output = root.join("merged.gmt");
    let specs = vec![
        CollectionSpec::File(gmt),
        CollectionSpec::GeneSets(
            app.show(&"KEGG@9606".parse().unwrap(), true, &JsonOutput)
                .unwrap()
                .genesets,
        ),
    ];
    let result = app.collect(specs, Some(output.as_path()), &JsonOutput).unwrap();
    assert_eq!(result.count, 3);

    let written = fs::read_to_string(output.as_std_path()).unwrap();
    assert_eq!(written.lines().count(), 3);
    assert!(written.contains("SET_A\tfirst\tEGFR\tTP53"));
    assert!(written.contains("path:hsa04010\tMAPK signaling pathway\tMAPK1"));
}
