use std::fs::File;
use std::path::Path;
use std::time::Duration;

use camino::Utf8PathBuf;
use reqwest::blocking::{Client, RequestBuilder, Response, multipart};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info};

use crate::error::GenesetError;
use crate::store::{MirrorInfo, Store};

pub const DEFAULT_SERVER_URL: &str = "http://asterix.fri.uni-lj.si/orngServerFiles";

const LIST_SEPARATOR: &str = "|||||";

/// Remote indexed file store. Every call is blocking.
pub trait ServerFiles: Send + Sync {
    fn listfiles(&self, domain: &str) -> Result<Vec<String>, GenesetError>;
    fn download(&self, domain: &str, filename: &str, destination: &Path)
    -> Result<(), GenesetError>;
    fn upload(
        &self,
        domain: &str,
        filename: &str,
        local_path: &Path,
        title: &str,
        tags: &[String],
    ) -> Result<(), GenesetError>;
    fn unprotect(&self, domain: &str, filename: &str) -> Result<(), GenesetError>;
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Username from config, password from `KIRA_GS_PASSWORD`.
    pub fn from_env(username: Option<&str>) -> Option<Self> {
        let username = username.map(str::trim).filter(|value| !value.is_empty())?;
        let password = std::env::var("KIRA_GS_PASSWORD").ok()?;
        Some(Self {
            username: username.to_string(),
            password,
        })
    }
}

#[derive(Clone)]
pub struct ServerFilesHttpClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl ServerFilesHttpClient {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Result<Self, GenesetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-gs/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GenesetError::ServerFilesHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| GenesetError::ServerFilesHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, command: &str) -> String {
        format!("{}/{command}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, GenesetError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(GenesetError::MissingCredentials)?;
        Ok(request.basic_auth(&credentials.username, Some(&credentials.password)))
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, GenesetError> {
        let response = request
            .send()
            .map_err(|err| GenesetError::ServerFilesHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "server files request failed".to_string());
            return Err(GenesetError::ServerFilesStatus { status, message });
        }
        Ok(response)
    }
}

impl ServerFiles for ServerFilesHttpClient {
    fn listfiles(&self, domain: &str) -> Result<Vec<String>, GenesetError> {
        let response = self.send(self.client.get(self.url("list")).query(&[("domain", domain)]))?;
        let body = response
            .text()
            .map_err(|err| GenesetError::ServerFilesHttp(err.to_string()))?;
        Ok(parse_listing(&body))
    }

    fn download(
        &self,
        domain: &str,
        filename: &str,
        destination: &Path,
    ) -> Result<(), GenesetError> {
        let mut response = self.send(
            self.client
                .get(self.url("download"))
                .query(&[("domain", domain), ("filename", filename)]),
        )?;
        let mut file =
            File::create(destination).map_err(|err| GenesetError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn upload(
        &self,
        domain: &str,
        filename: &str,
        local_path: &Path,
        title: &str,
        tags: &[String],
    ) -> Result<(), GenesetError> {
        let form = multipart::Form::new()
            .text("domain", domain.to_string())
            .text("filename", filename.to_string())
            .text("title", title.to_string())
            .text("tags", tags.join(";"))
            .file("data", local_path)
            .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
        let request = self.authorized(self.client.post(self.url("upload")).multipart(form))?;
        self.send(request)?;
        Ok(())
    }

    fn unprotect(&self, domain: &str, filename: &str) -> Result<(), GenesetError> {
        let request = self.authorized(self.client.post(self.url("protect")).form(&[
            ("domain", domain),
            ("filename", filename),
            ("access_code", "0"),
        ]))?;
        self.send(request)?;
        Ok(())
    }
}

pub fn parse_listing(body: &str) -> Vec<String> {
    body.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether the mirrored copy of `filename` matches the server copy stamped
/// `uploaded_at`. Without a stamp any mirrored copy is accepted.
pub fn mirror_is_current(
    store: &Store,
    domain: &str,
    filename: &str,
    uploaded_at: Option<&str>,
) -> bool {
    if !store.mirror_path(domain, filename).as_std_path().exists() {
        return false;
    }
    let Some(stamp) = uploaded_at else {
        return true;
    };
    match Store::read_info(&store.mirror_info_path(domain, filename)) {
        Ok(info) => info.and_then(|info| info.uploaded_at).as_deref() == Some(stamp),
        Err(err) => {
            debug!(%domain, %filename, error = %err, "unreadable sidecar, mirror is stale");
            false
        }
    }
}

/// Path of `filename` in the local mirror, downloading it first when it is
/// missing or older than the server copy stamped `uploaded_at`.
pub fn localpath_download<R: ServerFiles + ?Sized>(
    remote: &R,
    store: &Store,
    domain: &str,
    filename: &str,
    uploaded_at: Option<&str>,
) -> Result<Utf8PathBuf, GenesetError> {
    if mirror_is_current(store, domain, filename, uploaded_at) {
        debug!(%domain, %filename, "using mirrored file");
        return Ok(store.mirror_path(domain, filename));
    }
    download_to_mirror(remote, store, domain, filename, uploaded_at)
}

/// Downloads `filename` into the mirror unconditionally and records the
/// stamp it was fetched against.
pub fn download_to_mirror<R: ServerFiles + ?Sized>(
    remote: &R,
    store: &Store,
    domain: &str,
    filename: &str,
    uploaded_at: Option<&str>,
) -> Result<Utf8PathBuf, GenesetError> {
    let path = store.mirror_path(domain, filename);
    store.ensure_mirror_dir(domain)?;
    let temp = tempfile::Builder::new()
        .prefix("kira-gs-download")
        .tempfile_in(store.mirror_dir(domain).as_std_path())
        .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
    info!(%domain, %filename, "downloading from server files");
    remote.download(domain, filename, temp.path())?;
    temp.persist(path.as_std_path())
        .map_err(|err| GenesetError::Filesystem(err.to_string()))?;
    Store::write_info(
        &store.mirror_info_path(domain, filename),
        &MirrorInfo::new(domain, filename, uploaded_at),
    )?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_is_split_on_separator() {
        let body = "gs_KEGG_._9606.json.gz|||||index.json|||||";
        assert_eq!(
            parse_listing(body),
            vec!["gs_KEGG_._9606.json.gz".to_string(), "index.json".to_string()]
        );
        assert!(parse_listing("").is_empty());
    }

    #[test]
    fn mirror_is_current_compares_stamps() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = Store::new_with_root(root);
        let filename = "gs_KEGG_._9606.json.gz";
        assert!(!mirror_is_current(&store, "gene_sets", filename, None));

        Store::write_bytes_atomic(&store.mirror_path("gene_sets", filename), b"v1").unwrap();
        assert!(mirror_is_current(&store, "gene_sets", filename, None));
        assert!(!mirror_is_current(&store, "gene_sets", filename, Some("2024-05-01T00:00:00Z")));

        Store::write_info(
            &store.mirror_info_path("gene_sets", filename),
            &MirrorInfo::new("gene_sets", filename, Some("2024-05-01T00:00:00Z")),
        )
        .unwrap();
        assert!(mirror_is_current(&store, "gene_sets", filename, Some("2024-05-01T00:00:00Z")));
        assert!(!mirror_is_current(&store, "gene_sets", filename, Some("2024-06-01T00:00:00Z")));
    }

    #[test]
    fn credentials_need_username() {
        assert!(Credentials::from_env(None).is_none());
        assert!(Credentials::from_env(Some("  ")).is_none());
    }
}
