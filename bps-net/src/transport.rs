use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bps_common::error::{BpsError, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;
use url::Url;

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "bps buildpack toolkit (Rust; +https://github.com/alexykn/bps)";

/// Turns a dependency URI into a readable byte stream.
pub trait Transport: Send + Sync {
    /// `root` is the buildpack directory; `file://` and relative URIs are
    /// resolved below it.
    fn fetch(&self, root: &Path, uri: &str) -> Result<Box<dyn Read + Send>>;
}

/// Serves `file://` URIs and bare paths from the buildpack directory and
/// `http(s)://` URIs over the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTransport;

impl DefaultTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for DefaultTransport {
    fn fetch(&self, root: &Path, uri: &str) -> Result<Box<dyn Read + Send>> {
        match Url::parse(uri) {
            Ok(url) if url.scheme() == "file" => {
                let relative = uri.trim_start_matches("file://");
                open_local(&local_path(root, relative))
            }
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => download(url),
            Ok(url) => Err(BpsError::Transport(format!(
                "unsupported URI scheme '{}' in {}",
                url.scheme(),
                uri
            ))),
            Err(url::ParseError::RelativeUrlWithoutBase) => open_local(&local_path(root, uri)),
            Err(e) => Err(BpsError::Transport(format!("invalid URI '{uri}': {e}"))),
        }
    }
}

fn local_path(root: &Path, relative: &str) -> PathBuf {
    root.join(relative.trim_start_matches('/'))
}

fn open_local(path: &Path) -> Result<Box<dyn Read + Send>> {
    debug!("Opening local dependency {}", path.display());
    let file = File::open(path).map_err(|e| {
        BpsError::Io(Arc::new(io::Error::new(
            e.kind(),
            format!("failed to open {}: {}", path.display(), e),
        )))
    })?;
    Ok(Box::new(file))
}

fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| BpsError::Transport(format!("failed to build HTTP client: {e}")))
}

fn download(url: Url) -> Result<Box<dyn Read + Send>> {
    debug!("Downloading dependency from {}", url);
    let client = build_http_client()?;
    let response = client
        .get(url.clone())
        .send()
        .map_err(|e| BpsError::Transport(format!("request to {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(BpsError::Transport(format!(
            "request to {url} returned HTTP {status}"
        )));
    }
    debug!(
        "Response from {}: HTTP {}, content length {:?}",
        url,
        status,
        response.content_length()
    );
    Ok(Box::new(response))
}
