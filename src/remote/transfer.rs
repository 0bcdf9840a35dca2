//! File upload and download.

use futures::future::{BoxFuture, FutureExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use super::types::Site;
use crate::error::TransferError;

/// Moves files between the device and a site.
pub trait FileTransfer: Send + Sync {
  /// Upload the file at `local` to `remote` (absolute URL or path on the site).
  fn upload<'a>(
    &'a self,
    site: &'a Site,
    local: &'a Path,
    remote: &'a str,
  ) -> BoxFuture<'a, Result<(), TransferError>>;

  /// Download `url` into `local`, returning where the file was written.
  fn download<'a>(
    &'a self,
    site: &'a Site,
    url: &'a str,
    local: &'a Path,
  ) -> BoxFuture<'a, Result<PathBuf, TransferError>>;
}

/// HTTP file transfer using the site token as a query parameter.
#[derive(Clone)]
pub struct HttpFileTransfer {
  client: reqwest::Client,
}

impl HttpFileTransfer {
  pub fn new(timeout: Duration) -> Result<Self, TransferError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| TransferError::Unreachable(format!("failed to build HTTP client: {}", e)))?;
    Ok(Self { client })
  }

  async fn upload_file(&self, site: &Site, local: &Path, remote: &str) -> Result<(), TransferError> {
    let body = tokio::fs::read(local).await?;
    let target = resolve_target(&site.url, remote)?;

    let response = self
      .client
      .post(target)
      .query(&[("token", site.token.as_str())])
      .body(body)
      .send()
      .await
      .map_err(|e| TransferError::Unreachable(e.to_string()))?;

    if !response.status().is_success() {
      return Err(TransferError::Http(response.status().as_u16()));
    }
    Ok(())
  }

  async fn download_file(&self, site: &Site, url: &str, local: &Path) -> Result<PathBuf, TransferError> {
    let url = fix_pluginfile(url, &site.token);

    let response = self
      .client
      .get(&url)
      .send()
      .await
      .map_err(|e| TransferError::Unreachable(e.to_string()))?;

    if !response.status().is_success() {
      return Err(TransferError::Http(response.status().as_u16()));
    }

    let bytes = response
      .bytes()
      .await
      .map_err(|e| TransferError::Unreachable(e.to_string()))?;

    if let Some(parent) = local.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(local, &bytes).await?;

    Ok(local.to_path_buf())
  }
}

impl FileTransfer for HttpFileTransfer {
  fn upload<'a>(
    &'a self,
    site: &'a Site,
    local: &'a Path,
    remote: &'a str,
  ) -> BoxFuture<'a, Result<(), TransferError>> {
    self.upload_file(site, local, remote).boxed()
  }

  fn download<'a>(
    &'a self,
    site: &'a Site,
    url: &'a str,
    local: &'a Path,
  ) -> BoxFuture<'a, Result<PathBuf, TransferError>> {
    self.download_file(site, url, local).boxed()
  }
}

fn resolve_target(site_url: &str, remote: &str) -> Result<Url, TransferError> {
  if let Ok(url) = Url::parse(remote) {
    return Ok(url);
  }
  Url::parse(site_url)
    .and_then(|base| base.join(remote))
    .map_err(|e| TransferError::Unreachable(format!("invalid upload target {}: {}", remote, e)))
}

/// Make a file URL downloadable with a token.
///
/// Plain `/pluginfile` links are routed through `/webservice/pluginfile` and
/// the token is appended as a query parameter.
pub fn fix_pluginfile(url: &str, token: &str) -> String {
  let url = if url.contains("/webservice/pluginfile") {
    url.to_string()
  } else {
    url.replacen("/pluginfile", "/webservice/pluginfile", 1)
  };

  match Url::parse(&url) {
    Ok(mut parsed) => {
      parsed.query_pairs_mut().append_pair("token", token);
      parsed.to_string()
    }
    Err(_) => {
      let sep = if url.contains('?') { '&' } else { '?' };
      format!("{}{}token={}", url, sep, token)
    }
  }
}
