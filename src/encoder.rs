//! Resolving references to bytes and turning them into embedded payloads.
//!
//! Every lookup is cached on the [`RunContext`]: local files by absolute path, embedded
//! payloads by their full string. A resource that cannot be inlined degrades to its
//! original reference; only override sandbox violations propagate.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::asset_paths::{
  ReferenceKind, classify_reference, decode_local_path, media_type_for_path, remote_fetch_url,
  resolve_local, strip_query_and_fragment, to_forward_slashes,
};
use crate::context::RunContext;
use crate::error::BuildResult;
use crate::models::{OriginKind, ResolvedResource, saving_percent};
use crate::payload::{decode_payload, encode_payload};

impl RunContext {
  /// Encode a local file as an embedded payload, or `None` when it does not exist.
  ///
  /// The optimizer runs at most once per absolute path per run.
  pub async fn encode_file(&self, path: &Path) -> Option<String> {
    let slot = self.file_slot(path);
    if let Some(cached) = slot.get() {
      debug!("cache hit for {}", path.display());
      return cached.clone();
    }
    slot.get_or_init(|| self.load_and_encode(path)).await.clone()
  }

  async fn load_and_encode(&self, path: &Path) -> Option<String> {
    let bytes = match tokio::fs::read(path).await {
      Ok(bytes) => bytes,
      Err(err) if err.kind() == ErrorKind::NotFound => return None,
      Err(err) => {
        warn!("failed to read {}: {err}", path.display());
        return None;
      }
    };
    let label = match path.strip_prefix(self.project_root()) {
      Ok(relative) => to_forward_slashes(relative),
      Err(_) => path.display().to_string(),
    };
    let resource = ResolvedResource {
      media_type: media_type_for_path(path).to_string(),
      bytes,
      origin: OriginKind::LocalFile,
    };
    Some(self.optimize_and_encode(&label, resource).await)
  }

  /// Re-optimise an existing embedded payload.
  ///
  /// Malformed payloads, and payloads the optimizer cannot shrink, come back unchanged.
  pub async fn reencode(&self, payload: &str) -> String {
    let slot = self.payload_slot(payload);
    if let Some(cached) = slot.get() {
      return cached.clone();
    }
    slot
      .get_or_init(|| async {
        let Some(resource) = decode_payload(payload) else {
          warn!("could not decode embedded payload, keeping it as is");
          return payload.to_string();
        };
        let result = self
          .optimizers()
          .optimize(&resource.bytes, &resource.media_type)
          .await;
        self.stats().record(resource.bytes.len(), result.bytes.len());
        if !result.changed() {
          return payload.to_string();
        }
        info!(
          "[{}] {}: {} -> {} bytes ({}% saved)",
          resource.origin.label(),
          resource.media_type,
          resource.bytes.len(),
          result.bytes.len(),
          saving_percent(resource.bytes.len(), result.bytes.len())
        );
        let reencoded = encode_payload(&resource.media_type, &result.bytes);
        self.seed_payload(&reencoded);
        reencoded
      })
      .await
      .clone()
  }

  /// Download and embed a remote resource. Disabled unless `externals.fetch` is set.
  pub async fn fetch_and_encode(&self, url: &str) -> Option<String> {
    if !self.config().externals.fetch {
      return None;
    }
    let (bytes, header_type) = self.fetch(url).await?;
    let media_type = header_type
      .unwrap_or_else(|| media_type_for_path(Path::new(strip_query_and_fragment(url))).to_string());
    let resource = ResolvedResource {
      media_type,
      bytes,
      origin: OriginKind::Remote,
    };
    Some(self.optimize_and_encode(url, resource).await)
  }

  /// Download a remote text resource (script or stylesheet).
  pub async fn fetch_text(&self, url: &str) -> Option<String> {
    if !self.config().externals.fetch {
      return None;
    }
    let (bytes, _) = self.fetch(url).await?;
    match String::from_utf8(bytes) {
      Ok(text) => Some(text),
      Err(_) => {
        warn!("{url} is not valid UTF-8 text, keeping the remote reference");
        None
      }
    }
  }

  /// Resolve any reference found in a document to its inlined replacement.
  ///
  /// Returns the original reference whenever it cannot be inlined.
  pub async fn process_uri(&self, reference: &str, base_dir: &Path) -> BuildResult<String> {
    let trimmed = reference.trim();
    match classify_reference(trimmed) {
      ReferenceKind::Ignored => Ok(reference.to_string()),
      ReferenceKind::DataPayload => Ok(self.reencode(trimmed).await),
      ReferenceKind::Remote => {
        let url = remote_fetch_url(trimmed);
        if let Some(path) = self.overrides().resolve_remote(&url).await?
          && let Some(payload) = self.encode_file(&path).await
        {
          return Ok(payload);
        }
        match self.fetch_and_encode(&url).await {
          Some(payload) => Ok(payload),
          None => {
            debug!("leaving remote reference {url}");
            Ok(reference.to_string())
          }
        }
      }
      ReferenceKind::Local => {
        let decoded = decode_local_path(trimmed);
        if decoded.is_empty() {
          return Ok(reference.to_string());
        }
        let path = self.locate_local(&decoded, base_dir).await?;
        match self.encode_file(&path).await {
          Some(payload) => Ok(payload),
          None => {
            warn!("not found: {} (referenced as {trimmed})", path.display());
            Ok(reference.to_string())
          }
        }
      }
    }
  }

  /// File a decoded local reference reads from: its override when one exists, otherwise
  /// the referenced path itself.
  pub async fn locate_local(&self, decoded: &str, base_dir: &Path) -> BuildResult<PathBuf> {
    if let Some(path) = self.overrides().resolve_local(decoded, base_dir).await? {
      return Ok(path);
    }
    Ok(resolve_local(decoded, base_dir, self.project_root()))
  }

  async fn optimize_and_encode(&self, label: &str, resource: ResolvedResource) -> String {
    let original = resource.bytes.len();
    let result = self
      .optimizers()
      .optimize(&resource.bytes, &resource.media_type)
      .await;
    self.stats().record(original, result.bytes.len());
    if result.changed() {
      info!(
        "[{}] {label}: {original} -> {} bytes ({}% saved)",
        resource.origin.label(),
        result.bytes.len(),
        saving_percent(original, result.bytes.len())
      );
    } else {
      debug!(origin = ?resource.origin, status = ?result.status, "{label}: embedded without changes");
    }
    let payload = encode_payload(&resource.media_type, &result.bytes);
    self.seed_payload(&payload);
    payload
  }

  async fn fetch(&self, url: &str) -> Option<(Vec<u8>, Option<String>)> {
    let response = match self
      .http()
      .get(url)
      .send()
      .await
      .and_then(|response| response.error_for_status())
    {
      Ok(response) => response,
      Err(err) => {
        warn!("failed to fetch {url}: {err}");
        return None;
      }
    };
    let media_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|value| value.to_str().ok())
      .and_then(|value| value.split(';').next())
      .map(|value| value.trim().to_ascii_lowercase())
      .filter(|value| !value.is_empty());
    match response.bytes().await {
      Ok(body) => Some((body.to_vec(), media_type)),
      Err(err) => {
        warn!("failed to read response body from {url}: {err}");
        None
      }
    }
  }
}
