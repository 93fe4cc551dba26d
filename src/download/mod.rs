//! Per-feature download orchestration: full-product download or
//! manifest-guided partial download, atomic publication, and the
//! concurrency-bounded batch entry point.

mod file;
mod manifest;
mod odata;

pub use file::{download_file, FileDownloadError};
pub use manifest::{manifest_filename, ManifestError};
pub use odata::node_url;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::Stream;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::auth::{AuthError, Credentials};
use crate::executor::concurrent_map;
use crate::feature::Feature;
use crate::monitor::Monitor;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    File(#[from] FileDownloadError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct DownloadSuccess {
    pub title: String,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DownloadFailure {
    pub title: Option<String>,
    pub reason: String,
}

/// `None` means the feature lacked a title or download URL and was skipped
/// (logged at debug, non-fatal to the batch).
pub type DownloadOutcome = Option<Result<DownloadSuccess, DownloadFailure>>;

pub struct DownloadOptions {
    pub concurrency: usize,
    pub overwrite_existing: bool,
    pub filter_pattern: Option<String>,
    pub exclude: bool,
    pub tmpdir: Option<PathBuf>,
    pub monitor: Arc<dyn Monitor>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            overwrite_existing: false,
            filter_pattern: None,
            exclude: false,
            tmpdir: None,
            monitor: Arc::new(crate::monitor::NoopMonitor),
        }
    }
}

/// A per-product scratch directory, removed on drop unless its contents
/// were moved out first via [`ScratchDir::publish`].
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create(base: &Path, title: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(base)?;
        let unique = format!("{}____{}", title, Uuid::new_v4());
        let path = base.join(unique);
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Dispatches `downloadFeature` over `features` with at most
/// `options.concurrency` downloads in flight, yielding outcomes as they
/// complete.
pub fn download_features<S>(
    features: S,
    destination: PathBuf,
    credentials: Arc<Credentials>,
    options: Arc<DownloadOptions>,
) -> impl Stream<Item = DownloadOutcome>
where
    S: Stream<Item = Feature> + Unpin + Send + 'static,
{
    let concurrency = options.concurrency.max(1);
    concurrent_map(features, concurrency, move |feature| {
        let destination = destination.clone();
        let credentials = credentials.clone();
        let options = options.clone();
        async move { download_feature(&feature, &destination, &credentials, &options).await }
    })
}

pub async fn download_feature(
    feature: &Feature,
    destination: &Path,
    credentials: &Credentials,
    options: &DownloadOptions,
) -> DownloadOutcome {
    let title = feature.title()?.to_string();
    let url = match feature.download_url() {
        Some(u) => u.to_string(),
        None => {
            debug!(title, "feature has no download URL, skipping");
            return None;
        }
    };
    let collection = feature.collection().unwrap_or_default().to_string();
    let feature_id = feature.id().unwrap_or_default().to_string();

    let partial = options.filter_pattern.is_some();

    if partial {
        match manifest_filename(&collection) {
            Ok(manifest_name) => {
                Some(
                    download_partial(
                        &feature_id,
                        &title,
                        manifest_name,
                        destination,
                        credentials,
                        options,
                    )
                    .await
                    .map_err(|e| DownloadFailure {
                        title: Some(title.clone()),
                        reason: e.to_string(),
                    }),
                )
            }
            Err(e) => Some(Err(DownloadFailure {
                title: Some(title),
                reason: e.to_string(),
            })),
        }
    } else {
        Some(
            download_full(&title, &url, destination, credentials, options)
                .await
                .map_err(|e| DownloadFailure {
                    title: Some(title.clone()),
                    reason: e.to_string(),
                }),
        )
    }
}

async fn download_full(
    title: &str,
    url: &str,
    destination: &Path,
    credentials: &Credentials,
    options: &DownloadOptions,
) -> Result<DownloadSuccess, DownloadError> {
    let basename = format!("{}.zip", title);
    let final_path = destination.join(&basename);

    if final_path.exists() && !options.overwrite_existing {
        return Ok(DownloadSuccess {
            title: title.to_string(),
            output: final_path,
        });
    }

    let tmp_base = options
        .tmpdir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    let scratch = ScratchDir::create(&tmp_base, title)?;
    let scratch_file = scratch.path().join(&basename);

    let status = options.monitor.status();
    file::download_file(credentials, url, &scratch_file, &status).await?;

    tokio::fs::create_dir_all(destination).await?;
    tokio::fs::rename(&scratch_file, &final_path).await?;

    Ok(DownloadSuccess {
        title: title.to_string(),
        output: final_path,
    })
}

async fn download_partial(
    feature_id: &str,
    title: &str,
    manifest_name: &str,
    destination: &Path,
    credentials: &Credentials,
    options: &DownloadOptions,
) -> Result<DownloadSuccess, DownloadError> {
    let final_path = destination.join(title);

    if final_path.exists() && !options.overwrite_existing {
        return Ok(DownloadSuccess {
            title: title.to_string(),
            output: final_path,
        });
    }

    let tmp_base = options
        .tmpdir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    let scratch = ScratchDir::create(&tmp_base, title)?;

    let manifest_url = odata::node_url(feature_id, title, manifest_name);
    let manifest_local = scratch.path().join(manifest_name);
    let manifest_status = options.monitor.status();
    file::download_file(credentials, &manifest_url, &manifest_local, &manifest_status).await?;

    let manifest_xml = tokio::fs::read_to_string(&manifest_local).await?;
    let entries = manifest::parse_entries(&manifest_xml, manifest_name)?;
    let pattern = options
        .filter_pattern
        .as_deref()
        .expect("download_partial is only called when filter_pattern is set");
    let filtered = manifest::filter_entries(entries, pattern, options.exclude)?;

    let product_dir = scratch.path().join(title);
    for relative in &filtered {
        let file_url = odata::node_url(feature_id, title, relative);
        let local = product_dir.join(relative);
        let status = options.monitor.status();
        file::download_file(credentials, &file_url, &local, &status).await?;
    }

    tokio::fs::create_dir_all(destination).await?;
    tokio::fs::rename(&product_dir, &final_path).await?;

    Ok(DownloadSuccess {
        title: title.to_string(),
        output: final_path,
    })
}
