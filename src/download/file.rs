//! Streams a single URL to disk: manual HTTP-redirect following, a
//! streaming GET read in fixed-size chunks, and a 10-attempt retry loop
//! that restarts the destination file from zero on any mid-stream failure.

use std::path::Path;
use std::time::Duration;

use futures_util::TryStreamExt;
use rand::Rng;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tracing::warn;

use crate::auth::{AuthError, Credentials};
use crate::monitor::StatusHandle;

const DOWNLOAD_ATTEMPTS: u32 = 10;
const CHUNK_SIZE: usize = 5 * 1024 * 1024;
const MAX_REDIRECTS: u32 = 20;

#[derive(Debug, Error)]
pub enum FileDownloadError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("server returned status {0}")]
    BadStatus(StatusCode),

    #[error("response had no Content-Length")]
    MissingContentLength,

    #[error("download failed after {0} attempts")]
    RetriesExhausted(u32),
}

/// Downloads `url` to `local_path`, creating parent directories as needed.
/// Retries the whole transfer (not just the failing chunk) up to 10 times.
pub async fn download_file(
    credentials: &Credentials,
    url: &str,
    local_path: &Path,
    status: &StatusHandle,
) -> Result<(), FileDownloadError> {
    status.set_filename(
        local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    );

    let mut last_err = None;

    for attempt in 1..=DOWNLOAD_ATTEMPTS {
        match try_once(credentials, url, local_path, status).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(attempt, "download attempt failed: {}", e);
                last_err = Some(e);
            }
        }

        if attempt < DOWNLOAD_ATTEMPTS {
            let jitter: f64 = rand::thread_rng().gen_range(0.0..0.25);
            tokio::time::sleep(Duration::from_secs_f64(60.0 * (1.0 + jitter))).await;
        }
    }

    warn!("giving up on {} after {} attempts", url, DOWNLOAD_ATTEMPTS);
    let _ = last_err;
    Err(FileDownloadError::RetriesExhausted(DOWNLOAD_ATTEMPTS))
}

async fn try_once(
    credentials: &Credentials,
    url: &str,
    local_path: &Path,
    status: &StatusHandle,
) -> Result<(), FileDownloadError> {
    let session = credentials.get_session().await?;

    let mut target = url.to_string();
    let mut redirects = 0;
    loop {
        let response = session.head_no_redirect(&target).await?;
        if !response.status().is_redirection() {
            break;
        }
        redirects += 1;
        if redirects > MAX_REDIRECTS {
            return Err(FileDownloadError::TooManyRedirects);
        }
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(FileDownloadError::TooManyRedirects)?;
        target = location.to_string();
    }

    let response = session.get_stream(&target).await?;
    if response.status() != StatusCode::OK {
        return Err(FileDownloadError::BadStatus(response.status()));
    }

    let content_length = response
        .content_length()
        .ok_or(FileDownloadError::MissingContentLength)?;
    status.set_filesize(content_length);

    if let Some(parent) = local_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(local_path).await?;

    let byte_stream = response
        .bytes_stream()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
    let mut reader = StreamReader::new(byte_stream);
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        tokio::io::AsyncWriteExt::write_all(&mut file, &buf[..n]).await?;
        status.add_progress(n as u64);
    }

    Ok(())
}
