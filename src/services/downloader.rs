use std::path::{Path, PathBuf};
use std::time::Duration;

use backon::Retryable;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use crate::config::DistributionProfile;
use crate::errors::{BootstrapError, Result};
use crate::models::{DownloadProgress, VersionInfo};
use crate::services::api_client::retry_strategy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadControl {
    Running,
    Cancelled,
}

/// Producer half of the progress hand-off. Only forward movement is published, so the
/// single consumer holding the receiver always sees a non-decreasing fraction.
#[derive(Clone)]
pub struct ProgressSink {
    tx: watch::Sender<DownloadProgress>,
}

impl ProgressSink {
    pub fn channel() -> (Self, watch::Receiver<DownloadProgress>) {
        let (tx, rx) = watch::channel(DownloadProgress::default());
        (Self { tx }, rx)
    }

    pub fn publish(&self, progress: DownloadProgress) {
        self.tx.send_if_modified(|current| {
            let advanced = progress.fraction >= current.fraction
                && (progress.downloaded_bytes > current.downloaded_bytes
                    || progress.fraction > current.fraction);
            if advanced {
                *current = progress;
            }
            advanced
        });
    }
}

/// Streams version archives from a mirror into the downloads directory.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    downloads_dir: PathBuf,
    profile: DistributionProfile,
    idle_timeout: Duration,
    max_retries: usize,
}

impl Downloader {
    pub fn new(
        downloads_dir: PathBuf,
        profile: DistributionProfile,
        request_timeout: Duration,
        max_retries: usize,
    ) -> Result<Self> {
        // Archives are large: connecting and each gap between body chunks are bounded,
        // the transfer as a whole is not.
        let client = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            downloads_dir,
            profile,
            idle_timeout: request_timeout,
            max_retries,
        })
    }

    pub fn archive_url(&self, mirror: &str, version: &VersionInfo) -> String {
        format!(
            "{}/{}",
            mirror.trim_end_matches('/'),
            self.profile.archive_path(&version.client_version_upload)
        )
    }

    pub fn archive_path(&self, version: &VersionInfo) -> PathBuf {
        self.downloads_dir.join(format!(
            "{}-{}.zip",
            version.client_version_upload, self.profile.archive_name
        ))
    }

    /// Resolves to the completed archive path. The archive only ever appears under its
    /// final name once fully written; partial data lives in a private temp file.
    pub async fn download(
        &self,
        mirror: &str,
        version: &VersionInfo,
        progress: &ProgressSink,
        control: watch::Receiver<DownloadControl>,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.downloads_dir).await?;
        let url = self.archive_url(mirror, version);
        let final_path = self.archive_path(version);
        tracing::info!("downloading {} -> {}", url, final_path.display());

        let path = (|| self.attempt(&url, &final_path, progress, control.clone()))
            .retry(retry_strategy(self.max_retries))
            .when(|err| err.is_retryable())
            .notify(|err, delay| {
                tracing::warn!("download of {} failed ({}), retrying in {:?}", url, err, delay);
            })
            .await?;

        tracing::info!("download complete: {}", path.display());
        Ok(path)
    }

    async fn attempt(
        &self,
        url: &str,
        final_path: &Path,
        progress: &ProgressSink,
        mut control: watch::Receiver<DownloadControl>,
    ) -> Result<PathBuf> {
        if *control.borrow() == DownloadControl::Cancelled {
            return Err(BootstrapError::Cancelled);
        }

        let response = tokio::time::timeout(self.idle_timeout, self.client.get(url).send())
            .await
            .map_err(|_| self.stalled(url))??;
        let status = response.status();
        if !status.is_success() {
            return Err(BootstrapError::Http {
                url: url.to_string(),
                status,
            });
        }
        let total = response.content_length();

        let temp = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(&self.downloads_dir)?;
        let (std_file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);

        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        let mut control_open = true;

        loop {
            tokio::select! {
                changed = control.changed(), if control_open => {
                    if changed.is_err() {
                        control_open = false;
                    } else if *control.borrow() == DownloadControl::Cancelled {
                        tracing::info!("download of {} cancelled", url);
                        return Err(BootstrapError::Cancelled);
                    }
                }
                next = tokio::time::timeout(self.idle_timeout, stream.next()) => {
                    let Some(next) = next.map_err(|_| self.stalled(url))? else { break; };
                    let bytes = next?;
                    file.write_all(&bytes).await?;
                    downloaded += bytes.len() as u64;
                    progress.publish(DownloadProgress::new(downloaded, total));
                }
            }
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Some(expected) = total {
            if downloaded != expected {
                return Err(BootstrapError::FileSystem(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("archive truncated: got {downloaded} of {expected} bytes"),
                )));
            }
        }

        temp_path
            .persist(final_path)
            .map_err(|err| BootstrapError::FileSystem(err.error))?;
        progress.publish(DownloadProgress::complete(downloaded));
        Ok(final_path.to_path_buf())
    }

    fn stalled(&self, url: &str) -> BootstrapError {
        tracing::warn!("no data from {} for {:?}", url, self.idle_timeout);
        BootstrapError::Stalled {
            url: url.to_string(),
            idle: self.idle_timeout,
        }
    }
}
