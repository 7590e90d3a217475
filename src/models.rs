use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Update track name. Comparison ignores ASCII case; the spelling as received is kept for display.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    pub fn live() -> Self {
        Self::new("live")
    }

    /// Form used in endpoint paths.
    pub fn path_segment(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Channel {}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChannelResponse {
    pub channel_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    pub client_version_upload: String,
    pub bootstrapper_version: String,
    #[serde(default)]
    pub next_client_version_upload: Option<String>,
    #[serde(default)]
    pub next_client_version: Option<String>,
}

impl VersionInfo {
    /// Stand-in for a version pinned by id, where no metadata was fetched.
    pub fn pinned(version_id: &str) -> Self {
        Self {
            version: version_id.to_string(),
            client_version_upload: version_id.to_string(),
            bootstrapper_version: String::new(),
            next_client_version_upload: None,
            next_client_version: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct DownloadProgress {
    pub fraction: f64,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    pub fn new(downloaded_bytes: u64, total_bytes: Option<u64>) -> Self {
        let fraction = match total_bytes {
            Some(total) if total > 0 => (downloaded_bytes as f64 / total as f64).clamp(0.0, 1.0),
            _ => 0.0,
        };
        Self {
            fraction,
            downloaded_bytes,
            total_bytes,
        }
    }

    pub fn complete(total_bytes: u64) -> Self {
        Self {
            fraction: 1.0,
            downloaded_bytes: total_bytes,
            total_bytes: Some(total_bytes),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallRecord {
    pub installed_version_id: String,
    pub install_path: PathBuf,
}

impl InstallRecord {
    pub fn new(installed_version_id: impl Into<String>, install_path: impl Into<PathBuf>) -> Self {
        Self {
            installed_version_id: installed_version_id.into(),
            install_path: install_path.into(),
        }
    }

    pub fn is_version(&self, version_id: &str) -> bool {
        self.installed_version_id == version_id
    }

    pub fn executable(&self, relative: &Path) -> PathBuf {
        self.install_path.join(relative)
    }
}

/// What the pipeline decided to run this time.
#[derive(Clone, Debug)]
pub enum ResolvedTarget {
    /// Pinned version already present on disk; no network involved.
    Installed(InstallRecord),
    /// Version that may still have to be downloaded.
    Remote {
        channel: Option<Channel>,
        version: VersionInfo,
    },
}

impl ResolvedTarget {
    pub fn version_id(&self) -> &str {
        match self {
            ResolvedTarget::Installed(record) => &record.installed_version_id,
            ResolvedTarget::Remote { version, .. } => &version.client_version_upload,
        }
    }
}
