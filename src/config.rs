use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{BootstrapError, Result};
use crate::utils::paths::{
    resolve_data_dir, resolve_downloads_dir, resolve_log_dir, resolve_root_dir,
    resolve_versions_dir,
};

pub const DEFAULT_MIRRORS: &[&str] = &[
    "https://setup.rbxcdn.com",
    "https://setup-ak.rbxcdn.com",
    "https://setup.roblox.com",
];

pub const DEFAULT_CLIENT_SETTINGS_URL: &str = "https://clientsettingscdn.roblox.com";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_NETWORK_RETRIES: usize = 3;
const DEFAULT_PIPELINE_ATTEMPTS: usize = 2;
const DEFAULT_READY_GRACE_MS: u64 = 1500;

/// Names and layout of the build variant this bootstrapper manages.
#[derive(Clone, Debug)]
pub struct DistributionProfile {
    pub binary_type: String,
    pub platform_dir: String,
    pub archive_name: String,
    pub bundle_name: String,
    pub embedded_bundle: String,
    pub executable: PathBuf,
    pub url_scheme: String,
}

impl Default for DistributionProfile {
    fn default() -> Self {
        Self {
            binary_type: "MacPlayer".to_string(),
            platform_dir: "mac".to_string(),
            archive_name: "RobloxPlayer".to_string(),
            bundle_name: "RobloxPlayer.app".to_string(),
            embedded_bundle: "Roblox.app".to_string(),
            executable: PathBuf::from("Contents/MacOS/RobloxPlayer"),
            url_scheme: "roblox-player".to_string(),
        }
    }
}

impl DistributionProfile {
    /// Path of the archive relative to a mirror origin.
    pub fn archive_path(&self, version_id: &str) -> String {
        format!("{}/{}-{}.zip", self.platform_dir, version_id, self.archive_name)
    }

    pub fn embedded_bundle_path(&self) -> PathBuf {
        let mut path = self
            .executable
            .parent()
            .map(|dir| dir.to_path_buf())
            .unwrap_or_default();
        path.push(&self.embedded_bundle);
        path
    }
}

#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    pub root_dir: PathBuf,
    pub data_dir: PathBuf,
    pub versions_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub log_dir: PathBuf,
    pub mirrors: Vec<String>,
    pub client_settings_url: String,
    pub request_timeout: Duration,
    pub network_retries: usize,
    pub pipeline_attempts: usize,
    pub ready_grace: Duration,
    pub icon_path: Option<PathBuf>,
    pub profile: DistributionProfile,
}

impl BootstrapConfig {
    pub fn from_env() -> Result<Self> {
        let root_dir = resolve_root_dir();
        let mut config = Self::with_root(root_dir);
        config.log_dir = resolve_log_dir(&config.root_dir);

        if let Some(value) = env_string("ROSTRAP_MIRRORS") {
            config.mirrors = parse_mirror_list(&value);
            if config.mirrors.is_empty() {
                return Err(BootstrapError::Config(
                    "ROSTRAP_MIRRORS does not name any mirror".to_string(),
                ));
            }
        }
        if let Some(value) = env_string("ROSTRAP_CLIENT_SETTINGS_URL") {
            config.client_settings_url = value;
        }
        if let Some(secs) = env_parse::<u64>("ROSTRAP_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(retries) = env_parse::<usize>("ROSTRAP_NETWORK_RETRIES")? {
            config.network_retries = retries;
        }
        if let Some(attempts) = env_parse::<usize>("ROSTRAP_PIPELINE_ATTEMPTS")? {
            config.pipeline_attempts = attempts.max(1);
        }
        if let Some(ms) = env_parse::<u64>("ROSTRAP_READY_GRACE_MS")? {
            config.ready_grace = Duration::from_millis(ms);
        }
        config.icon_path = env_string("ROSTRAP_ICON_PATH").map(PathBuf::from);

        Ok(config)
    }

    /// Defaults laid out under `root_dir`, ignoring the environment.
    pub fn with_root(root_dir: PathBuf) -> Self {
        Self {
            data_dir: resolve_data_dir(&root_dir),
            versions_dir: resolve_versions_dir(&root_dir),
            downloads_dir: resolve_downloads_dir(&root_dir),
            log_dir: root_dir.join("logs"),
            mirrors: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            client_settings_url: DEFAULT_CLIENT_SETTINGS_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            network_retries: DEFAULT_NETWORK_RETRIES,
            pipeline_attempts: DEFAULT_PIPELINE_ATTEMPTS,
            ready_grace: Duration::from_millis(DEFAULT_READY_GRACE_MS),
            icon_path: None,
            profile: DistributionProfile::default(),
            root_dir,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("bootstrapper.db")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root_dir.join("bootstrapper.lock")
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env_string(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| BootstrapError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(None),
    }
}

fn parse_mirror_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().trim_end_matches('/'))
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_list_keeps_order_and_drops_blanks() {
        let mirrors = parse_mirror_list(" https://a.example/ ,, https://b.example ,");
        assert_eq!(mirrors, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn archive_path_follows_platform_template() {
        let profile = DistributionProfile::default();
        assert_eq!(
            profile.archive_path("version-abc"),
            "mac/version-abc-RobloxPlayer.zip"
        );
        assert_eq!(
            profile.embedded_bundle_path(),
            PathBuf::from("Contents/MacOS/Roblox.app")
        );
    }

    #[test]
    fn root_layout_uses_defaults() {
        let tmp = tempfile::tempdir().expect("temp root");
        let config = BootstrapConfig::with_root(tmp.path().to_path_buf());
        assert_eq!(config.mirrors.len(), DEFAULT_MIRRORS.len());
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.database_path(), tmp.path().join("config").join("bootstrapper.db"));
        assert_eq!(config.lock_path(), tmp.path().join("bootstrapper.lock"));
    }
}
