use std::path::Path;

use crate::errors::Result;
use crate::models::{Channel, InstallRecord, ResolvedTarget, UserChannelResponse, VersionInfo};
use crate::services::ApiClient;
use crate::utils::file::validate_version_id;

/// Local pins read from the settings store.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub version: Option<String>,
    pub channel: Option<Channel>,
}

/// Channel assignment and version metadata from the client settings API.
#[derive(Clone)]
pub struct ClientSettingsService {
    api: ApiClient,
    binary_type: String,
}

impl ClientSettingsService {
    pub fn new(api: ApiClient, binary_type: impl Into<String>) -> Self {
        Self {
            api,
            binary_type: binary_type.into(),
        }
    }

    pub async fn user_channel(&self) -> Result<Channel> {
        let response: UserChannelResponse = self
            .api
            .get(&format!(
                "v2/user-channel?binaryType={}",
                urlencoding::encode(&self.binary_type)
            ))
            .await?;
        if response.channel_name.trim().is_empty() {
            tracing::warn!("server assigned an empty channel; using {}", Channel::live());
            return Ok(Channel::live());
        }
        Ok(Channel::new(response.channel_name))
    }

    pub async fn client_version(&self, channel: &Channel) -> Result<VersionInfo> {
        self.api
            .get(&format!(
                "v2/client-version/{}/channel/{}",
                urlencoding::encode(&self.binary_type),
                urlencoding::encode(&channel.path_segment())
            ))
            .await
    }

    /// Decides what to run: an installed pinned version short-circuits the network,
    /// a pinned version not yet on disk is fetched by id, otherwise the channel decides.
    pub async fn resolve(&self, overrides: &Overrides, versions_dir: &Path) -> Result<ResolvedTarget> {
        if let Some(version_id) = overrides.version.as_deref() {
            validate_version_id(version_id)?;
            let bundle = versions_dir.join(format!("{version_id}.app"));
            if bundle.is_dir() {
                tracing::info!("version pinned to {} (already installed)", version_id);
                return Ok(ResolvedTarget::Installed(InstallRecord::new(version_id, bundle)));
            }
            tracing::info!("version pinned to {} (not installed yet)", version_id);
            return Ok(ResolvedTarget::Remote {
                channel: None,
                version: VersionInfo::pinned(version_id),
            });
        }

        let channel = match overrides.channel.clone() {
            Some(channel) => {
                tracing::info!("channel overridden to {}", channel);
                channel
            }
            None => {
                let channel = self.user_channel().await?;
                tracing::info!("server assigned channel {}", channel);
                channel
            }
        };

        let version = self.client_version(&channel).await?;
        tracing::info!(
            "channel {} is at {} ({})",
            channel,
            version.version,
            version.client_version_upload
        );
        Ok(ResolvedTarget::Remote {
            channel: Some(channel),
            version,
        })
    }
}
