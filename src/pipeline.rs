use std::time::Duration;

use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::BootstrapConfig;
use crate::db::queries::InstallRecordQueries;
use crate::db::Database;
use crate::errors::Result;
use crate::models::{DownloadProgress, InstallRecord, ResolvedTarget, VersionInfo};
use crate::services::{
    ApiClient, ClientSettingsService, DownloadControl, Downloader, IconBrander, Installer,
    LaunchArguments, LaunchRequestReceiver, LaunchRequestSlot, LaunchedProcess, MirrorSelector,
    Overrides, ProcessSupervisor, ProgressSink,
};

const PIPELINE_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct BootstrapOutcome {
    pub record: InstallRecord,
    pub launched: LaunchedProcess,
}

/// Owns every stage of one update-then-launch run.
#[derive(Clone)]
pub struct Bootstrapper {
    config: BootstrapConfig,
    db: Database,
    settings: ClientSettingsService,
    mirrors: MirrorSelector,
    downloader: Downloader,
    installer: Installer,
    supervisor: ProcessSupervisor,
}

impl Bootstrapper {
    pub fn new(config: BootstrapConfig, db: Database) -> Result<Self> {
        let api = ApiClient::new(
            config.client_settings_url.clone(),
            config.request_timeout,
            config.network_retries,
        )?;
        let settings = ClientSettingsService::new(api, config.profile.binary_type.clone());
        let mirrors = MirrorSelector::new(config.mirrors.clone(), config.request_timeout)?;
        let downloader = Downloader::new(
            config.downloads_dir.clone(),
            config.profile.clone(),
            config.request_timeout,
            config.network_retries,
        )?;
        let installer = Installer::new(
            config.versions_dir.clone(),
            config.profile.clone(),
            IconBrander::new(config.icon_path.clone()),
        );
        let supervisor = ProcessSupervisor::new(config.ready_grace);

        Ok(Self {
            config,
            db,
            settings,
            mirrors,
            downloader,
            installer,
            supervisor,
        })
    }

    /// Updates if needed, then launches with whatever arrives in the launch slot.
    pub async fn run(
        &self,
        launch_request: LaunchRequestReceiver,
        control: watch::Receiver<DownloadControl>,
    ) -> Result<BootstrapOutcome> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("bootstrap", %run_id);

        async move {
            let record = self.update(control).await?;
            let args = LaunchRequestSlot::wait(launch_request).await?;
            let launched = self.launch(&record, &args).await?;
            Ok(BootstrapOutcome { record, launched })
        }
        .instrument(span)
        .await
    }

    /// Brings the install up to date, rerunning the whole stage on recoverable failures.
    pub async fn update(&self, control: watch::Receiver<DownloadControl>) -> Result<InstallRecord> {
        let attempts = self.config.pipeline_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.update_once(control.clone()).await {
                Ok(record) => return Ok(record),
                Err(err) if err.is_recoverable() && attempt < attempts => {
                    tracing::warn!(
                        "update attempt {}/{} failed: {}; retrying",
                        attempt,
                        attempts,
                        err
                    );
                    attempt += 1;
                    tokio::time::sleep(PIPELINE_RETRY_DELAY).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn update_once(&self, control: watch::Receiver<DownloadControl>) -> Result<InstallRecord> {
        let current = self.db.get_install_record()?;
        let overrides = Overrides {
            version: self.db.get_version_override()?,
            channel: self.db.get_channel_override()?,
        };

        let target = self
            .settings
            .resolve(&overrides, &self.config.versions_dir)
            .await?;
        tracing::info!("target version {}", target.version_id());

        match target {
            ResolvedTarget::Installed(record) => {
                if current.as_ref() != Some(&record) {
                    self.db.save_install_record(&record)?;
                }
                Ok(record)
            }
            ResolvedTarget::Remote { version, .. } => {
                if let Some(record) = current.filter(|record| {
                    record.is_version(&version.client_version_upload)
                        && record.install_path.is_dir()
                }) {
                    tracing::info!("{} is up to date", record.installed_version_id);
                    return Ok(record);
                }
                self.install_remote(&version, control).await
            }
        }
    }

    async fn install_remote(
        &self,
        version: &VersionInfo,
        control: watch::Receiver<DownloadControl>,
    ) -> Result<InstallRecord> {
        let mirror = self.mirrors.select().await?;

        let (sink, progress) = ProgressSink::channel();
        let reporter = tokio::spawn(report_progress(progress));
        let downloaded = self.downloader.download(&mirror, version, &sink, control).await;
        drop(sink);
        let _ = reporter.await;
        let archive = downloaded?;

        let installed = self
            .installer
            .install(&archive, &version.client_version_upload)
            .await?;
        self.db.save_install_record(&installed.record)?;
        tracing::info!(
            "recorded {} at {}{}",
            installed.record.installed_version_id,
            installed.record.install_path.display(),
            if installed.freshly_extracted { "" } else { " (already present)" }
        );

        if let Err(err) = tokio::fs::remove_file(&archive).await {
            tracing::warn!("could not remove {}: {}", archive.display(), err);
        }
        Ok(installed.record)
    }

    pub async fn launch(
        &self,
        record: &InstallRecord,
        args: &LaunchArguments,
    ) -> Result<LaunchedProcess> {
        let executable = record.executable(&self.config.profile.executable);
        if args.is_empty() {
            tracing::info!("no launch request; starting player without arguments");
        }
        self.supervisor.launch(&executable, &args.to_argv()).await
    }
}

async fn report_progress(mut progress: watch::Receiver<DownloadProgress>) {
    let mut reported = 0u8;
    while progress.changed().await.is_ok() {
        let current = *progress.borrow_and_update();
        let decile = (current.fraction * 10.0).floor() as u8;
        if decile > reported {
            reported = decile;
            match current.total_bytes {
                Some(total) => tracing::info!(
                    "download {}% ({}/{} bytes)",
                    u32::from(decile) * 10,
                    current.downloaded_bytes,
                    total
                ),
                None => tracing::info!(
                    "download {}% ({} bytes)",
                    u32::from(decile) * 10,
                    current.downloaded_bytes
                ),
            }
        }
    }
}
