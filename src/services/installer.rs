use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::DistributionProfile;
use crate::errors::{BootstrapError, Result};
use crate::models::InstallRecord;
use crate::services::IconBrander;
use crate::utils::file::{dir_size, extract_zip_archive, remove_path, validate_version_id};

#[derive(Clone, Debug)]
pub struct InstalledBundle {
    pub record: InstallRecord,
    /// False when the bundle was already present and the archive was never opened.
    pub freshly_extracted: bool,
}

/// Turns a downloaded archive into `{versions_dir}/{versionId}.app`.
///
/// Extraction happens in a private staging directory next to the canonical location and
/// the bundle becomes visible through a single rename, so a crash at any earlier point
/// leaves the canonical namespace untouched.
#[derive(Clone)]
pub struct Installer {
    versions_dir: PathBuf,
    profile: DistributionProfile,
    brander: IconBrander,
}

impl Installer {
    pub fn new(versions_dir: PathBuf, profile: DistributionProfile, brander: IconBrander) -> Self {
        Self {
            versions_dir,
            profile,
            brander,
        }
    }

    pub fn target_dir(&self, version_id: &str) -> PathBuf {
        self.versions_dir.join(format!("{version_id}.app"))
    }

    #[cfg(test)]
    pub fn is_installed(&self, version_id: &str) -> bool {
        self.target_dir(version_id).is_dir()
    }

    pub async fn install(&self, archive: &Path, version_id: &str) -> Result<InstalledBundle> {
        validate_version_id(version_id)?;
        let this = self.clone();
        let archive = archive.to_path_buf();
        let version_id = version_id.to_string();
        tokio::task::spawn_blocking(move || this.install_blocking(&archive, &version_id))
            .await
            .map_err(install_task_failed)?
    }

    fn install_blocking(&self, archive: &Path, version_id: &str) -> Result<InstalledBundle> {
        fs::create_dir_all(&self.versions_dir)?;
        let target = self.target_dir(version_id);

        if target.is_dir() {
            tracing::info!("{} already installed at {}", version_id, target.display());
            return Ok(InstalledBundle {
                record: InstallRecord::new(version_id, target),
                freshly_extracted: false,
            });
        }

        // Same filesystem as the target so the commit below is a plain rename.
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.versions_dir)?;
        let files = extract_zip_archive(archive, staging.path())?;
        tracing::info!("extracted {} files from {}", files, archive.display());

        let staged_bundle = staging.path().join(&self.profile.bundle_name);
        if !staged_bundle.is_dir() {
            return Err(BootstrapError::FileSystem(io::Error::new(
                io::ErrorKind::NotFound,
                format!("archive does not contain {}", self.profile.bundle_name),
            )));
        }

        let embedded = staged_bundle.join(self.profile.embedded_bundle_path());
        if remove_path(&embedded)? {
            tracing::info!("removed embedded {}", self.profile.embedded_bundle);
        } else {
            tracing::debug!("no embedded {} to remove", self.profile.embedded_bundle);
        }

        commit(&staged_bundle, &target)?;
        drop(staging);

        if let Err(err) = self.brander.apply(&target) {
            tracing::warn!("could not brand {}: {}", target.display(), err);
        }

        match dir_size(&target) {
            Ok(bytes) => tracing::info!("installed {} ({} bytes)", target.display(), bytes),
            Err(_) => tracing::info!("installed {}", target.display()),
        }

        Ok(InstalledBundle {
            record: InstallRecord::new(version_id, target),
            freshly_extracted: true,
        })
    }
}

fn commit(staged: &Path, target: &Path) -> Result<()> {
    match fs::rename(staged, target) {
        Ok(()) => Ok(()),
        // Another bootstrapper committed the same version first; its copy is complete.
        Err(err) if target.is_dir() => {
            tracing::warn!("{} appeared during install ({}); keeping it", target.display(), err);
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn install_task_failed(err: tokio::task::JoinError) -> BootstrapError {
    BootstrapError::FileSystem(io::Error::other(format!("install task failed: {err}")))
}
