use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use crate::errors::{BootstrapError, Result};

/// Entry paths inside archives must stay below the extraction root.
pub fn is_safe_relative_path(path: &Path) -> bool {
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => return false,
            _ => {}
        }
    }
    true
}

/// A version id names exactly one directory entry under the versions root.
pub fn validate_version_id(version_id: &str) -> Result<()> {
    let path = Path::new(version_id);
    let single_component = path.components().count() == 1;
    if version_id.trim().is_empty() || !single_component || !is_safe_relative_path(path) {
        return Err(BootstrapError::FileSystem(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid version id {version_id:?}"),
        )));
    }
    Ok(())
}

#[cfg(unix)]
const S_IFMT: u32 = 0o170000;
#[cfg(unix)]
const S_IFLNK: u32 = 0o120000;

/// Whether a link stored at `link` (relative to the extraction root) pointing at `target`
/// stays inside the root once resolved lexically.
pub fn is_contained_link_target(link: &Path, target: &Path) -> bool {
    let mut depth: usize = link
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .count()
        })
        .unwrap_or(0);
    for component in target.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return false,
            Component::ParentDir => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
        }
    }
    true
}

/// Extracts every entry of `archive_path` under `dest`, keeping permission bits and
/// symbolic links on Unix. Returns the number of entries written.
///
/// Links are created only after every regular file is in place, so no write ever passes
/// through a link taken from the archive, and links resolving outside `dest` are skipped.
pub fn extract_zip_archive(archive_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut written = 0usize;
    #[cfg(unix)]
    let mut links: Vec<(PathBuf, String)> = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().replace('\\', "/");
        if name.is_empty() {
            continue;
        }
        let entry_path = PathBuf::from(&name);
        if !is_safe_relative_path(&entry_path) {
            tracing::warn!("skipping archive entry outside extraction root: {}", name);
            continue;
        }
        let out_path = dest.join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        #[cfg(unix)]
        {
            if let Some(mode) = entry.unix_mode() {
                if mode & S_IFMT == S_IFLNK {
                    let mut target = String::new();
                    io::Read::read_to_string(&mut entry, &mut target)?;
                    links.push((entry_path, target));
                    continue;
                }
            }
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&out_path)?;
        io::copy(&mut entry, &mut outfile)?;
        drop(outfile);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }
        written += 1;
    }

    #[cfg(unix)]
    for (link, target) in links {
        if !is_contained_link_target(&link, Path::new(&target)) {
            tracing::warn!(
                "skipping link {} pointing outside extraction root ({})",
                link.display(),
                target
            );
            continue;
        }
        let out_path = dest.join(&link);
        if out_path.symlink_metadata().is_ok() {
            tracing::warn!("skipping link {} over an existing entry", link.display());
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        std::os::unix::fs::symlink(&target, &out_path)?;
        written += 1;
    }

    Ok(written)
}

pub fn dir_size(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += metadata.len();
        }
    }
    Ok(total)
}

/// Removes a file or directory tree; a missing path is not an error.
pub fn remove_path(path: &Path) -> io::Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

#[cfg(test)]
pub mod fixtures {
    use std::io::Write;
    use std::path::Path;

    use zip::write::FileOptions;
    use zip::ZipWriter;

    /// Writes a zip shaped like a player distribution: `{bundle}/Contents/...`.
    pub fn write_bundle_archive(path: &Path, bundle: &str, include_embedded: bool) {
        let file = std::fs::File::create(path).expect("create archive");
        let mut zip = ZipWriter::new(file);
        let dir = FileOptions::default().unix_permissions(0o755);
        let exec = FileOptions::default().unix_permissions(0o755);
        let plain = FileOptions::default().unix_permissions(0o644);

        zip.add_directory(format!("{bundle}/"), dir).expect("bundle dir");
        zip.add_directory(format!("{bundle}/Contents/MacOS/"), dir)
            .expect("macos dir");
        zip.start_file(format!("{bundle}/Contents/Info.plist"), plain)
            .expect("plist entry");
        zip.write_all(b"<plist><dict/></plist>").expect("plist body");
        zip.start_file(format!("{bundle}/Contents/MacOS/RobloxPlayer"), exec)
            .expect("exec entry");
        zip.write_all(b"#!/bin/sh\nexit 0\n").expect("exec body");
        if include_embedded {
            zip.start_file(
                format!("{bundle}/Contents/MacOS/Roblox.app/Contents/MacOS/Roblox"),
                exec,
            )
            .expect("embedded entry");
            zip.write_all(b"#!/bin/sh\nexit 0\n").expect("embedded body");
        }
        zip.finish().expect("finish archive");
    }
}
