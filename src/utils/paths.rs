use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "rostrap";

fn ensure_dir(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        return None;
    }
    if std::fs::create_dir_all(path).is_ok() {
        return Some(path.to_path_buf());
    }
    None
}

fn env_dir(key: &str) -> Option<PathBuf> {
    let value = std::env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    ensure_dir(&PathBuf::from(trimmed))
}

pub fn resolve_root_dir() -> PathBuf {
    if let Some(dir) = env_dir("ROSTRAP_ROOT_DIR") {
        return dir;
    }

    if let Some(data) = dirs::data_dir() {
        if let Some(found) = ensure_dir(&data.join(APP_DIR_NAME)) {
            return found;
        }
    }

    if let Some(local) = dirs::data_local_dir() {
        if let Some(found) = ensure_dir(&local.join(APP_DIR_NAME)) {
            return found;
        }
    }

    PathBuf::from(APP_DIR_NAME)
}

pub fn resolve_data_dir(root: &Path) -> PathBuf {
    let config = root.join("config");
    ensure_dir(&config).unwrap_or_else(|| root.to_path_buf())
}

/// Canonical parent of every installed `{versionId}.app` bundle.
pub fn resolve_versions_dir(root: &Path) -> PathBuf {
    let versions = root.join("versions");
    ensure_dir(&versions).unwrap_or(versions)
}

pub fn resolve_downloads_dir(root: &Path) -> PathBuf {
    let downloads = root.join("downloads");
    if let Some(dir) = ensure_dir(&downloads) {
        return dir;
    }
    std::env::temp_dir().join(APP_DIR_NAME)
}

pub fn resolve_log_dir(root: &Path) -> PathBuf {
    if let Some(dir) = env_dir("ROSTRAP_LOG_DIR") {
        return dir;
    }

    let root_logs = root.join("logs");
    if let Some(found) = ensure_dir(&root_logs) {
        return found;
    }

    if let Some(cache) = dirs::cache_dir() {
        if let Some(found) = ensure_dir(&cache.join(APP_DIR_NAME).join("logs")) {
            return found;
        }
    }

    PathBuf::from("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_dirs_are_created_under_root() {
        let tmp = tempfile::tempdir().expect("temp root");
        let versions = resolve_versions_dir(tmp.path());
        let downloads = resolve_downloads_dir(tmp.path());
        let data = resolve_data_dir(tmp.path());

        assert_eq!(versions, tmp.path().join("versions"));
        assert_eq!(downloads, tmp.path().join("downloads"));
        assert_eq!(data, tmp.path().join("config"));
        assert!(versions.is_dir() && downloads.is_dir() && data.is_dir());
    }

    #[test]
    fn empty_path_is_never_created() {
        assert!(ensure_dir(Path::new("")).is_none());
    }
}
