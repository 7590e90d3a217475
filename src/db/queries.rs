use std::path::PathBuf;

use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::errors::Result;
use crate::models::{Channel, InstallRecord};

pub const INSTALLED_VERSION_KEY: &str = "InstalledVersion";
pub const INSTALLED_PATH_KEY: &str = "InstalledPath";
pub const VERSION_OVERRIDE_KEY: &str = "VersionOverride";
pub const CHANNEL_OVERRIDE_KEY: &str = "ChannelOverride";

pub trait SettingsQueries {
    fn set_setting(&self, key: &str, value: &str) -> Result<()>;
    fn get_setting(&self, key: &str) -> Result<Option<String>>;
    #[cfg(test)]
    fn delete_setting(&self, key: &str) -> Result<()>;
}

pub trait InstallRecordQueries {
    fn get_install_record(&self) -> Result<Option<InstallRecord>>;
    fn save_install_record(&self, record: &InstallRecord) -> Result<()>;
    fn get_version_override(&self) -> Result<Option<String>>;
    fn get_channel_override(&self) -> Result<Option<Channel>>;
}

impl SettingsQueries for Database {
    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.connection()?;
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    #[cfg(test)]
    fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl InstallRecordQueries for Database {
    fn get_install_record(&self) -> Result<Option<InstallRecord>> {
        let version = non_blank(self.get_setting(INSTALLED_VERSION_KEY)?);
        let path = non_blank(self.get_setting(INSTALLED_PATH_KEY)?);
        match (version, path) {
            (Some(version), Some(path)) => Ok(Some(InstallRecord::new(version, PathBuf::from(path)))),
            (None, None) => Ok(None),
            _ => {
                tracing::warn!("install record is half written; treating it as absent");
                Ok(None)
            }
        }
    }

    /// Both keys change together or not at all.
    fn save_install_record(&self, record: &InstallRecord) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().timestamp();
        tx.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![INSTALLED_VERSION_KEY, record.installed_version_id, now],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![
                INSTALLED_PATH_KEY,
                record.install_path.to_string_lossy().to_string(),
                now
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_version_override(&self) -> Result<Option<String>> {
        Ok(non_blank(self.get_setting(VERSION_OVERRIDE_KEY)?))
    }

    fn get_channel_override(&self) -> Result<Option<Channel>> {
        Ok(non_blank(self.get_setting(CHANNEL_OVERRIDE_KEY)?).map(Channel::new))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_and_delete() {
        let db = Database::in_memory().expect("in-memory db");
        db.set_setting("k", "v1").expect("set");
        db.set_setting("k", "v2").expect("overwrite");
        assert_eq!(db.get_setting("k").expect("get").as_deref(), Some("v2"));
        db.delete_setting("k").expect("delete");
        assert!(db.get_setting("k").expect("get").is_none());
    }

    #[test]
    fn install_record_is_absent_until_saved() {
        let db = Database::in_memory().expect("in-memory db");
        assert!(db.get_install_record().expect("read").is_none());

        let record = InstallRecord::new("version-1", "/tmp/versions/version-1.app");
        db.save_install_record(&record).expect("save");
        assert_eq!(db.get_install_record().expect("read"), Some(record));
    }

    #[test]
    fn half_written_record_reads_as_absent() {
        let db = Database::in_memory().expect("in-memory db");
        db.set_setting(INSTALLED_VERSION_KEY, "version-1").expect("set");
        assert!(db.get_install_record().expect("read").is_none());
    }

    #[test]
    fn overrides_ignore_blank_values() {
        let db = Database::in_memory().expect("in-memory db");
        db.set_setting(VERSION_OVERRIDE_KEY, "  ").expect("set");
        db.set_setting(CHANNEL_OVERRIDE_KEY, "ZCanary").expect("set");
        assert!(db.get_version_override().expect("read").is_none());
        assert_eq!(
            db.get_channel_override().expect("read"),
            Some(Channel::new("zcanary"))
        );
    }

    #[test]
    fn database_file_is_created_with_schema() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let path = tmp.path().join("config").join("bootstrapper.db");
        let db = crate::db::init(&path).expect("init db");
        db.set_setting(VERSION_OVERRIDE_KEY, "version-pinned").expect("set");
        drop(db);

        let reopened = crate::db::init(&path).expect("reopen db");
        assert_eq!(
            reopened.get_version_override().expect("read").as_deref(),
            Some("version-pinned")
        );
    }
}
