//! Token file storage
//!
//! Persists the single `TokenRecord` as a JSON object at a fixed path. The
//! token manager is the sole writer; every save is a wholesale overwrite
//! using atomic temp-file + rename so a crash mid-write cannot leave a
//! corrupted record behind.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::record::TokenRecord;

/// Handle to the persisted token record.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted record. `Ok(None)` means no authorization flow has
    /// completed yet (the file does not exist).
    pub async fn load(&self) -> Result<Option<TokenRecord>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let record: TokenRecord = serde_json::from_str(&contents)
                    .map_err(|e| Error::TokenParse(format!("parsing token file: {e}")))?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(format!("reading token file: {e}"))),
        }
    }

    /// Overwrite the persisted record.
    ///
    /// Writes to a temporary file in the same directory, then renames it over
    /// the target. File permissions are set to 0600 since the file contains
    /// live OAuth tokens.
    pub async fn save(&self, record: &TokenRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| Error::TokenParse(format!("serializing token record: {e}")))?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

        tokio::fs::write(&tmp_path, json.as_bytes())
            .await
            .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&tmp_path, perms)
                .await
                .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
        }

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

        debug!(path = %self.path.display(), "persisted token record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record(suffix: &str) -> TokenRecord {
        TokenRecord {
            access_token: format!("at_{suffix}"),
            refresh_token: format!("rt_{suffix}"),
            access_expires_at: 1_701_209_600,
            refresh_expires_at: 1_707_776_000,
        }
    }

    #[tokio::test]
    async fn load_returns_none_when_no_record_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));

        store.save(&test_record("1")).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, test_record("1"));
    }

    #[tokio::test]
    async fn save_overwrites_prior_record_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));

        store.save(&test_record("old")).await.unwrap();
        store.save(&test_record("new")).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "at_new");
        assert_eq!(loaded.refresh_token, "rt_new");

        // No versioned or appended state, just the one record
        let contents = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert!(!contents.contains("at_old"));
    }

    #[tokio::test]
    async fn corrupted_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let store = TokenStore::new(path);
        let result = store.load().await;
        assert!(matches!(result, Err(Error::TokenParse(_))), "got {result:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        store.save(&test_record("1")).await.unwrap();

        let metadata = tokio::fs::metadata(store.path()).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "token file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn no_temp_file_left_behind_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("tokens.json"));
        store.save(&test_record("1")).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["tokens.json"]);
    }
}
