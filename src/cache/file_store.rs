use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::cache::store::{Store, StoreError};
use crate::helpers::merge::unique_id;

const TMP_SUFFIX_LEN: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    deadline: DateTime<Utc>,
}

/// Directory-backed store, one file per key.
///
/// Writes go to a temp file with `0600` permissions which is then renamed
/// over the target, so readers in other processes never see a torn entry.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl Store for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: FileEntry = serde_json::from_str(&raw)?;
        if Utc::now() < entry.deadline {
            Ok(Some(entry.value))
        } else {
            debug!("file store: entry at {} is past its deadline", path.display());
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Unavailable(format!("ttl out of range: {}", e)))?;
        let entry = FileEntry { value, deadline: Utc::now() + ttl };
        let content = serde_json::to_vec(&entry)?;

        let dir = self.dir.clone();
        let path = self.path_for(key);
        // one blocking task: once started, the write and rename finish together
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &content))
            .await
            .map_err(|e| StoreError::Unavailable(format!("file store writer failed: {}", e)))?
    }
}

fn write_atomic(dir: &Path, path: &Path, content: &[u8]) -> Result<(), StoreError> {
    std::fs::create_dir_all(dir)?;
    let tmp = path.with_extension(format!("{}.tmp", unique_id(TMP_SUFFIX_LEN)));
    let written = std::fs::write(&tmp, content).and_then(|_| {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, path)
    });
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
