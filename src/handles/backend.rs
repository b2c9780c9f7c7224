use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::{HandleError, HandleResult};
use crate::reference::Blob;

const PREVIEW_PREFIX: &str = "preview_";
const FILE_SCHEME: &str = "file://";
const DEFAULT_OBJECT_URL_ORIGIN: &str = "http://localhost";

/// Mints and revokes the URIs behind preview handles.
pub trait HandleBackend {
    fn create(&mut self, id: u64, blob: &Blob) -> HandleResult<String>;
    /// Revoking an unknown or already revoked URI must succeed.
    fn revoke(&mut self, uri: &str) -> HandleResult<()>;
}

/// Object-URL style handles with no backing storage.
#[derive(Debug, Clone)]
pub struct ObjectUrlBackend {
    origin: String,
}

impl ObjectUrlBackend {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for ObjectUrlBackend {
    fn default() -> Self {
        Self::new(DEFAULT_OBJECT_URL_ORIGIN)
    }
}

impl HandleBackend for ObjectUrlBackend {
    fn create(&mut self, id: u64, _blob: &Blob) -> HandleResult<String> {
        Ok(format!("blob:{}/preview-{id}", self.origin))
    }

    fn revoke(&mut self, _uri: &str) -> HandleResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct PruneReport {
    pub removed_files: usize,
}

/// Writes each blob to `<dir>/preview_<id>.<ext>` and hands out `file://` URIs.
#[derive(Debug, Clone)]
pub struct TempFileBackend {
    dir: PathBuf,
}

impl TempFileBackend {
    pub fn new(dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: u64, blob: &Blob) -> PathBuf {
        self.dir
            .join(format!("{PREVIEW_PREFIX}{id}.{}", blob.extension()))
    }

    pub fn prune_stale(&self, max_age_hours: u64) -> io::Result<PruneReport> {
        let now = SystemTime::now();
        let mut report = PruneReport::default();
        let max_age = Duration::from_secs(max_age_hours.saturating_mul(60 * 60));

        if !self.dir.exists() {
            return Ok(report);
        }

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path
                .file_name()
                .and_then(|name| name.to_str())
                .is_none_or(|name| !name.starts_with(PREVIEW_PREFIX))
            {
                continue;
            }

            let modified = fs::metadata(&path)?.modified()?;
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age > max_age {
                match fs::remove_file(&path) {
                    Ok(()) => report.removed_files += 1,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), ?err, "failed to remove stale preview file");
                    }
                }
            }
        }

        Ok(report)
    }
}

impl HandleBackend for TempFileBackend {
    fn create(&mut self, id: u64, blob: &Blob) -> HandleResult<String> {
        let path = self.path_for(id, blob);
        fs::write(&path, blob.bytes()).map_err(|source| HandleError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(format!("{FILE_SCHEME}{}", path.display()))
    }

    fn revoke(&mut self, uri: &str) -> HandleResult<()> {
        let Some(path) = uri.strip_prefix(FILE_SCHEME).map(PathBuf::from) else {
            return Ok(());
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(HandleError::Remove { path, source }),
        }
    }
}
