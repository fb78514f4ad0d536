use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

const PHOTO_PREFIX: &str = "photo_";
const PHOTO_EXTENSION: &str = "jpeg";

/// A captured image held in memory for the duration of one pipeline run
#[derive(Debug, Clone)]
pub struct CapturedPhoto {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Timestamp-derived name with a random suffix so overlapping runs never collide
pub fn photo_file_name(created_at: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}{}_{}.{}",
        PHOTO_PREFIX,
        created_at.format("%Y%m%d_%H%M%S_%3f"),
        &suffix[..8],
        PHOTO_EXTENSION
    )
}

fn is_capture_artifact(name: &str) -> bool {
    name.starts_with(PHOTO_PREFIX) && name.ends_with(PHOTO_EXTENSION)
}

/// Scoped ownership of one temporary capture file.
///
/// [`TempCapture::release`] deletes the file exactly once; if the guard is
/// dropped without being released (a cancelled task), `Drop` removes it.
#[derive(Debug)]
pub struct TempCapture {
    path: PathBuf,
    released: bool,
}

impl TempCapture {
    pub fn new_in(dir: &Path, created_at: DateTime<Utc>) -> Self {
        Self {
            path: dir.join(photo_file_name(created_at)),
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Delete the artifact. Returns `Ok(false)` when nothing was written.
    pub async fn release(mut self) -> io::Result<bool> {
        self.released = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Removed capture artifact {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Drop for TempCapture {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed abandoned capture artifact {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove abandoned capture artifact {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Best-effort removal of capture artifacts left behind by a previous run
pub async fn sweep_capture_dir(dir: &Path) -> io::Result<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !is_capture_artifact(&name.to_string_lossy()) {
            continue;
        }
        match fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(
                "Failed to remove leftover capture {}: {}",
                entry.path().display(),
                e
            ),
        }
    }

    Ok(removed)
}
