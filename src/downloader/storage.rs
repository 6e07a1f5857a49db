// Temporary file storage
//
// Every download is written into its own `<downloads_dir>/<uuid>/` directory.
// The registry maps the client-facing filename to the produced files in
// completion order. Retrieval with the request token takes that exact file;
// without one it takes the oldest. The guard deletes the file (plus its
// directory) when dropped.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
struct PendingFile {
    request_id: Uuid,
    path: PathBuf,
    request_dir: PathBuf,
}

/// Filename -> produced files awaiting retrieval
#[derive(Debug, Default)]
pub struct PendingDownloads {
    inner: Mutex<HashMap<String, VecDeque<PendingFile>>>,
}

impl PendingDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished file under its client filename
    pub fn register(&self, filename: &str, request_id: Uuid, path: PathBuf, request_dir: PathBuf) {
        self.inner
            .lock()
            .entry(filename.to_string())
            .or_default()
            .push_back(PendingFile {
                request_id,
                path,
                request_dir,
            });
    }

    /// Take ownership of a file registered under `filename`.
    ///
    /// With a token only the file of that request matches; without one the
    /// oldest file is handed over.
    pub fn take(&self, filename: &str, token: Option<Uuid>) -> Option<TempFileGuard> {
        let mut inner = self.inner.lock();
        let queue = inner.get_mut(filename)?;
        let file = match token {
            Some(id) => {
                let pos = queue.iter().position(|f| f.request_id == id)?;
                queue.remove(pos)
            }
            None => queue.pop_front(),
        };
        if queue.is_empty() {
            inner.remove(filename);
        }
        file.map(|f| TempFileGuard::new(f.path, Some(f.request_dir)))
    }

    /// Number of files awaiting retrieval
    pub fn len(&self) -> usize {
        self.inner.lock().values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deletes a served file and its request directory when dropped
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
    request_dir: Option<PathBuf>,
}

impl TempFileGuard {
    pub fn new(path: PathBuf, request_dir: Option<PathBuf>) -> Self {
        Self { path, request_dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), "Failed to delete served file: {}", e);
            }
        }
        if let Some(dir) = &self.request_dir {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(dir = %dir.display(), "Failed to delete request directory: {}", e);
                }
            }
        }
        debug!(path = %self.path.display(), "Temporary file removed");
    }
}

/// Remove request directories left over from a previous run.
///
/// Only UUID-named directories are touched. Returns how many were removed.
pub fn purge_stale(root: &Path) -> io::Result<usize> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let is_request_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
            && entry
                .file_name()
                .to_str()
                .map_or(false, |name| Uuid::parse_str(name).is_ok());
        if !is_request_dir {
            continue;
        }
        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(dir = %entry.path().display(), "Failed to purge stale download: {}", e),
        }
    }
    Ok(removed)
}
