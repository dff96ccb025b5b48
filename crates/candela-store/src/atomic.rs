//! Write-temp-then-rename file replacement.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::StoreError;

const TEMP_SUFFIX: &str = ".tmp";

/// A fully written, durable temporary file waiting to replace its target.
///
/// Nothing is visible at the target path until [`publish`](Self::publish).
/// A staged file that is never published leaves the target untouched; the
/// temporary file is removed by [`discard`](Self::discard) or by the next
/// [`sweep_temp_files`] of its directory.
#[derive(Debug)]
pub struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
}

impl StagedFile {
    /// Writes a temporary file next to `target` and forces it to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, or if writing or
    /// syncing fails. The temporary file is removed in that case.
    pub fn create<F>(target: &Path, write: F) -> Result<Self, StoreError>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<(), StoreError>,
    {
        let dir = parent_dir(target);
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = dir.join(format!(".{file_name}.{}{TEMP_SUFFIX}", uuid::Uuid::new_v4()));

        let result = write_durably(&temp, write);
        if let Err(e) = result {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// Returns the temporary file path.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Returns the path the file will be published to.
    #[must_use]
    pub fn target_path(&self) -> &Path {
        &self.target
    }

    /// Atomically renames the temporary file over the target and syncs the
    /// directory entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails; the target is unchanged then.
    pub fn publish(self) -> Result<PathBuf, StoreError> {
        if let Err(e) = fs::rename(&self.temp, &self.target) {
            let _ = fs::remove_file(&self.temp);
            return Err(StoreError::io(&self.target, e));
        }
        sync_dir(parent_dir(&self.target))?;
        Ok(self.target)
    }

    /// Removes the temporary file without touching the target.
    pub fn discard(self) {
        let _ = fs::remove_file(&self.temp);
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn write_durably<F>(temp: &Path, write: F) -> Result<(), StoreError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), StoreError>,
{
    let file = File::create_new(temp).map_err(|e| StoreError::io(temp, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush().map_err(|e| StoreError::io(temp, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| StoreError::io(temp, e.into_error()))?;
    file.sync_all().map_err(|e| StoreError::io(temp, e))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| StoreError::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

/// Removes temporary files left in `dir` by writers that never published.
///
/// Must only run while no writer is active in `dir`. Returns the number of
/// files removed; a missing directory counts as clean.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or a file cannot be
/// removed.
pub fn sweep_temp_files(dir: &Path) -> Result<usize, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StoreError::io(dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, e))?;
        let name = entry.file_name();
        if is_temp_file(&name.to_string_lossy()) {
            let path = entry.path();
            fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;
            tracing::debug!(path = %path.display(), "removed stale temporary file");
            removed += 1;
        }
    }
    Ok(removed)
}
