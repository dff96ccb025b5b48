//! On-disk layout of the target directory.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use candela_types::{Symbol, Timeframe};

use crate::{StagedFile, StoreError};

const CANDLES_DIR: &str = "candles";
const CHECKPOINTS_DIR: &str = "checkpoints";

/// A (symbol, timeframe) pair: one candle file and one checkpoint.
pub type SeriesKey = (Symbol, Timeframe);

/// Paths of every file the pipeline owns under a target directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Creates a layout rooted at `root`. Nothing is touched on disk.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the target directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the candle files of a symbol.
    #[must_use]
    pub fn candle_dir(&self, symbol: &Symbol) -> PathBuf {
        self.root.join(CANDLES_DIR).join(symbol.as_str())
    }

    /// Candle file of a series.
    #[must_use]
    pub fn candle_path(&self, symbol: &Symbol, timeframe: Timeframe) -> PathBuf {
        self.candle_dir(symbol).join(format!("{timeframe}.csv"))
    }

    /// Directory holding the checkpoints of a symbol.
    #[must_use]
    pub fn checkpoint_dir(&self, symbol: &Symbol) -> PathBuf {
        self.root.join(CHECKPOINTS_DIR).join(symbol.as_str())
    }

    /// Checkpoint record of a series.
    #[must_use]
    pub fn checkpoint_path(&self, symbol: &Symbol, timeframe: Timeframe) -> PathBuf {
        self.checkpoint_dir(symbol).join(format!("{timeframe}.json"))
    }

    /// Creates the directory tree and proves it is writable by staging and
    /// discarding a probe file.
    ///
    /// # Errors
    ///
    /// Returns an error if the target directory cannot be created or written.
    pub fn ensure_writable(&self) -> Result<(), StoreError> {
        for dir in [self.root.join(CANDLES_DIR), self.root.join(CHECKPOINTS_DIR)] {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        let probe = self.root.join("probe");
        StagedFile::create(&probe, |w| {
            w.write_all(b"candela").map_err(|e| StoreError::io(&probe, e))
        })?
        .discard();
        Ok(())
    }

    /// Lists every series that has a candle file or a checkpoint.
    ///
    /// Entries whose names are not a valid symbol or timeframe are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory exists but cannot be listed.
    pub fn series(&self) -> Result<Vec<SeriesKey>, StoreError> {
        let mut found = BTreeSet::new();
        for (dir, ext) in [(CANDLES_DIR, "csv"), (CHECKPOINTS_DIR, "json")] {
            let base = self.root.join(dir);
            for symbol_dir in list_dir(&base)? {
                let Some(symbol) = file_name(&symbol_dir).and_then(|n| Symbol::new(&n).ok())
                else {
                    continue;
                };
                for file in list_dir(&symbol_dir)? {
                    if file.extension().and_then(|e| e.to_str()) != Some(ext) {
                        continue;
                    }
                    let timeframe = file
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(|s| s.parse::<Timeframe>().ok());
                    if let Some(timeframe) = timeframe {
                        found.insert((symbol.clone(), timeframe));
                    }
                }
            }
        }
        Ok(found.into_iter().collect())
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.map(|e| e.path()).map_err(|err| StoreError::io(dir, err)))
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(StoreError::io(dir, e)),
    }
}
