//! Configuration loading and command line overrides.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use candela_lib::PipelineConfig;

/// Global options that shape the pipeline configuration.
pub(crate) struct Settings {
    pub(crate) config: Option<PathBuf>,
    pub(crate) target_dir: Option<PathBuf>,
    pub(crate) workers: Option<usize>,
    pub(crate) verbose: u8,
    pub(crate) quiet: bool,
}

impl Settings {
    /// Returns the configuration file in use.
    pub(crate) fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(PipelineConfig::default_path)
    }

    /// Loads the configuration file and applies overrides, without touching
    /// the target directory.
    pub(crate) fn load(&self) -> Result<PipelineConfig> {
        let path = self.config_path();
        let mut config = PipelineConfig::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        if let Some(dir) = &self.target_dir {
            config.target_dir.clone_from(dir);
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        Ok(config)
    }

    /// Loads and validates the configuration, preparing the target directory.
    pub(crate) fn load_validated(&self) -> Result<PipelineConfig> {
        let config = self.load()?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Returns the arguments a worker process needs to see the same
    /// configuration and log level as this process.
    pub(crate) fn worker_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--config".into(), self.config_path().into()];
        if let Some(dir) = &self.target_dir {
            args.push("--target-dir".into());
            args.push(dir.into());
        }
        if let Some(workers) = self.workers {
            args.push("--workers".into());
            args.push(workers.to_string().into());
        }
        if self.quiet {
            args.push("--quiet".into());
        } else if self.verbose > 0 {
            args.push(format!("-{}", "v".repeat(usize::from(self.verbose))).into());
        }
        args
    }
}
