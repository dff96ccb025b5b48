//! Log output setup.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set. Otherwise `-q` shows warnings only, no flag
/// adds cycle progress, and each `-v` raises everything one level.
pub(crate) fn init(verbose: u8, quiet: bool) {
    let directives = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "warn,candela=info,candela_pipeline=info",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 1)
        .init();
}
