//! Strata logging bootstrap.
//!
//! Library crates only emit `tracing` events; applications pick one of the
//! subscribers installed here.
#![deny(missing_docs)]

use std::path::Path;

use anyhow::Result;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

/// Handle for changing the level filter after [`init`].
pub type ReloadHandle = reload::Handle<EnvFilter, Registry>;

/// Structured JSON logging into hourly rolling files under `dir`, with the
/// level filter reloadable at runtime.
///
/// Keep the returned guard alive: dropping it flushes and stops the
/// background writer.
pub fn init(dir: impl AsRef<Path>, level: Level) -> Result<(ReloadHandle, WorkerGuard)> {
    let appender = RollingFileAppender::new(Rotation::HOURLY, dir, "strata.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let (filter, handle) = reload::Layer::new(level_filter(level));
    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .json()
        .with_current_span(false)
        .with_span_list(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;
    Ok((handle, guard))
}

/// Replace the level filter installed by [`init`].
pub fn set_level(handle: &ReloadHandle, level: Level) -> Result<()> {
    handle.reload(level_filter(level))?;
    Ok(())
}

/// Compact human-readable logging to stderr, filtered by an `EnvFilter`
/// directive string such as `"strata_frame=debug,info"`.
pub fn init_stderr(directives: &str) -> Result<()> {
    let filter = EnvFilter::try_new(directives)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::default().add_directive(level.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test: the global subscriber can only be installed once per process.
    #[test]
    fn json_file_logging_with_reload() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, guard) = init(dir.path(), Level::INFO).unwrap();
        tracing::info!(rows = 3, "kept entry");
        tracing::debug!("dropped entry");
        set_level(&handle, Level::WARN).unwrap();
        tracing::info!("filtered entry");
        tracing::warn!("warned entry");
        drop(guard);

        let mut content = String::new();
        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let path = entry.unwrap().path();
            assert!(path.file_name().unwrap().to_string_lossy().starts_with("strata.log"));
            content.push_str(&std::fs::read_to_string(path).unwrap());
        }
        assert!(content.contains("\"message\":\"kept entry\""));
        assert!(content.contains("\"rows\":3"));
        assert!(content.contains("warned entry"));
        assert!(!content.contains("dropped entry"));
        assert!(!content.contains("filtered entry"));

        assert!(init(dir.path(), Level::INFO).is_err());
        assert!(init_stderr("info").is_err());
        assert!(init_stderr("strata_frame=verbose").is_err());
    }
}
