//! Join engine configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Tuning knobs for [`JoinEngine`](crate::JoinEngine).
///
/// Every field is optional in YAML:
///
/// ```yaml
/// parallel_threshold: 10000000
/// workers: 7
/// verify_string_matches: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest problem size (product of operand sizes) solved by flat
    /// broadcast; anything bigger runs on the worker pool.
    pub parallel_threshold: u64,
    /// Worker pool size. Defaults to the hardware concurrency minus one.
    pub workers: Option<usize>,
    /// Re-check String join matches byte by byte.
    pub verify_string_matches: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 10_000_000,
            workers: None,
            verify_string_matches: true,
        }
    }
}

impl EngineConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read a YAML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Effective worker count, at least one.
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get().saturating_sub(1))
                    .unwrap_or(1)
            })
            .max(1)
    }
}
