//! Configuration system.
//!
//! Loads cache configuration from JSON strings (file IO left to the app).

use serde::{Deserialize, Serialize};

/// Settings shared by every resource manager of a [`CanvasResources`](crate::canvas::CanvasResources).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Sweep expired entries when an insert finds the map at least this
    /// large. `0` disables sweeping; stale entries are then only replaced
    /// on lookup.
    #[serde(default = "default_prune_threshold")]
    pub prune_threshold: usize,
    /// Wrap interop handles with the strict entry point, so a native
    /// resource that already has a live wrapper is reported as an error
    /// instead of returning the existing wrapper.
    #[serde(default)]
    pub strict_interop: bool,
}

fn default_prune_threshold() -> usize {
    256
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prune_threshold: default_prune_threshold(),
            strict_interop: false,
        }
    }
}

impl CacheConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
