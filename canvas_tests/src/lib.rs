//! Shared fixtures for the canvas integration tests.

use std::sync::Arc;

use canvas_core::prelude::*;

/// Installs a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// A manager set plus one device, the usual starting point of a test.
pub struct Fixture {
    pub resources: CanvasResources,
    pub device: Arc<NativeDevice>,
}

impl Fixture {
    pub fn new() -> Self {
        Fixture::with_config(CacheConfig::default())
    }

    pub fn with_config(cfg: CacheConfig) -> Self {
        init_tracing();
        Fixture {
            resources: CanvasResources::new(cfg),
            device: NativeDevice::new("fixture"),
        }
    }

    /// A native bitmap nobody has wrapped yet.
    pub fn native_bitmap(&self, rgba: [u8; 4]) -> anyhow::Result<NativeHandle<NativeBitmap>> {
        Ok(NativeHandle::new(NativeBitmap::filled(&self.device, 4, 4, rgba)?))
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture::new()
    }
}
