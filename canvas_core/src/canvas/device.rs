//! Devices.

use std::{
    any::Any,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    error::{NativeError, ResourceError},
    native::{NativeResource, ResourceKind},
    wrapper::{ResourceWrapper, TrackedWrapper},
};

/// Simulated native device.
#[derive(Debug)]
pub struct NativeDevice {
    name: String,
    lost: AtomicBool,
}

impl NativeDevice {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(NativeDevice {
            name: name.into(),
            lost: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Simulates device removal. Every resource created on this device starts
    /// failing with `DXGI_ERROR_DEVICE_REMOVED`.
    pub fn mark_lost(&self) {
        self.lost.store(true, Ordering::Release);
    }

    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<(), NativeError> {
        if self.is_lost() {
            Err(NativeError::device_removed())
        } else {
            Ok(())
        }
    }
}

impl NativeResource for NativeDevice {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Device
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Wrapper over a [`NativeDevice`].
#[derive(Debug)]
pub struct CanvasDevice {
    base: ResourceWrapper<NativeDevice>,
}

impl CanvasDevice {
    pub fn name(&self) -> Result<String, ResourceError> {
        self.base.with_resource(|d| Ok(d.name().to_string()))
    }

    pub fn is_device_lost(&self) -> Result<bool, ResourceError> {
        self.base.with_resource(|d| Ok(d.is_lost()))
    }

    /// Fails with the native device-removed error once the device is lost.
    pub fn ensure_available(&self) -> Result<(), ResourceError> {
        self.base.with_resource(|d| Ok(d.check()?))
    }
}

impl TrackedWrapper for CanvasDevice {
    type Native = NativeDevice;

    fn construct(base: ResourceWrapper<NativeDevice>) -> Result<Self, ResourceError> {
        Ok(CanvasDevice { base })
    }

    fn base(&self) -> &ResourceWrapper<NativeDevice> {
        &self.base
    }
}
