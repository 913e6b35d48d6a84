//! The per-application set of resource managers.
//!
//! There is no global registry: an application builds one
//! [`CanvasResources`] and passes it (or a clone) to every place that needs
//! to turn native resources into wrappers.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    canvas::{
        bitmap::{CanvasBitmap, NativeBitmap},
        brush::{CanvasSolidColorBrush, Color, NativeSolidColorBrush},
        device::{CanvasDevice, NativeDevice},
    },
    config::CacheConfig,
    error::ResourceError,
    manager::{CacheStats, ResourceManager},
    native::{cast_native, NativeHandle, NativeResource, ResourceId, ResourceKind},
    wrapper::TrackedWrapper,
};

/// Any wrapper handed out by [`CanvasResources::wrap`].
#[derive(Debug, Clone)]
pub enum CanvasObject {
    Device(Arc<CanvasDevice>),
    Bitmap(Arc<CanvasBitmap>),
    SolidColorBrush(Arc<CanvasSolidColorBrush>),
}

impl CanvasObject {
    pub fn kind(&self) -> ResourceKind {
        match self {
            CanvasObject::Device(_) => ResourceKind::Device,
            CanvasObject::Bitmap(_) => ResourceKind::Bitmap,
            CanvasObject::SolidColorBrush(_) => ResourceKind::SolidColorBrush,
        }
    }

    pub fn id(&self) -> ResourceId {
        match self {
            CanvasObject::Device(w) => w.id(),
            CanvasObject::Bitmap(w) => w.id(),
            CanvasObject::SolidColorBrush(w) => w.id(),
        }
    }

    /// The wrapped native resource, type-erased.
    pub fn native(&self) -> Result<Arc<dyn NativeResource>, ResourceError> {
        let native: Arc<dyn NativeResource> = match self {
            CanvasObject::Device(w) => w.native()?,
            CanvasObject::Bitmap(w) => w.native()?,
            CanvasObject::SolidColorBrush(w) => w.native()?,
        };
        Ok(native)
    }

    /// The wrapped native resource as a concrete native type.
    pub fn native_as<T: NativeResource>(&self) -> Result<Arc<T>, ResourceError> {
        cast_native(&self.native()?)
    }

    pub fn close(&self) {
        match self {
            CanvasObject::Device(w) => w.close(),
            CanvasObject::Bitmap(w) => w.close(),
            CanvasObject::SolidColorBrush(w) => w.close(),
        }
    }

    pub fn into_bitmap(self) -> Result<Arc<CanvasBitmap>, ResourceError> {
        match self {
            CanvasObject::Bitmap(w) => Ok(w),
            _ => Err(ResourceError::NoInterface),
        }
    }

    pub fn into_device(self) -> Result<Arc<CanvasDevice>, ResourceError> {
        match self {
            CanvasObject::Device(w) => Ok(w),
            _ => Err(ResourceError::NoInterface),
        }
    }

    pub fn into_solid_color_brush(self) -> Result<Arc<CanvasSolidColorBrush>, ResourceError> {
        match self {
            CanvasObject::SolidColorBrush(w) => Ok(w),
            _ => Err(ResourceError::NoInterface),
        }
    }

    /// Whether both values are the same wrapper instance.
    pub fn ptr_eq(&self, other: &CanvasObject) -> bool {
        match (self, other) {
            (CanvasObject::Device(a), CanvasObject::Device(b)) => Arc::ptr_eq(a, b),
            (CanvasObject::Bitmap(a), CanvasObject::Bitmap(b)) => Arc::ptr_eq(a, b),
            (CanvasObject::SolidColorBrush(a), CanvasObject::SolidColorBrush(b)) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

/// Stats for every manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasStats {
    pub devices: CacheStats,
    pub bitmaps: CacheStats,
    pub brushes: CacheStats,
}

/// Resource managers for every wrapper type.
#[derive(Debug, Clone)]
pub struct CanvasResources {
    cfg: CacheConfig,
    pub devices: ResourceManager<CanvasDevice>,
    pub bitmaps: ResourceManager<CanvasBitmap>,
    pub brushes: ResourceManager<CanvasSolidColorBrush>,
}

impl CanvasResources {
    pub fn new(cfg: CacheConfig) -> Self {
        CanvasResources {
            devices: ResourceManager::new("devices", &cfg),
            bitmaps: ResourceManager::new("bitmaps", &cfg),
            brushes: ResourceManager::new("brushes", &cfg),
            cfg,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.cfg
    }

    /// Wraps a native resource handed over by interop code.
    ///
    /// Dispatches on the resource kind; a resource whose concrete type does
    /// not match its kind fails with `NoInterface`. With
    /// [`CacheConfig::strict_interop`] set, a resource that already has a
    /// live wrapper fails with `InvalidState`.
    pub fn wrap(&self, handle: &NativeHandle<dyn NativeResource>) -> Result<CanvasObject, ResourceError> {
        match handle.kind().ok_or(ResourceError::InvalidArgument)? {
            ResourceKind::Device => self
                .acquire(&self.devices, &handle.cast::<NativeDevice>()?)
                .map(CanvasObject::Device),
            ResourceKind::Bitmap => self
                .acquire(&self.bitmaps, &handle.cast::<NativeBitmap>()?)
                .map(CanvasObject::Bitmap),
            ResourceKind::SolidColorBrush => self
                .acquire(&self.brushes, &handle.cast::<NativeSolidColorBrush>()?)
                .map(CanvasObject::SolidColorBrush),
        }
    }

    fn acquire<W: TrackedWrapper>(
        &self,
        manager: &ResourceManager<W>,
        handle: &NativeHandle<W::Native>,
    ) -> Result<Arc<W>, ResourceError> {
        if self.cfg.strict_interop {
            manager.create(handle)
        } else {
            manager.get_or_create(handle)
        }
    }

    pub fn device(&self, native: &Arc<NativeDevice>) -> Result<Arc<CanvasDevice>, ResourceError> {
        self.devices.get_or_create(&NativeHandle::new(native.clone()))
    }

    /// Creates a new device and its wrapper.
    pub fn create_device(&self, name: &str) -> Result<Arc<CanvasDevice>, ResourceError> {
        self.devices.create(&NativeHandle::new(NativeDevice::new(name)))
    }

    /// Creates a bitmap on the device behind `device` and wraps it.
    pub fn create_bitmap(
        &self,
        device: &CanvasDevice,
        width: u32,
        height: u32,
        pixels: Bytes,
    ) -> Result<Arc<CanvasBitmap>, ResourceError> {
        let native = device.native()?;
        let bitmap = NativeBitmap::new(&native, width, height, pixels)?;
        self.bitmaps.create(&NativeHandle::new(bitmap))
    }

    pub fn create_solid_color_brush(
        &self,
        device: &CanvasDevice,
        color: Color,
    ) -> Result<Arc<CanvasSolidColorBrush>, ResourceError> {
        let native = device.native()?;
        let brush = NativeSolidColorBrush::new(&native, color)?;
        self.brushes.create(&NativeHandle::new(brush))
    }

    /// The device wrapper a bitmap was created on.
    pub fn bitmap_device(&self, bitmap: &CanvasBitmap) -> Result<Arc<CanvasDevice>, ResourceError> {
        self.devices.get_or_create(&bitmap.device_handle()?)
    }

    pub fn brush_device(
        &self,
        brush: &CanvasSolidColorBrush,
    ) -> Result<Arc<CanvasDevice>, ResourceError> {
        let native = brush.native()?;
        self.device(native.device())
    }

    pub fn stats(&self) -> CanvasStats {
        CanvasStats {
            devices: self.devices.stats(),
            bitmaps: self.bitmaps.stats(),
            brushes: self.brushes.stats(),
        }
    }

    /// Sweeps expired entries from every manager.
    pub fn prune_expired(&self) -> usize {
        self.devices.prune_expired() + self.bitmaps.prune_expired() + self.brushes.prune_expired()
    }
}

impl Default for CanvasResources {
    fn default() -> Self {
        CanvasResources::new(CacheConfig::default())
    }
}
