//! Solid colour brushes.

use std::{any::Any, sync::Arc};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    canvas::device::NativeDevice,
    error::{NativeError, ResourceError},
    native::{NativeResource, ResourceKind},
    wrapper::{ResourceWrapper, TrackedWrapper},
};

/// Straight-alpha RGBA8 colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }
}

/// Simulated native brush.
#[derive(Debug)]
pub struct NativeSolidColorBrush {
    device: Arc<NativeDevice>,
    color: Mutex<Color>,
}

impl NativeSolidColorBrush {
    pub fn new(device: &Arc<NativeDevice>, color: Color) -> Result<Arc<Self>, NativeError> {
        device.check()?;
        Ok(Arc::new(NativeSolidColorBrush {
            device: device.clone(),
            color: Mutex::new(color),
        }))
    }

    pub fn device(&self) -> &Arc<NativeDevice> {
        &self.device
    }

    pub fn color(&self) -> Color {
        *self.color.lock()
    }

    pub fn set_color(&self, color: Color) -> Result<(), NativeError> {
        self.device.check()?;
        *self.color.lock() = color;
        Ok(())
    }
}

impl NativeResource for NativeSolidColorBrush {
    fn kind(&self) -> ResourceKind {
        ResourceKind::SolidColorBrush
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Wrapper over a [`NativeSolidColorBrush`].
#[derive(Debug)]
pub struct CanvasSolidColorBrush {
    base: ResourceWrapper<NativeSolidColorBrush>,
}

impl CanvasSolidColorBrush {
    pub fn color(&self) -> Result<Color, ResourceError> {
        self.base.with_resource(|b| Ok(b.color()))
    }

    pub fn set_color(&self, color: Color) -> Result<(), ResourceError> {
        self.base.with_resource(|b| Ok(b.set_color(color)?))
    }
}

impl TrackedWrapper for CanvasSolidColorBrush {
    type Native = NativeSolidColorBrush;

    fn construct(base: ResourceWrapper<NativeSolidColorBrush>) -> Result<Self, ResourceError> {
        Ok(CanvasSolidColorBrush { base })
    }

    fn base(&self) -> &ResourceWrapper<NativeSolidColorBrush> {
        &self.base
    }
}
