//! Bitmaps.
//!
//! A [`NativeBitmap`] holds straight-alpha RGBA8 pixels, row-major, 4 bytes
//! per pixel, and belongs to the device it was created on.

use std::{any::Any, sync::Arc};

use bytes::Bytes;

use crate::{
    canvas::device::NativeDevice,
    error::{NativeError, ResourceError},
    native::{NativeHandle, NativeResource, ResourceKind},
    wrapper::{ResourceWrapper, TrackedWrapper},
};

/// Simulated native bitmap.
#[derive(Debug)]
pub struct NativeBitmap {
    device: Arc<NativeDevice>,
    width: u32,
    height: u32,
    pixels: Bytes,
}

impl NativeBitmap {
    /// Creates a bitmap on `device`.
    ///
    /// Fails with the device-removed error on a lost device and with
    /// `E_INVALIDARG` when the pixel buffer does not match the size.
    pub fn new(
        device: &Arc<NativeDevice>,
        width: u32,
        height: u32,
        pixels: Bytes,
    ) -> Result<Arc<Self>, NativeError> {
        device.check()?;
        let expected = byte_len(width, height)?;
        if pixels.len() != expected {
            return Err(NativeError::invalid_arg(format!(
                "expected {expected} bytes for {width}x{height}, got {}",
                pixels.len()
            )));
        }
        Ok(Arc::new(NativeBitmap {
            device: device.clone(),
            width,
            height,
            pixels,
        }))
    }

    /// Creates a bitmap filled with one colour.
    pub fn filled(
        device: &Arc<NativeDevice>,
        width: u32,
        height: u32,
        rgba: [u8; 4],
    ) -> Result<Arc<Self>, NativeError> {
        let len = byte_len(width, height)?;
        let pixels: Vec<u8> = rgba.iter().copied().cycle().take(len).collect();
        NativeBitmap::new(device, width, height, Bytes::from(pixels))
    }

    pub fn device(&self) -> &Arc<NativeDevice> {
        &self.device
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> Result<Bytes, NativeError> {
        self.device.check()?;
        Ok(self.pixels.clone())
    }
}

/// Size in bytes of a `width` x `height` RGBA8 buffer.
fn byte_len(width: u32, height: u32) -> Result<usize, NativeError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(4))
        .ok_or_else(|| NativeError::invalid_arg(format!("bitmap size {width}x{height} is too large")))
}

impl NativeResource for NativeBitmap {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Bitmap
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Wrapper over a [`NativeBitmap`].
#[derive(Debug)]
pub struct CanvasBitmap {
    base: ResourceWrapper<NativeBitmap>,
}

impl CanvasBitmap {
    pub fn size(&self) -> Result<(u32, u32), ResourceError> {
        self.base.with_resource(|b| Ok(b.size()))
    }

    /// Copies out the pixel data; passes through device loss.
    pub fn pixel_bytes(&self) -> Result<Bytes, ResourceError> {
        self.base.with_resource(|b| Ok(b.pixels()?))
    }

    /// Colour of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Result<[u8; 4], ResourceError> {
        self.base.with_resource(|b| {
            let (w, h) = b.size();
            if x >= w || y >= h {
                return Err(NativeError::invalid_arg(format!("pixel ({x}, {y}) outside {w}x{h}")).into());
            }
            let pixels = b.pixels()?;
            let at = (y as usize * w as usize + x as usize) * 4;
            Ok([pixels[at], pixels[at + 1], pixels[at + 2], pixels[at + 3]])
        })
    }

    /// Native device the bitmap lives on.
    pub fn device_handle(&self) -> Result<NativeHandle<NativeDevice>, ResourceError> {
        self.base.with_resource(|b| Ok(NativeHandle::new(b.device().clone())))
    }
}

impl TrackedWrapper for CanvasBitmap {
    type Native = NativeBitmap;

    /// Wrapping a bitmap whose device is gone fails with the native error.
    fn construct(base: ResourceWrapper<NativeBitmap>) -> Result<Self, ResourceError> {
        base.with_resource(|b| Ok(b.device().check()?))?;
        Ok(CanvasBitmap { base })
    }

    fn base(&self) -> &ResourceWrapper<NativeBitmap> {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_bitmap_has_expected_layout() {
        let device = NativeDevice::new("test");
        let bitmap = NativeBitmap::filled(&device, 2, 3, [1, 2, 3, 4]).unwrap();
        assert_eq!(bitmap.size(), (2, 3));
        let pixels = bitmap.pixels().unwrap();
        assert_eq!(pixels.len(), 24);
        assert_eq!(&pixels[20..24], &[1, 2, 3, 4]);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let device = NativeDevice::new("test");
        let err = NativeBitmap::new(&device, 2, 2, Bytes::from_static(&[0; 4])).unwrap_err();
        assert_eq!(err.code, crate::error::hresult::E_INVALIDARG);
    }

    #[test]
    fn oversized_bitmap_is_rejected() {
        let device = NativeDevice::new("test");
        let err = NativeBitmap::new(&device, 1 << 31, 1 << 31, Bytes::new()).unwrap_err();
        assert_eq!(err.code, crate::error::hresult::E_INVALIDARG);

        let err = NativeBitmap::filled(&device, u32::MAX, u32::MAX, [0; 4]).unwrap_err();
        assert_eq!(err.code, crate::error::hresult::E_INVALIDARG);
    }

    #[test]
    fn lost_device_refuses_new_bitmaps() {
        let device = NativeDevice::new("test");
        device.mark_lost();
        let err = NativeBitmap::filled(&device, 1, 1, [0; 4]).unwrap_err();
        assert!(err.is_device_lost());
    }
}
