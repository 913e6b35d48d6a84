//! Error types.
//!
//! Every fallible operation in this crate returns [`ResourceError`]. Failures
//! that originate in the native layer travel through unchanged inside
//! [`ResourceError::Native`]; the cache never translates them.

use std::fmt;

/// HRESULT-style result codes used at the interop boundary.
pub mod hresult {
    pub const S_OK: i32 = 0;
    pub const E_UNEXPECTED: i32 = 0x8000_FFFF_u32 as i32;
    pub const E_NOINTERFACE: i32 = 0x8000_4002_u32 as i32;
    pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
    pub const RO_E_CLOSED: i32 = 0x8000_0013_u32 as i32;
    pub const DXGI_ERROR_DEVICE_REMOVED: i32 = 0x887A_0005_u32 as i32;
}

/// A failure reported by a native resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    pub code: i32,
    pub message: String,
}

impl NativeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        NativeError {
            code,
            message: message.into(),
        }
    }

    /// The device backing the resource has been removed or reset.
    pub fn device_removed() -> Self {
        NativeError::new(hresult::DXGI_ERROR_DEVICE_REMOVED, "device removed")
    }

    pub fn invalid_arg(message: impl Into<String>) -> Self {
        NativeError::new(hresult::E_INVALIDARG, message)
    }

    pub fn is_device_lost(&self) -> bool {
        self.code == hresult::DXGI_ERROR_DEVICE_REMOVED
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.message, self.code as u32)
    }
}

impl std::error::Error for NativeError {}

/// Resource operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A null native resource was passed in.
    InvalidArgument,
    /// A live wrapper already exists for a resource that was expected to be new.
    InvalidState,
    /// The wrapper has been closed.
    ResourceClosed,
    /// The native resource is not of the requested type.
    NoInterface,
    /// Failure reported by the native layer, passed through unchanged.
    Native(NativeError),
}

impl ResourceError {
    /// Result code for interop callers.
    pub fn hresult(&self) -> i32 {
        match self {
            ResourceError::InvalidArgument => hresult::E_INVALIDARG,
            ResourceError::InvalidState => hresult::E_UNEXPECTED,
            ResourceError::ResourceClosed => hresult::RO_E_CLOSED,
            ResourceError::NoInterface => hresult::E_NOINTERFACE,
            ResourceError::Native(e) => e.code,
        }
    }

    pub fn is_device_lost(&self) -> bool {
        matches!(self, ResourceError::Native(e) if e.is_device_lost())
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::InvalidArgument => write!(f, "native resource must not be null"),
            ResourceError::InvalidState => {
                write!(f, "a live wrapper already exists for this native resource")
            }
            ResourceError::ResourceClosed => write!(f, "the object has been closed"),
            ResourceError::NoInterface => {
                write!(f, "native resource does not support the requested interface")
            }
            ResourceError::Native(e) => write!(f, "native error: {e}"),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Native(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NativeError> for ResourceError {
    fn from(e: NativeError) -> Self {
        ResourceError::Native(e)
    }
}
