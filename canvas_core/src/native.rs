//! Native resource model.
//!
//! Native resources are opaque, shared objects whose real behaviour lives
//! outside this crate. This module describes how they are handed over
//! ([`NativeHandle`]), what they are ([`ResourceKind`]) and how their identity
//! is computed ([`ResourceId`]).

use std::{any::Any, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::ResourceError;

/// Native resource category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Device,
    Bitmap,
    SolidColorBrush,
}

/// An opaque, reference-counted native object.
pub trait NativeResource: Send + Sync + 'static {
    fn kind(&self) -> ResourceKind;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Identity of a native resource.
///
/// This is the address of the shared allocation with any trait-object
/// metadata stripped, so the same object viewed as `Arc<NativeBitmap>` or as
/// `Arc<dyn NativeResource>` yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(usize);

impl ResourceId {
    pub fn of<R: ?Sized>(resource: &Arc<R>) -> Self {
        ResourceId(Arc::as_ptr(resource) as *const () as usize)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A possibly-null pointer to a native resource, the shape in which interop
/// code hands resources over.
pub struct NativeHandle<R: ?Sized>(Option<Arc<R>>);

impl<R: ?Sized> NativeHandle<R> {
    pub fn new(resource: Arc<R>) -> Self {
        NativeHandle(Some(resource))
    }

    pub fn null() -> Self {
        NativeHandle(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<&Arc<R>> {
        self.0.as_ref()
    }

    /// Returns the resource, or `InvalidArgument` for a null handle.
    pub fn require(&self) -> Result<&Arc<R>, ResourceError> {
        self.0.as_ref().ok_or(ResourceError::InvalidArgument)
    }

    pub fn id(&self) -> Option<ResourceId> {
        self.0.as_ref().map(ResourceId::of)
    }
}

impl NativeHandle<dyn NativeResource> {
    /// Casts to a concrete native type.
    pub fn cast<T: NativeResource>(&self) -> Result<NativeHandle<T>, ResourceError> {
        let resource = self.require()?;
        cast_native(resource).map(NativeHandle::new)
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        self.0.as_ref().map(|r| r.kind())
    }
}

impl<R: ?Sized> Clone for NativeHandle<R> {
    fn clone(&self) -> Self {
        NativeHandle(self.0.clone())
    }
}

impl<R: ?Sized> Default for NativeHandle<R> {
    fn default() -> Self {
        NativeHandle::null()
    }
}

impl<R: ?Sized> From<Arc<R>> for NativeHandle<R> {
    fn from(resource: Arc<R>) -> Self {
        NativeHandle::new(resource)
    }
}

impl<R: ?Sized> From<Option<Arc<R>>> for NativeHandle<R> {
    fn from(resource: Option<Arc<R>>) -> Self {
        NativeHandle(resource)
    }
}

impl<R: ?Sized> fmt::Debug for NativeHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "NativeHandle({id})"),
            None => write!(f, "NativeHandle(null)"),
        }
    }
}

/// Casts a type-erased native resource to a concrete native type.
pub fn cast_native<T: NativeResource>(
    resource: &Arc<dyn NativeResource>,
) -> Result<Arc<T>, ResourceError> {
    resource
        .clone()
        .into_any()
        .downcast::<T>()
        .map_err(|_| ResourceError::NoInterface)
}
