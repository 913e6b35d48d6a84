//! Wrapper base.
//!
//! Every wrapper type embeds a [`ResourceWrapper`], which owns the native
//! reference and the tracker. The wrapper state machine is
//! `Constructed -> Active -> Closed`; once closed, every accessor fails with
//! [`ResourceError::ResourceClosed`].

use std::{fmt, sync::Arc};

use parking_lot::RwLock;
use tracing::trace;

use crate::{
    error::ResourceError,
    native::ResourceId,
    tracker::ResourceTracker,
};

/// Lifecycle state of a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperState {
    /// Built but not yet recorded by a manager. Only observable from inside
    /// [`TrackedWrapper::construct`]; a manager never hands out a wrapper in
    /// this state.
    Constructed,
    Active,
    Closed,
}

/// Holds the native resource for a wrapper and its cache back reference.
pub struct ResourceWrapper<N: ?Sized> {
    resource: RwLock<Option<Arc<N>>>,
    tracker: ResourceTracker,
}

impl<N: ?Sized + Send + Sync + 'static> ResourceWrapper<N> {
    pub(crate) fn new(resource: Arc<N>, tracker: ResourceTracker) -> Self {
        ResourceWrapper {
            resource: RwLock::new(Some(resource)),
            tracker,
        }
    }

    /// Returns the native resource, or `ResourceClosed`.
    pub fn resource(&self) -> Result<Arc<N>, ResourceError> {
        self.resource.read().clone().ok_or(ResourceError::ResourceClosed)
    }

    /// Runs `f` against the native resource without cloning it.
    pub fn with_resource<T>(
        &self,
        f: impl FnOnce(&N) -> Result<T, ResourceError>,
    ) -> Result<T, ResourceError> {
        let guard = self.resource.read();
        let resource = guard.as_deref().ok_or(ResourceError::ResourceClosed)?;
        f(resource)
    }

    pub fn id(&self) -> ResourceId {
        self.tracker.id()
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    pub fn is_closed(&self) -> bool {
        self.resource.read().is_none()
    }

    pub fn state(&self) -> WrapperState {
        if self.is_closed() {
            WrapperState::Closed
        } else if self.tracker.is_attached() {
            WrapperState::Active
        } else {
            WrapperState::Constructed
        }
    }

    /// Releases the native resource and invalidates the cache entry.
    ///
    /// Closing an already closed wrapper does nothing.
    pub fn close(&self) {
        let released = self.resource.write().take();
        if released.is_some() {
            self.tracker.detach();
            trace!(id = %self.tracker.id(), "wrapper closed");
        }
    }
}

impl<N: ?Sized + Send + Sync + 'static> fmt::Debug for ResourceWrapper<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceWrapper")
            .field("id", &self.tracker.id())
            .field("state", &self.state())
            .finish()
    }
}

/// A wrapper type that a [`ResourceManager`](crate::manager::ResourceManager)
/// can hand out.
pub trait TrackedWrapper: Send + Sync + Sized + 'static {
    type Native: ?Sized + Send + Sync + 'static;

    /// Builds the wrapper around a freshly tracked native resource.
    ///
    /// Runs while the manager's lock is held: it must not call back into the
    /// same manager.
    fn construct(base: ResourceWrapper<Self::Native>) -> Result<Self, ResourceError>;

    fn base(&self) -> &ResourceWrapper<Self::Native>;

    fn id(&self) -> ResourceId {
        self.base().id()
    }

    fn close(&self) {
        self.base().close()
    }

    fn is_closed(&self) -> bool {
        self.base().is_closed()
    }

    /// The wrapped native resource (Win2D's `GetNativeResource`).
    fn native(&self) -> Result<Arc<Self::Native>, ResourceError> {
        self.base().resource()
    }
}
