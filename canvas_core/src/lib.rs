//! `canvas_core`
//!
//! Wrapper identity for native graphics resources.
//!
//! Design goals:
//! - At most one live wrapper per native resource, per manager.
//! - Weak references both ways: the cache never keeps a wrapper alive.
//! - Managers are explicitly constructed and passed around; no globals.
//! - Native failures are passed through unchanged.

pub mod canvas;
pub mod config;
pub mod error;
pub mod manager;
pub mod native;
pub mod tracker;
pub mod wrapper;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::canvas::*;
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::manager::*;
    pub use crate::native::*;
    pub use crate::wrapper::*;
}
