//! Canvas resources: simulated native graphics objects and their wrappers.
//!
//! The native types stand in for Direct2D objects; only the behaviour the
//! wrappers depend on is modelled (ownership by a device, device loss, a few
//! properties).

pub mod bitmap;
pub mod brush;
pub mod device;
pub mod resources;

pub use bitmap::{CanvasBitmap, NativeBitmap};
pub use brush::{CanvasSolidColorBrush, Color, NativeSolidColorBrush};
pub use device::{CanvasDevice, NativeDevice};
pub use resources::{CanvasObject, CanvasResources, CanvasStats};
