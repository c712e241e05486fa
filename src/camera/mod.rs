//! Camera acquisition seam.
//!
//! The watchdog re-requests the device through [`CameraSource::acquire`] on
//! every check, mirroring how the quiz page re-ran its media request each
//! second. The presence monitor pulls frames through [`CameraSource::frame`].

pub mod device;

pub use device::DeviceCamera;

use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CameraError {
    /// Device missing, busy, or permission denied. Recoverable via retry.
    #[error("camera not available: {0}")]
    Unavailable(String),

    /// Frame requested before a stream was acquired.
    #[error("camera stream not started")]
    StreamClosed,

    #[error("failed to decode camera frame: {0}")]
    Decode(String),
}

/// Source of webcam frames.
///
/// `acquire` is idempotent: calling it again while the stream is healthy is a
/// cheap probe, and after a device loss it attempts a fresh open.
pub trait CameraSource: Send {
    fn acquire(&mut self) -> Result<(), CameraError>;

    fn frame(&mut self) -> Result<DynamicImage, CameraError>;
}
