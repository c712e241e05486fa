use image::DynamicImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use super::{CameraError, CameraSource};

/// Webcam backed by the platform capture backend (V4L2, AVFoundation, MSMF).
pub struct DeviceCamera {
    index: u32,
    camera: Option<Camera>,
}

impl DeviceCamera {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            camera: None,
        }
    }

    fn open(&mut self) -> Result<(), CameraError> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(self.index), requested)
            .map_err(|e| CameraError::Unavailable(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CameraError::Unavailable(e.to_string()))?;

        tracing::info!(device = %camera.info().human_name(), "Camera found");
        self.camera = Some(camera);
        Ok(())
    }
}

impl CameraSource for DeviceCamera {
    fn acquire(&mut self) -> Result<(), CameraError> {
        // Keep a healthy stream; only reopen after the device stops
        // delivering frames.
        if let Some(camera) = self.camera.as_mut() {
            if camera.is_stream_open() && camera.frame().is_ok() {
                return Ok(());
            }
            tracing::warn!("Camera stream went stale, reopening");
            if let Some(mut stale) = self.camera.take() {
                let _ = stale.stop_stream();
            }
        }

        self.open()
    }

    fn frame(&mut self) -> Result<DynamicImage, CameraError> {
        let camera = self.camera.as_mut().ok_or(CameraError::StreamClosed)?;
        let buffer = camera
            .frame()
            .map_err(|e| CameraError::Unavailable(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Decode(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        let rgb = image::RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| CameraError::Decode("frame buffer size mismatch".into()))?;
        Ok(DynamicImage::ImageRgb8(rgb))
    }
}

impl Drop for DeviceCamera {
    fn drop(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            let _ = camera.stop_stream();
        }
    }
}
