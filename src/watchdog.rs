//! Camera availability watchdog.
//!
//! Acquires the camera at startup and re-checks it on every tick. While the
//! camera cannot be acquired a blocking error modal stays on screen; the
//! moment acquisition succeeds again the modal is closed. Whether the modal
//! is up is tracked with an explicit flag rather than by inspecting the
//! alert widget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::alerts::{AlertSink, AlertSpec};
use crate::camera::{CameraError, CameraSource};

/// Camera handle shared between the watchdog and the presence monitor.
pub type SharedCamera = Arc<Mutex<Box<dyn CameraSource>>>;

pub struct CameraWatchdog {
    camera: SharedCamera,
    alerts: Arc<dyn AlertSink>,
    /// Gate read by the presence monitor before every sample.
    available: Arc<AtomicBool>,
    /// True while the camera-error modal is on screen.
    error_shown: bool,
}

impl CameraWatchdog {
    pub fn new(
        camera: SharedCamera,
        alerts: Arc<dyn AlertSink>,
        available: Arc<AtomicBool>,
    ) -> Self {
        Self {
            camera,
            alerts,
            available,
            error_shown: false,
        }
    }

    pub fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// One acquisition attempt. Device probing blocks on camera I/O, so it
    /// runs on the blocking pool; the camera lock is held only inside that
    /// worker.
    async fn acquire(&self) -> Result<(), CameraError> {
        let camera = Arc::clone(&self.camera);
        let attempt = tokio::task::spawn_blocking(move || match camera.lock() {
            Ok(mut camera) => camera.acquire(),
            Err(_) => Err(CameraError::Unavailable("camera lock poisoned".into())),
        })
        .await;

        match attempt {
            Ok(result) => result,
            Err(err) => Err(CameraError::Unavailable(format!(
                "camera task aborted: {}",
                err
            ))),
        }
    }

    /// One-time startup acquisition.
    pub async fn start(&mut self) {
        match self.acquire().await {
            Ok(()) => {
                info!("Camera found");
                self.available.store(true, Ordering::SeqCst);
            }
            Err(err) => {
                error!(%err, "Camera unavailable at startup");
                self.available.store(false, Ordering::SeqCst);
                self.alerts.show(&AlertSpec::camera_error(&err.to_string()));
                self.error_shown = true;
            }
        }
    }

    /// Periodic re-check. Camera loss is recoverable; this never fails the
    /// session, it only flips the gate and the modal.
    pub async fn check(&mut self) {
        match self.acquire().await {
            Ok(()) => {
                if self.error_shown {
                    info!("Camera recovered");
                    self.alerts.close();
                    self.error_shown = false;
                }
                self.available.store(true, Ordering::SeqCst);
            }
            Err(err) => {
                error!(%err, "Camera check failed");
                if !self.error_shown {
                    self.alerts.show(&AlertSpec::camera_error(&err.to_string()));
                    self.error_shown = true;
                }
                self.available.store(false, Ordering::SeqCst);
            }
        }
    }
}
