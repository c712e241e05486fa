//! Proctoring session orchestration.
//!
//! Two periodic tasks on one tokio runtime: the camera watchdog (availability
//! checks every second) and the frame sampler (face detection every second).
//! Ticks use `MissedTickBehavior::Delay`, so within either loop one tick's
//! full pipeline finishes before the next tick fires; the two loops are not
//! ordered relative to each other. Blocking work (camera I/O, inference, the
//! report POST) runs on the blocking pool.

use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::alerts::{AlertSink, AlertSpec};
use crate::camera::{CameraError, CameraSource};
use crate::config::Config;
use crate::detector::FaceDetector;
use crate::monitor::{FrameClass, PresenceMonitor, Verdict};
use crate::overlay;
use crate::reporter::SuspicionSink;
use crate::watchdog::{CameraWatchdog, SharedCamera};

/// Callback invoked when the server reports the suspicion maximum. The host
/// decides what happens to the quiz (typically: terminate it).
pub type MaxSuspicionHandler = Arc<dyn Fn() + Send + Sync>;

pub struct ProctorSession {
    config: Config,
    camera: SharedCamera,
    detector: Arc<dyn FaceDetector>,
    alerts: Arc<dyn AlertSink>,
    reporter: Arc<dyn SuspicionSink>,
    available: Arc<AtomicBool>,
    on_max_suspicion: MaxSuspicionHandler,
}

impl ProctorSession {
    pub fn new(
        config: Config,
        camera: Box<dyn CameraSource>,
        detector: Arc<dyn FaceDetector>,
        alerts: Arc<dyn AlertSink>,
        reporter: Arc<dyn SuspicionSink>,
        on_max_suspicion: MaxSuspicionHandler,
    ) -> Self {
        Self {
            config,
            camera: Arc::new(Mutex::new(camera)),
            detector,
            alerts,
            reporter,
            available: Arc::new(AtomicBool::new(false)),
            on_max_suspicion,
        }
    }

    /// Run both loops until the shutdown signal fires.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut watchdog = CameraWatchdog::new(
            self.camera.clone(),
            self.alerts.clone(),
            self.available.clone(),
        );
        watchdog.start().await;

        let check_interval = Duration::from_millis(self.config.camera.check_interval_ms);
        let sample_interval = Duration::from_millis(self.config.monitor.sample_interval_ms);

        let mut sampler = FrameSampler::new(
            self.camera,
            self.detector,
            self.alerts,
            self.reporter,
            self.available,
            self.on_max_suspicion,
            &self.config,
        );

        let mut watchdog_shutdown = shutdown.clone();
        let watchdog_task = tokio::spawn(async move {
            let mut ticker = interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = watchdog_shutdown.changed() => break,
                    _ = ticker.tick() => watchdog.check().await,
                }
            }
            debug!("Watchdog loop stopped");
        });

        let mut monitor_shutdown = shutdown;
        let monitor_task = tokio::spawn(async move {
            let mut ticker = interval(sample_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = monitor_shutdown.changed() => break,
                    _ = ticker.tick() => sampler.sample().await,
                }
            }
            debug!("Monitor loop stopped");
        });

        let (watchdog_result, monitor_result) = tokio::join!(watchdog_task, monitor_task);
        watchdog_result?;
        monitor_result?;

        info!("Proctoring session stopped");
        Ok(())
    }
}

/// State of the presence-monitor loop: one `sample` call is one tick.
pub struct FrameSampler {
    camera: SharedCamera,
    detector: Arc<dyn FaceDetector>,
    alerts: Arc<dyn AlertSink>,
    reporter: Arc<dyn SuspicionSink>,
    available: Arc<AtomicBool>,
    on_max_suspicion: MaxSuspicionHandler,
    monitor: PresenceMonitor,
    toast_duration: Duration,
    preview_path: Option<PathBuf>,
    stream_started: bool,
}

impl FrameSampler {
    pub fn new(
        camera: SharedCamera,
        detector: Arc<dyn FaceDetector>,
        alerts: Arc<dyn AlertSink>,
        reporter: Arc<dyn SuspicionSink>,
        available: Arc<AtomicBool>,
        on_max_suspicion: MaxSuspicionHandler,
        config: &Config,
    ) -> Self {
        Self {
            camera,
            detector,
            alerts,
            reporter,
            available,
            on_max_suspicion,
            monitor: PresenceMonitor::new(config.monitor.absence_threshold),
            toast_duration: Duration::from_millis(config.alerts.toast_duration_ms),
            preview_path: config.monitor.preview_path.clone(),
            stream_started: false,
        }
    }

    /// Current absence counter value.
    pub fn absence(&self) -> u32 {
        self.monitor.absence()
    }

    pub async fn sample(&mut self) {
        // Camera outages do not count as absence; the counter holds.
        if !self.available.load(Ordering::SeqCst) {
            return;
        }

        let frame = match self.grab_frame().await {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%err, "No frame available this sample");
                return;
            }
        };

        if !self.stream_started {
            let (width, height) = frame.dimensions();
            info!(width, height, "Video stream playing");
            self.stream_started = true;
        }

        let detector = Arc::clone(&self.detector);
        let detect_frame = frame.clone();
        let faces =
            match tokio::task::spawn_blocking(move || detector.detect(&detect_frame)).await {
                Ok(Ok(faces)) => faces,
                Ok(Err(err)) => {
                    warn!(%err, "Face detection failed, skipping sample");
                    return;
                }
                Err(err) => {
                    warn!(%err, "Detection task aborted, skipping sample");
                    return;
                }
            };

        // Preview only; classification does not read the overlay.
        if let Some(path) = &self.preview_path {
            let canvas = overlay::render(&frame, &faces);
            if let Err(err) = overlay::save_preview(&canvas, path) {
                debug!(%err, "Could not write overlay preview");
            }
        }

        match self.monitor.observe(faces.len()) {
            Verdict::Present => {}
            Verdict::Suspicious { consecutive } => {
                debug!(consecutive, faces = faces.len(), "Non-single-face sample");
            }
            Verdict::Escalate { class } => self.escalate(class).await,
        }
    }

    /// Frame grabs block on camera I/O, so they run on the blocking pool
    /// like inference and the report POST.
    async fn grab_frame(&self) -> Result<DynamicImage, CameraError> {
        let camera = Arc::clone(&self.camera);
        let grab = tokio::task::spawn_blocking(move || match camera.lock() {
            Ok(mut camera) => camera.frame(),
            Err(_) => Err(CameraError::Unavailable("camera lock poisoned".into())),
        })
        .await;

        match grab {
            Ok(result) => result,
            Err(err) => Err(CameraError::Unavailable(format!(
                "camera task aborted: {}",
                err
            ))),
        }
    }

    async fn escalate(&self, class: FrameClass) {
        info!(?class, "Sustained absence threshold reached, notifying server");

        // The warning toast goes up immediately, whatever the server says.
        self.alerts
            .show(&AlertSpec::absence_warning(self.toast_duration));

        let reporter = Arc::clone(&self.reporter);
        match tokio::task::spawn_blocking(move || reporter.report()).await {
            Ok(Ok(outcome)) => {
                if outcome.max_reached {
                    warn!("Server reports maximum suspicion reached");
                    (self.on_max_suspicion)();
                }
            }
            Ok(Err(err)) => warn!(%err, "Suspicion report dropped"),
            Err(err) => warn!(%err, "Suspicion report task aborted"),
        }
    }
}
