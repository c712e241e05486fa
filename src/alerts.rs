//! Alert presentation seam.
//!
//! The original quiz page drove a modal/toast widget with an options bag
//! (icon, title, body, position, timers, dismissal flags). [`AlertSpec`]
//! keeps that surface; [`AlertSink`] is the collaborator boundary so the
//! proctoring logic never depends on how alerts are rendered. Whether the
//! camera-error dialog is currently open is tracked by the watchdog itself,
//! never queried back from the sink.

use chrono::Local;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertIcon {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPosition {
    Center,
    TopRight,
}

/// Options bag for one alert.
#[derive(Debug, Clone)]
pub struct AlertSpec {
    pub icon: AlertIcon,
    pub title: Option<String>,
    pub body: String,
    pub position: AlertPosition,
    /// Corner toast rather than a modal.
    pub toast: bool,
    /// Auto-dismiss timer; `None` keeps the alert up until closed.
    pub auto_dismiss: Option<Duration>,
    pub timer_progress_bar: bool,
    /// When false the alert has no confirm button and ignores outside
    /// clicks and the escape key.
    pub dismissible: bool,
}

impl AlertSpec {
    pub const CAMERA_ERROR_TITLE: &'static str = "Can't access the camera";

    /// Blocking modal shown while the camera cannot be acquired.
    pub fn camera_error(detail: &str) -> Self {
        Self {
            icon: AlertIcon::Error,
            title: Some(Self::CAMERA_ERROR_TITLE.to_string()),
            body: format!("Error: {}\nPlease fix the problem to continue.", detail),
            position: AlertPosition::Center,
            toast: false,
            auto_dismiss: None,
            timer_progress_bar: false,
            dismissible: false,
        }
    }

    /// Transient corner toast warning the user to stay in view.
    pub fn absence_warning(duration: Duration) -> Self {
        Self {
            icon: AlertIcon::Warning,
            title: None,
            body: "Please do not move away from the camera or else your test may be terminated."
                .to_string(),
            position: AlertPosition::TopRight,
            toast: true,
            auto_dismiss: Some(duration),
            timer_progress_bar: true,
            dismissible: false,
        }
    }
}

/// Alert presentation collaborator.
pub trait AlertSink: Send + Sync {
    fn show(&self, spec: &AlertSpec);

    /// Close the currently showing modal, if any. Toasts dismiss themselves.
    fn close(&self);
}

/// Renders alerts on stderr. Stands in for a desktop alert widget when the
/// agent runs headless.
pub struct ConsoleAlerts;

impl AlertSink for ConsoleAlerts {
    fn show(&self, spec: &AlertSpec) {
        let stamp = Local::now().format("%H:%M:%S");
        let kind = match spec.icon {
            AlertIcon::Error => "ERROR",
            AlertIcon::Warning => "WARNING",
        };

        match &spec.title {
            Some(title) => eprintln!("[{}] {}: {} - {}", stamp, kind, title, spec.body),
            None => eprintln!("[{}] {}: {}", stamp, kind, spec.body),
        }

        if let Some(timer) = spec.auto_dismiss {
            eprintln!("[{}] (dismisses after {:?})", stamp, timer);
        }
    }

    fn close(&self) {
        let stamp = Local::now().format("%H:%M:%S");
        eprintln!("[{}] alert dismissed", stamp);
    }
}
