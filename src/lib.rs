pub mod alerts;
pub mod camera;
pub mod config;
pub mod detector;
pub mod logging;
pub mod monitor;
pub mod overlay;
pub mod reporter;
pub mod session;
pub mod watchdog;

pub use config::Config;
pub use session::ProctorSession;
