use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use invigil::alerts::ConsoleAlerts;
use invigil::camera::DeviceCamera;
use invigil::detector::UltraFaceDetector;
use invigil::logging;
use invigil::reporter::HttpReporter;
use invigil::session::{MaxSuspicionHandler, ProctorSession};
use invigil::Config;

fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("invigil {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config_path
}

fn print_help() {
    println!(
        r#"invigil - webcam proctoring agent for web-based quizzes

USAGE:
    invigil [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    INVIGIL_CONFIG      Path to config file (overrides default location)
    INVIGIL_LOG         Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/invigil/config.toml

The agent watches the webcam once a second, counts faces in each frame,
and reports sustained absence (or extra people) to the quiz server's
suspicion endpoint."#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    // Load configuration
    let config = match config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    if config.quiz.quiz_id.is_empty() {
        warn!("No quiz_id configured; reports will carry an empty identifier");
    }

    // Load the detection model before either loop starts
    let detector = Arc::new(UltraFaceDetector::load(&config.models_dir())?);
    info!("Face detection model ready");

    let camera = Box::new(DeviceCamera::new(config.camera.device_index));
    let alerts = Arc::new(ConsoleAlerts);
    let reporter = Arc::new(HttpReporter::new(&config.quiz));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The server locking the quiz ends the session on our side too
    let max_tx = shutdown_tx.clone();
    let on_max: MaxSuspicionHandler = Arc::new(move || {
        error!("Maximum suspicion reached; ending proctoring session");
        let _ = max_tx.send(true);
    });

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            let _ = ctrl_c_tx.send(true);
        }
    });

    let session = ProctorSession::new(config, camera, detector, alerts, reporter, on_max);
    session.run(shutdown_rx).await
}
