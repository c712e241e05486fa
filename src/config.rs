use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub quiz: QuizConfig,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub alerts: AlertConfig,
}

/// Session parameters the hosting quiz page used to supply as globals.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuizConfig {
    /// Identifier of the quiz session being proctored.
    #[serde(default)]
    pub quiz_id: String,

    /// Endpoint that records suspicion events for this quiz.
    #[serde(default = "default_report_url")]
    pub report_url: String,

    /// Anti-forgery token issued for the quiz session.
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Device index passed to the capture backend.
    #[serde(default)]
    pub device_index: u32,

    /// Watchdog re-check period in milliseconds.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Frame sampling period in milliseconds.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Consecutive non-single-face samples before an escalation fires.
    #[serde(default = "default_absence_threshold")]
    pub absence_threshold: u32,

    /// Override for the face model cache directory.
    #[serde(default)]
    pub models_dir: Option<PathBuf>,

    /// Where to write the detection overlay preview (disabled when unset).
    #[serde(default)]
    pub preview_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// How long the absence warning toast stays up, in milliseconds.
    #[serde(default = "default_toast_duration_ms")]
    pub toast_duration_ms: u64,
}

fn default_report_url() -> String {
    "http://127.0.0.1:8000/ajax/increase_suspicious/".to_string()
}

fn default_check_interval_ms() -> u64 {
    1000
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_absence_threshold() -> u32 {
    10
}

fn default_toast_duration_ms() -> u64 {
    3000
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            check_interval_ms: default_check_interval_ms(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            absence_threshold: default_absence_threshold(),
            models_dir: None,
            preview_path: None,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            toast_duration_ms: default_toast_duration_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quiz: QuizConfig::default(),
            camera: CameraConfig::default(),
            monitor: MonitorConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        // Check environment variable
        if let Ok(path) = std::env::var("INVIGIL_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("invigil")
            .join("config.toml")
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("invigil")
    }

    /// Directory where face detection models are cached.
    pub fn models_dir(&self) -> PathBuf {
        self.monitor.models_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("invigil")
                .join("models")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_proctoring_contract() {
        let config = Config::default();
        assert_eq!(config.monitor.absence_threshold, 10);
        assert_eq!(config.monitor.sample_interval_ms, 1000);
        assert_eq!(config.camera.check_interval_ms, 1000);
        assert_eq!(config.alerts.toast_duration_ms, 3000);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[quiz]
quiz_id = "a1b2c3"
csrf_token = "tok"

[monitor]
absence_threshold = 5
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.quiz.quiz_id, "a1b2c3");
        assert_eq!(config.monitor.absence_threshold, 5);
        assert_eq!(config.monitor.sample_interval_ms, 1000);
        assert_eq!(config.camera.device_index, 0);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = Config::default();
        config.quiz.quiz_id = "q-42".to_string();
        config.monitor.preview_path = Some(PathBuf::from("/tmp/preview.jpg"));

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.quiz.quiz_id, "q-42");
        assert_eq!(
            parsed.monitor.preview_path,
            Some(PathBuf::from("/tmp/preview.jpg"))
        );
    }
}
