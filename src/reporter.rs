//! Suspicion reporting to the quiz server.
//!
//! One escalation is one form POST carrying the quiz identifier and the
//! session's anti-forgery token. The server answers with JSON telling us
//! whether the quiz-wide suspicion maximum has been reached.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::config::QuizConfig;

/// Response body of the suspicion endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportOutcome {
    /// True when the server-side suspicion count hit the quiz maximum.
    #[serde(default)]
    pub max_reached: bool,
}

/// Destination for escalation reports.
pub trait SuspicionSink: Send + Sync {
    fn report(&self) -> Result<ReportOutcome>;
}

/// Posts suspicion events to the configured quiz endpoint.
pub struct HttpReporter {
    url: String,
    quiz_id: String,
    csrf_token: String,
}

impl HttpReporter {
    pub fn new(quiz: &QuizConfig) -> Self {
        Self {
            url: quiz.report_url.clone(),
            quiz_id: quiz.quiz_id.clone(),
            csrf_token: quiz.csrf_token.clone(),
        }
    }
}

impl SuspicionSink for HttpReporter {
    fn report(&self) -> Result<ReportOutcome> {
        let response = ureq::post(&self.url)
            .send_form(&[
                ("quiz", self.quiz_id.as_str()),
                ("csrfmiddlewaretoken", self.csrf_token.as_str()),
            ])
            .map_err(|e| anyhow!("Suspicion report failed: {}", e))?;

        let outcome: ReportOutcome = response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse suspicion response: {}", e))?;

        Ok(outcome)
    }
}

#[cfg(test)]
pub mod recording {
    //! Counting reporter double for session tests.

    use super::{ReportOutcome, SuspicionSink};
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicU32, Ordering};

    pub struct CountingReporter {
        pub calls: AtomicU32,
        max_reached: bool,
        fail: bool,
    }

    impl CountingReporter {
        pub fn new(max_reached: bool) -> Self {
            Self {
                calls: AtomicU32::new(0),
                max_reached,
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                max_reached: false,
                fail: true,
            }
        }

        pub fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SuspicionSink for CountingReporter {
        fn report(&self) -> Result<ReportOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            Ok(ReportOutcome {
                max_reached: self.max_reached,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn report_posts_quiz_id_and_token() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        // Serve one request and hand the form body back to the test.
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];

            let header_end = loop {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let headers = String::from_utf8_lossy(&request[..header_end]).to_string();
            let content_length: usize = headers
                .lines()
                .find(|line| line.to_ascii_lowercase().starts_with("content-length:"))
                .and_then(|line| line.split(':').nth(1))
                .and_then(|value| value.trim().parse().ok())
                .expect("request must carry a content length");

            while request.len() < header_end + content_length {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
            }

            stream
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 21\r\nConnection: close\r\n\r\n{\"max_reached\": true}",
                )
                .unwrap();

            String::from_utf8_lossy(&request[header_end..header_end + content_length])
                .to_string()
        });

        let quiz = QuizConfig {
            quiz_id: "q-77".to_string(),
            report_url: format!("http://{}/ajax/increase_suspicious/", addr),
            csrf_token: "tok-123".to_string(),
        };

        let outcome = HttpReporter::new(&quiz).report().unwrap();
        assert!(outcome.max_reached);

        let body = server.join().unwrap();
        assert!(body.contains("quiz=q-77"), "body was: {}", body);
        assert!(
            body.contains("csrfmiddlewaretoken=tok-123"),
            "body was: {}",
            body
        );
    }

    #[test]
    fn parses_server_response() {
        let outcome: ReportOutcome =
            serde_json::from_str(r#"{"success": "Suspicious increased", "max_reached": true}"#)
                .unwrap();
        assert!(outcome.max_reached);
    }

    #[test]
    fn max_reached_defaults_to_false() {
        let outcome: ReportOutcome = serde_json::from_str(r#"{}"#).unwrap();
        assert!(!outcome.max_reached);
    }
}
