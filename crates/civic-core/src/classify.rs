//! Best-effort severity classification.
//!
//! The classifier is an opaque HTTP service with two endpoints:
//!
//! - `POST {base}/predict-text`  body `{"text": "..."}`
//! - `POST {base}/predict-image` body `{"image_url": "..."}`
//!
//! Both answer `{"result": {"severity": "..."}}`. Any failure here is
//! logged and replaced by [`Severity::Low`]; it never blocks a report.

use std::time::Duration;

use serde_json::{Value, json};

use crate::error::ErrorCode;
use crate::model::issue::Severity;

/// Default request timeout for classifier calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("classifier is disabled")]
    Disabled,

    #[error("classifier request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("classifier response from {endpoint} was not valid JSON: {message}")]
    Decode { endpoint: String, message: String },

    #[error("classifier response from {endpoint} has no usable severity")]
    MissingSeverity { endpoint: String },
}

impl ClassifyError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::ClassificationUnavailable
    }
}

/// Something that can assign a severity to report text or an image.
pub trait SeverityClassifier {
    /// # Errors
    ///
    /// Returns [`ClassifyError`] when no severity could be obtained.
    fn classify_text(&self, text: &str) -> Result<Severity, ClassifyError>;

    /// # Errors
    ///
    /// Returns [`ClassifyError`] when no severity could be obtained.
    fn classify_image(&self, image_url: &str) -> Result<Severity, ClassifyError>;
}

/// Classifier used when `[classifier] enabled = false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledClassifier;

impl SeverityClassifier for DisabledClassifier {
    fn classify_text(&self, _text: &str) -> Result<Severity, ClassifyError> {
        Err(ClassifyError::Disabled)
    }

    fn classify_image(&self, _image_url: &str) -> Result<Severity, ClassifyError> {
        Err(ClassifyError::Disabled)
    }
}

/// Blocking HTTP client for the classification service.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpClassifier {
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent("civic-core")
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn predict(&self, path: &str, body: &Value) -> Result<Severity, ClassifyError> {
        let endpoint = format!("{}/{path}", self.base_url);
        let response = self
            .agent
            .post(&endpoint)
            .set("Accept", "application/json")
            .send_json(body)
            .map_err(|err| ClassifyError::Transport {
                endpoint: endpoint.clone(),
                message: err.to_string(),
            })?;

        let payload: Value = response.into_json().map_err(|err| ClassifyError::Decode {
            endpoint: endpoint.clone(),
            message: err.to_string(),
        })?;

        severity_from_payload(&payload).ok_or(ClassifyError::MissingSeverity { endpoint })
    }
}

impl SeverityClassifier for HttpClassifier {
    fn classify_text(&self, text: &str) -> Result<Severity, ClassifyError> {
        self.predict("predict-text", &json!({ "text": text }))
    }

    fn classify_image(&self, image_url: &str) -> Result<Severity, ClassifyError> {
        self.predict("predict-image", &json!({ "image_url": image_url }))
    }
}

/// Pull `result.severity` out of a classifier answer, any letter case.
#[must_use]
pub fn severity_from_payload(payload: &Value) -> Option<Severity> {
    payload
        .get("result")?
        .get("severity")?
        .as_str()?
        .parse()
        .ok()
}

/// Severity for a new report: the higher of the text and image verdicts.
///
/// Each failed call is logged and counts as [`Severity::Low`].
pub fn assess_severity(
    classifier: &dyn SeverityClassifier,
    text: &str,
    image_url: Option<&str>,
) -> Severity {
    let from_text = classifier.classify_text(text).unwrap_or_else(|err| {
        absorb(&err);
        Severity::Low
    });
    let from_image = image_url.map_or(Severity::Low, |url| {
        classifier.classify_image(url).unwrap_or_else(|err| {
            absorb(&err);
            Severity::Low
        })
    });
    from_text.max(from_image)
}

fn absorb(err: &ClassifyError) {
    if matches!(err, ClassifyError::Disabled) {
        tracing::debug!("severity classification skipped: disabled");
    } else {
        tracing::warn!(code = %err.code(), error = %err, "severity classification failed, using low");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    struct Fixed {
        text: Result<Severity, ()>,
        image: Result<Severity, ()>,
    }

    impl SeverityClassifier for Fixed {
        fn classify_text(&self, _text: &str) -> Result<Severity, ClassifyError> {
            self.text.map_err(|()| ClassifyError::MissingSeverity {
                endpoint: "text".into(),
            })
        }

        fn classify_image(&self, _image_url: &str) -> Result<Severity, ClassifyError> {
            self.image.map_err(|()| ClassifyError::MissingSeverity {
                endpoint: "image".into(),
            })
        }
    }

    /// Serve one HTTP request with `body` and return the base URL.
    fn serve_once(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream);
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("header line");
                let trimmed = line.trim_end();
                if trimmed.is_empty() {
                    break;
                }
                if let Some((name, value)) = trimmed.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().expect("length");
                    }
                }
            }
            let mut request_body = vec![0; content_length];
            reader.read_exact(&mut request_body).expect("body");
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            reader
                .get_mut()
                .write_all(response.as_bytes())
                .expect("write");
        });
        format!("http://{addr}")
    }

    #[test]
    fn payload_severity_is_case_insensitive() {
        let payload = json!({ "result": { "severity": "HIGH", "label": "pothole" } });
        assert_eq!(severity_from_payload(&payload), Some(Severity::High));
        assert_eq!(severity_from_payload(&json!({ "result": {} })), None);
        assert_eq!(severity_from_payload(&json!({ "severity": "low" })), None);
    }

    #[test]
    fn higher_verdict_wins() {
        let c = Fixed {
            text: Ok(Severity::Medium),
            image: Ok(Severity::High),
        };
        assert_eq!(assess_severity(&c, "t", Some("img")), Severity::High);
        assert_eq!(assess_severity(&c, "t", None), Severity::Medium);
    }

    #[test]
    fn failures_fall_back_to_low() {
        let c = Fixed {
            text: Err(()),
            image: Err(()),
        };
        assert_eq!(assess_severity(&c, "t", Some("img")), Severity::Low);
        assert_eq!(assess_severity(&DisabledClassifier, "t", None), Severity::Low);
    }

    #[test]
    fn http_classifier_reads_result_severity() {
        let base = serve_once(r#"{"result":{"severity":"Medium","confidence":0.8}}"#);
        let classifier = HttpClassifier::new(&base, Duration::from_secs(5));
        assert_eq!(classifier.classify_text("water everywhere").expect("classify"), Severity::Medium);
    }

    #[test]
    fn unreachable_classifier_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let classifier = HttpClassifier::new(&format!("http://{addr}/"), Duration::from_millis(500));
        let err = classifier.classify_text("x").expect_err("nothing listening");
        assert!(matches!(err, ClassifyError::Transport { .. }));
        assert_eq!(err.code(), ErrorCode::ClassificationUnavailable);
    }
}
