//! HTTP Classifier Implementation
//!
//! Implements the `PlantClassifier` trait against the classification
//! backend's `/detect` endpoint: the image goes up as a multipart form
//! upload, the response carries the resolved subject id (or none).

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::classify::{Identification, PlantClassifier};
use crate::core::settings::RemoteSettings;
use crate::core::{CoreError, CoreResult};

// =============================================================================
// HTTP Classifier
// =============================================================================

/// Classification service client over HTTP.
pub struct HttpClassifier {
    /// Base URL of the classification backend
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

impl HttpClassifier {
    /// Creates a classifier from remote-service settings.
    pub fn new(settings: &RemoteSettings) -> CoreResult<Self> {
        let base_url = settings.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(CoreError::ValidationError(
                "Classification service base URL cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Deserialize)]
struct DetectResponse {
    /// Resolved subject id; absent or null when nothing was recognized.
    #[serde(default)]
    id: Option<String>,
}

#[async_trait]
impl PlantClassifier for HttpClassifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn identify(&self, image: &[u8]) -> CoreResult<Identification> {
        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| CoreError::Internal(format!("Failed to build upload part: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(format!("{}/detect", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| CoreError::RemoteCallFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::RemoteCallFailed(format!(
                "Classification service returned {}",
                status
            )));
        }

        let body: DetectResponse = response
            .json()
            .await
            .map_err(|e| CoreError::RemoteCallFailed(format!("Malformed response: {}", e)))?;

        Ok(Identification {
            subject_id: body.id,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_base_url() {
        let settings = RemoteSettings {
            base_url: "   ".to_string(),
            ..RemoteSettings::default()
        };

        assert!(matches!(
            HttpClassifier::new(&settings),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let settings = RemoteSettings {
            base_url: "http://localhost:8000/".to_string(),
            ..RemoteSettings::default()
        };

        let classifier = HttpClassifier::new(&settings).unwrap();
        assert_eq!(classifier.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_detect_response_parsing() {
        let resolved: DetectResponse = serde_json::from_str(r#"{"id":"subj_9"}"#).unwrap();
        assert_eq!(resolved.id.as_deref(), Some("subj_9"));

        let unresolved: DetectResponse = serde_json::from_str(r#"{"id":null}"#).unwrap();
        assert!(unresolved.id.is_none());

        let empty: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.id.is_none());
    }
}
