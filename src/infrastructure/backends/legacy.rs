#[cfg(test)]
#[path = "legacy_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::AudioClip;
use crate::domain::models::Backend;
use crate::domain::models::BackendName;
use crate::domain::models::ConsultationReply;
use crate::domain::models::PatientRecord;
use crate::domain::models::Turn;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AdviceRequest {
    text: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AdviceResponse {
    advice: String,
}

/// Single endpoint advice backend. Stateless: every message is sent without
/// history, and records, reports and speech are unavailable.
pub struct Legacy {
    url: String,
    timeout: String,
}

impl Default for Legacy {
    fn default() -> Legacy {
        return Legacy::new(
            &Config::get(ConfigKey::BackendURL),
            &Config::get(ConfigKey::BackendHealthCheckTimeout),
        );
    }
}

impl Legacy {
    pub fn new(url: &str, timeout: &str) -> Legacy {
        return Legacy {
            url: url.trim_end_matches('/').to_string(),
            timeout: timeout.to_string(),
        };
    }
}

#[async_trait]
impl Backend for Legacy {
    fn name(&self) -> BackendName {
        return BackendName::Legacy;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        let res = reqwest::Client::new()
            .get(&self.url)
            .timeout(Duration::from_millis(self.timeout.parse::<u64>()?))
            .send()
            .await;

        if res.is_err() {
            tracing::error!(error = ?res.unwrap_err(), "Advice backend is not reachable");
            bail!("Advice backend is not reachable");
        }

        let res = res.unwrap();
        if !res.status().is_success() {
            tracing::error!(status = res.status().as_u16(), "Advice backend health check failed");
            bail!("Advice backend health check failed");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn consult(&self, message: &str, _history: &[Turn]) -> Result<ConsultationReply> {
        let req = AdviceRequest {
            text: message.to_string(),
        };

        let res = reqwest::Client::new()
            .post(format!("{url}/get_advice", url = self.url))
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to make advice request"
            );
            bail!("Failed to make advice request");
        }

        let payload = res.json::<AdviceResponse>().await?;
        return Ok(ConsultationReply {
            response: payload.advice,
            existing_patient: None,
        });
    }

    #[allow(clippy::implicit_return)]
    async fn lookup_patient(&self, _name: &str) -> Result<Option<PatientRecord>> {
        bail!("The legacy backend does not keep patient records")
    }

    #[allow(clippy::implicit_return)]
    async fn save_patient(&self, _name: &str, _history: &[Turn]) -> Result<()> {
        bail!("The legacy backend does not keep patient records")
    }

    #[allow(clippy::implicit_return)]
    async fn generate_report(&self, _history: &[Turn]) -> Result<String> {
        bail!("The legacy backend cannot generate reports")
    }

    #[allow(clippy::implicit_return)]
    async fn text_to_speech(&self, _text: &str) -> Result<AudioClip> {
        bail!("The legacy backend does not support text to speech")
    }

    #[allow(clippy::implicit_return)]
    async fn speech_to_text(&self, _audio: AudioClip) -> Result<String> {
        bail!("The legacy backend does not support speech to text")
    }
}
