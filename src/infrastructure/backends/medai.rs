#[cfg(test)]
#[path = "medai_test.rs"]
mod tests;

use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use reqwest::multipart;
use serde::de::DeserializeOwned;
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

#[derive(Debug, Serialize)]
struct ConsultationRequest<'a> {
    message: &'a str,
    history: &'a [Turn],
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ExistingPatient {
    found: bool,
    name: Option<String>,
    last_consultation: Option<String>,
    summary: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ConsultationResponse {
    response: String,
    #[serde(default)]
    existing_patient: Option<ExistingPatient>,
}

#[derive(Debug, Serialize)]
struct NameRequest<'a> {
    name: &'a str,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LookupPatient {
    full_name: Option<String>,
    last_consultation: Option<String>,
    chief_complaint: Option<String>,
    current_medications: Option<String>,
    allergies: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LookupResponse {
    found: bool,
    #[serde(default)]
    patient: Option<LookupPatient>,
}

#[derive(Debug, Serialize)]
struct SavePatientRequest<'a> {
    name: &'a str,
    history: &'a [Turn],
}

#[derive(Debug, Serialize)]
struct ReportRequest<'a> {
    history: &'a [Turn],
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ReportResponse {
    report: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SpeechResponse {
    audio: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TranscriptionResponse {
    transcription: String,
}

impl From<ExistingPatient> for PatientRecord {
    fn from(val: ExistingPatient) -> Self {
        return PatientRecord {
            name: val.name.unwrap_or_default(),
            last_consultation_date: val.last_consultation.unwrap_or_default(),
            summary: val.summary.unwrap_or_default(),
        };
    }
}

impl From<LookupPatient> for PatientRecord {
    fn from(val: LookupPatient) -> Self {
        let mut summary: Vec<String> = vec![];
        if let Some(complaint) = val.chief_complaint.filter(|e| return !e.is_empty()) {
            summary.push(format!("Chief Complaint: {complaint}"));
        }
        if let Some(medications) = val.current_medications.filter(|e| return !e.is_empty()) {
            summary.push(format!("Current Medications: {medications}"));
        }
        if let Some(allergies) = val.allergies.filter(|e| return !e.is_empty()) {
            summary.push(format!("Allergies: {allergies}"));
        }

        return PatientRecord {
            name: val.full_name.unwrap_or_default(),
            last_consultation_date: val.last_consultation.unwrap_or_default(),
            summary: summary.join(", "),
        };
    }
}

/// Client for the consultation backend that serves chat, patient records,
/// reports and speech.
pub struct MedAI {
    url: String,
    timeout: String,
}

impl Default for MedAI {
    fn default() -> MedAI {
        return MedAI::new(
            &Config::get(ConfigKey::BackendURL),
            &Config::get(ConfigKey::BackendHealthCheckTimeout),
        );
    }
}

impl MedAI {
    pub fn new(url: &str, timeout: &str) -> MedAI {
        return MedAI {
            url: url.trim_end_matches('/').to_string(),
            timeout: timeout.to_string(),
        };
    }

    async fn post_json<B: serde::Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let res = reqwest::Client::new()
            .post(format!("{url}{path}", url = self.url))
            .json(body)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                path = path,
                "MedAI request failed"
            );
            bail!(format!("MedAI request to {path} failed"));
        }

        let payload = res.json::<R>().await?;
        return Ok(payload);
    }
}

#[async_trait]
impl Backend for MedAI {
    fn name(&self) -> BackendName {
        return BackendName::MedAI;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("MedAI URL is not defined");
        }

        let res = reqwest::Client::new()
            .get(&self.url)
            .timeout(Duration::from_millis(self.timeout.parse::<u64>()?))
            .send()
            .await;

        if res.is_err() {
            tracing::error!(error = ?res.unwrap_err(), "MedAI is not reachable");
            bail!("MedAI is not reachable");
        }

        let status = res.unwrap().status().as_u16();
        if status >= 400 {
            tracing::error!(status = status, "MedAI health check failed");
            bail!("MedAI health check failed");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn consult(&self, message: &str, history: &[Turn]) -> Result<ConsultationReply> {
        let req = ConsultationRequest { message, history };
        let res: ConsultationResponse = self.post_json("/consultation_chat", &req).await?;
        tracing::debug!(body = ?res, "Consultation response");

        let existing_patient = res
            .existing_patient
            .filter(|e| return e.found)
            .map(PatientRecord::from);

        return Ok(ConsultationReply {
            response: res.response,
            existing_patient,
        });
    }

    #[allow(clippy::implicit_return)]
    async fn lookup_patient(&self, name: &str) -> Result<Option<PatientRecord>> {
        let res: LookupResponse = self
            .post_json("/lookup_patient", &NameRequest { name })
            .await?;

        if !res.found {
            return Ok(None);
        }

        let mut patient = PatientRecord::from(res.patient.unwrap_or_default());
        if patient.name.is_empty() {
            patient.name = name.to_string();
        }

        return Ok(Some(patient));
    }

    #[allow(clippy::implicit_return)]
    async fn save_patient(&self, name: &str, history: &[Turn]) -> Result<()> {
        let res = reqwest::Client::new()
            .post(format!("{url}/save_patient", url = self.url))
            .json(&SavePatientRequest { name, history })
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(status = res.status().as_u16(), "Failed to save patient");
            bail!("Failed to save patient");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn generate_report(&self, history: &[Turn]) -> Result<String> {
        let res: ReportResponse = self
            .post_json("/generate_report", &ReportRequest { history })
            .await?;

        return Ok(res.report);
    }

    #[allow(clippy::implicit_return)]
    async fn text_to_speech(&self, text: &str) -> Result<AudioClip> {
        let res: SpeechResponse = self
            .post_json("/text-to-speech", &SpeechRequest { text })
            .await?;

        if res.audio.is_empty() {
            bail!("Text to speech returned no audio");
        }

        let bytes = b64.decode(res.audio)?;
        return Ok(AudioClip::new("speech.mp3", "audio/mpeg", bytes));
    }

    #[allow(clippy::implicit_return)]
    async fn speech_to_text(&self, audio: AudioClip) -> Result<String> {
        let part = multipart::Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.mime)?;
        let form = multipart::Form::new().part("file", part);

        let res = reqwest::Client::new()
            .post(format!("{url}/speech-to-text", url = self.url))
            .multipart(form)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(status = res.status().as_u16(), "Speech to text failed");
            bail!("Speech to text failed");
        }

        let payload = res.json::<TranscriptionResponse>().await?;
        return Ok(payload.transcription.trim().to_string());
    }
}
