#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

use super::PatientRecord;
use super::Turn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BackendName {
    MedAI,
    Legacy,
}

impl BackendName {
    pub fn parse(text: String) -> Result<BackendName> {
        if let Some(name) = BackendName::iter().find(|e| return e.to_string() == text) {
            return Ok(name);
        }

        bail!(format!("No backend implemented for {text}"))
    }
}

/// Result of a consultation exchange. `existing_patient` is only set when the
/// backend matched the conversation to a returning patient.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsultationReply {
    pub response: String,
    pub existing_patient: Option<PatientRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioClip {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl AudioClip {
    pub fn new(file_name: &str, mime: &str, bytes: Vec<u8>) -> AudioClip {
        return AudioClip {
            file_name: file_name.to_string(),
            mime: mime.to_string(),
            bytes,
        };
    }
}

#[async_trait]
pub trait Backend {
    fn name(&self) -> BackendName;

    /// Used at startup to verify the backend is reachable before the
    /// consultation begins.
    async fn health_check(&self) -> Result<()>;

    /// Sends the new message alongside the prior conversation context. The
    /// history must not contain placeholder turns.
    async fn consult(&self, message: &str, history: &[Turn]) -> Result<ConsultationReply>;

    /// Looks up a previously saved patient by full name.
    async fn lookup_patient(&self, name: &str) -> Result<Option<PatientRecord>>;

    /// Persists the conversation against a patient name. The response body is
    /// ignored.
    async fn save_patient(&self, name: &str, history: &[Turn]) -> Result<()>;

    async fn generate_report(&self, history: &[Turn]) -> Result<String>;

    /// Synthesizes speech for `text`, returning decoded audio bytes.
    async fn text_to_speech(&self, text: &str) -> Result<AudioClip>;

    async fn speech_to_text(&self, audio: AudioClip) -> Result<String>;
}

pub type SharedBackend = Arc<dyn Backend + Send + Sync>;
