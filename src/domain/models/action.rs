use std::path::PathBuf;

use super::Turn;

/// Identifies an in-flight request. `epoch` changes whenever the session is
/// cleared, `id` names the placeholder turn the request owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub id: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsultationRequest {
    pub ticket: Ticket,
    pub message: String,
    pub history: Vec<Turn>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRequest {
    pub ticket: Ticket,
    pub history: Vec<Turn>,
    pub patient_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioSource {
    Microphone,
    File(PathBuf),
}

#[derive(Debug)]
pub enum Action {
    Consult(ConsultationRequest),
    GenerateReport(ReportRequest),
    LookupPatient(Ticket, String),
    Speak(String),
    StopAudio(),
    Transcribe(Ticket, AudioSource),
}
