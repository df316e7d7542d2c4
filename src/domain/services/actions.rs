#[cfg(test)]
#[path = "actions_test.rs"]
mod tests;

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use super::audio::read_clip;
use super::AudioDevice;
use crate::domain::models::Action;
use crate::domain::models::AudioSource;
use crate::domain::models::ConsultationRequest;
use crate::domain::models::Event;
use crate::domain::models::ReportRequest;
use crate::domain::models::SharedBackend;
use crate::domain::models::Ticket;
use crate::domain::models::Turn;

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /consultation (/begin) - Start a new consultation.
- /report (/r) - Generate a medical consultation report once enough questions have been answered.
- /medical_report (/view) - View the most recently generated report.
- /download (/d) [DIRECTORY?] - Save the report as a text file. Defaults to the configured report directory.
- /voice (/v) [AUDIO_FILE?] - Record from the microphone, or transcribe an existing audio file, and send it as your message.
- /stop (/s) - Stop any recording or playback in progress.
- /speech [on,off] - Toggle reading assistant replies out loud.
- /lookup (/l) [FULL_NAME] - Look up your previous consultation records.
- /restart - Clear the conversation and start over.
- /home (/back) - Return to the home page.
- /quit /exit (/q) - Exit.
- /help (/h) - Provides this help menu.
        "#;

    return text.trim().to_string();
}

fn send(tx: &mpsc::UnboundedSender<Event>, event: Event) {
    if tx.send(event).is_err() {
        tracing::warn!("UI is no longer listening for backend events");
    }
}

pub async fn consult(backend: &SharedBackend, req: ConsultationRequest) -> Event {
    let res = backend.consult(&req.message, &req.history).await;
    return Event::ConsultationResponse(req.ticket, res);
}

/// Persists the conversation against the patient's name. Failures are logged
/// and never reach the user.
pub async fn save_patient(backend: &SharedBackend, name: &str, history: &[Turn]) {
    match backend.save_patient(name, history).await {
        Ok(()) => tracing::info!(name = name, turns = history.len(), "Saved patient"),
        Err(err) => tracing::warn!(error = ?err, name = name, "Failed to save patient"),
    }
}

pub async fn generate_report(backend: &SharedBackend, req: ReportRequest) -> Event {
    if let Some(name) = req.patient_name.clone() {
        let save_backend = backend.clone();
        let history = req.history.clone();
        tokio::spawn(async move {
            save_patient(&save_backend, &name, &history).await;
        });
    }

    let res = backend.generate_report(&req.history).await;
    return Event::ReportResponse(req.ticket, res);
}

pub async fn lookup_patient(backend: &SharedBackend, ticket: Ticket, name: &str) -> Event {
    let res = backend.lookup_patient(name).await;
    return Event::PatientLookupResponse(ticket, res);
}

pub async fn transcribe(
    backend: &SharedBackend,
    audio: &AudioDevice,
    ticket: Ticket,
    source: AudioSource,
) -> Event {
    let clip = match source {
        AudioSource::Microphone => audio.record().await,
        AudioSource::File(file_path) => read_clip(&file_path).await,
    };

    let res = match clip {
        Ok(clip) => backend.speech_to_text(clip).await,
        Err(err) => Err(err),
    };

    return Event::TranscriptionResponse(ticket, res);
}

/// Synthesizes `text` through the backend, falling back to the local
/// synthesizer when that fails.
pub async fn speak(backend: &SharedBackend, audio: &AudioDevice, text: &str) -> Result<()> {
    match backend.text_to_speech(text).await {
        Ok(clip) => {
            audio.play(clip).await?;
        }
        Err(err) => {
            tracing::warn!(error = ?err, "Text to speech failed, using local synthesizer");
            audio.speak_locally(text).await?;
        }
    }

    return Ok(());
}

/// Speaks assistant replies one at a time, in the order they were queued.
/// Replies still waiting when audio is stopped are dropped.
struct SpeechQueue {
    tx: mpsc::UnboundedSender<(u64, String)>,
    generation: Arc<AtomicU64>,
}

impl SpeechQueue {
    fn start(backend: SharedBackend, audio: AudioDevice) -> SpeechQueue {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u64, String)>();
        let generation = Arc::new(AtomicU64::new(0));

        let worker_generation = generation.clone();
        tokio::spawn(async move {
            while let Some((queued_in, text)) = rx.recv().await {
                if queued_in != worker_generation.load(Ordering::SeqCst) {
                    tracing::debug!("Dropping reply queued before audio was stopped");
                    continue;
                }
                if let Err(err) = speak(&backend, &audio, &text).await {
                    tracing::warn!(error = ?err, "Unable to speak assistant reply");
                }
            }
        });

        return SpeechQueue { tx, generation };
    }

    fn push(&self, text: String) {
        let generation = self.generation.load(Ordering::SeqCst);
        if self.tx.send((generation, text)).is_err() {
            tracing::warn!("Speech queue is no longer running");
        }
    }

    fn drop_queued(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct ConsultationService {}

impl ConsultationService {
    pub async fn start(
        backend: SharedBackend,
        audio: AudioDevice,
        tx: mpsc::UnboundedSender<Event>,
        rx: &mut mpsc::UnboundedReceiver<Action>,
    ) -> Result<()> {
        let speech = SpeechQueue::start(backend.clone(), audio.clone());

        loop {
            let action = rx.recv().await;
            if action.is_none() {
                return Ok(());
            }

            let worker_tx = tx.clone();
            let worker_backend = backend.clone();
            match action.unwrap() {
                Action::Consult(req) => {
                    tokio::spawn(async move {
                        send(&worker_tx, consult(&worker_backend, req).await);
                    });
                }
                Action::GenerateReport(req) => {
                    tokio::spawn(async move {
                        send(&worker_tx, generate_report(&worker_backend, req).await);
                    });
                }
                Action::LookupPatient(ticket, name) => {
                    tokio::spawn(async move {
                        send(
                            &worker_tx,
                            lookup_patient(&worker_backend, ticket, &name).await,
                        );
                    });
                }
                Action::Transcribe(ticket, source) => {
                    let worker_audio = audio.clone();
                    tokio::spawn(async move {
                        let event =
                            transcribe(&worker_backend, &worker_audio, ticket, source).await;
                        send(&worker_tx, event);
                    });
                }
                Action::Speak(text) => {
                    speech.push(text);
                }
                Action::StopAudio() => {
                    speech.drop_queued();
                    audio.stop().await;
                }
            }
        }
    }
}
