#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use anyhow::Result;
use tokio::sync::mpsc;

use super::extract_patient_name;
use super::ReportStore;
use crate::domain::models::Action;
use crate::domain::models::AudioSource;
use crate::domain::models::ConsultationReply;
use crate::domain::models::ConsultationRequest;
use crate::domain::models::Event;
use crate::domain::models::PatientRecord;
use crate::domain::models::ReportRequest;
use crate::domain::models::Role;
use crate::domain::models::Ticket;
use crate::domain::models::Turn;
use crate::domain::models::TurnSink;

pub const GREETING: &str = "Hello! I'm your medical consultation assistant. I'll ask you a series of questions to better understand your health concerns and provide you with a comprehensive report. Let's start: What is your main health concern or symptom today?";
pub const PROCESSING: &str = "Processing...";
pub const GENERATING: &str = "Generating your medical consultation report...";
pub const LISTENING: &str = "Listening... Please speak now.";
pub const TRANSCRIBING: &str = "Transcribing your recording...";
pub const LOOKING_UP: &str = "Looking up your previous records...";
pub const ADVICE_ERROR: &str = "Sorry, there was an error getting advice.";
pub const REPORT_ERROR: &str =
    "Sorry, there was an error generating the report. Please try again.";
pub const LOOKUP_ERROR: &str = "Sorry, there was an error looking up your records.";
pub const NEED_MORE_INFORMATION: &str = "I need more information before generating a report. Please answer a few more questions about your health concerns.";
pub const TRANSCRIPTION_FAILED: &str =
    "Sorry, I couldn't understand the recording. Please try typing your message instead.";
pub const REPORT_READY: &str = "Your medical consultation report is ready. Use /medical_report to view it or /download to save it as a text file.";

pub struct SessionSettings {
    pub auto_speech: bool,
    pub report_min_turns: usize,
}

impl Default for SessionSettings {
    fn default() -> SessionSettings {
        return SessionSettings {
            auto_speech: false,
            report_min_turns: 6,
        };
    }
}

/// Conversation state for one consultation. Owns the transcript and mirrors
/// every change to its `TurnSink`. Network work is described by the requests
/// returned from the `begin_*` methods and reconciled by `apply`.
pub struct Session {
    turns: Vec<Turn>,
    current_patient: Option<PatientRecord>,
    is_returning_patient: bool,
    auto_speech: bool,
    report_min_turns: usize,
    epoch: u64,
    next_placeholder_id: u64,
    sink: Box<dyn TurnSink>,
    actions: Option<mpsc::UnboundedSender<Action>>,
}

impl Session {
    pub fn new(sink: Box<dyn TurnSink>, settings: SessionSettings) -> Session {
        return Session {
            turns: vec![],
            current_patient: None,
            is_returning_patient: false,
            auto_speech: settings.auto_speech,
            report_min_turns: settings.report_min_turns,
            epoch: 0,
            next_placeholder_id: 0,
            sink,
            actions: None,
        };
    }

    /// Channel used to request speech for assistant turns.
    pub fn with_actions(mut self, tx: mpsc::UnboundedSender<Action>) -> Session {
        self.actions = Some(tx);
        return self;
    }

    pub fn turns(&self) -> &[Turn] {
        return &self.turns;
    }

    /// Number of real turns, placeholders excluded.
    pub fn turn_count(&self) -> usize {
        return self.turns.iter().filter(|e| return !e.is_placeholder()).count();
    }

    /// Transcript as sent to the backend.
    pub fn history(&self) -> Vec<Turn> {
        return self
            .turns
            .iter()
            .filter(|e| return !e.is_placeholder())
            .cloned()
            .collect();
    }

    pub fn current_patient(&self) -> Option<&PatientRecord> {
        return self.current_patient.as_ref();
    }

    pub fn is_returning_patient(&self) -> bool {
        return self.is_returning_patient;
    }

    pub fn auto_speech(&self) -> bool {
        return self.auto_speech;
    }

    pub fn set_auto_speech(&mut self, enabled: bool) {
        self.auto_speech = enabled;
    }

    pub fn is_waiting(&self) -> bool {
        return self.turns.iter().any(|e| return e.is_placeholder());
    }

    pub fn append(&mut self, role: Role, text: &str) -> Result<()> {
        let turn = Turn::new(role, text);
        self.sink.append(&turn)?;
        self.turns.push(turn);

        if role == Role::Assistant && self.auto_speech {
            if let Some(tx) = &self.actions {
                tx.send(Action::Speak(text.to_string()))?;
            }
        }

        return Ok(());
    }

    /// Shows a status line below the transcript without adding a turn.
    pub fn note(&mut self, text: &str) -> Result<()> {
        return self.sink.note(text);
    }

    pub fn discard_echo(&mut self, line: &str) -> Result<()> {
        return self.sink.discard_echo(line);
    }

    pub fn clear(&mut self) -> Result<()> {
        self.sink.clear()?;
        self.turns.clear();
        self.current_patient = None;
        self.is_returning_patient = false;
        self.epoch += 1;

        return Ok(());
    }

    pub fn restart(&mut self) -> Result<()> {
        self.clear()?;
        self.append(Role::Assistant, GREETING)?;

        return Ok(());
    }

    /// Removes the most recent turn with `role`. Returns false when there is
    /// none.
    pub fn retract_last(&mut self, role: Role) -> Result<bool> {
        if let Some(idx) = self.turns.iter().rposition(|e| return e.role == role) {
            self.remove(idx)?;
            return Ok(true);
        }

        return Ok(false);
    }

    fn remove(&mut self, idx: usize) -> Result<()> {
        self.sink.retract(idx)?;
        self.turns.remove(idx);

        return Ok(());
    }

    fn append_placeholder(&mut self, text: &str) -> Result<Ticket> {
        self.next_placeholder_id += 1;
        let ticket = Ticket {
            epoch: self.epoch,
            id: self.next_placeholder_id,
        };

        let turn = Turn::placeholder(ticket.id, text);
        self.sink.append(&turn)?;
        self.turns.push(turn);

        return Ok(ticket);
    }

    fn retract_placeholder(&mut self, ticket: Ticket) -> Result<()> {
        if let Some(idx) = self
            .turns
            .iter()
            .rposition(|e| return e.placeholder_id() == Some(ticket.id))
        {
            self.remove(idx)?;
        }

        return Ok(());
    }

    fn is_stale(&self, ticket: Ticket) -> bool {
        if ticket.epoch != self.epoch {
            tracing::debug!(
                ticket = ticket.id,
                epoch = ticket.epoch,
                current_epoch = self.epoch,
                "Dropping response from a previous session"
            );
            return true;
        }

        return false;
    }

    fn set_patient(&mut self, patient: PatientRecord) -> Result<()> {
        self.append(Role::Assistant, &patient.welcome_message())?;
        if let Some(summary) = patient.summary_message() {
            self.append(Role::Assistant, &summary)?;
        }

        self.current_patient = Some(patient);
        self.is_returning_patient = true;

        return Ok(());
    }

    /// Records the user's message and a "Processing..." placeholder, returning
    /// the request to send. Empty input is ignored.
    pub fn begin_submit(&mut self, text: &str) -> Result<Option<ConsultationRequest>> {
        let message = text.trim();
        if message.is_empty() {
            return Ok(None);
        }

        let history = self.history();
        self.append(Role::User, message)?;
        let ticket = self.append_placeholder(PROCESSING)?;

        return Ok(Some(ConsultationRequest {
            ticket,
            message: message.to_string(),
            history,
        }));
    }

    pub fn finish_submit(
        &mut self,
        ticket: Ticket,
        res: Result<ConsultationReply>,
    ) -> Result<()> {
        if self.is_stale(ticket) {
            return Ok(());
        }
        self.retract_placeholder(ticket)?;

        match res {
            Ok(reply) => {
                if let Some(patient) = reply.existing_patient {
                    self.set_patient(patient)?;
                }
                self.append(Role::Assistant, &reply.response)?;
            }
            Err(err) => {
                tracing::error!(error = ?err, "Consultation request failed");
                self.append(Role::Assistant, ADVICE_ERROR)?;
            }
        }

        return Ok(());
    }

    /// Returns `None` after appending guidance when the conversation is still
    /// too short for a report.
    pub fn begin_report(&mut self) -> Result<Option<ReportRequest>> {
        if self.turn_count() < self.report_min_turns {
            self.append(Role::Assistant, NEED_MORE_INFORMATION)?;
            return Ok(None);
        }

        let history = self.history();
        let patient_name = extract_patient_name(&history);
        let ticket = self.append_placeholder(GENERATING)?;

        return Ok(Some(ReportRequest {
            ticket,
            history,
            patient_name,
        }));
    }

    pub fn finish_report(
        &mut self,
        ticket: Ticket,
        res: Result<String>,
        reports: &ReportStore,
    ) -> Result<()> {
        if self.is_stale(ticket) {
            return Ok(());
        }
        self.retract_placeholder(ticket)?;

        match res {
            Ok(report) => {
                reports.store(&report);
                self.append(Role::Assistant, REPORT_READY)?;
            }
            Err(err) => {
                tracing::error!(error = ?err, "Report generation failed");
                self.append(Role::Assistant, REPORT_ERROR)?;
            }
        }

        return Ok(());
    }

    pub fn begin_transcription(&mut self, source: &AudioSource) -> Result<Ticket> {
        let text = match source {
            AudioSource::Microphone => LISTENING,
            AudioSource::File(_) => TRANSCRIBING,
        };

        return self.append_placeholder(text);
    }

    /// A usable transcript is submitted as if typed, returning the resulting
    /// consultation request.
    pub fn finish_transcription(
        &mut self,
        ticket: Ticket,
        res: Result<String>,
    ) -> Result<Option<ConsultationRequest>> {
        if self.is_stale(ticket) {
            return Ok(None);
        }
        self.retract_placeholder(ticket)?;

        match res {
            Ok(transcript) if !transcript.trim().is_empty() => {
                return self.begin_submit(&transcript);
            }
            Ok(_) => {
                tracing::warn!("Speech to text returned an empty transcription");
            }
            Err(err) => {
                tracing::error!(error = ?err, "Speech to text failed");
            }
        }

        self.append(Role::Assistant, TRANSCRIPTION_FAILED)?;
        return Ok(None);
    }

    pub fn begin_lookup(&mut self, name: &str) -> Result<Option<(Ticket, String)>> {
        let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            return Ok(None);
        }

        let ticket = self.append_placeholder(LOOKING_UP)?;
        return Ok(Some((ticket, name)));
    }

    pub fn finish_lookup(
        &mut self,
        ticket: Ticket,
        res: Result<Option<PatientRecord>>,
    ) -> Result<()> {
        if self.is_stale(ticket) {
            return Ok(());
        }
        self.retract_placeholder(ticket)?;

        match res {
            Ok(Some(patient)) => {
                self.set_patient(patient)?;
            }
            Ok(None) => {
                self.append(
                    Role::Assistant,
                    "I couldn't find any previous records under that name. Let's continue with your consultation.",
                )?;
            }
            Err(err) => {
                tracing::error!(error = ?err, "Patient lookup failed");
                self.append(Role::Assistant, LOOKUP_ERROR)?;
            }
        }

        return Ok(());
    }

    /// Reconciles a backend event with the session. A follow up action is
    /// returned when the event produces a new request.
    pub fn apply(&mut self, event: Event, reports: &ReportStore) -> Result<Option<Action>> {
        match event {
            Event::ConsultationResponse(ticket, res) => {
                self.finish_submit(ticket, res)?;
            }
            Event::PatientLookupResponse(ticket, res) => {
                self.finish_lookup(ticket, res)?;
            }
            Event::ReportResponse(ticket, res) => {
                self.finish_report(ticket, res, reports)?;
            }
            Event::TranscriptionResponse(ticket, res) => {
                if let Some(req) = self.finish_transcription(ticket, res)? {
                    return Ok(Some(Action::Consult(req)));
                }
            }
        }

        return Ok(None);
    }
}
