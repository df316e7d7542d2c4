use anyhow::Result;

use super::ConsultationReply;
use super::PatientRecord;
use super::Ticket;

pub enum Event {
    ConsultationResponse(Ticket, Result<ConsultationReply>),
    PatientLookupResponse(Ticket, Result<Option<PatientRecord>>),
    ReportResponse(Ticket, Result<String>),
    TranscriptionResponse(Ticket, Result<String>),
}
