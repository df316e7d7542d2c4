#[cfg(test)]
#[path = "ui_test.rs"]
mod tests;

use std::io;
use std::path;

use anyhow::Result;
use crossterm::tty::IsTty;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::codec::LinesCodec;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Action;
use crate::domain::models::AudioSource;
use crate::domain::models::Event;
use crate::domain::models::Page;
use crate::domain::models::SharedBackend;
use crate::domain::models::SlashCommand;
use crate::domain::services::actions::help_text;
use crate::domain::services::BubbleSink;
use crate::domain::services::ReportStore;
use crate::domain::services::Session;
use crate::domain::services::SessionSettings;

fn home_text() -> String {
    let text = r#"
Answer a few questions about your health concerns and receive a consultation
report you can save as a text file.

Type /consultation to begin, /lookup YOUR NAME to load your previous records,
or /help for all commands.
        "#;

    return text.trim().to_string();
}

/// Routes typed lines and backend events to the session and the pages.
/// Everything shown goes through the session's sink, which keeps track of
/// what is on screen.
pub struct ConsultationApp {
    session: Session,
    reports: ReportStore,
    page: Page,
    tx: mpsc::UnboundedSender<Action>,
    report_dir: path::PathBuf,
}

impl ConsultationApp {
    pub fn new(
        session: Session,
        reports: ReportStore,
        tx: mpsc::UnboundedSender<Action>,
        report_dir: path::PathBuf,
    ) -> ConsultationApp {
        return ConsultationApp {
            session,
            reports,
            page: Page::Home,
            tx,
            report_dir,
        };
    }

    fn print(&mut self, text: &str) -> Result<()> {
        return self.session.note(text);
    }

    fn print_title(&mut self, title: &str) -> Result<()> {
        let underline = "═".repeat(title.chars().count());
        return self.print(&format!("\n{title}\n{underline}"));
    }

    pub fn show_page(&mut self, page: Page) -> Result<()> {
        self.page = page;
        tracing::debug!(page = page.path(), "Showing page");

        match page {
            Page::Home => {
                self.print_title("Medical Consultation Assistant")?;
                self.print(&home_text())?;
            }
            Page::Consultation => {
                if self.session.turn_count() == 0 {
                    self.session.restart()?;
                } else if let Some(patient) = self.session.current_patient() {
                    let text = format!("Continuing your consultation, {}.", patient.name);
                    self.print(&text)?;
                } else {
                    self.print("Continuing your consultation.")?;
                }
            }
            Page::MedicalReport => match self.reports.get() {
                Some(report) => {
                    self.print_title("Medical Consultation Report")?;
                    self.print(&report)?;
                    self.print("\nUse /download to save this report, or /back to return home.")?;
                }
                None => {
                    self.print("No report has been generated yet. Use /report during a consultation once you have answered a few questions.")?;
                }
            },
        }

        return Ok(());
    }

    fn ensure_consultation(&mut self) -> Result<()> {
        if self.page != Page::Consultation {
            self.show_page(Page::Consultation)?;
        }

        return Ok(());
    }

    async fn download(&mut self, dir: path::PathBuf) -> Result<()> {
        match self.reports.download(&dir).await {
            Ok(file_path) => {
                self.print(&format!("Saved report to {}", file_path.to_string_lossy()))?;
            }
            Err(err) => {
                tracing::warn!(error = ?err, "Report download failed");
                self.print(&format!("Unable to save report: {err}"))?;
            }
        }

        return Ok(());
    }

    /// Returns false when the user asked to quit.
    pub async fn handle_command(&mut self, command: SlashCommand) -> Result<bool> {
        if command.is_quit() {
            return Ok(false);
        }

        if command.is_help() {
            self.print(&help_text())?;
            return Ok(true);
        }

        if let Some(page) = command.page() {
            self.show_page(page)?;
            return Ok(true);
        }

        if command.is_restart() {
            self.page = Page::Consultation;
            self.session.restart()?;
            return Ok(true);
        }

        if command.is_generate_report() {
            self.ensure_consultation()?;
            if let Some(req) = self.session.begin_report()? {
                self.tx.send(Action::GenerateReport(req))?;
            }
            return Ok(true);
        }

        if command.is_download() {
            let mut dir = self.report_dir.clone();
            if !command.rest().is_empty() {
                dir = path::PathBuf::from(command.rest());
            }
            self.download(dir).await?;
            return Ok(true);
        }

        if command.is_voice() {
            self.ensure_consultation()?;
            let mut source = AudioSource::Microphone;
            if !command.rest().is_empty() {
                source = AudioSource::File(path::PathBuf::from(command.rest()));
            }
            let ticket = self.session.begin_transcription(&source)?;
            self.tx.send(Action::Transcribe(ticket, source))?;
            return Ok(true);
        }

        if command.is_stop_audio() {
            self.tx.send(Action::StopAudio())?;
            return Ok(true);
        }

        if command.is_speech_toggle() {
            let enabled = command
                .speech_setting()
                .unwrap_or(!self.session.auto_speech());
            self.session.set_auto_speech(enabled);
            if enabled {
                self.print("Assistant replies will be read out loud.")?;
            } else {
                self.print("Assistant replies will no longer be read out loud.")?;
            }
            return Ok(true);
        }

        if command.is_lookup() {
            self.ensure_consultation()?;
            match self.session.begin_lookup(&command.rest())? {
                Some((ticket, name)) => {
                    self.tx.send(Action::LookupPatient(ticket, name))?;
                }
                None => {
                    self.print("Usage: /lookup FULL NAME")?;
                }
            }
            return Ok(true);
        }

        return Ok(true);
    }

    /// Returns false when the user asked to quit.
    pub async fn handle_input(&mut self, line: &str) -> Result<bool> {
        if let Some(command) = SlashCommand::parse(line) {
            return self.handle_command(command).await;
        }

        let text = line.trim();
        if text.is_empty() {
            return Ok(true);
        }
        if text.starts_with('/') {
            self.print(&format!("Unknown command {text}. Type /help for all commands."))?;
            return Ok(true);
        }

        self.ensure_consultation()?;
        if let Some(req) = self.session.begin_submit(text)? {
            self.tx.send(Action::Consult(req))?;
        }

        return Ok(true);
    }

    pub fn handle_event(&mut self, event: Event) -> Result<()> {
        if let Some(action) = self.session.apply(event, &self.reports)? {
            self.tx.send(action)?;
        }

        return Ok(());
    }
}

pub async fn start(
    backend: SharedBackend,
    tx: mpsc::UnboundedSender<Action>,
    mut rx: mpsc::UnboundedReceiver<Event>,
) -> Result<()> {
    let columns = crossterm::terminal::size()
        .map(|(cols, _)| return usize::from(cols))
        .unwrap_or(80);

    let sink = BubbleSink::new(io::stdout(), &Config::get(ConfigKey::Username), columns);
    let session = Session::new(
        Box::new(sink),
        SessionSettings {
            auto_speech: Config::get_bool(ConfigKey::AutoSpeech),
            report_min_turns: Config::get_usize(ConfigKey::ReportMinTurns)?,
        },
    )
    .with_actions(tx.clone());

    let mut app = ConsultationApp::new(
        session,
        ReportStore::default(),
        tx,
        path::PathBuf::from(Config::get(ConfigKey::ReportDir)),
    );

    if let Err(err) = backend.health_check().await {
        tracing::warn!(error = ?err, backend = %backend.name(), "Backend health check failed");
        let warning = format!(
            "Unable to reach the {} backend at {}. Replies will fail until it is available.",
            backend.name(),
            Config::get(ConfigKey::BackendURL)
        );
        app.print(&warning)?;
    }

    app.show_page(Page::Home)?;

    let echoes_input = io::stdin().is_tty();
    let mut lines = FramedRead::new(tokio::io::stdin(), LinesCodec::new());
    loop {
        tokio::select! {
            line = lines.next() => {
                match line {
                    Some(Ok(line)) => {
                        if echoes_input {
                            app.session.discard_echo(&line)?;
                        }
                        if !app.handle_input(&line).await? {
                            break;
                        }
                    }
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                }
            }
            event = rx.recv() => {
                match event {
                    Some(event) => app.handle_event(event)?,
                    None => break,
                }
            }
        }
    }

    return Ok(());
}
