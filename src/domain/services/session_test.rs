use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use tokio::sync::mpsc;

use super::Session;
use super::SessionSettings;
use super::ADVICE_ERROR;
use super::GENERATING;
use super::GREETING;
use super::NEED_MORE_INFORMATION;
use super::PROCESSING;
use super::REPORT_ERROR;
use super::REPORT_READY;
use super::TRANSCRIPTION_FAILED;
use crate::domain::models::Action;
use crate::domain::models::AudioSource;
use crate::domain::models::ConsultationReply;
use crate::domain::models::Event;
use crate::domain::models::PatientRecord;
use crate::domain::models::RecordingSink;
use crate::domain::models::Role;
use crate::domain::models::Turn;
use crate::domain::services::ReportStore;

fn session() -> (Session, RecordingSink) {
    let sink = RecordingSink::default();
    let session = Session::new(Box::new(sink.clone()), SessionSettings::default());
    return (session, sink);
}

fn reply(text: &str) -> ConsultationReply {
    return ConsultationReply {
        response: text.to_string(),
        existing_patient: None,
    };
}

fn seed(session: &mut Session, count: usize) -> Result<()> {
    for idx in 0..count {
        if idx % 2 == 0 {
            session.append(Role::Assistant, &format!("Question {idx}"))?;
        } else {
            session.append(Role::User, &format!("Answer {idx}"))?;
        }
    }

    return Ok(());
}

mod submit {
    use super::*;

    #[test]
    fn it_ignores_empty_input() -> Result<()> {
        let (mut session, sink) = session();

        assert!(session.begin_submit("").unwrap().is_none());
        assert!(session.begin_submit("   \n\t").unwrap().is_none());
        assert!(session.turns().is_empty());
        assert!(sink.rendered().is_empty());

        return Ok(());
    }

    #[test]
    fn it_appends_user_turn_and_placeholder() -> Result<()> {
        let (mut session, sink) = session();
        session.append(Role::Assistant, GREETING)?;

        let req = session.begin_submit("I have a headache")?.unwrap();

        assert_eq!(req.message, "I have a headache");
        assert_eq!(req.history, vec![Turn::new(Role::Assistant, GREETING)]);
        assert_eq!(session.turns().len(), 3);
        assert_eq!(
            session.turns()[1],
            Turn::new(Role::User, "I have a headache")
        );
        assert!(session.turns()[2].is_placeholder());
        assert_eq!(session.turns()[2].content, PROCESSING);
        assert_eq!(sink.rendered(), session.turns().to_vec());
        assert!(session.is_waiting());

        return Ok(());
    }

    #[test]
    fn it_trims_input() -> Result<()> {
        let (mut session, _sink) = session();
        let req = session.begin_submit("  I feel dizzy \n")?.unwrap();

        assert_eq!(req.message, "I feel dizzy");
        assert_eq!(session.turns()[0].content, "I feel dizzy");

        return Ok(());
    }

    #[test]
    fn it_resolves_headache_scenario() -> Result<()> {
        let (mut session, sink) = session();

        let req = session.begin_submit("I have a headache")?.unwrap();
        assert!(req.history.is_empty());

        session.finish_submit(req.ticket, Ok(reply("How long have you had it?")))?;

        let expected = vec![
            Turn::new(Role::User, "I have a headache"),
            Turn::new(Role::Assistant, "How long have you had it?"),
        ];
        assert_eq!(session.turns().to_vec(), expected);
        assert_eq!(sink.rendered(), expected);
        assert!(!session.is_waiting());

        return Ok(());
    }

    #[test]
    fn it_reports_errors_and_retracts_placeholder() -> Result<()> {
        let (mut session, sink) = session();

        let req = session.begin_submit("I have a headache")?.unwrap();
        session.finish_submit(req.ticket, Err(anyhow!("connection refused")))?;

        assert_eq!(
            sink.contents(),
            vec!["I have a headache".to_string(), ADVICE_ERROR.to_string()]
        );
        assert!(session.turns().iter().all(|e| return !e.is_placeholder()));

        return Ok(());
    }

    #[test]
    fn it_welcomes_returning_patients() -> Result<()> {
        let (mut session, sink) = session();

        let req = session.begin_submit("My name is Sarah Thompson")?.unwrap();
        let patient = PatientRecord {
            name: "Sarah Thompson".to_string(),
            last_consultation_date: "2024-05-02".to_string(),
            summary: "Chief Complaint: stomach pain".to_string(),
        };
        session.finish_submit(
            req.ticket,
            Ok(ConsultationReply {
                response: "What brings you in today?".to_string(),
                existing_patient: Some(patient.clone()),
            }),
        )?;

        assert!(session.is_returning_patient());
        assert_eq!(session.current_patient(), Some(&patient));
        assert_eq!(
            sink.contents(),
            vec![
                "My name is Sarah Thompson".to_string(),
                "Welcome back, Sarah Thompson! I see your last consultation was on 2024-05-02."
                    .to_string(),
                "Here is a summary of your previous records: Chief Complaint: stomach pain"
                    .to_string(),
                "What brings you in today?".to_string(),
            ]
        );

        return Ok(());
    }

    #[test]
    fn it_skips_empty_patient_summaries() -> Result<()> {
        let (mut session, _sink) = session();

        let req = session.begin_submit("This is Jane Doe")?.unwrap();
        session.finish_submit(
            req.ticket,
            Ok(ConsultationReply {
                response: "How can I help?".to_string(),
                existing_patient: Some(PatientRecord {
                    name: "Jane Doe".to_string(),
                    ..Default::default()
                }),
            }),
        )?;

        assert_eq!(session.turns().len(), 3);
        assert_eq!(
            session.turns()[1].content,
            "Welcome back, Jane Doe! I found your previous records."
        );

        return Ok(());
    }

    #[test]
    fn it_keeps_real_turns_when_responses_arrive_out_of_order() -> Result<()> {
        let (mut session, _sink) = session();

        let first = session.begin_submit("I have a headache")?.unwrap();
        let second = session.begin_submit("It started yesterday")?.unwrap();
        assert_eq!(
            second.history,
            vec![Turn::new(Role::User, "I have a headache")]
        );

        session.finish_submit(second.ticket, Ok(reply("Second reply")))?;
        session.finish_submit(first.ticket, Ok(reply("First reply")))?;

        assert_eq!(
            session
                .turns()
                .iter()
                .map(|e| return e.content.as_str())
                .collect::<Vec<_>>(),
            vec![
                "I have a headache",
                "It started yesterday",
                "Second reply",
                "First reply",
            ]
        );

        return Ok(());
    }

    #[test]
    fn it_drops_responses_from_before_a_restart() -> Result<()> {
        let (mut session, sink) = session();

        let req = session.begin_submit("I have a headache")?.unwrap();
        session.restart()?;
        session.finish_submit(req.ticket, Ok(reply("Too late")))?;

        assert_eq!(sink.contents(), vec![GREETING.to_string()]);
        assert_eq!(session.turns().len(), 1);

        return Ok(());
    }
}

mod turn_log {
    use super::*;

    #[test]
    fn it_retracts_most_recent_turn_for_role() -> Result<()> {
        let (mut session, sink) = session();
        session.append(Role::Assistant, "One")?;
        session.append(Role::User, "Two")?;
        session.append(Role::Assistant, "Three")?;
        session.append(Role::User, "Four")?;

        assert!(session.retract_last(Role::Assistant)?);

        assert_eq!(
            sink.contents(),
            vec!["One".to_string(), "Two".to_string(), "Four".to_string()]
        );
        assert_eq!(sink.rendered(), session.turns().to_vec());

        return Ok(());
    }

    #[test]
    fn it_ignores_retract_without_match() -> Result<()> {
        let (mut session, sink) = session();
        session.append(Role::Assistant, "One")?;

        assert!(!session.retract_last(Role::User)?);
        assert_eq!(sink.contents(), vec!["One".to_string()]);

        return Ok(());
    }

    #[test]
    fn it_clears_turns_and_patient() -> Result<()> {
        let (mut session, sink) = session();
        let req = session.begin_submit("This is Jane Doe")?.unwrap();
        session.finish_submit(
            req.ticket,
            Ok(ConsultationReply {
                response: "Welcome".to_string(),
                existing_patient: Some(PatientRecord {
                    name: "Jane Doe".to_string(),
                    ..Default::default()
                }),
            }),
        )?;
        assert!(session.is_returning_patient());

        session.clear()?;

        assert_eq!(session.turn_count(), 0);
        assert!(session.turns().is_empty());
        assert!(sink.rendered().is_empty());
        assert_eq!(session.current_patient(), None);
        assert!(!session.is_returning_patient());

        return Ok(());
    }

    #[test]
    fn it_keeps_notes_out_of_turns() -> Result<()> {
        let (mut session, sink) = session();
        session.append(Role::Assistant, "One")?;

        session.note("Continuing your consultation.")?;

        assert_eq!(session.turn_count(), 1);
        assert_eq!(sink.contents(), vec!["One".to_string()]);
        assert_eq!(
            sink.notes(),
            vec!["Continuing your consultation.".to_string()]
        );

        session.clear()?;
        assert!(sink.notes().is_empty());

        return Ok(());
    }

    #[test]
    fn it_restarts_with_greeting() -> Result<()> {
        let (mut session, sink) = session();
        seed(&mut session, 4)?;

        session.restart()?;

        assert_eq!(session.turns().to_vec(), vec![Turn::new(Role::Assistant, GREETING)]);
        assert_eq!(sink.contents(), vec![GREETING.to_string()]);

        return Ok(());
    }

    #[test]
    fn it_excludes_placeholders_from_history() -> Result<()> {
        let (mut session, _sink) = session();
        seed(&mut session, 2)?;
        session.begin_submit("Another answer")?;

        assert_eq!(session.turns().len(), 4);
        assert_eq!(session.turn_count(), 3);
        assert!(session.history().iter().all(|e| return !e.is_placeholder()));
        assert_eq!(session.history().len(), 3);

        return Ok(());
    }
}

mod speech {
    use super::*;

    #[test]
    fn it_requests_speech_for_assistant_turns() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Action>();
        let sink = RecordingSink::default();
        let mut session = Session::new(
            Box::new(sink.clone()),
            SessionSettings {
                auto_speech: true,
                report_min_turns: 6,
            },
        )
        .with_actions(tx);

        session.append(Role::User, "Hello")?;
        assert!(rx.try_recv().is_err());

        session.append(Role::Assistant, "How are you feeling?")?;
        assert_eq!(sink.contents().len(), 2);
        match rx.try_recv()? {
            Action::Speak(text) => assert_eq!(text, "How are you feeling?"),
            _ => bail!("Wrong action"),
        }

        return Ok(());
    }

    #[test]
    fn it_does_not_speak_placeholders() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Action>();
        let mut session = Session::new(
            Box::new(RecordingSink::default()),
            SessionSettings {
                auto_speech: true,
                report_min_turns: 6,
            },
        )
        .with_actions(tx);

        session.begin_submit("I have a headache")?;
        assert!(rx.try_recv().is_err());

        return Ok(());
    }

    #[test]
    fn it_stays_silent_when_disabled() -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Action>();
        let mut session =
            Session::new(Box::new(RecordingSink::default()), SessionSettings::default())
                .with_actions(tx);

        session.append(Role::Assistant, "Hello")?;
        assert!(rx.try_recv().is_err());

        session.set_auto_speech(true);
        session.append(Role::Assistant, "Hello again")?;
        assert!(rx.try_recv().is_ok());

        return Ok(());
    }
}

mod report {
    use super::*;

    #[test]
    fn it_requires_enough_turns() -> Result<()> {
        let (mut session, sink) = session();
        seed(&mut session, 5)?;
        let before = session.turns().to_vec();

        assert!(session.begin_report()?.is_none());

        assert_eq!(session.turns().len(), before.len() + 1);
        assert_eq!(&session.turns()[..before.len()], before.as_slice());
        assert_eq!(
            session.turns().last().unwrap(),
            &Turn::new(Role::Assistant, NEED_MORE_INFORMATION)
        );
        assert_eq!(sink.rendered(), session.turns().to_vec());

        return Ok(());
    }

    #[test]
    fn it_honors_configured_threshold() -> Result<()> {
        let mut session = Session::new(
            Box::new(RecordingSink::default()),
            SessionSettings {
                auto_speech: false,
                report_min_turns: 10,
            },
        );
        seed(&mut session, 8)?;
        assert!(session.begin_report()?.is_none());

        let mut session = Session::new(
            Box::new(RecordingSink::default()),
            SessionSettings {
                auto_speech: false,
                report_min_turns: 10,
            },
        );
        seed(&mut session, 10)?;
        assert!(session.begin_report()?.is_some());

        return Ok(());
    }

    #[test]
    fn it_builds_report_requests() -> Result<()> {
        let (mut session, _sink) = session();
        for (role, content) in test_utils::intake_fixture() {
            let role = if role == "user" {
                Role::User
            } else {
                Role::Assistant
            };
            session.append(role, content)?;
        }

        let req = session.begin_report()?.unwrap();

        assert_eq!(req.history.len(), 7);
        assert!(req.history.iter().all(|e| return !e.is_placeholder()));
        assert_eq!(req.patient_name, Some("Sarah Thompson".to_string()));
        assert_eq!(session.turns().last().unwrap().content, GENERATING);
        assert!(session.turns().last().unwrap().is_placeholder());

        return Ok(());
    }

    #[test]
    fn it_stores_generated_reports() -> Result<()> {
        let (mut session, sink) = session();
        let reports = ReportStore::default();
        seed(&mut session, 6)?;

        let report = "MEDICAL CONSULTATION REPORT\n\nAssessment: tension headache\n";
        let req = session.begin_report()?.unwrap();
        session.finish_report(req.ticket, Ok(report.to_string()), &reports)?;

        assert_eq!(reports.get(), Some(report.to_string()));
        assert_eq!(sink.contents().len(), 7);
        assert_eq!(sink.contents().last().unwrap(), REPORT_READY);
        assert!(!session.is_waiting());

        return Ok(());
    }

    #[test]
    fn it_reports_generation_errors() -> Result<()> {
        let (mut session, sink) = session();
        let reports = ReportStore::default();
        seed(&mut session, 6)?;

        let req = session.begin_report()?.unwrap();
        session.finish_report(req.ticket, Err(anyhow!("500")), &reports)?;

        assert_eq!(reports.get(), None);
        assert_eq!(sink.contents().last().unwrap(), REPORT_ERROR);
        assert!(!session.is_waiting());

        return Ok(());
    }
}

mod transcription {
    use super::*;

    #[test]
    fn it_submits_transcripts() -> Result<()> {
        let (mut session, sink) = session();
        session.append(Role::Assistant, GREETING)?;

        let ticket = session.begin_transcription(&AudioSource::Microphone)?;
        assert!(session.is_waiting());

        let req = session
            .finish_transcription(ticket, Ok("I have a sore throat".to_string()))?
            .unwrap();

        assert_eq!(req.message, "I have a sore throat");
        assert_eq!(req.history, vec![Turn::new(Role::Assistant, GREETING)]);
        assert_eq!(
            sink.contents(),
            vec![
                GREETING.to_string(),
                "I have a sore throat".to_string(),
                PROCESSING.to_string(),
            ]
        );

        return Ok(());
    }

    #[test]
    fn it_asks_to_type_on_empty_transcripts() -> Result<()> {
        let (mut session, sink) = session();

        let ticket = session.begin_transcription(&AudioSource::Microphone)?;
        let req = session.finish_transcription(ticket, Ok("  ".to_string()))?;

        assert!(req.is_none());
        assert_eq!(sink.contents(), vec![TRANSCRIPTION_FAILED.to_string()]);

        return Ok(());
    }

    #[test]
    fn it_asks_to_type_on_failed_transcripts() -> Result<()> {
        let (mut session, sink) = session();

        let ticket = session.begin_transcription(&AudioSource::File("a.wav".into()))?;
        let req = session.finish_transcription(ticket, Err(anyhow!("recorder missing")))?;

        assert!(req.is_none());
        assert_eq!(sink.contents(), vec![TRANSCRIPTION_FAILED.to_string()]);

        return Ok(());
    }

    #[test]
    fn it_applies_transcripts_as_consultations() -> Result<()> {
        let (mut session, _sink) = session();
        let reports = ReportStore::default();

        let ticket = session.begin_transcription(&AudioSource::Microphone)?;
        let action = session.apply(
            Event::TranscriptionResponse(ticket, Ok("I feel dizzy".to_string())),
            &reports,
        )?;

        match action {
            Some(Action::Consult(req)) => assert_eq!(req.message, "I feel dizzy"),
            _ => bail!("Wrong action"),
        }

        return Ok(());
    }
}

mod lookup {
    use super::*;

    #[test]
    fn it_ignores_empty_names() -> Result<()> {
        let (mut session, _sink) = session();
        assert!(session.begin_lookup("  ")?.is_none());
        assert!(session.turns().is_empty());

        return Ok(());
    }

    #[test]
    fn it_populates_found_patients() -> Result<()> {
        let (mut session, sink) = session();

        let (ticket, name) = session.begin_lookup(" Sarah   Thompson ")?.unwrap();
        assert_eq!(name, "Sarah Thompson");

        let patient = PatientRecord {
            name: "Sarah Thompson".to_string(),
            last_consultation_date: "2024-05-02".to_string(),
            summary: "".to_string(),
        };
        session.finish_lookup(ticket, Ok(Some(patient.clone())))?;

        assert_eq!(session.current_patient(), Some(&patient));
        assert!(session.is_returning_patient());
        assert_eq!(sink.contents().len(), 1);

        return Ok(());
    }

    #[test]
    fn it_reports_missing_patients() -> Result<()> {
        let (mut session, sink) = session();

        let (ticket, _name) = session.begin_lookup("Nobody Here")?.unwrap();
        session.finish_lookup(ticket, Ok(None))?;

        assert!(!session.is_returning_patient());
        assert_eq!(sink.contents().len(), 1);
        assert!(!session.is_waiting());

        return Ok(());
    }
}
