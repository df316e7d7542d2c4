use anyhow::Result;

use super::Bubble;
use super::BubbleAlignment;
use super::BubbleSink;
use super::Entry;
use crate::domain::models::Role;
use crate::domain::models::Turn;
use crate::domain::models::TurnSink;

fn create_lines(turn: &Turn, author: &str, alignment: BubbleAlignment, width: usize) -> String {
    return Bubble::new(turn, author, alignment, width)
        .as_lines()
        .join("\n");
}

fn output(sink: &BubbleSink<Vec<u8>>) -> String {
    return String::from_utf8_lossy(&sink.out).to_string();
}

#[test]
fn it_creates_assistant_bubble() {
    let turn = Turn::new(Role::Assistant, "Hi there!");
    let lines_str = create_lines(&turn, "MedAI", BubbleAlignment::Left, 50);
    insta::assert_snapshot!(lines_str, @r###"
    ╭MedAI──────╮
    │ Hi there! │
    ╰───────────╯
    "###);
}

#[test]
fn it_wraps_long_assistant_bubble() {
    let turn = Turn::new(
        Role::Assistant,
        "Please describe the pain and when it started.",
    );
    let lines_str = create_lines(&turn, "MedAI", BubbleAlignment::Left, 30);
    insta::assert_snapshot!(lines_str, @r###"
    ╭MedAI────────────────╮
    │ Please describe the │
    │ pain and when it    │
    │ started.            │
    ╰─────────────────────╯
    "###);
}

#[test]
fn it_right_aligns_user_bubble() {
    let turn = Turn::new(Role::User, "I have a headache");
    let lines = Bubble::new(&turn, "testuser", BubbleAlignment::Right, 30).as_lines();

    assert_eq!(
        lines,
        vec![
            "         ╭testuser───────────╮".to_string(),
            "         │ I have a headache │".to_string(),
            "         ╰───────────────────╯".to_string(),
        ]
    );
}

#[test]
fn it_widens_bubble_for_author() {
    let turn = Turn::new(Role::User, "Hi");
    let lines = Bubble::new(&turn, "testuser", BubbleAlignment::Left, 50).as_lines();

    assert_eq!(lines[0], "╭testuser──╮");
    assert_eq!(lines[1], "│ Hi       │");
}

fn turn_contents(sink: &BubbleSink<Vec<u8>>) -> Vec<String> {
    return sink
        .entries
        .iter()
        .filter_map(|entry| match entry {
            Entry::Turn(turn, _) => return Some(turn.content.to_string()),
            Entry::Note(_) => return None,
        })
        .collect();
}

#[test]
fn it_renders_appended_turns() -> Result<()> {
    let mut sink = BubbleSink::new(vec![], "testuser", 50);
    sink.append(&Turn::new(Role::Assistant, "Hi there!"))?;
    sink.append(&Turn::new(Role::User, "Hello"))?;

    let text = output(&sink);
    assert!(text.contains("│ Hi there! │"));
    assert!(text.contains("│ Hello    │"));
    assert_eq!(sink.entries.len(), 2);
    assert_eq!(sink.entries[0].height(), 3);

    return Ok(());
}

#[test]
fn it_caps_bubble_width_on_wide_terminals() -> Result<()> {
    let sink = BubbleSink::new(vec![], "testuser", 240);
    assert_eq!(sink.columns, 240);
    assert_eq!(sink.width, 100);

    return Ok(());
}

#[test]
fn it_redraws_turns_below_retracted_turn() -> Result<()> {
    let mut sink = BubbleSink::new(vec![], "testuser", 50);
    sink.append(&Turn::new(Role::User, "I have a headache"))?;
    sink.append(&Turn::placeholder(1, "Processing..."))?;
    sink.append(&Turn::new(Role::Assistant, "How long?"))?;
    sink.out.clear();

    sink.retract(1)?;

    let text = output(&sink);
    assert!(text.starts_with("\u{1b}[6F\u{1b}[J"));
    assert!(!text.contains("Processing..."));
    assert!(text.contains("│ How long? │"));
    assert_eq!(
        turn_contents(&sink),
        vec!["I have a headache".to_string(), "How long?".to_string()]
    );

    return Ok(());
}

#[test]
fn it_erases_notes_written_below_retracted_turn() -> Result<()> {
    let mut sink = BubbleSink::new(vec![], "testuser", 50);
    sink.append(&Turn::new(Role::User, "I have a headache"))?;
    sink.append(&Turn::placeholder(1, "Processing..."))?;
    sink.note("Assistant replies will be read out loud.")?;
    sink.note("Continuing your consultation.")?;
    sink.out.clear();

    sink.retract(1)?;

    let text = output(&sink);
    assert!(text.starts_with("\u{1b}[5F\u{1b}[J"));
    assert!(!text.contains("Processing..."));
    assert!(text.ends_with(
        "Assistant replies will be read out loud.\nContinuing your consultation.\n"
    ));
    assert_eq!(turn_contents(&sink), vec!["I have a headache".to_string()]);
    assert_eq!(sink.entries.len(), 3);

    return Ok(());
}

#[test]
fn it_wraps_notes_to_terminal_width() -> Result<()> {
    let mut sink = BubbleSink::new(vec![], "testuser", 10);
    sink.note("Saved report to ./medical_report.txt\n\nDone")?;

    assert_eq!(
        output(&sink),
        "Saved repo\nrt to ./me\ndical_repo\nrt.txt\n\nDone\n"
    );
    assert_eq!(sink.entries[0].height(), 6);

    return Ok(());
}

#[test]
fn it_discards_echoed_input() -> Result<()> {
    let mut sink = BubbleSink::new(vec![], "testuser", 10);

    sink.discard_echo("/speech on")?;
    assert_eq!(output(&sink), "\u{1b}[1F\u{1b}[J");
    sink.out.clear();

    sink.discard_echo("I have had a headache since Monday")?;
    assert_eq!(output(&sink), "\u{1b}[4F\u{1b}[J");
    sink.out.clear();

    sink.discard_echo("")?;
    assert_eq!(output(&sink), "\u{1b}[1F\u{1b}[J");
    assert!(sink.entries.is_empty());

    return Ok(());
}

#[test]
fn it_rejects_retracting_unknown_turns() -> Result<()> {
    let mut sink = BubbleSink::new(vec![], "testuser", 50);
    sink.note("Continuing your consultation.")?;

    assert!(sink.retract(0).is_err());

    return Ok(());
}

#[test]
fn it_clears_rendered_turns_and_notes() -> Result<()> {
    let mut sink = BubbleSink::new(vec![], "testuser", 50);
    sink.append(&Turn::new(Role::Assistant, "Hi there!"))?;
    sink.note("Assistant replies will be read out loud.")?;
    sink.out.clear();

    sink.clear()?;

    assert_eq!(output(&sink), "\u{1b}[4F\u{1b}[J");
    assert!(sink.entries.is_empty());

    return Ok(());
}
