#[cfg(test)]
#[path = "patient_name_test.rs"]
mod tests;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::models::Role;
use crate::domain::models::Turn;

static INTRODUCTION: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(r"(?i)\b(?:my name is|i am|this is)\s+([a-z]+(?:[ \t]+[a-z]+)*)").unwrap();
});

fn token_count(text: &str) -> usize {
    return text.split_whitespace().count();
}

fn from_introduction(content: &str) -> Option<String> {
    for captures in INTRODUCTION.captures_iter(content) {
        if let Some(name) = captures.get(1) {
            if token_count(name.as_str()) >= 2 {
                return Some(name.as_str().split_whitespace().collect::<Vec<_>>().join(" "));
            }
        }
    }

    return None;
}

fn from_bare_name(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }

    if !trimmed
        .chars()
        .all(|c| return c.is_alphabetic() || c.is_whitespace())
    {
        return None;
    }

    if token_count(trimmed) < 2 {
        return None;
    }

    return Some(trimmed.split_whitespace().collect::<Vec<_>>().join(" "));
}

/// Best effort guess at the patient's full name. Looks for introductions
/// ("my name is", "i am", "this is") in user turns, and otherwise accepts an
/// answer among the first three turns made only of two or more words.
pub fn extract_patient_name(turns: &[Turn]) -> Option<String> {
    for (idx, turn) in turns.iter().enumerate() {
        if turn.role != Role::User || turn.is_placeholder() {
            continue;
        }

        if let Some(name) = from_introduction(&turn.content) {
            return Some(name);
        }

        if idx < 3 {
            if let Some(name) = from_bare_name(&turn.content) {
                return Some(name);
            }
        }
    }

    return None;
}
