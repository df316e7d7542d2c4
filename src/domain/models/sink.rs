use anyhow::Result;

use super::Turn;

/// Rendering surface for the transcript. Turns mirror the session's turn
/// sequence one to one, so `index` is a position in both. Notes are status
/// lines shown between turns; they never count as turns.
pub trait TurnSink: Send {
    fn append(&mut self, turn: &Turn) -> Result<()>;

    fn retract(&mut self, index: usize) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    fn note(&mut self, text: &str) -> Result<()>;

    /// Removes a line the terminal echoed while it was typed.
    fn discard_echo(&mut self, line: &str) -> Result<()>;
}

/// In memory sink for tests. Clones share the rendered log.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct RecordingSink {
    rendered: std::sync::Arc<std::sync::Mutex<Vec<Turn>>>,
    notes: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn rendered(&self) -> Vec<Turn> {
        return self.rendered.lock().unwrap().clone();
    }

    pub fn contents(&self) -> Vec<String> {
        return self
            .rendered()
            .iter()
            .map(|e| return e.content.to_string())
            .collect();
    }

    pub fn notes(&self) -> Vec<String> {
        return self.notes.lock().unwrap().clone();
    }
}

#[cfg(test)]
impl TurnSink for RecordingSink {
    fn append(&mut self, turn: &Turn) -> Result<()> {
        self.rendered.lock().unwrap().push(turn.clone());
        return Ok(());
    }

    fn retract(&mut self, index: usize) -> Result<()> {
        self.rendered.lock().unwrap().remove(index);
        return Ok(());
    }

    fn clear(&mut self) -> Result<()> {
        self.rendered.lock().unwrap().clear();
        self.notes.lock().unwrap().clear();
        return Ok(());
    }

    fn note(&mut self, text: &str) -> Result<()> {
        self.notes.lock().unwrap().push(text.to_string());
        return Ok(());
    }

    fn discard_echo(&mut self, _line: &str) -> Result<()> {
        return Ok(());
    }
}
