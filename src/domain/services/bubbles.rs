#[cfg(test)]
#[path = "bubbles_test.rs"]
mod tests;

use std::io::Write;

use anyhow::bail;
use anyhow::Result;
use crossterm::cursor;
use crossterm::queue;
use crossterm::terminal;
use owo_colors::OwoColorize;
use owo_colors::Stream;

use crate::domain::models::Role;
use crate::domain::models::Turn;
use crate::domain::models::TurnSink;

pub const ASSISTANT_NAME: &str = "MedAI";

#[derive(PartialEq, Eq)]
pub enum BubbleAlignment {
    Left,
    Right,
}

pub struct Bubble<'a> {
    alignment: BubbleAlignment,
    turn: &'a Turn,
    author: &'a str,
    window_max_width: usize,
}

pub struct BubbleConfig {
    pub bubble_padding: usize,
    pub outer_padding_percentage: f32,
}

fn repeat(text: &str, count: usize) -> String {
    return [text].repeat(count).join("");
}

impl<'a> Bubble<'a> {
    pub fn new(
        turn: &'a Turn,
        author: &'a str,
        alignment: BubbleAlignment,
        window_max_width: usize,
    ) -> Bubble<'a> {
        return Bubble {
            alignment,
            turn,
            author,
            window_max_width,
        };
    }

    pub fn style_config() -> BubbleConfig {
        return BubbleConfig {
            // Vertical bars plus their inner padding.
            bubble_padding: 4,
            outer_padding_percentage: 0.04,
        };
    }

    fn wrap_width(&self) -> usize {
        let style_config = Bubble::style_config();
        let min_outer_padding = (self.window_max_width as f32
            * style_config.outer_padding_percentage)
            .ceil() as usize;

        return self
            .window_max_width
            .saturating_sub(style_config.bubble_padding + min_outer_padding)
            .max(self.author.chars().count())
            .max(1);
    }

    pub fn as_lines(&self) -> Vec<String> {
        let text_lines = self.turn.as_string_lines(self.wrap_width());
        let author_len = self.author.chars().count();
        let inner_width = text_lines
            .iter()
            .map(|e| return e.chars().count())
            .max()
            .unwrap_or_default()
            .max(author_len);

        let mut lines = vec![format!(
            "╭{author}{bar}╮",
            author = self.author,
            bar = repeat("─", inner_width + 2 - author_len)
        )];
        for line in text_lines {
            let fill = repeat(" ", inner_width - line.chars().count());
            lines.push(format!("│ {line}{fill} │"));
        }
        lines.push(format!("╰{bar}╯", bar = repeat("─", inner_width + 2)));

        if self.alignment == BubbleAlignment::Left {
            return lines;
        }

        let outer_padding = repeat(
            " ",
            self.window_max_width
                .saturating_sub(inner_width + Bubble::style_config().bubble_padding),
        );

        return lines
            .into_iter()
            .map(|e| return format!("{outer_padding}{e}"))
            .collect();
    }
}

const MAX_BUBBLE_WIDTH: usize = 100;

enum Entry {
    Turn(Turn, usize),
    Note(Vec<String>),
}

impl Entry {
    fn height(&self) -> usize {
        match self {
            Entry::Turn(_, height) => return *height,
            Entry::Note(lines) => return lines.len(),
        }
    }
}

/// Terminal transcript. Everything written below the first turn goes through
/// here with its height, so a retracted turn can be erased and everything
/// below it redrawn.
pub struct BubbleSink<W: Write + Send> {
    out: W,
    username: String,
    columns: usize,
    width: usize,
    entries: Vec<Entry>,
}

impl<W: Write + Send> BubbleSink<W> {
    pub fn new(out: W, username: &str, columns: usize) -> BubbleSink<W> {
        let columns = columns.max(1);
        return BubbleSink {
            out,
            username: username.to_string(),
            columns,
            width: columns.min(MAX_BUBBLE_WIDTH),
            entries: vec![],
        };
    }

    fn lines(&self, turn: &Turn) -> Vec<String> {
        if turn.role == Role::User {
            return Bubble::new(turn, &self.username, BubbleAlignment::Right, self.width)
                .as_lines();
        }

        return Bubble::new(turn, ASSISTANT_NAME, BubbleAlignment::Left, self.width).as_lines();
    }

    /// Splits `text` into terminal rows.
    fn rows(&self, text: &str) -> Vec<String> {
        let mut rows = vec![];
        for line in text.split('\n') {
            let chars = line.chars().collect::<Vec<char>>();
            if chars.is_empty() {
                rows.push("".to_string());
                continue;
            }
            for chunk in chars.chunks(self.columns) {
                rows.push(chunk.iter().collect());
            }
        }

        return rows;
    }

    fn draw(&mut self, turn: &Turn) -> Result<usize> {
        let lines = self.lines(turn);
        for line in &lines {
            let styled = if turn.is_placeholder() {
                line.if_supports_color(Stream::Stdout, |e| return e.dimmed())
                    .to_string()
            } else if turn.role == Role::Assistant {
                // Brown
                line.if_supports_color(Stream::Stdout, |e| return e.truecolor(138, 85, 63))
                    .to_string()
            } else {
                line.to_string()
            };
            writeln!(self.out, "{styled}")?;
        }
        self.out.flush()?;

        return Ok(lines.len());
    }

    fn draw_note(&mut self, rows: Vec<String>) -> Result<()> {
        for row in &rows {
            writeln!(self.out, "{row}")?;
        }
        self.out.flush()?;
        self.entries.push(Entry::Note(rows));

        return Ok(());
    }

    fn erase(&mut self, height: usize) -> Result<()> {
        if height == 0 {
            return Ok(());
        }

        queue!(
            self.out,
            cursor::MoveToPreviousLine(u16::try_from(height).unwrap_or(u16::MAX)),
            terminal::Clear(terminal::ClearType::FromCursorDown)
        )?;

        return Ok(());
    }
}

impl<W: Write + Send> TurnSink for BubbleSink<W> {
    fn append(&mut self, turn: &Turn) -> Result<()> {
        let height = self.draw(turn)?;
        self.entries.push(Entry::Turn(turn.clone(), height));

        return Ok(());
    }

    fn retract(&mut self, index: usize) -> Result<()> {
        let position = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| return matches!(entry, Entry::Turn(..)))
            .nth(index)
            .map(|(position, _)| return position);
        let Some(position) = position else {
            bail!(format!("No rendered turn at position {index}"));
        };

        let tail = self.entries.split_off(position);
        let height: usize = tail.iter().map(|entry| return entry.height()).sum();
        self.erase(height)?;

        for entry in tail.into_iter().skip(1) {
            match entry {
                Entry::Turn(turn, _) => self.append(&turn)?,
                Entry::Note(rows) => self.draw_note(rows)?,
            }
        }
        self.out.flush()?;

        return Ok(());
    }

    fn clear(&mut self) -> Result<()> {
        let height: usize = self.entries.iter().map(|entry| return entry.height()).sum();
        self.erase(height)?;
        self.entries.clear();
        self.out.flush()?;

        return Ok(());
    }

    fn note(&mut self, text: &str) -> Result<()> {
        let rows = self.rows(text);
        return self.draw_note(rows);
    }

    fn discard_echo(&mut self, line: &str) -> Result<()> {
        let width = line.chars().count().max(1);
        let height = (width + self.columns - 1) / self.columns;
        self.erase(height)?;
        self.out.flush()?;

        return Ok(());
    }
}
