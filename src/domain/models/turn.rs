#[cfg(test)]
#[path = "turn_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One role tagged entry of the consultation transcript. The whole ordered
/// sequence is what the backend receives as `history`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(skip)]
    placeholder: Option<u64>,
}

impl Turn {
    pub fn new(role: Role, content: &str) -> Turn {
        return Turn {
            role,
            content: content.to_string(),
            placeholder: None,
        };
    }

    /// Transient assistant status line ("Processing...") owned by the request
    /// with the given id. Never sent to the backend.
    pub fn placeholder(id: u64, content: &str) -> Turn {
        return Turn {
            role: Role::Assistant,
            content: content.to_string(),
            placeholder: Some(id),
        };
    }

    pub fn is_placeholder(&self) -> bool {
        return self.placeholder.is_some();
    }

    pub fn placeholder_id(&self) -> Option<u64> {
        return self.placeholder;
    }

    pub fn as_string_lines(&self, line_max_width: usize) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();

        for full_line in self.content.replace('\t', "  ").split('\n') {
            if full_line.trim().is_empty() {
                lines.push("".to_string());
                continue;
            }

            let mut char_count = 0;
            let mut current_lines: Vec<&str> = vec![];

            for word in full_line.split(' ') {
                if !current_lines.is_empty() && word.len() + char_count + 1 > line_max_width {
                    lines.push(current_lines.join(" ").trim_end().to_string());
                    current_lines = vec![word];
                    char_count = word.len() + 1;
                } else {
                    current_lines.push(word);
                    char_count += word.len() + 1;
                }
            }
            if !current_lines.is_empty() {
                lines.push(current_lines.join(" ").trim_end().to_string());
            }
        }

        return lines;
    }
}
