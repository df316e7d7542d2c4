use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub name: String,
    pub last_consultation_date: String,
    pub summary: String,
}

impl PatientRecord {
    pub fn welcome_message(&self) -> String {
        if self.last_consultation_date.is_empty() {
            return format!(
                "Welcome back, {}! I found your previous records.",
                self.name
            );
        }

        return format!(
            "Welcome back, {}! I see your last consultation was on {}.",
            self.name, self.last_consultation_date
        );
    }

    pub fn summary_message(&self) -> Option<String> {
        if self.summary.trim().is_empty() {
            return None;
        }

        return Some(format!(
            "Here is a summary of your previous records: {}",
            self.summary.trim()
        ));
    }
}
