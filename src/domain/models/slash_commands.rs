#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

use super::Page;

pub struct SlashCommand {
    command: String,
    pub args: Vec<String>,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let mut args = text
            .split_whitespace()
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();
        if args.is_empty() {
            return None;
        }
        let prefix = args[0].to_string();
        args.remove(0);

        let cmd = SlashCommand {
            command: prefix,
            args,
        };
        if cmd.is_quit()
            || cmd.is_help()
            || cmd.page().is_some()
            || cmd.is_restart()
            || cmd.is_generate_report()
            || cmd.is_download()
            || cmd.is_voice()
            || cmd.is_stop_audio()
            || cmd.is_speech_toggle()
            || cmd.is_lookup()
        {
            return Some(cmd);
        }

        return None;
    }

    /// Joined arguments, for commands taking free text such as a name.
    pub fn rest(&self) -> String {
        return self.args.join(" ");
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }

    pub fn page(&self) -> Option<Page> {
        match self.command.as_str() {
            "/" | "/home" | "/back" => return Some(Page::Home),
            "/consultation" | "/begin" => return Some(Page::Consultation),
            "/medical_report" | "/view" => return Some(Page::MedicalReport),
            _ => return None,
        }
    }

    pub fn is_restart(&self) -> bool {
        return ["/restart"].contains(&self.command.as_str());
    }

    pub fn is_generate_report(&self) -> bool {
        return ["/r", "/report"].contains(&self.command.as_str());
    }

    pub fn is_download(&self) -> bool {
        return ["/d", "/download"].contains(&self.command.as_str());
    }

    pub fn is_voice(&self) -> bool {
        return ["/v", "/voice", "/mic"].contains(&self.command.as_str());
    }

    pub fn is_stop_audio(&self) -> bool {
        return ["/s", "/stop"].contains(&self.command.as_str());
    }

    pub fn is_speech_toggle(&self) -> bool {
        return ["/speech"].contains(&self.command.as_str());
    }

    pub fn is_lookup(&self) -> bool {
        return ["/l", "/lookup"].contains(&self.command.as_str());
    }

    /// `Some(true)` / `Some(false)` for explicit on/off arguments, `None` to
    /// toggle.
    pub fn speech_setting(&self) -> Option<bool> {
        match self.args.first().map(|e| return e.to_lowercase()) {
            Some(arg) if arg == "on" || arg == "true" => return Some(true),
            Some(arg) if arg == "off" || arg == "false" => return Some(false),
            _ => return None,
        }
    }
}
