#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::env;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

use crate::domain::models::BackendName;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    AudioPlayer,
    AudioRecorder,
    AutoSpeech,
    Backend,
    BackendHealthCheckTimeout,
    BackendURL,
    ConfigFile,
    ReportDir,
    ReportMinTurns,
    SpeechFallback,
    Username,
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn get_bool(key: ConfigKey) -> bool {
        return matches!(Config::get(key).as_str(), "true" | "1" | "on" | "yes");
    }

    pub fn get_usize(key: ConfigKey) -> Result<usize> {
        let val = Config::get(key);
        if let Ok(res) = val.parse::<usize>() {
            return Ok(res);
        }

        bail!(format!("Config key '{key}' must be a positive number, got '{val}'"));
    }

    fn default_config_path() -> path::PathBuf {
        #[cfg(not(target_os = "macos"))]
        let config_dir = dirs::config_dir();
        #[cfg(target_os = "macos")]
        let config_dir = dirs::home_dir().map(|e| return e.join(".config"));

        return config_dir
            .unwrap_or_else(|| return path::PathBuf::from("."))
            .join("medconsult/config.toml");
    }

    pub fn default(key: ConfigKey) -> String {
        if key == ConfigKey::Username {
            let mut user = env::var("USER").unwrap_or_else(|_| return "".to_string());
            if user.is_empty() {
                user = "Patient".to_string();
            }

            return user;
        }

        if key == ConfigKey::ReportDir {
            return dirs::download_dir()
                .unwrap_or_else(|| return path::PathBuf::from("."))
                .to_string_lossy()
                .to_string();
        }

        if key == ConfigKey::ConfigFile {
            return Config::default_config_path().to_string_lossy().to_string();
        }

        let default_backend = BackendName::MedAI.to_string();

        #[cfg(target_os = "macos")]
        let (player, recorder, speech_fallback) =
            ("afplay {file}", "sox -d -q {file} trim 0 8", "say {text}");
        #[cfg(not(target_os = "macos"))]
        let (player, recorder, speech_fallback) = (
            "ffplay -nodisp -autoexit -loglevel quiet {file}",
            "arecord -q -f cd -t wav -d 8 {file}",
            "espeak {text}",
        );

        let res = match key {
            ConfigKey::AudioPlayer => player,
            ConfigKey::AudioRecorder => recorder,
            ConfigKey::AutoSpeech => "false",
            ConfigKey::Backend => &default_backend,
            ConfigKey::BackendHealthCheckTimeout => "1000",
            ConfigKey::BackendURL => "http://localhost:5000",
            ConfigKey::ReportMinTurns => "6",
            ConfigKey::SpeechFallback => speech_fallback,

            // Special
            ConfigKey::ConfigFile | ConfigKey::ReportDir | ConfigKey::Username => "",
        };

        return res.to_string();
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                if let Some(val) = doc.get(&key.to_string()) {
                    // Use clap value parsers to do validation.
                    let mut possible_values = vec![];
                    if let Some(arg) = cmd
                        .get_arguments()
                        .find(|e| return e.get_long() == Some(key.to_string().as_str()))
                    {
                        possible_values = arg
                            .get_possible_values()
                            .iter()
                            .map(|e| return e.get_name().to_string())
                            .collect::<Vec<String>>();
                    }

                    if let Some(val_int) = val.as_integer() {
                        Config::set(key, &val_int.to_string());
                    } else if let Some(val_bool) = val.as_bool() {
                        Config::set(key, &val_bool.to_string());
                    } else if let Some(val_str) = val.as_str() {
                        if val_str.is_empty() {
                            continue;
                        }
                        if !possible_values.is_empty()
                            && !possible_values.contains(&val_str.to_string())
                        {
                            bail!(format!("config.toml has an invalid value for key '{key}': {val_str}\nPossible values are: {}", possible_values.join(", ")));
                        }
                        Config::set(key, val_str);
                    } else {
                        bail!(format!(
                            "config.toml has an unsupported value type for key '{key}'"
                        ));
                    }
                }
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        Config::get_usize(ConfigKey::ReportMinTurns)?;
        Config::get_usize(ConfigKey::BackendHealthCheckTimeout)?;

        tracing::debug!(
            username = Config::get(ConfigKey::Username),
            backend = Config::get(ConfigKey::Backend),
            backend_url = Config::get(ConfigKey::BackendURL),
            auto_speech = Config::get(ConfigKey::AutoSpeech),
            report_min_turns = Config::get(ConfigKey::ReportMinTurns),
            report_dir = Config::get(ConfigKey::ReportDir),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                if key == ConfigKey::Username {
                    return Some(
                        "# Your name displayed in all chat bubbles.\n# username = \"\""
                            .to_string(),
                    );
                }

                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))?;

                let mut description = arg
                    .get_help()
                    .map(|e| return e.to_string())
                    .unwrap_or_default();

                description = description
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                if !arg.get_possible_values().is_empty() {
                    let possible_values = arg
                        .get_possible_values()
                        .iter()
                        .map(|e| return e.get_name())
                        .collect::<Vec<_>>()
                        .join(", ");
                    description = format!("{description} [possible values: {}]", possible_values);
                }

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<i32>().is_ok() || val.parse::<bool>().is_ok() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = {}", toml_edit::Value::from(val));
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}
