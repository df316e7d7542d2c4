#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use owo_colors::OwoColorize;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendName;
use crate::domain::services::actions::help_text;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

pub fn log_path() -> path::PathBuf {
    return dirs::cache_dir()
        .unwrap_or_else(|| return path::PathBuf::from("."))
        .join("medconsult/debug.log");
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_debug() -> Command {
    return Command::new("debug")
        .about("Debug helpers for medconsult")
        .hide(true)
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running medconsult with environment variable RUST_LOG=medconsult")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );
}

fn arg_backend() -> Arg {
    return Arg::new(ConfigKey::Backend.to_string())
        .short('b')
        .long(ConfigKey::Backend.to_string())
        .env("MEDCONSULT_BACKEND")
        .num_args(1)
        .help(format!(
            "The consultation backend to connect to. [default: {}]",
            Config::default(ConfigKey::Backend)
        ))
        .value_parser(PossibleValuesParser::new(BackendName::VARIANTS));
}

fn arg_backend_url() -> Arg {
    return Arg::new(ConfigKey::BackendURL.to_string())
        .short('u')
        .long(ConfigKey::BackendURL.to_string())
        .env("MEDCONSULT_BACKEND_URL")
        .num_args(1)
        .help(format!(
            "Base URL of the consultation backend. [default: {}]",
            Config::default(ConfigKey::BackendURL)
        ));
}

fn arg_backend_health_check_timeout() -> Arg {
    return Arg::new(ConfigKey::BackendHealthCheckTimeout.to_string())
        .long(ConfigKey::BackendHealthCheckTimeout.to_string())
        .env("MEDCONSULT_BACKEND_HEALTH_CHECK_TIMEOUT")
        .num_args(1)
        .help(
            format!("Time to wait in milliseconds before timing out when doing a healthcheck for a backend. [default: {}]", Config::default(ConfigKey::BackendHealthCheckTimeout)),
        );
}

fn arg_auto_speech() -> Arg {
    return Arg::new(ConfigKey::AutoSpeech.to_string())
        .long(ConfigKey::AutoSpeech.to_string())
        .env("MEDCONSULT_AUTO_SPEECH")
        .num_args(1)
        .help(format!(
            "Read assistant replies out loud. [default: {}]",
            Config::default(ConfigKey::AutoSpeech)
        ))
        .value_parser(PossibleValuesParser::new(["true", "false"]));
}

fn arg_report_min_turns() -> Arg {
    return Arg::new(ConfigKey::ReportMinTurns.to_string())
        .long(ConfigKey::ReportMinTurns.to_string())
        .env("MEDCONSULT_REPORT_MIN_TURNS")
        .num_args(1)
        .help(format!(
            "Number of answered turns required before a report can be generated. [default: {}]",
            Config::default(ConfigKey::ReportMinTurns)
        ));
}

fn subcommand_chat() -> Command {
    return Command::new("chat")
        .about("Start a new consultation.")
        .arg(arg_backend())
        .arg(arg_backend_url())
        .arg(arg_backend_health_check_timeout())
        .arg(arg_auto_speech())
        .arg(arg_report_min_turns());
}

pub fn build() -> Command {
    let commands_text = help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") {
                return format!("CHAT {line}").underline().bold().to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");

    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("medconsult")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_chat())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_debug())
        .arg(arg_backend())
        .arg(arg_backend_url())
        .arg(arg_backend_health_check_timeout())
        .arg(arg_auto_speech())
        .arg(arg_report_min_turns())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("MEDCONSULT_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::ReportDir.to_string())
                .short('d')
                .long(ConfigKey::ReportDir.to_string())
                .env("MEDCONSULT_REPORT_DIR")
                .num_args(1)
                .help(format!("Directory reports are downloaded to. [default: {}]", Config::default(ConfigKey::ReportDir)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::AudioPlayer.to_string())
                .long(ConfigKey::AudioPlayer.to_string())
                .env("MEDCONSULT_AUDIO_PLAYER")
                .num_args(1)
                .help(format!("Play synthesized replies with this command. {{file}} is replaced with the path of the audio clip. [default: {}]", Config::default(ConfigKey::AudioPlayer)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::AudioRecorder.to_string())
                .long(ConfigKey::AudioRecorder.to_string())
                .env("MEDCONSULT_AUDIO_RECORDER")
                .num_args(1)
                .help(format!("Record from the microphone with this command. {{file}} is replaced with the path of the recording. [default: {}]", Config::default(ConfigKey::AudioRecorder)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::SpeechFallback.to_string())
                .long(ConfigKey::SpeechFallback.to_string())
                .env("MEDCONSULT_SPEECH_FALLBACK")
                .num_args(1)
                .help(format!("Local speech synthesizer used when the backend can't synthesize speech. {{text}} is replaced with the reply. [default: {}]", Config::default(ConfigKey::SpeechFallback)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::Username.to_string())
                .long(ConfigKey::Username.to_string())
                .env("MEDCONSULT_USERNAME")
                .num_args(1)
                .help("Your name displayed in all chat bubbles.")
                .global(true)
        );
}

pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => {
            match debug_matches.subcommand() {
                Some(("log-path", _)) => {
                    println!("{}", log_path().to_string_lossy());
                }
                Some(("enum-config", _)) => {
                    let res = ConfigKey::VARIANTS.join("\n");
                    println!("{}", res);
                }
                _ => {
                    subcommand_debug().print_long_help()?;
                }
            }

            return Ok(false);
        }
        Some(("chat", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        _ => {
            Config::load(build(), vec![&matches]).await?;
        }
    }

    return Ok(true);
}
