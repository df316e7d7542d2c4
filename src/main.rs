#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::Error;
use anyhow::Result;
use domain::models::Action;
use domain::models::BackendName;
use domain::models::Event;
use infrastructure::backends::BackendManager;
use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tokio::task;

use crate::application::cli;
use crate::application::ui;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::services::actions::ConsultationService;
use crate::domain::services::audio::AudioCommands;
use crate::domain::services::audio::CommandTemplate;
use crate::domain::services::AudioDevice;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        format!(
            "Oh no! medconsult has failed with the following app version and error.\n\nVersion: {}\nCommit: {}\nError: {}",
            env!("CARGO_PKG_VERSION"),
            env!("VERGEN_GIT_DESCRIBE"),
            err
        )
        .red()
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

fn audio_device() -> AudioDevice {
    return AudioDevice::new(AudioCommands {
        player: CommandTemplate::new(&Config::get(ConfigKey::AudioPlayer)),
        recorder: CommandTemplate::new(&Config::get(ConfigKey::AudioRecorder)),
        speech_fallback: CommandTemplate::new(&Config::get(ConfigKey::SpeechFallback)),
    });
}

async fn run() -> Result<()> {
    let backend = BackendManager::get(BackendName::parse(Config::get(ConfigKey::Backend))?)?;

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

    let mut background_futures = task::JoinSet::new();
    let service_backend = backend.clone();
    background_futures.spawn(async move {
        return ConsultationService::start(
            service_backend,
            audio_device(),
            event_tx,
            &mut action_rx,
        )
        .await;
    });

    let ui_future = ui::start(backend, action_tx, event_rx);

    let res = tokio::select!(
        res = background_futures.join_next() => match res {
            Some(Ok(service_res)) => service_res,
            Some(Err(join_err)) => Err(join_err.into()),
            None => Ok(()),
        },
        res = ui_future => res,
    );

    return res;
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let debug_log_dir = env::var("MEDCONSULT_LOG_DIR").unwrap_or_else(|_| {
        return cli::log_path()
            .parent()
            .map(|e| return e.to_string_lossy().to_string())
            .unwrap_or_else(|| return ".".to_string());
    });

    let file_appender = tracing_appender::rolling::never(debug_log_dir, "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("medconsult")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    match cli::parse().await {
        Ok(true) => {}
        Ok(false) => process::exit(0),
        Err(err) => handle_error(err),
    }

    if let Err(err) = run().await {
        handle_error(err);
    }

    process::exit(0);
}
