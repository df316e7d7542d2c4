#[cfg(test)]
#[path = "audio_test.rs"]
mod tests;

use std::future::Future;
use std::path;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use tokio::fs;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::models::AudioClip;

/// Shell-free command template. `{file}` and `{text}` are substituted per
/// argument; when a required placeholder is missing the value is appended as
/// the last argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandTemplate {
    template: String,
}

impl CommandTemplate {
    pub fn new(template: &str) -> CommandTemplate {
        return CommandTemplate {
            template: template.trim().to_string(),
        };
    }

    pub fn is_empty(&self) -> bool {
        return self.template.is_empty();
    }

    pub fn expand(&self, placeholder: &str, value: &str) -> Result<(String, Vec<String>)> {
        let mut parts = self
            .template
            .split_whitespace()
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();
        if parts.is_empty() {
            bail!("No command configured");
        }

        let program = parts.remove(0);
        let mut substituted = false;
        let mut args = parts
            .into_iter()
            .map(|arg| {
                if arg.contains(placeholder) {
                    substituted = true;
                    return arg.replace(placeholder, value);
                }
                return arg;
            })
            .collect::<Vec<String>>();

        if !substituted {
            args.push(value.to_string());
        }

        return Ok((program, args));
    }

    fn command(&self, placeholder: &str, value: &str) -> Result<Command> {
        let (program, args) = self.expand(placeholder, value)?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        return Ok(cmd);
    }
}

#[derive(Clone, Debug)]
pub struct AudioCommands {
    pub player: CommandTemplate,
    pub recorder: CommandTemplate,
    pub speech_fallback: CommandTemplate,
}

async fn run(mut cmd: Command) -> Result<()> {
    let status = cmd.status().await?;
    if !status.success() {
        bail!(format!("Audio command exited with {status}"));
    }

    return Ok(());
}

/// Temporary audio file, removed when dropped. Cancelled and failed
/// operations drop it too, so nothing is left behind in the scratch dir.
struct ScratchFile {
    path: path::PathBuf,
}

impl ScratchFile {
    fn new(dir: &path::Path, extension: &str) -> ScratchFile {
        return ScratchFile {
            path: dir.join(format!("medconsult-{}.{extension}", Uuid::new_v4())),
        };
    }

    fn path_str(&self) -> String {
        return self.path.to_string_lossy().to_string();
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = ?err, path = ?self.path, "Failed to remove audio file");
            }
        }
    }
}

/// The single microphone/speaker. Only one capture or playback runs at a
/// time; starting another cancels the previous one, which kills its child
/// process.
#[derive(Clone)]
pub struct AudioDevice {
    commands: AudioCommands,
    scratch_dir: path::PathBuf,
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl AudioDevice {
    pub fn new(commands: AudioCommands) -> AudioDevice {
        return AudioDevice {
            commands,
            scratch_dir: std::env::temp_dir(),
            active: Arc::new(Mutex::new(None)),
        };
    }

    /// Directory for recordings and synthesized clips while they are in use.
    pub fn with_scratch_dir(mut self, dir: &path::Path) -> AudioDevice {
        self.scratch_dir = dir.to_path_buf();
        return self;
    }

    pub async fn stop(&self) {
        if let Some(prev) = self.active.lock().await.take() {
            prev.cancel();
        }
    }

    /// Runs `fut` as the device's only active operation.
    pub async fn exclusive<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let token = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            if let Some(prev) = active.replace(token.clone()) {
                prev.cancel();
            }
        }

        tokio::select! {
            res = fut => return res,
            _ = token.cancelled() => return Err(anyhow!("Audio was interrupted")),
        }
    }

    /// Plays synthesized audio through the configured player.
    pub async fn play(&self, clip: AudioClip) -> Result<()> {
        let player = self.commands.player.clone();
        let scratch = ScratchFile::new(&self.scratch_dir, "mp3");

        return self
            .exclusive(async move {
                fs::write(&scratch.path, &clip.bytes).await?;
                let cmd = player.command("{file}", &scratch.path_str())?;
                return run(cmd).await;
            })
            .await;
    }

    /// Speaks `text` with the local synthesizer, used when the speech endpoint
    /// is unavailable.
    pub async fn speak_locally(&self, text: &str) -> Result<()> {
        if self.commands.speech_fallback.is_empty() {
            bail!("No local speech synthesizer configured");
        }

        let cmd = self.commands.speech_fallback.command("{text}", text)?;
        return self.exclusive(run(cmd)).await;
    }

    /// Records from the microphone with the configured recorder command.
    pub async fn record(&self) -> Result<AudioClip> {
        let recorder = self.commands.recorder.clone();
        let scratch = ScratchFile::new(&self.scratch_dir, "wav");

        return self
            .exclusive(async move {
                let cmd = recorder.command("{file}", &scratch.path_str())?;
                run(cmd).await?;

                let bytes = fs::read(&scratch.path).await?;
                return Ok(AudioClip::new("recording.wav", "audio/wav", bytes));
            })
            .await;
    }
}

pub async fn read_clip(file_path: &path::Path) -> Result<AudioClip> {
    let bytes = fs::read(file_path).await?;
    let file_name = file_path
        .file_name()
        .map(|e| return e.to_string_lossy().to_string())
        .unwrap_or_else(|| return "recording.wav".to_string());

    let extension = file_path
        .extension()
        .map(|e| return e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let mime = match extension.as_str() {
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "webm" => "audio/webm",
        "m4a" => "audio/mp4",
        _ => "audio/wav",
    };

    return Ok(AudioClip::new(&file_name, mime, bytes));
}
