//! Speech output through an external program (espeak-ng, say, piper + aplay...).
//!
//! The text is written to the child's stdin; `{lang}` in the argument list is
//! replaced by the requested language. Playback is considered finished when
//! the process exits.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::VoiceConfig;
use crate::errors::{VoiceNavError, VoiceNavResult};
use crate::voice::traits::SpeechSynthesizer;

/// Longest announcement accepted, in bytes.
const MAX_TTS_INPUT_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone)]
pub struct ProcessSynthesizer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessSynthesizer {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// `None` when no TTS command is configured.
    pub fn from_config(config: &VoiceConfig) -> Option<Self> {
        let program = config.tts_command.as_deref()?.trim();
        if program.is_empty() {
            return None;
        }
        Some(Self::new(
            program,
            config.tts_args.clone(),
            Duration::from_secs(config.tts_timeout_secs),
        ))
    }
}

#[async_trait]
impl SpeechSynthesizer for ProcessSynthesizer {
    async fn speak(&self, text: &str, lang: &str) -> VoiceNavResult<()> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceNavError::Voice(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let args: Vec<String> = self.args.iter().map(|a| a.replace("{lang}", lang)).collect();
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VoiceNavError::Voice(format!("Failed to spawn {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceNavError::Voice("Failed to open stdin".to_string()))?;
        let text_owned = text.to_string();
        // Written from a separate task so a chatty child cannot deadlock us.
        let write_task = tokio::spawn(async move {
            stdin.write_all(text_owned.as_bytes()).await?;
            stdin.shutdown().await
        });

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceNavError::Voice(format!(
                    "TTS process timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| VoiceNavError::Voice(format!("Failed to wait for {}: {e}", self.program)))?;

        match write_task.await {
            Ok(Ok(())) => {}
            // The program may not read stdin at all.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!(program = %self.program, "TTS stdin closed early");
            }
            Ok(Err(e)) => {
                return Err(VoiceNavError::Voice(format!("Failed to write TTS stdin: {e}")))
            }
            Err(e) => return Err(VoiceNavError::Voice(format!("Stdin task failed: {e}"))),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceNavError::Voice(format!(
                "{} failed: {}",
                self.program,
                stderr.trim()
            )));
        }

        tracing::debug!(program = %self.program, lang, "announcement spoken");
        Ok(())
    }
}
