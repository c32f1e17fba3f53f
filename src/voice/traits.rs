use async_trait::async_trait;

use crate::errors::VoiceNavResult;

/// Microphone-side capability. Events flow out through the channel handed to
/// the backend at construction time.
pub trait SpeechCapture: Send + Sync {
    fn start(&self) -> VoiceNavResult<()>;

    fn stop(&self) -> VoiceNavResult<()>;

    fn is_listening(&self) -> bool;
}

/// Speaker-side capability.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Resolves once playback has finished.
    async fn speak(&self, text: &str, lang: &str) -> VoiceNavResult<()>;
}

/// Synthesizer that says nothing, for deployments without audio output.
pub struct SilentSynthesizer;

#[async_trait]
impl SpeechSynthesizer for SilentSynthesizer {
    async fn speak(&self, text: &str, lang: &str) -> VoiceNavResult<()> {
        tracing::debug!(lang, chars = text.chars().count(), "speech suppressed");
        Ok(())
    }
}
