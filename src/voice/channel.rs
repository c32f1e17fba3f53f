//! In-process capture backend: transcripts are pushed by whoever owns the
//! recognizer (a browser bridge, a test, a stdin reader) and forwarded as
//! [`VoiceEvent`]s while capture is running.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use crate::errors::{VoiceNavError, VoiceNavResult};
use crate::voice::traits::SpeechCapture;
use crate::voice::types::VoiceEvent;

pub struct ChannelCapture {
    tx: mpsc::Sender<VoiceEvent>,
    listening: AtomicBool,
}

impl ChannelCapture {
    pub fn new(tx: mpsc::Sender<VoiceEvent>) -> Self {
        Self {
            tx,
            listening: AtomicBool::new(false),
        }
    }

    /// Creates a capture plus the receiving end of its event stream.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<VoiceEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    fn emit(&self, event: VoiceEvent) -> VoiceNavResult<()> {
        self.tx
            .try_send(event)
            .map_err(|e| VoiceNavError::Voice(format!("voice event dropped: {e}")))
    }

    /// Forwards a recognizer result. Returns `false` when capture is paused
    /// and the transcript was discarded.
    pub fn push_transcript(
        &self,
        text: impl Into<String>,
        confidence: f32,
        is_final: bool,
    ) -> VoiceNavResult<bool> {
        if !self.is_listening() {
            tracing::debug!("capture paused, transcript discarded");
            return Ok(false);
        }
        self.emit(VoiceEvent::Transcript {
            text: text.into(),
            confidence,
            is_final,
        })?;
        Ok(true)
    }

    pub fn push_error(&self, message: impl Into<String>) -> VoiceNavResult<()> {
        self.emit(VoiceEvent::Error {
            message: message.into(),
        })
    }
}

impl SpeechCapture for ChannelCapture {
    fn start(&self) -> VoiceNavResult<()> {
        if !self.listening.swap(true, Ordering::SeqCst) {
            self.emit(VoiceEvent::ListeningStarted)?;
        }
        Ok(())
    }

    fn stop(&self) -> VoiceNavResult<()> {
        if self.listening.swap(false, Ordering::SeqCst) {
            self.emit(VoiceEvent::ListeningEnded)?;
        }
        Ok(())
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}
