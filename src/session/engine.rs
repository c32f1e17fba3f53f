use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::mpsc;

use crate::errors::{VoiceNavError, VoiceNavResult};
use crate::executor::{ActionExecutor, ExecutionOutcome};
use crate::perception::pipeline::SnapshotExtractor;
use crate::resolver::types::Resolution;
use crate::resolver::CommandResolver;
use crate::session::history::{Speaker, TranscriptHistory};
use crate::session::state::SessionState;
use crate::voice::settings::{load_settings, save_settings, SettingsStore, VoiceSettings};
use crate::voice::traits::{SpeechCapture, SpeechSynthesizer};
use crate::voice::types::VoiceEvent;

/// What one handled utterance produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReport {
    pub resolution: Resolution,
    pub outcome: ExecutionOutcome,
}

/// Clears the in-flight flag however the handling path exits.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Voice-driven loop: transcript in, page action and spoken feedback out.
///
/// One utterance is handled at a time. Capture is paused while the command is
/// resolved, executed and announced, then resumed whatever the result.
pub struct VoiceSession {
    resolver: Arc<CommandResolver>,
    extractor: SnapshotExtractor,
    executor: ActionExecutor,
    capture: Arc<dyn SpeechCapture>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Option<Arc<dyn SettingsStore>>,
    settings: RwLock<VoiceSettings>,
    history: Mutex<TranscriptHistory>,
    state: Mutex<SessionState>,
    latest_transcript: Mutex<Option<String>>,
    in_flight: AtomicBool,
    handled: AtomicUsize,
}

impl VoiceSession {
    pub fn new(
        resolver: Arc<CommandResolver>,
        extractor: SnapshotExtractor,
        executor: ActionExecutor,
        capture: Arc<dyn SpeechCapture>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        settings: VoiceSettings,
    ) -> Self {
        let history = TranscriptHistory::new(settings.max_transcriptions);
        tracing::info!(session_id = %history.session_id, lang = %settings.language, "voice session created");
        Self {
            resolver,
            extractor,
            executor,
            capture,
            synthesizer,
            store: None,
            settings: RwLock::new(settings),
            history: Mutex::new(history),
            state: Mutex::new(SessionState::Idle),
            latest_transcript: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            handled: AtomicUsize::new(0),
        }
    }

    /// Loads settings from `store` and persists later changes to it.
    pub fn with_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        let settings = load_settings(store.as_ref());
        lock(&self.history).set_cap(settings.max_transcriptions);
        self.settings = RwLock::new(settings);
        self.store = Some(store);
        self
    }

    pub fn settings(&self) -> VoiceSettings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn update_settings(&self, settings: VoiceSettings) -> VoiceNavResult<()> {
        if let Some(store) = &self.store {
            save_settings(store.as_ref(), &settings)?;
        }
        lock(&self.history).set_cap(settings.max_transcriptions);
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = settings;
        tracing::info!("voice settings updated");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        lock(&self.state).clone()
    }

    fn set_state(&self, next: SessionState) {
        let mut state = lock(&self.state);
        tracing::debug!(from = ?*state, to = ?next, "session state");
        *state = next;
    }

    pub fn history(&self) -> TranscriptHistory {
        lock(&self.history).clone()
    }

    pub fn latest_transcript(&self) -> Option<String> {
        lock(&self.latest_transcript).clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Utterances handled to completion since the session was created.
    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }

    pub fn start(&self) -> VoiceNavResult<()> {
        self.capture.start()?;
        self.set_state(SessionState::Listening);
        Ok(())
    }

    pub fn stop(&self) -> VoiceNavResult<()> {
        self.capture.stop()?;
        self.set_state(SessionState::Idle);
        Ok(())
    }

    /// Consumes capture events until the channel closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<VoiceEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle_event(event).await {
                tracing::warn!(error = %e, "voice event not handled");
            }
        }
        tracing::info!("voice event stream closed");
    }

    pub async fn handle_event(&self, event: VoiceEvent) -> VoiceNavResult<Option<CommandReport>> {
        match event {
            VoiceEvent::ListeningStarted => {
                if !self.state().is_busy() {
                    self.set_state(SessionState::Listening);
                }
                Ok(None)
            }
            VoiceEvent::ListeningEnded => {
                if self.state() == SessionState::Listening {
                    self.set_state(SessionState::Idle);
                }
                Ok(None)
            }
            VoiceEvent::Transcript {
                text,
                confidence,
                is_final,
            } => {
                *lock(&self.latest_transcript) = Some(text.clone());
                if !is_final || text.trim().is_empty() {
                    return Ok(None);
                }
                let threshold = self.settings().confidence_threshold;
                if confidence < threshold {
                    tracing::debug!(confidence, threshold, "transcript below confidence threshold");
                    return Ok(None);
                }
                self.process_utterance(&text, Some(confidence)).await
            }
            VoiceEvent::Error { message } => {
                tracing::warn!(error = %message, "speech recognition error");
                self.set_state(SessionState::Error(message));
                Ok(None)
            }
        }
    }

    /// Handles one utterance end to end. `Ok(None)` when another utterance is
    /// already in flight.
    pub async fn process_utterance(
        &self,
        text: &str,
        confidence: Option<f32>,
    ) -> VoiceNavResult<Option<CommandReport>> {
        if text.trim().is_empty() {
            return Err(VoiceNavError::Validation("Command is required".into()));
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::warn!(utterance = %text, "command already in progress, ignoring");
            return Ok(None);
        }
        let _guard = InFlightGuard(&self.in_flight);

        if let Err(e) = self.capture.stop() {
            tracing::warn!(error = %e, "could not pause capture");
        }
        lock(&self.history).push(Speaker::User, text.trim(), confidence);
        self.set_state(SessionState::Resolving {
            utterance: text.trim().to_string(),
        });

        let result = self.resolve_and_apply(text).await;
        let message = match &result {
            Ok(report) => report.resolution.command.message.clone(),
            Err(e) => e.to_string(),
        };
        lock(&self.history).push(Speaker::System, message.clone(), None);

        let settings = self.settings();
        if settings.announce_actions && !message.is_empty() {
            self.set_state(SessionState::Speaking {
                message: message.clone(),
            });
            if let Err(e) = self.synthesizer.speak(&message, &settings.language).await {
                tracing::warn!(error = %e, "announcement failed");
            }
        }

        self.resume();
        self.handled.fetch_add(1, Ordering::SeqCst);
        result.map(Some)
    }

    async fn resolve_and_apply(&self, text: &str) -> VoiceNavResult<CommandReport> {
        let snapshot = self.extractor.extract(self.executor.page().as_ref());
        tracing::debug!(candidates = snapshot.len(), "snapshot extracted");

        let resolution = self.resolver.resolve(text, &snapshot).await?;
        let outcome = if resolution.command.is_actionable() {
            self.set_state(SessionState::Executing {
                command: resolution.command.clone(),
            });
            self.executor.apply(&resolution.command)
        } else {
            ExecutionOutcome::Skipped
        };
        Ok(CommandReport { resolution, outcome })
    }

    fn resume(&self) {
        match self.capture.start() {
            Ok(()) => self.set_state(SessionState::Listening),
            Err(e) => {
                tracing::warn!(error = %e, "could not resume capture");
                self.set_state(SessionState::Error(e.to_string()));
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
