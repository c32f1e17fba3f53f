pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;
pub mod resolver;
pub mod server;
pub mod session;
pub mod voice;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;

use crate::config::AppConfig;
use crate::errors::{VoiceNavError, VoiceNavResult};
use crate::executor::ActionExecutor;
use crate::llm::registry::ProviderRegistry;
use crate::perception::html_page::HtmlPage;
use crate::perception::pipeline::SnapshotExtractor;
use crate::resolver::inference::{Inference, LlmInference, RemoteInference};
use crate::resolver::CommandResolver;
use crate::server::AppState;
use crate::session::VoiceSession;
use crate::voice::channel::ChannelCapture;
use crate::voice::process_tts::ProcessSynthesizer;
use crate::voice::settings::FileSettingsStore;
use crate::voice::traits::{SilentSynthesizer, SpeechCapture, SpeechSynthesizer};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    /// Run the inference service.
    Serve,
    /// Drive a voice session over a static page, one transcript per stdin line.
    Session { page: PathBuf },
}

fn parse_mode(args: &[String]) -> VoiceNavResult<Mode> {
    match args {
        [] => Ok(Mode::Serve),
        [flag] if flag == "serve" => Ok(Mode::Serve),
        [flag, path] if flag == "--page" => Ok(Mode::Session {
            page: PathBuf::from(path),
        }),
        other => Err(VoiceNavError::Config(format!(
            "unrecognised arguments {other:?}; usage: voicenav [serve | --page <file.html>]"
        ))),
    }
}

pub async fn run() -> VoiceNavResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let config = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "config not loaded; using defaults");
            AppConfig::default()
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_mode(&args)? {
        Mode::Serve => {
            let registry = ProviderRegistry::from_config(&config);
            let inference = Arc::new(LlmInference::from_registry(&registry)?);
            let resolver = CommandResolver::from_config(&config.resolver, &config.commands, inference);
            let state = AppState {
                resolver: Arc::new(resolver),
            };
            server::serve(&config.server.bind, state).await
        }
        Mode::Session { page } => run_session(&config, &page).await,
    }
}

fn build_inference(config: &AppConfig) -> VoiceNavResult<Arc<dyn Inference>> {
    if config.inference.enabled {
        tracing::info!(endpoint = %config.inference.endpoint, "using remote inference service");
        return Ok(Arc::new(RemoteInference::new(&config.inference)));
    }
    let registry = ProviderRegistry::from_config(config);
    Ok(Arc::new(LlmInference::from_registry(&registry)?))
}

async fn run_session(config: &AppConfig, page_path: &std::path::Path) -> VoiceNavResult<()> {
    let page = Arc::new(HtmlPage::from_file(page_path)?);
    let resolver = Arc::new(CommandResolver::from_config(
        &config.resolver,
        &config.commands,
        build_inference(config)?,
    ));

    let (capture, events) = ChannelCapture::channel(32);
    let capture = Arc::new(capture);
    let synthesizer: Arc<dyn SpeechSynthesizer> = match ProcessSynthesizer::from_config(&config.voice) {
        Some(tts) => Arc::new(tts),
        None => Arc::new(SilentSynthesizer),
    };
    let store = match &config.voice.settings_dir {
        Some(dir) => FileSettingsStore::new(dir),
        None => FileSettingsStore::default_location(),
    };
    tracing::debug!(dir = %store.dir().display(), "settings store");

    let session = Arc::new(
        VoiceSession::new(
            resolver,
            SnapshotExtractor::new(config.snapshot.clone()),
            ActionExecutor::new(page.clone()),
            capture.clone(),
            synthesizer,
            Default::default(),
        )
        .with_store(Arc::new(store)),
    );
    session.start()?;
    let worker = tokio::spawn(session.clone().run(events));

    let mut pushed = 0usize;
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // Capture is paused while the previous utterance is handled.
        while !capture.is_listening() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        if capture.push_transcript(line, 1.0, true)? {
            pushed += 1;
        }
    }

    while session.handled() < pushed {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    session.stop()?;
    worker.abort();

    let history = session.history();
    tracing::info!(
        session_id = %history.session_id,
        entries = history.len(),
        effects = page.effects().len(),
        "session finished"
    );
    Ok(())
}
