use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{VoiceNavError, VoiceNavResult};
use crate::resolver::types::Action;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub inference: RemoteInferenceConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderEntry {
                display_name: "OpenAI".into(),
                api_base: "https://api.openai.com/v1/chat/completions".into(),
                model: "gpt-4o-mini".into(),
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
                top_p: default_top_p(),
                timeout_ms: default_timeout_ms(),
                api_key: None,
            },
        );
        Self {
            active_provider: "openai".into(),
            providers,
            roles: RolesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    /// Request timeout at the provider boundary.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Optional API key stored in config.toml (falls back to env var VOICENAV_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps pipeline roles to specific provider+model combinations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Voice command interpretation: short, low-temperature JSON replies.
    pub commands: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    150
}

fn default_top_p() -> f64 {
    0.9
}

fn default_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Hard deadline for the inference tier.
    #[serde(default = "default_timeout_ms")]
    pub inference_timeout_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// 0 keeps the cache unbounded.
    #[serde(default)]
    pub cache_max_entries: usize,
    /// Characters of the serialized snapshot folded into the cache key.
    #[serde(default = "default_fingerprint_len")]
    pub fingerprint_len: usize,
    /// Elements forwarded to the inference tier.
    #[serde(default = "default_inference_element_limit")]
    pub inference_element_limit: usize,
}

impl ResolverConfig {
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            inference_timeout_ms: default_timeout_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_max_entries: 0,
            fingerprint_len: default_fingerprint_len(),
            inference_element_limit: default_inference_element_limit(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_fingerprint_len() -> usize {
    100
}

fn default_inference_element_limit() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// The generic scan only runs when the curated pass yields fewer candidates than this.
    #[serde(default = "default_min_curated")]
    pub min_curated: usize,
    #[serde(default = "default_per_selector_limit")]
    pub per_selector_limit: usize,
    #[serde(default = "default_text_limit")]
    pub text_limit: usize,
    #[serde(default = "default_important_elements")]
    pub important: Vec<ImportantElement>,
    #[serde(default = "default_interactive_selectors")]
    pub interactive_selectors: Vec<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            min_curated: default_min_curated(),
            per_selector_limit: default_per_selector_limit(),
            text_limit: default_text_limit(),
            important: default_important_elements(),
            interactive_selectors: default_interactive_selectors(),
        }
    }
}

/// An element the site knows matters, with a stable label used instead of live text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportantElement {
    pub id: String,
    pub selector: String,
    pub text: String,
}

fn default_max_candidates() -> usize {
    40
}

fn default_min_curated() -> usize {
    10
}

fn default_per_selector_limit() -> usize {
    5
}

fn default_text_limit() -> usize {
    50
}

fn default_important_elements() -> Vec<ImportantElement> {
    [
        ("inicio", "#inicio", "Bienvenido a MiSaludDigital"),
        ("servicios", "#servicios", "Nuestros Servicios"),
        ("contacto", "#contacto", "Contáctanos"),
        ("accesibilidad", "#accesibilidad", "Compromiso con la Accesibilidad"),
        ("turnos", "#turnos", "Turnos Online"),
        ("historial", "#historial", "Historial Clínico"),
        ("teleconsultas", "#teleconsultas", "Teleconsultas"),
        ("farmacias", "#farmacias", "Farmacias Adheridas"),
        ("noticias", "#noticias", "Noticias de Salud"),
        ("soporte", "#soporte", "Soporte 24/7"),
        ("contacto-telefono", "#contacto-telefono a", "Teléfono"),
        ("contacto-email", "#contacto-email a", "Email"),
    ]
    .into_iter()
    .map(|(id, selector, text)| ImportantElement {
        id: id.into(),
        selector: selector.into(),
        text: text.into(),
    })
    .collect()
}

fn default_interactive_selectors() -> Vec<String> {
    [
        r#"button:not([aria-hidden="true"])"#,
        r#"a[href]:not([aria-hidden="true"])"#,
        r#"input:not([type="hidden"])"#,
        r#"[role="button"]:not([aria-hidden="true"])"#,
        r#"[tabindex="0"]"#,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommandsConfig {
    /// Extra exact-phrase commands merged over the built-in table.
    #[serde(default)]
    pub direct: Vec<DirectCommandConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectCommandConfig {
    pub phrase: String,
    pub action: Action,
    pub element: String,
    pub message: String,
}

/// Client-side settings for reaching a remote inference service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteInferenceConfig {
    /// Voice sessions resolve through the service instead of calling the LLM directly.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RemoteInferenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:3000/api/voice-command".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// External text-to-speech program. Receives the text on stdin.
    #[serde(default)]
    pub tts_command: Option<String>,
    #[serde(default)]
    pub tts_args: Vec<String>,
    #[serde(default = "default_tts_timeout_secs")]
    pub tts_timeout_secs: u64,
    /// Directory for persisted settings; defaults to the user data dir.
    #[serde(default)]
    pub settings_dir: Option<PathBuf>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            tts_command: None,
            tts_args: Vec::new(),
            tts_timeout_secs: default_tts_timeout_secs(),
            settings_dir: None,
        }
    }
}

fn default_tts_timeout_secs() -> u64 {
    30
}

fn resolve_config_path() -> VoiceNavResult<PathBuf> {
    if let Ok(path) = std::env::var("VOICENAV_CONFIG") {
        if !path.trim().is_empty() {
            let candidate = PathBuf::from(path);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found via VOICENAV_CONFIG");
                return Ok(candidate);
            }
            return Err(VoiceNavError::Config(format!(
                "VOICENAV_CONFIG points to missing file {}",
                candidate.display()
            )));
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(VoiceNavError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn parse_config(content: &str) -> VoiceNavResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    if config.resolver.inference_timeout_ms == 0 {
        return Err(VoiceNavError::Config(
            "resolver.inference_timeout_ms must be greater than zero".into(),
        ));
    }
    if config.snapshot.max_candidates == 0 {
        return Err(VoiceNavError::Config(
            "snapshot.max_candidates must be greater than zero".into(),
        ));
    }
    Ok(config)
}

pub fn load_config() -> VoiceNavResult<AppConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> VoiceNavResult<()> {
    let path = resolve_config_path()?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
