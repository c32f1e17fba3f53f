use std::sync::Arc;

use tokio::time::Instant;

use crate::config::{CommandsConfig, ResolverConfig};
use crate::errors::{VoiceNavError, VoiceNavResult};
use crate::perception::types::ElementSnapshot;
use crate::resolver::cache::ResolutionCache;
use crate::resolver::direct::DirectCommandTable;
use crate::resolver::inference::Inference;
use crate::resolver::metrics::PerformanceMonitor;
use crate::resolver::types::{normalize_utterance, FailureKind, Resolution, ResolvedCommand, Tier};

/// Tiered utterance resolution: exact phrase table, then the TTL cache, then
/// inference under a hard deadline.
///
/// Every path yields the same [`ResolvedCommand`] contract. The only error
/// that escapes [`resolve`](Self::resolve) is a blank utterance.
pub struct CommandResolver {
    direct: DirectCommandTable,
    cache: ResolutionCache,
    inference: Arc<dyn Inference>,
    config: ResolverConfig,
    monitor: PerformanceMonitor,
}

impl CommandResolver {
    pub fn new(
        direct: DirectCommandTable,
        cache: ResolutionCache,
        inference: Arc<dyn Inference>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            direct,
            cache,
            inference,
            config,
            monitor: PerformanceMonitor::default(),
        }
    }

    pub fn from_config(
        resolver: &ResolverConfig,
        commands: &CommandsConfig,
        inference: Arc<dyn Inference>,
    ) -> Self {
        let direct = DirectCommandTable::with_extra(&commands.direct);
        let cache = ResolutionCache::with_capacity(resolver.cache_ttl(), resolver.cache_max_entries);
        tracing::info!(
            direct = direct.len(),
            backend = %inference.name(),
            timeout_ms = resolver.inference_timeout_ms,
            ttl_secs = resolver.cache_ttl_secs,
            "command resolver ready"
        );
        Self::new(direct, cache, inference, resolver.clone())
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub async fn resolve(
        &self,
        utterance: &str,
        snapshot: &ElementSnapshot,
    ) -> VoiceNavResult<Resolution> {
        let start = Instant::now();
        let normalized = normalize_utterance(utterance);
        if normalized.is_empty() {
            return Err(VoiceNavError::Validation("Command is required".into()));
        }

        if let Some(command) = self.direct.lookup(&normalized) {
            return Ok(self.finish(&normalized, command, Tier::Direct, None, start));
        }

        let key = ResolutionCache::key(&normalized, &snapshot.fingerprint(self.config.fingerprint_len));
        if let Some(command) = self.cache.get(&key) {
            return Ok(self.finish(&normalized, command, Tier::Cached, None, start));
        }

        let elements = snapshot.head(self.config.inference_element_limit);
        let deadline = self.config.inference_timeout();
        let outcome = tokio::time::timeout(deadline, self.inference.infer(utterance.trim(), elements))
            .await
            .unwrap_or(Err(VoiceNavError::Timeout(self.config.inference_timeout_ms)));

        let resolution = match outcome {
            Ok(Some(command)) => {
                let command = command.normalized();
                self.cache.put(key, command.clone());
                self.finish(&normalized, command, Tier::Inferred, None, start)
            }
            Ok(None) => self.fail(&normalized, FailureKind::Empty, start),
            Err(e) => {
                let kind = classify(&e);
                tracing::warn!(
                    command = %normalized,
                    backend = %self.inference.name(),
                    error = %e,
                    failure = ?kind,
                    "inference failed"
                );
                self.fail(&normalized, kind, start)
            }
        };
        Ok(resolution)
    }

    fn fail(&self, normalized: &str, kind: FailureKind, start: Instant) -> Resolution {
        self.finish(
            normalized,
            ResolvedCommand::failed(kind.message()),
            Tier::Failed,
            Some(kind),
            start,
        )
    }

    fn finish(
        &self,
        normalized: &str,
        command: ResolvedCommand,
        tier: Tier,
        failure: Option<FailureKind>,
        start: Instant,
    ) -> Resolution {
        let elapsed = start.elapsed();
        tracing::info!(
            command = %normalized,
            tier = tier.as_str(),
            action = %command.action,
            element = %command.target,
            success = command.success,
            elapsed_ms = elapsed.as_millis() as u64,
            "command resolved"
        );
        self.monitor
            .record(normalized, elapsed, tier, tier != Tier::Failed);
        Resolution {
            command,
            tier,
            failure,
            elapsed,
        }
    }
}

fn classify(err: &VoiceNavError) -> FailureKind {
    match err {
        VoiceNavError::Timeout(_) => FailureKind::Timeout,
        VoiceNavError::Parse(_) | VoiceNavError::Json(_) => FailureKind::Parse,
        _ => FailureKind::Transport,
    }
}
