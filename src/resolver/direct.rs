use std::collections::HashMap;

use crate::config::DirectCommandConfig;
use crate::resolver::types::{normalize_utterance, Action, ResolvedCommand};

/// Built-in phrases that dominate real usage and must never wait on the network.
const BUILTIN: &[(&str, Action, &str, &str)] = &[
    ("ir a inicio", Action::Scroll, "#inicio", "Navegando a inicio"),
    ("navegar a inicio", Action::Scroll, "#inicio", "Navegando a inicio"),
    ("ir a servicios", Action::Scroll, "#servicios", "Navegando a servicios"),
    ("mostrar servicios", Action::Scroll, "#servicios", "Mostrando servicios"),
    ("ir a contacto", Action::Scroll, "#contacto", "Navegando a contacto"),
    ("ir a accesibilidad", Action::Scroll, "#accesibilidad", "Navegando a accesibilidad"),
    ("ver turnos", Action::Scroll, "#turnos", "Mostrando turnos online"),
    ("turnos online", Action::Scroll, "#turnos", "Mostrando turnos online"),
    ("ver historial", Action::Scroll, "#historial", "Mostrando historial clínico"),
    ("historial clínico", Action::Scroll, "#historial", "Mostrando historial clínico"),
    ("ver teleconsultas", Action::Scroll, "#teleconsultas", "Mostrando teleconsultas"),
    ("ver farmacias", Action::Scroll, "#farmacias", "Mostrando farmacias adheridas"),
    ("ver noticias", Action::Scroll, "#noticias", "Mostrando noticias de salud"),
    ("ver soporte", Action::Scroll, "#soporte", "Mostrando soporte"),
    ("llamar teléfono", Action::Click, "#contacto-telefono a", "Llamando teléfono"),
    ("llamar", Action::Click, "#contacto-telefono a", "Llamando teléfono"),
    ("enviar email", Action::Click, "#contacto-email a", "Enviando email"),
    ("email", Action::Click, "#contacto-email a", "Enviando email"),
];

/// Exact-phrase lookup table. Immutable once built.
#[derive(Debug, Clone)]
pub struct DirectCommandTable {
    entries: HashMap<String, ResolvedCommand>,
}

impl DirectCommandTable {
    pub fn builtin() -> Self {
        Self::with_extra(&[])
    }

    /// Built-in table plus config-supplied entries; config wins on phrase clashes.
    pub fn with_extra(extra: &[DirectCommandConfig]) -> Self {
        let mut entries: HashMap<String, ResolvedCommand> = BUILTIN
            .iter()
            .map(|(phrase, action, element, message)| {
                (phrase.to_string(), ResolvedCommand::new(*action, *element, *message))
            })
            .collect();

        for entry in extra {
            let phrase = normalize_utterance(&entry.phrase);
            if phrase.is_empty() {
                tracing::warn!("ignoring direct command with empty phrase");
                continue;
            }
            let command = ResolvedCommand {
                action: entry.action,
                target: entry.element.clone(),
                message: entry.message.clone(),
                success: entry.action != Action::None,
            };
            if entries.insert(phrase.clone(), command).is_some() {
                tracing::debug!(phrase = %phrase, "config overrides built-in direct command");
            }
        }

        tracing::debug!(entries = entries.len(), "direct command table built");
        Self { entries }
    }

    /// Exact match on an already-normalized phrase.
    pub fn lookup(&self, normalized_phrase: &str) -> Option<ResolvedCommand> {
        self.entries.get(normalized_phrase).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for DirectCommandTable {
    fn default() -> Self {
        Self::builtin()
    }
}
