//! Applies a resolved command to the page.
//!
//! Best effort and synchronous: the target is resolved to at most one
//! element, a missing target is logged and reported, and page-level
//! failures come back as an outcome instead of an error.

use std::sync::Arc;

use serde::Serialize;

use crate::errors::VoiceNavError;
use crate::perception::traits::Page;
use crate::perception::types::{DomNode, ScrollOptions};
use crate::resolver::types::{Action, ResolvedCommand};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Failed or `none` command; the page was not touched.
    Skipped,
    Applied { action: Action, target: String },
    TargetNotFound { target: String },
    Failed { reason: String },
}

impl ExecutionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ExecutionOutcome::Applied { .. })
    }
}

pub struct ActionExecutor {
    page: Arc<dyn Page>,
}

impl ActionExecutor {
    pub fn new(page: Arc<dyn Page>) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    pub fn apply(&self, command: &ResolvedCommand) -> ExecutionOutcome {
        if !command.is_actionable() {
            tracing::debug!(action = %command.action, success = command.success, "command skipped");
            return ExecutionOutcome::Skipped;
        }

        let target = command.target.as_str();
        let node = match self.page.query_selector(target) {
            Ok(Some(node)) => node,
            Ok(None) => {
                tracing::warn!(selector = %target, "element not found");
                return ExecutionOutcome::TargetNotFound {
                    target: target.to_string(),
                };
            }
            // An unusable selector cannot name anything on the page.
            Err(e) => {
                tracing::warn!(selector = %target, error = %e, "element not found");
                return ExecutionOutcome::TargetNotFound {
                    target: target.to_string(),
                };
            }
        };

        match self.perform(command.action, &node) {
            Ok(()) => {
                tracing::info!(action = %command.action, selector = %target, "action applied");
                ExecutionOutcome::Applied {
                    action: command.action,
                    target: target.to_string(),
                }
            }
            Err(e) => {
                tracing::error!(action = %command.action, selector = %target, error = %e, "action failed");
                ExecutionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn perform(&self, action: Action, node: &DomNode) -> Result<(), VoiceNavError> {
        match action {
            Action::Click => self.page.click(node),
            Action::Scroll => self.page.scroll_into_view(node, ScrollOptions::SMOOTH_CENTER),
            Action::Focus => self.page.focus(node),
            Action::Navigate => match node.href.as_deref() {
                Some(href) => self.page.navigate(href),
                None => {
                    tracing::debug!(tag = %node.tag, "no href to follow, scrolling instead");
                    self.page.scroll_into_view(node, ScrollOptions::SMOOTH_CENTER)
                }
            },
            Action::None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::html_page::{HtmlPage, PageEffect};

    const DOC: &str = r#"
        <body>
          <section id="inicio"><h1>Inicio</h1></section>
          <section id="servicios"><a href="/servicios/turnos" class="link">Turnos</a></section>
          <div id="contacto-telefono"><a href="tel:+541100000000">Llamar</a></div>
          <input id="buscar" type="search">
        </body>
    "#;

    fn setup() -> (Arc<HtmlPage>, ActionExecutor) {
        let page = Arc::new(HtmlPage::new(DOC));
        let exec = ActionExecutor::new(page.clone());
        (page, exec)
    }

    #[test]
    fn scroll_is_smooth_and_centered() {
        let (page, exec) = setup();
        let outcome = exec.apply(&ResolvedCommand::new(Action::Scroll, "#inicio", "Inicio"));
        assert!(outcome.is_applied());
        assert!(matches!(
            page.effects().as_slice(),
            [PageEffect::ScrollIntoView { options, .. }] if *options == ScrollOptions::SMOOTH_CENTER
        ));
    }

    #[test]
    fn click_and_focus_reach_the_page() {
        let (page, exec) = setup();
        exec.apply(&ResolvedCommand::new(Action::Click, "#contacto-telefono a", "Llamando"));
        exec.apply(&ResolvedCommand::new(Action::Focus, "#buscar", "Buscar"));
        let effects = page.effects();
        assert!(matches!(effects[0], PageEffect::Click { .. }));
        assert!(matches!(effects[1], PageEffect::Focus { .. }));
        assert!(page.focused().is_some());
    }

    #[test]
    fn navigate_follows_href_or_falls_back_to_scroll() {
        let (page, exec) = setup();
        exec.apply(&ResolvedCommand::new(Action::Navigate, ".link", "Turnos"));
        assert_eq!(page.location().as_deref(), Some("/servicios/turnos"));

        exec.apply(&ResolvedCommand::new(Action::Navigate, "#inicio", "Inicio"));
        assert!(matches!(
            page.effects().last(),
            Some(PageEffect::ScrollIntoView { .. })
        ));
    }

    #[test]
    fn missing_target_has_no_effect() {
        let (page, exec) = setup();
        let outcome = exec.apply(&ResolvedCommand::new(Action::Click, "#no-existe", "x"));
        assert_eq!(
            outcome,
            ExecutionOutcome::TargetNotFound {
                target: "#no-existe".into()
            }
        );
        let outcome = exec.apply(&ResolvedCommand::new(Action::Click, "a[[[", "x"));
        assert!(matches!(outcome, ExecutionOutcome::TargetNotFound { .. }));
        assert!(page.effects().is_empty());
    }

    #[test]
    fn failed_and_none_commands_are_skipped() {
        let (page, exec) = setup();
        assert_eq!(
            exec.apply(&ResolvedCommand::failed("Comando abortado por timeout")),
            ExecutionOutcome::Skipped
        );
        assert_eq!(
            exec.apply(&ResolvedCommand::new(Action::None, "#inicio", "nada")),
            ExecutionOutcome::Skipped
        );
        assert!(page.effects().is_empty());
    }
}
