use crate::errors::VoiceNavResult;
use crate::perception::types::{DomNode, ScrollOptions};

/// Capability over a live page: selector queries plus the action primitives
/// the executor needs. A browser bridge, a headless document or a test fake
/// can stand behind it.
///
/// Queries never mutate the page. An unparseable selector is an error.
pub trait Page: Send + Sync {
    fn query_selector(&self, selector: &str) -> VoiceNavResult<Option<DomNode>>;

    fn query_selector_all(&self, selector: &str) -> VoiceNavResult<Vec<DomNode>>;

    /// Triggers the element's activation behaviour.
    fn click(&self, node: &DomNode) -> VoiceNavResult<()>;

    fn scroll_into_view(&self, node: &DomNode, options: ScrollOptions) -> VoiceNavResult<()>;

    fn focus(&self, node: &DomNode) -> VoiceNavResult<()>;

    /// Moves the page to a new location.
    fn navigate(&self, url: &str) -> VoiceNavResult<()>;
}
