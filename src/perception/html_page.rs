//! Headless [`Page`] over a static HTML document.
//!
//! There is no layout engine: every rendered element gets the same nominal
//! box, and elements that would not render (hidden attribute, inline
//! `display:none`/`visibility:hidden`, hidden inputs, anything under
//! `<head>`/`<template>` or a hidden ancestor) get an empty one. Actions are
//! recorded as [`PageEffect`]s rather than performed.

use std::sync::{Mutex, MutexGuard};

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::errors::{VoiceNavError, VoiceNavResult};
use crate::perception::traits::Page;
use crate::perception::types::{DomNode, Rect, ScrollOptions, SiblingPosition};

const VISIBLE_BOX: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 100.0,
    height: 20.0,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEffect {
    Click { node_id: usize },
    ScrollIntoView { node_id: usize, options: ScrollOptions },
    Focus { node_id: usize },
    Navigate { url: String },
}

#[derive(Debug, Default)]
struct PageState {
    effects: Vec<PageEffect>,
    focused: Option<usize>,
    location: Option<String>,
}

pub struct HtmlPage {
    // scraper's tree is not Send, so the document is re-parsed per call.
    source: String,
    state: Mutex<PageState>,
}

impl HtmlPage {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            state: Mutex::new(PageState::default()),
        }
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> VoiceNavResult<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), bytes = source.len(), "html page loaded");
        Ok(Self::new(source))
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every action recorded so far, oldest first.
    pub fn effects(&self) -> Vec<PageEffect> {
        self.state().effects.clone()
    }

    pub fn focused(&self) -> Option<usize> {
        self.state().focused
    }

    pub fn location(&self) -> Option<String> {
        self.state().location.clone()
    }

    fn matching(&self, selector: &str, limit: Option<usize>) -> VoiceNavResult<Vec<DomNode>> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.source);
        let mut out = Vec::new();
        for (ordinal, node) in document.root_element().descendants().enumerate() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            if selector.matches(&el) {
                out.push(to_dom_node(el, ordinal));
                if limit.is_some_and(|l| out.len() >= l) {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Confirms a handle still points at the same element before acting on it.
    fn check_handle(&self, node: &DomNode) -> VoiceNavResult<()> {
        let document = Html::parse_document(&self.source);
        let found = document
            .root_element()
            .descendants()
            .nth(node.node_id)
            .and_then(ElementRef::wrap)
            .map(|el| el.value().name().eq_ignore_ascii_case(&node.tag))
            .unwrap_or(false);
        if found {
            Ok(())
        } else {
            Err(VoiceNavError::Page(format!(
                "stale handle {} for <{}>",
                node.node_id, node.tag
            )))
        }
    }

    fn record(&self, effect: PageEffect) {
        tracing::debug!(?effect, "page effect");
        self.state().effects.push(effect);
    }
}

impl Page for HtmlPage {
    fn query_selector(&self, selector: &str) -> VoiceNavResult<Option<DomNode>> {
        Ok(self.matching(selector, Some(1))?.into_iter().next())
    }

    fn query_selector_all(&self, selector: &str) -> VoiceNavResult<Vec<DomNode>> {
        self.matching(selector, None)
    }

    fn click(&self, node: &DomNode) -> VoiceNavResult<()> {
        self.check_handle(node)?;
        self.record(PageEffect::Click {
            node_id: node.node_id,
        });
        Ok(())
    }

    fn scroll_into_view(&self, node: &DomNode, options: ScrollOptions) -> VoiceNavResult<()> {
        self.check_handle(node)?;
        self.record(PageEffect::ScrollIntoView {
            node_id: node.node_id,
            options,
        });
        Ok(())
    }

    fn focus(&self, node: &DomNode) -> VoiceNavResult<()> {
        self.check_handle(node)?;
        self.state().focused = Some(node.node_id);
        self.record(PageEffect::Focus {
            node_id: node.node_id,
        });
        Ok(())
    }

    fn navigate(&self, url: &str) -> VoiceNavResult<()> {
        self.state().location = Some(url.to_string());
        self.record(PageEffect::Navigate {
            url: url.to_string(),
        });
        Ok(())
    }
}

fn parse_selector(selector: &str) -> VoiceNavResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| VoiceNavError::Page(format!("invalid selector {selector:?}: {e:?}")))
}

fn to_dom_node(el: ElementRef<'_>, node_id: usize) -> DomNode {
    let value = el.value();
    let tag = value.name().to_ascii_lowercase();
    let attr = |name: &str| {
        value
            .attr(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    };

    let href = match tag.as_str() {
        "a" | "area" | "link" => attr("href"),
        _ => None,
    };
    let input_type = match tag.as_str() {
        "input" | "button" => attr("type"),
        _ => None,
    };

    let siblings = el.parent().map(|parent| {
        let same_tag: Vec<ElementRef<'_>> = parent
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|c| c.value().name() == value.name())
            .collect();
        let index = same_tag
            .iter()
            .position(|c| *c == el)
            .map(|i| i + 1)
            .unwrap_or(1);
        SiblingPosition {
            index,
            count: same_tag.len(),
        }
    });

    DomNode {
        node_id,
        id: attr("id"),
        class_name: attr("class"),
        text: collapse_whitespace(&el.text().collect::<String>()),
        href,
        role: attr("role"),
        aria_label: attr("aria-label"),
        input_type,
        rect: if is_rendered(el) {
            VISIBLE_BOX
        } else {
            Rect::default()
        },
        siblings,
        tag,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_rendered(el: ElementRef<'_>) -> bool {
    let value = el.value();
    if value.name() == "input"
        && value
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("hidden"))
    {
        return false;
    }

    let hidden = std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .any(|e| {
            let v = e.value();
            matches!(v.name(), "head" | "script" | "style" | "template" | "noscript")
                || v.attr("hidden").is_some()
                || v.attr("style").is_some_and(style_hides)
        });
    !hidden
}

fn style_hides(style: &str) -> bool {
    let compact: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    compact.contains("display:none") || compact.contains("visibility:hidden")
}
