//! Snapshot pipeline: turns the live page into a bounded candidate list.
//!
//! 1. Resolve the curated important elements; emit them with their curated
//!    labels so payloads stay small and stable.
//! 2. Only if that yields too few candidates, scan the generic interactive
//!    selectors, capping each selector's contribution and dropping anything
//!    without rendered area.
//! 3. Truncate to the configured maximum.
//!
//! Extraction never mutates the page.

use std::collections::HashSet;

use crate::config::SnapshotConfig;
use crate::perception::traits::Page;
use crate::perception::types::{CandidateElement, DomNode, ElementSnapshot};

#[derive(Debug, Clone)]
pub struct SnapshotExtractor {
    config: SnapshotConfig,
}

impl SnapshotExtractor {
    pub fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    pub fn extract(&self, page: &dyn Page) -> ElementSnapshot {
        let mut elements = Vec::new();
        let mut seen: HashSet<usize> = HashSet::new();

        // Step 1: curated elements
        for important in &self.config.important {
            match page.query_selector(&important.selector) {
                Ok(Some(node)) => {
                    seen.insert(node.node_id);
                    elements.push(CandidateElement {
                        tag: node.tag,
                        id: Some(important.id.clone()),
                        class_name: None,
                        selector: important.selector.clone(),
                        text: Some(important.text.clone()),
                        href: node.href,
                        role: node.role,
                        aria_label: node.aria_label,
                        input_type: None,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(selector = %important.selector, error = %e, "curated selector failed");
                }
            }
        }

        let curated = elements.len();
        tracing::debug!(curated, "curated candidates");

        // Step 2: generic scan, only when the curated set is too thin
        if curated < self.config.min_curated {
            for selector in &self.config.interactive_selectors {
                let nodes = match page.query_selector_all(selector) {
                    Ok(nodes) => nodes,
                    Err(e) => {
                        tracing::warn!(selector = %selector, error = %e, "interactive selector failed");
                        continue;
                    }
                };
                for node in nodes.into_iter().take(self.config.per_selector_limit) {
                    if !node.rect.has_area() || !seen.insert(node.node_id) {
                        continue;
                    }
                    elements.push(self.scanned_candidate(node));
                }
            }
            tracing::debug!(scanned = elements.len() - curated, "interactive scan complete");
        }

        // Step 3: bound
        if elements.len() > self.config.max_candidates {
            tracing::debug!(
                found = elements.len(),
                max = self.config.max_candidates,
                "snapshot truncated"
            );
        }
        ElementSnapshot::bounded(elements, self.config.max_candidates)
    }

    fn scanned_candidate(&self, node: DomNode) -> CandidateElement {
        let selector = generate_selector(&node);
        let text: String = node.text.trim().chars().take(self.config.text_limit).collect();
        CandidateElement {
            tag: node.tag,
            id: node.id,
            class_name: node.class_name,
            selector,
            text: (!text.is_empty()).then_some(text),
            href: node.href,
            role: node.role,
            aria_label: node.aria_label,
            input_type: node.input_type,
        }
    }
}

/// Best-effort unique selector: id, then first class, then position among
/// same-tag siblings, then the bare tag.
pub fn generate_selector(node: &DomNode) -> String {
    if let Some(id) = node.id.as_deref().filter(|id| !id.is_empty()) {
        return format!("#{id}");
    }

    if let Some(first_class) = node
        .class_name
        .as_deref()
        .and_then(|classes| classes.split_whitespace().next())
    {
        return format!(".{first_class}");
    }

    match node.siblings {
        Some(pos) if pos.count > 1 => format!("{}:nth-of-type({})", node.tag, pos.index),
        _ => node.tag.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::html_page::HtmlPage;
    use crate::perception::types::{Rect, SiblingPosition};

    fn node(tag: &str) -> DomNode {
        DomNode {
            node_id: 0,
            tag: tag.into(),
            id: None,
            class_name: None,
            text: String::new(),
            href: None,
            role: None,
            aria_label: None,
            input_type: None,
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            siblings: None,
        }
    }

    #[test]
    fn selector_prefers_id_then_class_then_position() {
        let mut n = node("button");
        n.id = Some("enviar".into());
        n.class_name = Some("btn primary".into());
        assert_eq!(generate_selector(&n), "#enviar");

        n.id = None;
        assert_eq!(generate_selector(&n), ".btn");

        n.class_name = None;
        n.siblings = Some(SiblingPosition { index: 3, count: 4 });
        assert_eq!(generate_selector(&n), "button:nth-of-type(3)");

        n.siblings = Some(SiblingPosition { index: 1, count: 1 });
        assert_eq!(generate_selector(&n), "button");
    }

    #[test]
    fn curated_elements_use_curated_labels() {
        let page = HtmlPage::new(
            r#"<body>
                 <section id="inicio"><h1>Texto vivo muy largo que no debe aparecer</h1></section>
                 <div id="contacto-telefono"><a href="tel:+5411" aria-label="Llamar">011</a></div>
               </body>"#,
        );
        let extractor = SnapshotExtractor::new(SnapshotConfig {
            min_curated: 0,
            ..SnapshotConfig::default()
        });
        let snapshot = extractor.extract(&page);
        assert_eq!(snapshot.len(), 2);

        let inicio = &snapshot.elements()[0];
        assert_eq!(inicio.tag, "section");
        assert_eq!(inicio.selector, "#inicio");
        assert_eq!(inicio.text.as_deref(), Some("Bienvenido a MiSaludDigital"));

        let tel = &snapshot.elements()[1];
        assert_eq!(tel.tag, "a");
        assert_eq!(tel.id.as_deref(), Some("contacto-telefono"));
        assert_eq!(tel.href.as_deref(), Some("tel:+5411"));
        assert_eq!(tel.aria_label.as_deref(), Some("Llamar"));
    }

    #[test]
    fn scan_skips_hidden_caps_per_selector_and_truncates_text() {
        let long = "x".repeat(80);
        let html = format!(
            r#"<body>
                 <button hidden>oculto</button>
                 <button class="cta">{long}</button>
                 <button>b3</button><button>b4</button><button>b5</button>
                 <button>b6</button><button>b7</button>
               </body>"#
        );
        let page = HtmlPage::new(html);
        let extractor = SnapshotExtractor::new(SnapshotConfig {
            interactive_selectors: vec!["button".into()],
            ..SnapshotConfig::default()
        });
        let snapshot = extractor.extract(&page);

        // first five matches considered, the hidden one dropped
        assert_eq!(snapshot.len(), 4);
        let first = &snapshot.elements()[0];
        assert_eq!(first.selector, ".cta");
        assert_eq!(first.text.as_deref().map(|t| t.chars().count()), Some(50));
        assert_eq!(snapshot.elements()[1].selector, "button:nth-of-type(3)");
    }

    #[test]
    fn scan_is_skipped_when_curated_set_is_large_enough() {
        let page = HtmlPage::new(r#"<body><section id="inicio"></section><button>x</button></body>"#);
        let extractor = SnapshotExtractor::new(SnapshotConfig {
            min_curated: 1,
            ..SnapshotConfig::default()
        });
        let snapshot = extractor.extract(&page);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.elements()[0].selector, "#inicio");
    }

    #[test]
    fn never_exceeds_max_candidates() {
        let buttons: String = (0..20).map(|i| format!("<button id=\"b{i}\">{i}</button>")).collect();
        let links: String = (0..20).map(|i| format!("<a href=\"/{i}\">{i}</a>")).collect();
        let page = HtmlPage::new(format!("<body>{buttons}{links}</body>"));
        let extractor = SnapshotExtractor::new(SnapshotConfig {
            max_candidates: 7,
            ..SnapshotConfig::default()
        });
        let snapshot = extractor.extract(&page);
        assert_eq!(snapshot.len(), 7);
    }
}
