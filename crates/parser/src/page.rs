use scraper::{Html, Node, Selector};

use darkgather_core::{ItemKind, PageItem};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_CONTENT_CHARS: usize = 5000;

/// Text inside these never counts as visible content.
const INVISIBLE: &[&str] = &["script", "style", "iframe", "noscript"];

pub fn extract_page_data(url: &str, html: &str) -> PageItem {
    let document = Html::parse_document(html);

    let title = selector("title")
        .and_then(|s| document.select(&s).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| url.to_string());

    let content = visible_text(&document);

    let link_count = selector("a")
        .map(|s| document.select(&s).count())
        .unwrap_or(0);

    PageItem {
        kind: ItemKind::Page,
        title: truncate_chars(&title, MAX_TITLE_CHARS),
        url: url.to_string(),
        content: truncate_chars(&content, MAX_CONTENT_CHARS),
        discovered_at: chrono::Utc::now(),
        link_count,
    }
}

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

/// Every trimmed, non-empty text node outside script/style/iframe/noscript, space-joined.
fn visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|el| INVISIBLE.iter().any(|n| *n == el.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    parts.join(" ")
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
