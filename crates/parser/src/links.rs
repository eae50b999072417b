use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::RegexSet;
use scraper::{Html, Selector};
use url::Url;

use darkgather_core::config::AddressVersion;

/// Hard ceiling on links followed from one page, whatever the config says.
pub const MAX_LINKS_PER_PAGE: usize = 20;

const ONION_SUFFIX: &str = ".onion";

// Binaries, archives and media: never worth a circuit.
static BLACKLIST: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"\.exe$", r"\.zip$", r"\.rar$", r"\.tar$", r"\.gz$",
        r"\.mp3$", r"\.mp4$", r"\.avi$", r"\.mkv$", r"\.pdf$",
    ])
    .unwrap()
});

/// Which hosts count as in-scope: `.onion` with the fixed host length of one address version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRule {
    host_len: usize,
}

impl AddressRule {
    pub fn new(version: AddressVersion) -> Self {
        Self {
            host_len: version.host_len(),
        }
    }

    pub fn is_valid(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }
        url.host_str()
            .map(|h| h.ends_with(ONION_SUFFIX) && h.len() == self.host_len)
            .unwrap_or(false)
    }

    pub fn parse(&self, raw: &str) -> Option<Url> {
        Url::parse(raw.trim()).ok().filter(|u| self.is_valid(u))
    }
}

impl Default for AddressRule {
    fn default() -> Self {
        Self::new(AddressVersion::default())
    }
}

pub fn is_blacklisted(url: &Url) -> bool {
    BLACKLIST.is_match(&url.as_str().to_lowercase())
}

/// In-scope, non-blacklisted links of a page, resolved against `base_url`,
/// deduplicated in document order and capped at `max_links` (never above 20).
pub fn extract_links(base_url: &Url, html: &str, rule: &AddressRule, max_links: usize) -> Vec<Url> {
    let cap = max_links.min(MAX_LINKS_PER_PAGE);
    let Ok(sel) = Selector::parse("a[href]") else {
        return vec![];
    };
    let document = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for el in document.select(&sel) {
        if links.len() >= cap {
            break;
        }
        let Some(href) = el.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty()
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with('#')
        {
            continue;
        }
        let Ok(resolved) = base_url.join(href) else {
            continue;
        };
        if !rule.is_valid(&resolved) || is_blacklisted(&resolved) {
            continue;
        }
        if seen.insert(resolved.to_string()) {
            links.push(resolved);
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v2() -> AddressRule {
        AddressRule::new(AddressVersion::V2)
    }

    #[test]
    fn test_validate_v2_addresses() {
        let rule = v2();
        assert!(rule.parse("http://abcdefghijklmnop.onion/x").is_some());
        assert!(rule.parse("https://abcdefghijklmnop.onion/").is_some());
        assert!(rule.parse("http://short.onion/x").is_none());
        assert!(rule.parse("https://example.com/x").is_none());
        assert!(rule.parse("ftp://abcdefghijklmnop.onion/x").is_none());
        assert!(rule.parse("not a url").is_none());
    }

    #[test]
    fn test_validate_v3_addresses() {
        let rule = AddressRule::new(AddressVersion::V3);
        let v3 = "http://zqktlwiuavvvqqt4ybvgvi7tyo4hjl5xgfuvpdf6otjiycgwqbym2qad.onion/wiki";
        assert!(rule.parse(v3).is_some());
        assert!(rule.parse("http://abcdefghijklmnop.onion/x").is_none());
    }

    #[test]
    fn test_blacklist() {
        let bad = Url::parse("http://abcdefghijklmnop.onion/file.exe").unwrap();
        let upper = Url::parse("http://abcdefghijklmnop.onion/Movie.MKV").unwrap();
        let ok = Url::parse("http://abcdefghijklmnop.onion/index.html").unwrap();
        assert!(is_blacklisted(&bad));
        assert!(is_blacklisted(&upper));
        assert!(!is_blacklisted(&ok));
    }

    #[test]
    fn test_extract_links_filters_and_resolves() {
        let base = Url::parse("http://abcdefghijklmnop.onion/dir/page.html").unwrap();
        let html = r##"
            <a href="other.html">relative</a>
            <a href="/root">absolute path</a>
            <a href="http://qrstuvwxyzabcdef.onion/">foreign onion</a>
            <a href="https://example.com/">clearnet</a>
            <a href="http://short.onion/">short</a>
            <a href="/tool.zip">archive</a>
            <a href="mailto:x@y.z">mail</a>
            <a href="javascript:void(0)">js</a>
            <a href="#top">fragment</a>
            <a href="other.html">duplicate</a>
            <a>no href</a>
        "##;

        let links: Vec<String> = extract_links(&base, html, &v2(), 20)
            .into_iter()
            .map(|u| u.to_string())
            .collect();

        assert_eq!(
            links,
            vec![
                "http://abcdefghijklmnop.onion/dir/other.html",
                "http://abcdefghijklmnop.onion/root",
                "http://qrstuvwxyzabcdef.onion/",
            ]
        );
    }

    #[test]
    fn test_extract_links_is_capped() {
        let base = Url::parse("http://abcdefghijklmnop.onion/").unwrap();
        let html: String = (0..50).map(|i| format!("<a href=\"/p{}\">p</a>", i)).collect();

        assert_eq!(extract_links(&base, &html, &v2(), 100).len(), MAX_LINKS_PER_PAGE);
        assert_eq!(extract_links(&base, &html, &v2(), 5).len(), 5);
    }
}
