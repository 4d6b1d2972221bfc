//! HTML extraction helpers built on the `scraper` crate.
//!
//! Everything here is deterministic string work over already-fetched,
//! already-bounded HTML: titles, meta descriptions, about sections, visible
//! text, and anchor inventories with footer/header placement flags.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

fn noise_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)<script\b[^>]*>.*?</script>|<style\b[^>]*>.*?</style>|<noscript\b[^>]*>.*?</noscript>|<iframe\b[^>]*>.*?</iframe>|<svg\b[^>]*>.*?</svg>",
        )
        .expect("noise tag regex must compile")
    })
}

fn chrome_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)<nav\b[^>]*>.*?</nav>|<footer\b[^>]*>.*?</footer>|<header\b[^>]*>.*?</header>",
        )
        .expect("chrome tag regex must compile")
    })
}

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector must parse")
}

/// Drop script/style/noscript/iframe/svg blocks.
fn strip_noise(html: &str) -> String {
    noise_tag_re().replace_all(html, " ").into_owned()
}

/// The `<title>` text, trimmed, when non-empty.
pub fn page_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let title = doc
        .select(&sel("title"))
        .next()
        .map(|el| el.text().collect::<String>())?;
    let trimmed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// The `meta[name=description]` (or og:description) content.
pub fn meta_description(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    for selector in [
        r#"meta[name="description"]"#,
        r#"meta[property="og:description"]"#,
    ] {
        if let Some(content) = doc
            .select(&sel(selector))
            .next()
            .and_then(|el| el.value().attr("content"))
        {
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Text of the most "about-like" region of a page, capped at `max_chars`.
///
/// Tries, in order: a `<section>` whose text mentions "About", a
/// `div[class*=about]`, a `section[class*=hero]`, `<main>`, then `<body>`.
pub fn about_text(html: &str, max_chars: usize) -> Option<String> {
    let cleaned = strip_noise(html);
    let doc = Html::parse_document(&cleaned);

    for element in doc.select(&sel("section")) {
        let text = squash(element.text().collect::<String>());
        if text.contains("About") && !text.is_empty() {
            return Some(cap_chars(&text, max_chars));
        }
    }

    for selector in [r#"div[class*="about"]"#, r#"section[class*="hero"]"#, "main", "body"] {
        if let Some(element) = doc.select(&sel(selector)).next() {
            let text = squash(element.text().collect::<String>());
            if !text.is_empty() {
                return Some(cap_chars(&text, max_chars));
            }
        }
    }
    None
}

/// Page body text with navigation chrome removed, capped at `max_chars`.
pub fn visible_text(html: &str, max_chars: usize) -> Option<String> {
    let cleaned = chrome_tag_re()
        .replace_all(&strip_noise(html), " ")
        .into_owned();
    let doc = Html::parse_document(&cleaned);
    let body = doc.select(&sel("body")).next()?;
    let text = squash(body.text().collect::<String>());
    if text.is_empty() {
        None
    } else {
        Some(cap_chars(&text, max_chars))
    }
}

/// One `<a href>` found on a page, with placement context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorHit {
    /// The raw href attribute.
    pub href: String,
    /// Whether any ancestor is a footer element (tag, class, or id).
    ///
    /// A boolean, so arbitrarily nested footers count exactly once.
    pub in_footer: bool,
    /// Whether any ancestor is a `header` or `nav` element.
    pub in_header: bool,
}

/// Collect every anchor with an absolute http(s) href.
pub fn anchors(html: &str) -> Vec<AnchorHit> {
    let doc = Html::parse_document(html);
    let mut hits = Vec::new();

    for anchor in doc.select(&sel("a[href]")) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.starts_with("http://") && !href.starts_with("https://") {
            continue;
        }

        let mut in_footer = false;
        let mut in_header = false;
        for node in anchor.ancestors() {
            let Some(element) = node.value().as_element() else {
                continue;
            };
            let name = element.name();
            let class = element.attr("class").unwrap_or_default().to_ascii_lowercase();
            let id = element.attr("id").unwrap_or_default().to_ascii_lowercase();
            if name == "footer" || class.contains("footer") || id.contains("footer") {
                in_footer = true;
            }
            if name == "header" || name == "nav" {
                in_header = true;
            }
        }

        hits.push(AnchorHit {
            href: href.to_string(),
            in_footer,
            in_header,
        });
    }
    hits
}

fn squash(text: String) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cap_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
