//! Metadata extraction from watch page HTML.
//!
//! Open Graph tags supply the title and thumbnail. The description comes from
//! the page body when present, since `og:description` is truncated.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static OG_META: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property^="og:"]"#));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));
static META_DESCRIPTION: Lazy<Selector> = Lazy::new(|| selector(r#"meta[name="description"]"#));
static DESCRIPTION_CONTAINERS: Lazy<Vec<Selector>> =
    Lazy::new(|| vec![selector("#watch-description-text"), selector("#description")]);
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| selector("p"));

fn selector(css: &str) -> Selector {
    // Selectors are compile-time constants.
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

/// Metadata extracted from a watch page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

/// Extract title, description and thumbnail URL from watch page HTML.
#[must_use]
pub fn extract_page_metadata(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    let mut og_title = None;
    let mut og_description = None;
    let mut og_image = None;
    for element in document.select(&OG_META) {
        let Some(property) = element.value().attr("property") else {
            continue;
        };
        let content = non_empty(element.value().attr("content"));
        match property {
            "og:title" => og_title = og_title.or(content),
            "og:description" => og_description = og_description.or(content),
            "og:image" => og_image = og_image.or(content),
            _ => {}
        }
    }

    let title = og_title.or_else(|| {
        document
            .select(&TITLE)
            .next()
            .and_then(|el| non_empty(Some(&element_text(el))))
    });

    let description = body_description(&document)
        .or(og_description)
        .or_else(|| {
            document
                .select(&META_DESCRIPTION)
                .next()
                .and_then(|el| non_empty(el.value().attr("content")))
        });

    PageMetadata {
        title,
        description,
        thumbnail: og_image,
    }
}

fn body_description(document: &Html) -> Option<String> {
    for container_selector in DESCRIPTION_CONTAINERS.iter() {
        let Some(container) = document.select(container_selector).next() else {
            continue;
        };
        let paragraphs: String = container.select(&PARAGRAPH).map(element_text).collect();
        let text = if paragraphs.trim().is_empty() {
            element_text(container)
        } else {
            paragraphs
        };
        if let Some(text) = non_empty(Some(&text)) {
            return Some(text);
        }
    }
    None
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
