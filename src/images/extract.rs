//! Locating image candidates inside HTML markup.
//!
//! Every helper returns an already sanitized URL, so callers can take the
//! first hit without re-validating.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::sanitize;

/// Attributes lazy-loading scripts read the real source from.
const LAZY_ATTRIBUTES: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-lazy",
    "data-url",
];

const LAZY_SRCSET_ATTRIBUTES: &[&str] = &["data-srcset", "data-lazy-srcset"];

/// How many ancestors of a link are searched at most.
const MAX_PARENT_DEPTH: usize = 3;

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("valid selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));
static STYLED: Lazy<Selector> = Lazy::new(|| Selector::parse("[style]").expect("valid selector"));
static PICTURE_SOURCE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("picture source").expect("valid selector"));
static META: Lazy<Selector> = Lazy::new(|| Selector::parse("meta").expect("valid selector"));

static BACKGROUND_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"background(?:-image)?\s*:[^;]*?url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#)
        .expect("valid regex")
});

/// Meta keys in lookup order: Open Graph, Twitter card, then custom
/// featured-image tags.
const META_IMAGE_KEYS: &[&[&str]] = &[
    &["og:image", "og:image:url", "og:image:secure_url"],
    &["twitter:image", "twitter:image:src"],
    &["featured-image", "featured_image", "article:featured_image", "thumbnail"],
];

/// First URL of a responsive `srcset` value.
pub fn first_srcset_candidate(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .next()
        .and_then(|entry| entry.split_whitespace().next())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// URL inside a CSS `background`/`background-image` declaration.
pub fn background_image_url(style: &str) -> Option<String> {
    BACKGROUND_URL
        .captures(style)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Best source of a single `<img>`: lazy attribute, responsive set, then `src`.
pub fn image_from_img(img: ElementRef) -> Option<String> {
    let element = img.value();

    LAZY_ATTRIBUTES
        .iter()
        .filter_map(|attr| element.attr(attr))
        .find_map(sanitize)
        .or_else(|| {
            LAZY_SRCSET_ATTRIBUTES
                .iter()
                .chain(std::iter::once(&"srcset"))
                .filter_map(|attr| element.attr(attr))
                .filter_map(first_srcset_candidate)
                .find_map(|c| sanitize(&c))
        })
        .or_else(|| element.attr("src").and_then(sanitize))
}

/// Search one container: lazy images, responsive sets, plain `src`, inline
/// CSS backgrounds, then nested `<picture>` sources.
pub fn image_in_container(container: ElementRef) -> Option<String> {
    let imgs: Vec<ElementRef> = std::iter::once(container)
        .filter(|el| el.value().name() == "img")
        .chain(container.select(&IMG))
        .collect();

    imgs.iter()
        .find_map(|img| {
            LAZY_ATTRIBUTES
                .iter()
                .filter_map(|attr| img.value().attr(attr))
                .find_map(sanitize)
        })
        .or_else(|| {
            imgs.iter().find_map(|img| {
                LAZY_SRCSET_ATTRIBUTES
                    .iter()
                    .chain(std::iter::once(&"srcset"))
                    .filter_map(|attr| img.value().attr(attr))
                    .filter_map(first_srcset_candidate)
                    .find_map(|c| sanitize(&c))
            })
        })
        .or_else(|| imgs.iter().find_map(|img| img.value().attr("src").and_then(sanitize)))
        .or_else(|| {
            std::iter::once(container)
                .chain(container.select(&STYLED))
                .filter_map(|el| el.value().attr("style"))
                .filter_map(background_image_url)
                .find_map(|c| sanitize(&c))
        })
        .or_else(|| {
            container
                .select(&PICTURE_SOURCE)
                .filter_map(|source| source.value().attr("srcset"))
                .filter_map(first_srcset_candidate)
                .find_map(|c| sanitize(&c))
        })
}

/// Search `link` itself, then its ancestors while they still belong to the
/// same card, then the card's siblings up to the neighbouring cards.
///
/// `is_foreign` tells whether a link points at a different article. An
/// ancestor or sibling holding such a link belongs to another card.
pub fn image_near<'a, F>(link: ElementRef<'a>, is_foreign: F) -> Option<String>
where
    F: Fn(ElementRef<'a>) -> bool,
{
    if let Some(found) = image_in_container(link) {
        return Some(found);
    }

    let mut card = link;
    let parents = link
        .ancestors()
        .filter_map(ElementRef::wrap)
        .filter(|el| !matches!(el.value().name(), "body" | "html"))
        .take(MAX_PARENT_DEPTH);
    for parent in parents {
        if links_elsewhere(parent, &is_foreign) {
            break;
        }
        if let Some(found) = image_in_container(parent) {
            return Some(found);
        }
        card = parent;
    }

    let same_card = |el: &ElementRef<'a>| !links_elsewhere(*el, &is_foreign);
    card.prev_siblings()
        .filter_map(ElementRef::wrap)
        .take_while(same_card)
        .find_map(image_in_container)
        .or_else(|| {
            card.next_siblings()
                .filter_map(ElementRef::wrap)
                .take_while(same_card)
                .find_map(image_in_container)
        })
}

fn links_elsewhere<'a, F>(element: ElementRef<'a>, is_foreign: &F) -> bool
where
    F: Fn(ElementRef<'a>) -> bool,
{
    std::iter::once(element)
        .filter(|el| el.value().name() == "a")
        .chain(element.select(&LINK))
        .any(|a| is_foreign(a))
}

/// First usable `<img>` in an HTML fragment such as a feed summary.
pub fn first_image_in_html(html: &str) -> Option<String> {
    if !html.contains("<img") && !html.contains("<IMG") {
        return None;
    }
    let fragment = Html::parse_fragment(html);
    let found = fragment.select(&IMG).find_map(image_from_img);
    found
}

/// Preview image declared in page metadata, in priority order.
pub fn meta_image(document: &Html) -> Option<String> {
    META_IMAGE_KEYS.iter().find_map(|keys| {
        document.select(&META).find_map(|meta| {
            let element = meta.value();
            let key = element.attr("property").or_else(|| element.attr("name"))?;
            if !keys.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                return None;
            }
            element.attr("content").and_then(sanitize)
        })
    })
}
