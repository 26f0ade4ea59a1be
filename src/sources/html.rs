use scraper::Html;

/// Extract plain text from HTML content, preserving word boundaries
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_fragment(html);
    let mut text = String::new();

    for node in document.root_element().descendants() {
        if let Some(text_node) = node.value().as_text() {
            text.push_str(text_node);
        }
        // Add space after block elements to preserve word boundaries
        if let Some(element) = node.value().as_element() {
            match element.name() {
                "p" | "br" | "div" | "li" | "h1" | "h2" | "h3" => text.push(' '),
                _ => {}
            }
        }
    }

    collapse_whitespace(&text)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate at a word boundary, appending an ellipsis when anything was cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut = text
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let head = &text[..cut];

    match head.rfind(' ') {
        Some(pos) if pos > 0 => format!("{}...", head[..pos].trim_end()),
        _ => format!("{}...", head),
    }
}

/// Plain-text summary from an HTML snippet, or `None` if nothing is left.
pub fn summary_from_html(html: &str, max_chars: usize) -> Option<String> {
    let text = html_to_text(html);
    if text.is_empty() {
        None
    } else {
        Some(truncate_text(&text, max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_simple() {
        assert_eq!(html_to_text("<p>Hello world</p>"), "Hello world");
    }

    #[test]
    fn test_html_to_text_with_links() {
        let html = r#"<p>Check out <a href="https://example.com">this link</a>!</p>"#;
        assert_eq!(html_to_text(html), "Check out this link!");
    }

    #[test]
    fn test_html_to_text_multiple_paragraphs() {
        let html = "<p>First paragraph</p><p>Second paragraph</p>";
        assert_eq!(html_to_text(html), "First paragraph Second paragraph");
    }

    #[test]
    fn test_html_to_text_drops_images() {
        let html = r#"<p>Article text <img src="https://example.com/a.jpg" alt="x"> more text</p>"#;
        assert_eq!(html_to_text(html), "Article text more text");
    }

    #[test]
    fn test_html_to_text_empty() {
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_text("Short text", 50), "Short text");
        assert_eq!(truncate_text("Exactly twenty chars", 20), "Exactly twenty chars");
    }

    #[test]
    fn test_truncate_at_word_boundary() {
        let text = "This is a very long text that should be truncated at a word boundary";
        assert_eq!(truncate_text(text, 30), "This is a very long text that...");
    }

    #[test]
    fn test_truncate_without_spaces() {
        assert_eq!(truncate_text("Verylongwordwithoutspaces", 10), "Verylongwo...");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "Überraschung für München und Köln";
        let truncated = truncate_text(text, 14);
        assert_eq!(truncated, "Überraschung...");
    }

    #[test]
    fn test_summary_from_html() {
        assert_eq!(summary_from_html("<p>  </p>", 100), None);
        assert_eq!(
            summary_from_html("<div>News <b>today</b></div>", 100).as_deref(),
            Some("News today")
        );
    }
}
