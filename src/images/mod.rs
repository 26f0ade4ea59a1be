//! Preview-image handling shared by every adapter and the aggregator.
//!
//! [`validate`] and [`normalize`] are pure; [`extract`] pulls candidates out
//! of HTML; [`ImageResolver`] performs the last-resort page fetch.

pub mod extract;
pub mod resolver;

pub use resolver::ImageResolver;

use std::net::IpAddr;

use url::{Host, Url};

/// Anything shorter cannot be a usable absolute image URL.
const MIN_URL_LEN: usize = 10;

/// Document, archive, video and audio extensions that are never previews.
const NON_IMAGE_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "rtf", "csv", "zip", "rar",
    "7z", "gz", "tar", "exe", "dmg", "mp4", "m4v", "avi", "mov", "mkv", "webm", "wmv", "flv",
    "mp3", "wav", "ogg", "oga", "flac", "m4a", "aac",
];

const BLOCKED_HOSTS: &[&str] = &["localhost", "test", "invalid"];

const BLOCKED_HOST_SUFFIXES: &[&str] = &[".localhost", ".local", ".test", ".invalid", ".internal"];

/// Rewrite protocol-relative URLs (`//host/path`) to https. Everything else
/// is returned trimmed but otherwise untouched.
pub fn normalize(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

/// Whether `url` is acceptable as an article preview image.
///
/// Protocol-relative input is judged after [`normalize`].
pub fn validate(url: &str) -> bool {
    let url = normalize(url);
    if url.len() < MIN_URL_LEN {
        return false;
    }

    let parsed = match Url::parse(&url) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    let host_ok = match parsed.host() {
        Some(Host::Domain(domain)) => is_public_domain(domain),
        Some(Host::Ipv4(ip)) => is_public_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_public_ip(IpAddr::V6(ip)),
        None => false,
    };
    if !host_ok {
        return false;
    }

    !has_non_image_extension(&parsed)
}

/// Normalize then validate; the accepted form is returned.
pub fn sanitize(candidate: &str) -> Option<String> {
    let normalized = normalize(candidate);
    if validate(&normalized) {
        Some(normalized)
    } else {
        None
    }
}

fn is_public_domain(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_lowercase();
    if BLOCKED_HOSTS.contains(&domain.as_str()) {
        return false;
    }
    !BLOCKED_HOST_SUFFIXES
        .iter()
        .any(|suffix| domain.ends_with(suffix))
}

fn is_public_ip(ip: IpAddr) -> bool {
    !(ip.is_loopback() || ip.is_unspecified())
}

fn has_non_image_extension(url: &Url) -> bool {
    let last_segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    match last_segment.rsplit_once('.') {
        Some((_, ext)) => NON_IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_common_images() {
        assert!(validate("https://example.com/image.jpg"));
        assert!(validate("https://example.com/image.png"));
        assert!(validate("http://example.com/image.gif"));
        assert!(validate("//example.com/image.webp"));
        assert!(validate("https://cdn.example.com/resize?w=800&id=42"));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(!validate(""));
        assert!(!validate("not-a-url"));
        assert!(!validate("abc"));
        assert!(!validate("ftp://example.com/image.jpg"));
        assert!(!validate("data:image/png;base64,AAAA"));
    }

    #[test]
    fn test_validate_rejects_non_image_extensions() {
        assert!(!validate("https://example.com/document.pdf"));
        assert!(!validate("https://example.com/clip.MP4"));
        assert!(!validate("https://example.com/podcast.mp3"));
        assert!(!validate("https://example.com/sheet.xlsx"));
    }

    #[test]
    fn test_validate_rejects_local_hosts() {
        assert!(!validate("https://localhost/image.jpg"));
        assert!(!validate("http://127.0.0.1/image.jpg"));
        assert!(!validate("http://[::1]/image.jpg"));
        assert!(!validate("http://0.0.0.0/image.jpg"));
        assert!(!validate("https://media.test/image.jpg"));
        assert!(!validate("https://printer.local/image.jpg"));
    }

    #[test]
    fn test_normalize_protocol_relative() {
        assert_eq!(normalize("//cdn.site.com/a.jpg"), "https://cdn.site.com/a.jpg");
        assert_eq!(normalize("http://site.com/a.jpg"), "http://site.com/a.jpg");
        assert_eq!(normalize("  https://site.com/a.jpg "), "https://site.com/a.jpg");
    }

    #[test]
    fn test_sanitize_returns_normalized_form() {
        assert_eq!(
            sanitize("//cdn.site.com/a.jpg").as_deref(),
            Some("https://cdn.site.com/a.jpg")
        );
        assert!(sanitize("https://site.com/file.pdf").is_none());
    }
}
