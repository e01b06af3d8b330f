use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid space regex"));

/// Decode HTML entities, handling one level of double encoding.
pub fn clean_html_entities(text: &str) -> String {
    let mut cleaned = text.to_string();
    for _ in 0..2 {
        let decoded = html_escape::decode_html_entities(&cleaned).into_owned();
        if decoded == cleaned {
            break;
        }
        cleaned = decoded;
    }
    cleaned
}

/// Plain text from an HTML-ish snippet: tags stripped, entities decoded,
/// whitespace collapsed.
pub fn clean_text(text: &str) -> String {
    let stripped = TAG_RE.replace_all(text, " ");
    let decoded = clean_html_entities(&stripped);
    SPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}

/// Truncate to at most `max_chars` characters, appending "..." when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((idx, _)) => {
            let mut out = text[..idx].trim_end().to_string();
            out.push_str("...");
            out
        }
    }
}

/// Lowercased host of `url`, without a leading `www.`.
pub fn url_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// Whether the host of `url` equals one of `domains` or is a subdomain of one.
pub fn host_matches(url: &str, domains: &[String]) -> bool {
    let Some(host) = url_host(url) else {
        return false;
    };
    domains.iter().any(|d| {
        let d = d.trim().trim_start_matches("www.").to_lowercase();
        !d.is_empty() && (host == d || host.ends_with(&format!(".{d}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(
            clean_text("<span class=\"searchmatch\">Rust</span>  &amp;amp; <b>Cargo</b>\n"),
            "Rust & Cargo"
        );
        assert_eq!(clean_text("Tom&#39;s"), "Tom's");
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語...");
    }

    #[test]
    fn test_host_matching() {
        let domains = vec!["arxiv.org".to_string()];
        assert!(host_matches("https://arxiv.org/abs/1706.03762", &domains));
        assert!(host_matches("https://export.arxiv.org/x", &domains));
        assert!(host_matches("https://www.arxiv.org/x", &domains));
        assert!(!host_matches("https://notarxiv.org/x", &domains));
        assert!(!host_matches("not a url", &domains));
    }
}
