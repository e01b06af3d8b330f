//! Source clean-up and per-request shaping.

use super::types::SearchOptions;
use crate::providers::{ProviderResults, Source};
use crate::utils::{clean_text, host_matches, truncate_chars};
use std::collections::HashSet;

/// Longest `content` kept per source, in characters.
pub const CONTENT_LIMIT: usize = 500;

/// Request-independent clean-up, applied before results are cached.
pub fn normalize(results: ProviderResults) -> ProviderResults {
    let mut seen = HashSet::new();
    let sources = results
        .sources
        .into_iter()
        .filter_map(|s| {
            let url = s.url.trim().to_string();
            let mut title = clean_text(&s.title);
            if url.is_empty() || !seen.insert(url.clone()) {
                return None;
            }
            if title.is_empty() {
                title = url.clone();
            }
            let quality_score = if s.quality_score.is_finite() {
                s.quality_score.clamp(0.0, 1.0)
            } else {
                0.0
            };
            Some(Source {
                url,
                title,
                content: truncate_chars(&clean_text(&s.content), CONTENT_LIMIT),
                quality_score,
                summary: s.summary.map(|t| clean_text(&t)).filter(|t| !t.is_empty()),
            })
        })
        .collect();
    ProviderResults {
        sources,
        total: results.total,
        answer: results
            .answer
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty()),
    }
}

/// Domain filters, display ordering and the result cap.
pub fn shape(mut sources: Vec<Source>, options: &SearchOptions) -> Vec<Source> {
    if !options.include_domains.is_empty() {
        sources.retain(|s| host_matches(&s.url, &options.include_domains));
    }
    if !options.exclude_domains.is_empty() {
        sources.retain(|s| !host_matches(&s.url, &options.exclude_domains));
    }
    // Stable: equal scores keep backend order
    sources.sort_by(|a, b| b.quality_score.total_cmp(&a.quality_score));
    sources.truncate(options.limit());
    sources
}
