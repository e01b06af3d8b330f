//! Pretty formatter for terminal output.
//!
//! Search results render as numbered cards: bold title, link, a short snippet
//! and dimmed metadata. Routing details go last, where the eye settles.

use super::StatusReport;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use delve_core::{
    CircuitState, ClassificationRule, ClassificationSource, QueryClassification, Source,
    UnifiedSearchResult,
};
use owo_colors::OwoColorize;

/// Terminal width for formatting (default fallback)
const DEFAULT_WIDTH: usize = 80;

/// Indent for card content (after number)
const CARD_INDENT: usize = 6;

/// Snippet lines shown per card
const SNIPPET_LINES: usize = 2;

pub fn search_result(result: &UnifiedSearchResult) -> String {
    let width = terminal_width();
    let mut output = String::new();

    if let Some(answer) = &result.pre_computed_answer {
        output.push_str(&format!("{} {}\n\n", "Answer:".green().bold(), answer.bold()));
    }

    output.push_str(&section_header(
        &result.backend_used,
        Some(result.result_count),
        width,
    ));
    output.push('\n');
    if result.sources.is_empty() {
        output.push_str(&format!("  {}\n", "No results".yellow()));
    }
    for (i, source) in result.sources.iter().enumerate() {
        output.push_str(&card(source, i + 1, width));
        if i + 1 < result.sources.len() {
            output.push('\n');
        }
    }

    output.push('\n');
    output.push_str(&routing_footer(result));
    output
}

pub fn multi_results(query: &str, results: &[UnifiedSearchResult]) -> String {
    let width = terminal_width();
    let mut output = format!("{} {}\n\n", "Query:".dimmed(), query.bold());
    for result in results {
        output.push_str(&section_header(
            &result.backend_used,
            Some(result.result_count),
            width,
        ));
        output.push('\n');
        for (i, source) in result.sources.iter().enumerate() {
            output.push_str(&card(source, i + 1, width));
        }
        output.push('\n');
    }
    output
}

pub fn classification(query: &str, c: &QueryClassification, chain: &[String]) -> String {
    let mut output = String::new();
    output.push_str(&format!("{:>12} {}\n", "Query:".dimmed(), query.bold()));
    output.push_str(&format!("{:>12} {}\n", "Backend:".dimmed(), c.backend.green().bold()));
    output.push_str(&format!(
        "{:>12} {}\n",
        "Confidence:".dimmed(),
        confidence(c.confidence)
    ));
    output.push_str(&format!("{:>12} {}\n", "Mode:".dimmed(), c.mode));
    output.push_str(&format!("{:>12} {}\n", "Source:".dimmed(), source_label(c.source)));
    if let Some(rule) = &c.rule_id {
        output.push_str(&format!("{:>12} {}\n", "Rule:".dimmed(), rule));
    }
    if let Some(domain) = &c.domain_hint {
        output.push_str(&format!("{:>12} {}\n", "Domain:".dimmed(), domain));
    }
    output.push_str(&format!("{:>12} {}\n", "Reason:".dimmed(), c.reason));
    if !chain.is_empty() {
        output.push_str(&format!(
            "{:>12} {}\n",
            "Fallbacks:".dimmed(),
            chain.join(" → ").cyan()
        ));
    }
    output
}

pub fn status(report: &StatusReport) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(terminal_width() as u16)
        .set_header(vec!["Backend", "Category", "Available", "Circuit", "Falls back to"]);

    for b in &report.backends {
        let available = if b.available { "yes" } else { "no" };
        let circuit = match b.circuit {
            Some(CircuitState::Closed) | None => "closed",
            Some(CircuitState::Open) => "open",
            Some(CircuitState::HalfOpen) => "half-open",
        };
        table.add_row(vec![
            b.id.clone(),
            b.category.to_string(),
            available.to_string(),
            circuit.to_string(),
            b.fallbacks.join(", "),
        ]);
    }

    let available = report.backends.iter().filter(|b| b.available).count();
    let stats = &report.cache;
    format!(
        "{}\n\n{}\n\n  {} of {} backends available\n  {} {} / {} entries, {} hits, {} stale, {} misses\n",
        "Search Backends".bold().cyan(),
        table,
        available.to_string().green().bold(),
        report.backends.len(),
        "Cache:".dimmed(),
        stats.size,
        stats.capacity,
        stats.hits,
        stats.stale_hits,
        stats.misses
    )
}

pub fn rules(rules: &[ClassificationRule]) -> String {
    let width = terminal_width();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(width as u16)
        .set_header(vec!["Priority", "Rule", "Backend", "Confidence", "Matches on"]);

    for rule in rules {
        let mut terms: Vec<&str> = rule.keywords.iter().map(String::as_str).collect();
        terms.extend(rule.all_keywords.iter().map(String::as_str));
        let mut matches = truncate(&terms.join(", "), width.saturating_sub(50).max(20));
        if !rule.patterns.is_empty() {
            matches.push_str(&format!(" (+{} patterns)", rule.patterns.len()));
        }
        table.add_row(vec![
            rule.priority.to_string(),
            rule.id.clone(),
            rule.backend.clone(),
            format!("{:.2}", rule.confidence),
            matches,
        ]);
    }

    format!(
        "{}\n\n{}\n\n{} First match in this order wins; unmatched queries go to the default backend.\n",
        "Classification Rules".bold().cyan(),
        table,
        "Tip:".green().bold()
    )
}

fn card(source: &Source, index: usize, width: usize) -> String {
    let mut output = String::new();
    let indent = " ".repeat(CARD_INDENT);
    let content_width = width.saturating_sub(CARD_INDENT + 2);

    output.push_str(&format!(
        "{}{}\n",
        format!(" {:>3}. ", index).cyan().bold(),
        truncate(&source.title, content_width).bold()
    ));
    output.push_str(&format!(
        "{}{}\n",
        indent,
        hyperlink(&source.url, &truncate(&source.url, content_width)).blue()
    ));

    let snippet = source.summary.as_deref().unwrap_or(&source.content);
    for line in wrap(snippet, content_width).into_iter().take(SNIPPET_LINES) {
        output.push_str(&format!("{}{}\n", indent, line));
    }
    output.push_str(&format!(
        "{}{}\n",
        indent,
        format!("score {:.2}", source.quality_score).dimmed()
    ));
    output
}

fn routing_footer(result: &UnifiedSearchResult) -> String {
    let c = &result.classification;
    let mut meta = vec![
        format!("via {}", result.backend_used),
        format!("{} ms", result.duration_ms),
        format!("{} available", result.total_available),
    ];
    if result.cached {
        meta.push("cached".to_string());
    }
    let mut output = format!(
        "{} {} {} {}\n",
        "Routed to".dimmed(),
        c.backend.cyan(),
        format!("({}, {})", confidence(c.confidence), source_label(c.source)).dimmed(),
        format!("[{}]", meta.join(" · ")).dimmed()
    );
    if !result.fallback_history.is_empty() {
        let steps: Vec<String> = result
            .fallback_history
            .iter()
            .map(ToString::to_string)
            .collect();
        output.push_str(&format!("{} {}\n", "Fallback:".yellow(), steps.join("; ")));
    }
    output
}

fn section_header(label: &str, count: Option<usize>, width: usize) -> String {
    let count_str = match count {
        Some(n) => format!(" ({} results)", n),
        None => String::new(),
    };

    let header_text = format!("{}{}", label, count_str);
    let line_len = (width.saturating_sub(header_text.len() + 4)).min(60);
    let line = "─".repeat(line_len);

    format!(
        "{} {} {}",
        "──".cyan(),
        header_text.green().bold(),
        line.cyan()
    )
}

fn confidence(value: f32) -> String {
    format!("{:.0}%", value * 100.0)
}

fn source_label(source: ClassificationSource) -> &'static str {
    match source {
        ClassificationSource::Pattern => "rule match",
        ClassificationSource::Model => "model",
        ClassificationSource::Default => "default",
        ClassificationSource::Forced => "requested",
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or(s);
    if first_line.chars().count() <= max_len {
        first_line.to_string()
    } else {
        let truncated: String = first_line.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Greedy word wrap on char counts.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(20);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn terminal_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(DEFAULT_WIDTH)
}

/// OSC 8 hyperlink, rendered as plain text by terminals without support.
fn hyperlink(url: &str, display_text: &str) -> String {
    format!("\x1b]8;;{}\x07{}\x1b]8;;\x07", url, display_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
        assert_eq!(truncate("first\nsecond", 20), "first");
    }

    #[test]
    fn test_wrap() {
        let lines = wrap("the quick brown fox jumps over the lazy dog again and again", 20);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog again and again");
        assert!(wrap("   ", 20).is_empty());
    }

    #[test]
    fn test_card_shows_summary_over_content() {
        let source = Source::new("https://example.org/a", "Title")
            .with_content("long content")
            .with_summary("tl;dr");
        let rendered = card(&source, 1, 80);
        assert!(rendered.contains("tl;dr"));
        assert!(!rendered.contains("long content"));
    }
}
