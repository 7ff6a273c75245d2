//! Text and JSON rendering of a link view.

use std::fmt::Write;

use clap::ValueEnum;
use serde::Serialize;

use link_grabber::{Bucket, ClassifiedLink, CollectionResult, FinalizeReason, LinkView};

/// Output format for collected links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Grouped columns with badges.
    #[default]
    Pretty,
    /// One JSON document with every bucket.
    Json,
    /// One href per line.
    Plain,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    tab_id: u64,
    source_url: &'a str,
    reason: FinalizeReason,
    frames_expected: usize,
    frames_received: usize,
    collected_at: String,
    total: usize,
    visible: usize,
    layout: Vec<Bucket>,
    anchors: &'a [ClassifiedLink],
    images: &'a [ClassifiedLink],
    scripts: &'a [ClassifiedLink],
}

/// Render a view of `result` in the requested format.
pub fn render(
    result: &CollectionResult,
    view: &LinkView,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Pretty => Ok(render_pretty(result, view)),
        OutputFormat::Plain => Ok(render_plain(view)),
        OutputFormat::Json => {
            let report = JsonReport {
                tab_id: result.tab_id,
                source_url: &result.source_url,
                reason: result.reason,
                frames_expected: result.frames_expected,
                frames_received: result.frames_received,
                collected_at: result.collected_at.to_rfc3339(),
                total: view.total,
                visible: view.visible(),
                layout: view.layout(),
                anchors: &view.anchors,
                images: &view.images,
                scripts: &view.scripts,
            };
            Ok(serde_json::to_string_pretty(&report)?)
        }
    }
}

fn render_plain(view: &LinkView) -> String {
    view.hrefs().iter().fold(String::new(), |mut out, href| {
        out.push_str(href);
        out.push('\n');
        out
    })
}

fn reason_label(reason: FinalizeReason) -> &'static str {
    match reason {
        FinalizeReason::Complete => "complete",
        FinalizeReason::Deadline => "deadline reached",
        FinalizeReason::Requested => "finalized early",
    }
}

fn render_pretty(result: &CollectionResult, view: &LinkView) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Links from {} ({}/{} frames, {})",
        result.source_url,
        result.frames_received,
        result.frames_expected,
        reason_label(result.reason)
    );

    if view.total == 0 {
        out.push_str("No links found on this page.\n");
        return out;
    }
    let _ = writeln!(out, "Showing {} / {}", view.visible(), view.total);
    if view.is_empty() {
        out.push_str("No links match the current filters.\n");
        return out;
    }

    for bucket in view.layout() {
        let links = view.bucket(bucket);
        let _ = writeln!(out, "\n{} ({})", bucket.title(), links.len());
        for link in links {
            let _ = writeln!(out, "  {}", link_line(link));
        }
    }
    out
}

fn link_line(link: &ClassifiedLink) -> String {
    let mut line = link.link.href.clone();
    let mut markers: Vec<&str> = link.badges.iter().map(|b| b.label()).collect();
    if link.is_blocked {
        markers.push("blocked");
    }
    if link.is_duplicate {
        markers.push("duplicate");
    }
    for marker in markers {
        let _ = write!(line, " [{marker}]");
    }
    let text = link.link.text.trim();
    if !text.is_empty() && text != link.link.href {
        let _ = write!(line, "  \"{}\"", truncate(text, 60));
    }
    line
}

fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(max_chars).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  a\n  b ", 10), "a b");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}
