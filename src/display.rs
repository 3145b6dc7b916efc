//! Colored CLI display utilities for sentinel output.
//!
//! This module provides functions for printing colored, formatted output
//! to the terminal during review cycles and session inspection.

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::knowledge::{KnowledgeEntry, StoreSummary};
use crate::learning::{AcceptanceStats, LearningInsights, ThresholdDelta};
use crate::monitor::{HealthReport, SessionCounters, Trigger, TriggerPriority};
use crate::validate::ValidatedSuggestion;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to a maximum length, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

/// Format a confidence as a percentage.
#[must_use]
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Print one fired trigger.
pub fn print_trigger(trigger: &Trigger) {
    let tag = match trigger.priority {
        TriggerPriority::High => "[TRIGGER]".red().bold().to_string(),
        TriggerPriority::Medium => "[TRIGGER]".yellow().bold().to_string(),
    };
    println!("{} {} - {}", tag, trigger.kind.bold(), trigger.detail.dimmed());
    let _ = io::stdout().flush();
}

/// Print the session health report.
pub fn print_health(report: &HealthReport) {
    let score = match report.score {
        70..=100 => report.score.green().bold().to_string(),
        40..=69 => report.score.yellow().bold().to_string(),
        _ => report.score.red().bold().to_string(),
    };
    println!(
        "{} {} Health {}/100",
        timestamp().dimmed(),
        "[HEALTH]".blue().bold(),
        score
    );
    for pressure in &report.pressures {
        if pressure.value > 0.0 {
            println!(
                "  {} {}",
                format!("{:<12}", pressure.kind).dimmed(),
                pressure_bar(pressure.value)
            );
        }
    }
    for recommendation in &report.recommendations {
        println!("  {} {recommendation}", "->".yellow());
    }
    if report.needs_handoff {
        println!(
            "  {} Session is degraded, run `sentinel handoff`",
            "!!".red().bold()
        );
    }
    let _ = io::stdout().flush();
}

/// Render a pressure value as a ten-slot bar.
#[must_use]
pub fn pressure_bar(value: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = ((value.clamp(0.0, 1.0) * 10.0).round() as usize).min(10);
    format!("{}{}", "#".repeat(filled), "-".repeat(10 - filled))
}

/// Print one validated suggestion with its index.
pub fn print_suggestion(index: usize, suggestion: &ValidatedSuggestion) {
    let confidence = if suggestion.confidence >= 0.7 {
        format_confidence(suggestion.confidence).green().to_string()
    } else {
        format_confidence(suggestion.confidence).yellow().to_string()
    };
    let location = match (&suggestion.suggestion.file, suggestion.suggestion.line) {
        (Some(file), Some(line)) => format!(" ({file}:{line})"),
        (Some(file), None) => format!(" ({file})"),
        _ => String::new(),
    };
    println!(
        "{} [{}] {} {}{}",
        format!("{index:>3}.").bold(),
        suggestion.suggestion.category.cyan(),
        confidence,
        suggestion.suggestion.text,
        location.dimmed()
    );
    if let Some(entry) = &suggestion.contradicted_by {
        println!(
            "     {} conflicts with \"{}\"",
            "!".yellow().bold(),
            truncate(entry, DEFAULT_MAX_LEN)
        );
    }
    if suggestion.near_rejection {
        println!("     {} close to a previously rejected suggestion", "~".dimmed());
    }
    let _ = io::stdout().flush();
}

/// Print the header for a review cycle's suggestions.
pub fn print_review_header(suggestions: usize, degraded: bool) {
    if degraded {
        println!(
            "{} {} Worker unavailable, review ran without suggestions",
            timestamp().dimmed(),
            "[REVIEW]".yellow().bold()
        );
    } else {
        println!(
            "{} {} {} suggestion(s) passed validation",
            timestamp().dimmed(),
            "[REVIEW]".cyan().bold(),
            suggestions
        );
    }
    let _ = io::stdout().flush();
}

/// Print the session counters summary.
pub fn print_status(counters: &SessionCounters) {
    println!(
        "{} {} phase={}",
        timestamp().dimmed(),
        "[SESSION]".blue().bold(),
        counters.phase.to_string().cyan()
    );
    println!("  lines written   {}", counters.lines_written);
    println!("  files edited    {}", counters.edits.len());
    println!("  distinct errors {}", counters.errors.len());
    println!("  corrections     {}", counters.corrections.len());
    println!(
        "  context usage   {:.0}%",
        counters.context_usage * 100.0
    );
    let _ = io::stdout().flush();
}

/// Print one proposed or applied threshold move.
pub fn print_delta(delta: &ThresholdDelta, applied: bool) {
    let tag = if applied {
        "[TUNE]".magenta().bold().to_string()
    } else {
        "[TUNE?]".magenta().to_string()
    };
    let direction = if delta.is_raise() {
        "raise".yellow().to_string()
    } else {
        "lower".green().to_string()
    };
    println!(
        "{tag} {} {direction} {} -> {} ({} acceptance {})",
        delta.kind.bold(),
        delta.current,
        delta.proposed,
        delta.category.cyan(),
        format_confidence(delta.rate).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print per-category acceptance stats.
pub fn print_stats(stats: &AcceptanceStats) {
    println!(
        "{} {} overall acceptance {}",
        timestamp().dimmed(),
        "[LEARN]".magenta().bold(),
        format_confidence(stats.overall.rate)
    );
    for (category, entry) in &stats.by_category {
        println!(
            "  {} {} ({} accepted / {} rejected)",
            format!("{category:<16}").cyan(),
            format_confidence(entry.rate),
            entry.accepted,
            entry.rejected
        );
    }
    let _ = io::stdout().flush();
}

/// Print rejection analysis.
pub fn print_insights(insights: &LearningInsights) {
    if insights.reason_counts.is_empty() {
        println!("{} no rejections recorded yet", "[LEARN]".magenta().bold());
        let _ = io::stdout().flush();
        return;
    }
    println!("{} top rejection reasons:", "[LEARN]".magenta().bold());
    for (reason, count) in insights.reason_counts.iter().take(5) {
        println!("  {count:>3}x {}", truncate(reason, DEFAULT_MAX_LEN));
    }
    for anti in &insights.anti_patterns {
        println!(
            "  {} {} rejected {:.0}% of the time ({} rejections)",
            "!!".red().bold(),
            anti.category.cyan(),
            anti.share * 100.0,
            anti.count
        );
    }
    let _ = io::stdout().flush();
}

/// Print the knowledge store summary.
pub fn print_store_summary(summary: &StoreSummary) {
    println!(
        "{} {} {} entries",
        timestamp().dimmed(),
        "[KNOWLEDGE]".blue().bold(),
        summary.total
    );
    for (category, count) in &summary.by_category {
        println!("  {} {count}", format!("{category:<12}").cyan());
    }
    if !summary.most_used.is_empty() {
        println!("  most used:");
        for (title, uses) in &summary.most_used {
            println!("    {uses:>3}x {}", truncate(title, DEFAULT_MAX_LEN));
        }
    }
    let _ = io::stdout().flush();
}

/// Print one knowledge entry with its relevance score.
pub fn print_scored_entry(score: f64, entry: &KnowledgeEntry) {
    println!(
        "{} [{}] {} {}",
        format!("{score:.2}").dimmed(),
        entry.category.to_string().cyan(),
        entry.priority.to_string().yellow(),
        entry.title.bold()
    );
    println!("     {}", truncate(&entry.content, 120).dimmed());
    let _ = io::stdout().flush();
}

/// Print where the handoff note landed.
pub fn print_handoff_written(path: &Path) {
    println!(
        "{} {} Handoff note written to {}",
        timestamp().dimmed(),
        "[HANDOFF]".blue().bold(),
        path.display().to_string().cyan()
    );
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stdout().flush();
}
