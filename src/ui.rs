//! Terminal front end: the interactive decision source for the review
//! loop plus the presentation helpers used by the CLI commands.
//!
//! All human interaction goes through the [`DecisionSource`] trait, so
//! this module is the only place that knows about prompts and styling.

use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Editor, Select};

use crate::error::Error;
use crate::models::{ContentHistory, ReviewReport, SearchHit, StoredRecord};
use crate::review_loop::{Decision, DecisionSource, LoopEvent};

const ACTIONS: [&str; 5] = ["approve", "edit", "regenerate", "review", "cancel"];

pub struct TerminalPrompt {
    preview_chars: usize,
}

impl TerminalPrompt {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }
}

fn prompt_err(e: dialoguer::Error) -> Error {
    Error::Prompt(e.to_string())
}

impl DecisionSource for TerminalPrompt {
    fn decide(&mut self, iteration: u32, max_iterations: u32) -> Result<Decision, Error> {
        let idx = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Iteration {}/{} — what would you like to do?",
                iteration, max_iterations
            ))
            .items(&ACTIONS)
            .default(3)
            .interact()
            .map_err(prompt_err)?;

        Ok(match idx {
            0 => Decision::Approve,
            1 => Decision::Edit,
            2 => Decision::Regenerate,
            3 => Decision::Review,
            _ => Decision::Cancel,
        })
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool, Error> {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(prompt_err)
    }

    fn edit_body(&mut self, current: &str) -> Result<String, Error> {
        // Closing the editor without saving means "no changes".
        match Editor::new().edit(current).map_err(prompt_err)? {
            Some(edited) => Ok(edited),
            None => Ok(String::new()),
        }
    }

    fn notify(&mut self, event: LoopEvent<'_>) {
        match event {
            LoopEvent::Draft {
                body,
                iteration,
                max_iterations,
            } => {
                println!();
                println!(
                    "{}",
                    style(format!(
                        "--- Current draft (iteration {}/{}) ---",
                        iteration, max_iterations
                    ))
                    .bold()
                    .blue()
                );
                println!("{}", preview(body, self.preview_chars));
            }
            LoopEvent::Review(report) => print_review(report),
            LoopEvent::Warning(msg) => println!("{}", style(msg).yellow()),
            LoopEvent::Info(msg) => println!("{}", style(msg).dim()),
        }
    }
}

/// Truncate to `max_chars` characters, marking the cut.
fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

pub fn print_review(report: &ReviewReport) {
    println!();
    println!("{}", style("--- Review ---").bold().yellow());
    println!("  overall:    {}/10", report.overall_score);
    println!("  grammar:    {}/10", report.grammar_score);
    println!("  style:      {}/10", report.style_score);
    println!("  engagement: {}/10", report.engagement_score);
    if !report.summary.is_empty() {
        println!("  summary:    {}", report.summary);
    }
    if report.is_fallback() {
        println!(
            "  {}",
            style("(substituted report — provider output was unusable)").yellow()
        );
    }
    if !report.strengths.is_empty() {
        println!("  strengths:");
        for s in &report.strengths {
            println!("    + {}", s);
        }
    }
    if !report.weaknesses.is_empty() {
        println!("  weaknesses:");
        for w in &report.weaknesses {
            println!("    - {}", w);
        }
    }
    if !report.suggestions.is_empty() {
        println!("  suggestions:");
        for s in &report.suggestions {
            println!("    * {}", s);
        }
    }
    println!();
}

pub fn print_search_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        let title = hit
            .record
            .metadata_str("title")
            .unwrap_or("(untitled)")
            .to_string();
        println!("{}. [{:.2}] {}", i + 1, hit.score, title);
        println!("    created: {}", hit.record.created_at_iso());
        println!("    excerpt: \"{}\"", hit.snippet);
        println!("    id: {}", hit.record.id);
        println!();
    }
}

pub fn print_record(record: &StoredRecord) {
    println!("--- Record ---");
    println!("id:         {}", record.id);
    println!("partition:  {}", record.partition);
    println!("created_at: {}", record.created_at_iso());
    println!("metadata:   {}", record.metadata);
    println!();
    println!("--- Body ---");
    println!("{}", record.body);
}

pub fn print_history(history: &ContentHistory, preview_chars: usize) {
    let original = &history.original;
    println!("{}", style("--- Original ---").bold().blue());
    println!("id:      {}", original.id);
    if let Some(title) = original.metadata_str("title") {
        println!("title:   {}", title);
    }
    if let Some(url) = original.metadata_str("url") {
        println!("url:     {}", url);
    }
    println!("created: {}", original.created_at_iso());
    println!("{}", preview(&original.body, preview_chars));
    println!();

    println!(
        "{}",
        style(format!("--- Drafts ({}) ---", history.drafts.len())).bold().green()
    );
    for draft in &history.drafts {
        println!(
            "[v{}] {}  style={} tone={}  {}",
            draft.metadata_i64("version").unwrap_or(0),
            draft.id,
            draft.metadata_str("style").unwrap_or("-"),
            draft.metadata_str("tone").unwrap_or("-"),
            draft.created_at_iso(),
        );
        println!("{}", preview(&draft.body, preview_chars.min(200)));
        println!();
    }

    println!(
        "{}",
        style(format!("--- Reviews ({}) ---", history.reviews.len())).bold().yellow()
    );
    for review in &history.reviews {
        println!(
            "[score {}] {}  {}",
            review.metadata_i64("overall_score").unwrap_or(0),
            review.id,
            review.created_at_iso(),
        );
        println!("{}", review.body);
        println!();
    }

    match &history.final_version {
        Some(final_version) => {
            println!("{}", style("--- Final version ---").bold().red());
            println!(
                "id: {}  status: {}  {}",
                final_version.id,
                final_version.metadata_str("status").unwrap_or("-"),
                final_version.created_at_iso(),
            );
            println!("{}", preview(&final_version.body, preview_chars));
        }
        None => println!("{}", style("--- No final version yet ---").dim()),
    }
}
