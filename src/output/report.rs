use serde_json::json;

use crate::clustering::source_label;
use crate::models::{BuildRecord, FailureEntry, Outcome};

use super::styling::{bright, bright_green, bright_red, bright_yellow, cyan, dim};

/// Prints one build's report to the operator's terminal.
pub fn display_record(record: &BuildRecord, job_url: &str) {
    println!(
        "{} {}  {}",
        bright(record.kind),
        bright_yellow(format!("#{}", record.job_id)),
        dim(job_url)
    );
    println!("  {} {}", dim("Result:"), styled_outcome(record.outcome));

    for failure in &record.failures {
        println!("  {}", bright_red(highlight(failure)));
        println!(
            "    {} {}   {} {}",
            dim("source:"),
            cyan(source_label(&failure.source)),
            dim("machine:"),
            failure.built_on
        );
    }
    println!();
}

pub fn display_benchmark_results(significant: &[String]) {
    if significant.is_empty() {
        return;
    }
    println!("  {}", bright("Significant benchmark results"));
    for line in significant {
        println!("    {line}");
    }
    println!();
}

/// Markdown fragment for one build, appended to the clipboard report.
pub fn markdown_fragment(record: &BuildRecord, job_url: &str) -> String {
    let mut md = format!("## [{} #{}]({})\n\n", record.kind, record.job_id, job_url);
    md.push_str(&format!("Result: **{}**\n\n", record.outcome));

    for failure in &record.failures {
        md.push_str(&format!(
            "- `{}`\n  - source: {}, machine: {}, run: {}\n",
            highlight(failure),
            source_label(&failure.source),
            failure.built_on,
            failure.upstream
        ));
    }
    md.push('\n');
    md
}

pub fn markdown_benchmark_results(significant: &[String]) -> String {
    if significant.is_empty() {
        return String::new();
    }
    format!(
        "### Significant benchmark results\n\n```\n{}\n```\n\n",
        significant.join("\n")
    )
}

/// Flattened JSON records for one build: one per failure entry, or one
/// outcome summary when the build had none.
pub fn json_records(record: &BuildRecord, job_url: &str) -> Vec<serde_json::Value> {
    if record.failures.is_empty() {
        return vec![json!({
            "type": record.kind,
            "job_id": record.job_id,
            "outcome": record.outcome,
            "url": job_url,
        })];
    }

    record
        .failures
        .iter()
        .map(|failure| {
            json!({
                "type": failure.kind,
                "job_id": record.job_id,
                "outcome": record.outcome,
                "url": job_url,
                "reason": failure.reason,
                "highlight_line": failure.highlight_line,
                "source": failure.source,
                "upstream": failure.upstream,
                "built_on": failure.built_on,
            })
        })
        .collect()
}

fn highlight(failure: &FailureEntry) -> &str {
    failure
        .reason
        .lines()
        .nth(failure.highlight_line)
        .unwrap_or("")
}

fn styled_outcome(outcome: Outcome) -> console::StyledObject<String> {
    match outcome {
        Outcome::Success => bright_green(outcome),
        Outcome::Pending | Outcome::Unstable => bright_yellow(outcome),
        Outcome::Aborted => dim(outcome),
        Outcome::Failed => bright_red(outcome),
    }
}
