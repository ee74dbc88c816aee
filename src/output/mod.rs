mod progress;
mod report;
mod styling;
mod tables;

use std::path::Path;

use log::info;

pub use progress::FetchProgress;
pub use report::{
    display_benchmark_results, display_record, json_records, markdown_benchmark_results,
    markdown_fragment,
};
pub use styling::{dim, magenta_bold};
pub use tables::print_clusters;

use crate::error::{CiTriageError, Result};

/// Prints the citriage banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔎 citriage"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CI result triage tool")
    );
}

/// Usage summary shown for unrecognized targets and commands.
pub fn print_usage() {
    eprintln!(
        "Usage:
  citriage rate <pr|commit|benchmark>     health row for recent builds
  citriage walk <pr|commit|benchmark>     cluster recent failures by cause
  citriage url <url>                      direct CI job URL or GitHub PR URL
  citriage pr <jobid>                     report one pull-request CI job
  citriage commit <jobid>                 report one commit CI job
  citriage benchmark <jobid>              report one benchmark CI job

Flags:
  --copy          copy the markdown report to the system clipboard
  --json <path>   write the flattened JSON record list to a file
  --no-cache      disable the on-disk result cache"
    );
}

/// Writes the accumulated markdown report to the system clipboard.
pub fn copy_to_clipboard(markdown: &str) -> Result<()> {
    let mut clipboard =
        arboard::Clipboard::new().map_err(|e| CiTriageError::Clipboard(e.to_string()))?;
    clipboard
        .set_text(markdown.to_string())
        .map_err(|e| CiTriageError::Clipboard(e.to_string()))?;
    info!("Markdown report copied to clipboard");
    Ok(())
}

/// Writes the accumulated JSON record list to a file.
pub fn write_json_file(path: &Path, records: &[serde_json::Value]) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(records)?)?;
    info!("JSON records written to: {}", path.display());
    Ok(())
}
