use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{CiTriageError, Result};
use crate::models::{FailureEntry, JobKind};

const AGENT_PLACEHOLDER: &str = "JNLP4-connect connection from <agent>";
const CHECKOUT_PLACEHOLDER: &str = "FATAL: Could not checkout <commit>";

// TAP numbering differs per run and carries no root-cause signal.
fn tap_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^not ok \d+ ").unwrap())
}

// Agent identities embedded in connection errors differ per run and would
// split identical failures into separate clusters.
fn agent_noise() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"JNLP4-connect connection from '[^']*'").unwrap())
}

// Checkout failures differ only by the commit hash being fetched.
fn checkout_noise() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"FATAL: Could not checkout [0-9a-f]+").unwrap())
}

fn pr_reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/pull/(\d+)").unwrap())
}

/// Derives the deduplication key for a failure entry from its highlighted
/// reason line, with per-run noise collapsed into fixed placeholders.
///
/// The placeholders are chosen so that none of the rules re-match them;
/// normalization is idempotent.
///
/// # Errors
///
/// Returns `MalformedEntry` when `highlight_line` does not index a valid
/// line of `reason`. That is a contract violation on the fetcher that built
/// the entry, not a condition to absorb.
pub fn reason_key(entry: &FailureEntry) -> Result<String> {
    let line = entry
        .reason
        .lines()
        .nth(entry.highlight_line)
        .ok_or_else(|| {
            CiTriageError::MalformedEntry(format!(
                "highlight line {} out of range for failure from {}",
                entry.highlight_line, entry.upstream
            ))
        })?;

    let line = tap_prefix().replace(line, "");
    let line = agent_noise().replace_all(&line, AGENT_PLACEHOLDER);
    let line = checkout_noise().replace_all(&line, CHECKOUT_PLACEHOLDER);
    Ok(line.into_owned())
}

/// Parses the numeric job id embedded in an upstream CI run URL.
///
/// Job ids are monotonically increasing, so they double as the
/// chronological ordering key.
pub fn upstream_job_id(upstream: &str) -> Option<u64> {
    upstream
        .rsplit('/')
        .filter(|segment| !segment.is_empty())
        .find_map(|segment| segment.parse().ok())
}

/// Renders a source identifier for display: `#<id>` when the source is a
/// resolvable PR reference, the raw string otherwise.
pub fn source_label(source: &str) -> String {
    match pr_reference().captures(source) {
        Some(caps) => format!("#{}", &caps[1]),
        None => source.to_string(),
    }
}

/// A set of failure entries sharing a normalized root-cause signature.
#[derive(Debug, Clone)]
pub struct FailureCluster {
    pub reason_key: String,
    pub kind: JobKind,
    /// Every raw entry whose normalized highlight matched `reason_key`,
    /// in input order.
    pub all_entries: Vec<FailureEntry>,
    /// `all_entries` deduplicated by source, ascending by upstream job id.
    pub deduped_entries: Vec<FailureEntry>,
    /// Distinct machines the failure was observed on.
    pub machines: Vec<String>,
}

impl FailureCluster {
    pub fn source_labels(&self) -> Vec<String> {
        self.deduped_entries
            .iter()
            .map(|entry| source_label(&entry.source))
            .collect()
    }

    /// Earliest upstream reference. Only meaningful when the cluster has
    /// more than one deduplicated member.
    pub fn first_seen(&self) -> Option<&str> {
        if self.deduped_entries.len() > 1 {
            self.deduped_entries.first().map(|e| e.upstream.as_str())
        } else {
            None
        }
    }

    pub fn last_seen(&self) -> Option<&str> {
        self.deduped_entries.last().map(|e| e.upstream.as_str())
    }
}

/// Groups a flat failure list into ranked clusters, most-impactful first.
///
/// Grouping is stable: clusters appear keyed by first occurrence, and
/// entries within a cluster follow input order. Ranking is by deduplicated
/// entry count descending, ties broken lexicographically by reason key.
pub fn cluster_failures(entries: &[FailureEntry]) -> Result<Vec<FailureCluster>> {
    let mut groups: IndexMap<String, Vec<FailureEntry>> = IndexMap::new();
    for entry in entries {
        groups
            .entry(reason_key(entry)?)
            .or_default()
            .push(entry.clone());
    }

    let mut clusters: Vec<FailureCluster> = groups
        .into_iter()
        .map(|(reason_key, all_entries)| build_cluster(reason_key, all_entries))
        .collect();

    clusters.sort_by(|a, b| {
        b.deduped_entries
            .len()
            .cmp(&a.deduped_entries.len())
            .then_with(|| a.reason_key.cmp(&b.reason_key))
    });

    Ok(clusters)
}

fn build_cluster(reason_key: String, all_entries: Vec<FailureEntry>) -> FailureCluster {
    // A change counts once even when it failed on several machines for the
    // same reason.
    let mut seen_sources = HashSet::new();
    let mut deduped: Vec<FailureEntry> = all_entries
        .iter()
        .filter(|entry| seen_sources.insert(entry.source.clone()))
        .cloned()
        .collect();
    deduped.sort_by_key(|entry| upstream_job_id(&entry.upstream).unwrap_or(u64::MAX));

    let machines: Vec<String> = all_entries
        .iter()
        .map(|entry| entry.built_on.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let kind = all_entries[0].kind;

    FailureCluster {
        reason_key,
        kind,
        all_entries,
        deduped_entries: deduped,
        machines,
    }
}
