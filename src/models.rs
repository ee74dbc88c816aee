use std::fmt;

use serde::{Deserialize, Serialize};

/// Which CI pipeline produced a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Pr,
    Commit,
    Benchmark,
}

impl JobKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pr" => Some(Self::Pr),
            "commit" => Some(Self::Commit),
            "benchmark" => Some(Self::Benchmark),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pr => "pr",
            Self::Commit => "commit",
            Self::Benchmark => "benchmark",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one CI run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Success,
    Pending,
    Aborted,
    Failed,
    Unstable,
}

impl Outcome {
    /// Maps a Jenkins `result` field to an outcome. A missing result means
    /// the build is still running.
    pub fn from_ci_result(result: Option<&str>) -> Self {
        match result {
            None => Self::Pending,
            Some("SUCCESS") => Self::Success,
            Some("ABORTED") => Self::Aborted,
            Some("UNSTABLE") => Self::Unstable,
            Some(_) => Self::Failed,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "SUCCESS",
            Self::Pending => "PENDING",
            Self::Aborted => "ABORTED",
            Self::Failed => "FAILED",
            Self::Unstable => "UNSTABLE",
        };
        f.write_str(s)
    }
}

/// One failing sub-test or step within a build.
///
/// Created once by the fetch stage; the clustering engine only groups and
/// sorts these, it never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    /// Raw multi-line diagnostic text.
    pub reason: String,
    /// Index of the salient error line within `reason`.
    pub highlight_line: usize,
    /// Identifier of the triggering change (PR or commit reference URL).
    pub source: String,
    /// URL of the CI run that produced this failure. Embeds a monotonically
    /// increasing job id used for chronological ordering.
    pub upstream: String,
    /// Machine or agent the failing step executed on.
    pub built_on: String,
    /// CI kind this failure belongs to.
    #[serde(rename = "type")]
    pub kind: JobKind,
}

/// One CI run's normalized outcome plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    pub kind: JobKind,
    pub job_id: u64,
    pub outcome: Outcome,
    /// Empty unless the build failed (or, partially, for unstable builds).
    #[serde(default)]
    pub failures: Vec<FailureEntry>,
}

/// A collection of build records partitioned by outcome.
///
/// Constructed once per invocation from fetch results; read-only afterward.
#[derive(Debug, Default)]
pub struct BuildSet {
    pub count: usize,
    pub success: Vec<BuildRecord>,
    pub pending: Vec<BuildRecord>,
    pub aborted: Vec<BuildRecord>,
    pub failed: Vec<BuildRecord>,
    pub unstable: Vec<BuildRecord>,
}

impl BuildSet {
    pub fn from_records(records: Vec<BuildRecord>) -> Self {
        let mut set = Self {
            count: records.len(),
            ..Self::default()
        };

        for record in records {
            match record.outcome {
                Outcome::Success => set.success.push(record),
                Outcome::Pending => set.pending.push(record),
                Outcome::Aborted => set.aborted.push(record),
                Outcome::Failed => set.failed.push(record),
                Outcome::Unstable => set.unstable.push(record),
            }
        }

        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(job_id: u64, outcome: Outcome) -> BuildRecord {
        BuildRecord {
            kind: JobKind::Pr,
            job_id,
            outcome,
            failures: vec![],
        }
    }

    #[test]
    fn outcome_mapping_covers_jenkins_results() {
        assert_eq!(Outcome::from_ci_result(None), Outcome::Pending);
        assert_eq!(Outcome::from_ci_result(Some("SUCCESS")), Outcome::Success);
        assert_eq!(Outcome::from_ci_result(Some("ABORTED")), Outcome::Aborted);
        assert_eq!(Outcome::from_ci_result(Some("UNSTABLE")), Outcome::Unstable);
        assert_eq!(Outcome::from_ci_result(Some("FAILURE")), Outcome::Failed);
    }

    #[test]
    fn job_kind_parses_known_kinds_only() {
        assert_eq!(JobKind::parse("pr"), Some(JobKind::Pr));
        assert_eq!(JobKind::parse("commit"), Some(JobKind::Commit));
        assert_eq!(JobKind::parse("benchmark"), Some(JobKind::Benchmark));
        assert_eq!(JobKind::parse("nightly"), None);
    }

    #[test]
    fn build_set_partitions_by_outcome() {
        let set = BuildSet::from_records(vec![
            record(1, Outcome::Success),
            record(2, Outcome::Failed),
            record(3, Outcome::Pending),
            record(4, Outcome::Success),
            record(5, Outcome::Unstable),
        ]);

        assert_eq!(set.count, 5);
        assert_eq!(set.success.len(), 2);
        assert_eq!(set.failed.len(), 1);
        assert_eq!(set.pending.len(), 1);
        assert_eq!(set.unstable.len(), 1);
        assert!(set.aborted.is_empty());
    }
}
