use serde::Deserialize;

use crate::models::{FailureEntry, JobKind, Outcome};

/// How many trailing console lines are kept as a failure's diagnostic text.
const CONSOLE_TAIL: usize = 100;

/// One build as reported by the Jenkins JSON API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JenkinsBuild {
    pub result: Option<String>,
    #[serde(default)]
    pub built_on: Option<String>,
    #[serde(default)]
    pub sub_builds: Vec<JenkinsSubBuild>,
    #[serde(default)]
    pub actions: Vec<JenkinsAction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JenkinsSubBuild {
    pub job_name: String,
    pub build_number: u64,
    pub result: Option<String>,
    /// Relative URL like `job/node-test-commit-linux/40300/`.
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JenkinsAction {
    #[serde(default)]
    pub parameters: Vec<JenkinsParameter>,
}

#[derive(Debug, Deserialize)]
pub struct JenkinsParameter {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl JenkinsBuild {
    pub fn outcome(&self) -> Outcome {
        Outcome::from_ci_result(self.result.as_deref())
    }

    /// Looks up a string build parameter across all actions.
    pub fn parameter(&self, name: &str) -> Option<String> {
        self.actions
            .iter()
            .flat_map(|action| &action.parameters)
            .find(|param| param.name == name)
            .and_then(|param| param.value.as_str())
            .map(str::to_string)
    }
}

impl JenkinsSubBuild {
    pub fn outcome(&self) -> Outcome {
        Outcome::from_ci_result(self.result.as_deref())
    }
}

/// Listing of a job's recent builds, as returned by the job-level API with
/// a `builds[number,result]` tree filter.
#[derive(Debug, Deserialize)]
pub struct JenkinsJobListing {
    #[serde(default)]
    pub builds: Vec<JenkinsBuildRef>,
}

#[derive(Debug, Deserialize)]
pub struct JenkinsBuildRef {
    pub number: u64,
    pub result: Option<String>,
}

/// Builds a failure entry from a failing run's console text.
///
/// Keeps the trailing portion of the console as the diagnostic and picks
/// the most salient line in it as the highlight. The highlight index is
/// guaranteed to be in range of the stored reason.
pub fn failure_from_console(
    console: &str,
    source: String,
    upstream: String,
    built_on: String,
    kind: JobKind,
) -> FailureEntry {
    let lines: Vec<&str> = console.lines().collect();
    let tail = &lines[lines.len().saturating_sub(CONSOLE_TAIL)..];

    if tail.is_empty() {
        return FailureEntry {
            reason: "(no console output)".to_string(),
            highlight_line: 0,
            source,
            upstream,
            built_on,
            kind,
        };
    }

    FailureEntry {
        reason: tail.join("\n"),
        highlight_line: pick_highlight(tail),
        source,
        upstream,
        built_on,
        kind,
    }
}

/// Picks the salient error line: a TAP failure beats a fatal diagnostic
/// beats a generic error, falling back to the last non-empty line.
fn pick_highlight(lines: &[&str]) -> usize {
    if let Some(idx) = lines.iter().position(|l| l.starts_with("not ok ")) {
        return idx;
    }
    if let Some(idx) = lines.iter().position(|l| l.contains("FATAL:")) {
        return idx;
    }
    if let Some(idx) = lines.iter().position(|l| l.contains("Error:")) {
        return idx;
    }
    lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .unwrap_or(0)
}

/// Extracts benchmark comparison lines flagged as statistically
/// significant (the comparison output marks them with trailing `*`,
/// `**` or `***`).
pub fn significant_results(console: &str) -> Vec<String> {
    console
        .lines()
        .filter(|line| {
            line.split_whitespace()
                .any(|token| token.chars().all(|c| c == '*'))
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(console: &str) -> FailureEntry {
        failure_from_console(
            console,
            "source".to_string(),
            "https://ci.example.org/job/x/1/".to_string(),
            "agent-1".to_string(),
            JobKind::Pr,
        )
    }

    #[test]
    fn tap_failure_wins_the_highlight() {
        let entry = failure("setup line\nnot ok 12 parallel/test-net\nError: trailing noise");
        assert_eq!(entry.highlight_line, 1);
        assert_eq!(
            entry.reason.lines().nth(entry.highlight_line).unwrap(),
            "not ok 12 parallel/test-net"
        );
    }

    #[test]
    fn fatal_beats_generic_error() {
        let entry = failure("Error: something\nFATAL: Could not checkout abc123\n");
        assert_eq!(entry.highlight_line, 1);
    }

    #[test]
    fn falls_back_to_last_non_empty_line() {
        let entry = failure("line one\nline two\n\n");
        assert_eq!(entry.highlight_line, 1);
    }

    #[test]
    fn empty_console_still_yields_a_valid_entry() {
        let entry = failure("");
        assert_eq!(entry.highlight_line, 0);
        assert!(entry.reason.lines().nth(entry.highlight_line).is_some());
    }

    #[test]
    fn highlight_is_always_in_range() {
        for console in ["", "\n\n\n", "a", "a\nb\nc"] {
            let entry = failure(console);
            assert!(
                entry.reason.lines().nth(entry.highlight_line).is_some(),
                "out of range for console {console:?}"
            );
        }
    }

    #[test]
    fn significant_results_keeps_only_starred_lines() {
        let console = "\
 streams/pipe.js n=1000    1.52 %       ***   0.0001
 streams/creation.js n=50  0.30 %             0.4512
 buffers/copy.js n=20     -2.01 %        **   0.0042
done";
        let lines = significant_results(console);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("streams/pipe.js"));
        assert!(lines[1].contains("buffers/copy.js"));
    }

    #[test]
    fn parameters_are_found_across_actions() {
        let build: JenkinsBuild = serde_json::from_str(
            r#"{
                "result": "FAILURE",
                "actions": [
                    {},
                    {"parameters": [{"name": "PR_ID", "value": "12345"}]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(build.outcome(), Outcome::Failed);
        assert_eq!(build.parameter("PR_ID").as_deref(), Some("12345"));
        assert_eq!(build.parameter("MISSING"), None);
    }
}
