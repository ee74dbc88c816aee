use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::JobKind;

/// Configuration file structure for citriage.
///
/// Loaded from an explicit path, from `citriage.toml` in the current
/// directory, or synthesized entirely from defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Jenkins instance base URL
    #[serde(default = "default_ci_base_url")]
    pub ci_base_url: String,

    /// GitHub API base URL (used to resolve PR URLs to CI runs)
    #[serde(default = "default_github_base_url")]
    pub github_base_url: String,

    /// Repository path (e.g., 'owner/repo')
    #[serde(default = "default_repo_path")]
    pub repo_path: String,

    /// Number of recent builds covered by `rate` and `walk`
    #[serde(default = "default_build_window")]
    pub build_window: usize,

    /// Disable the on-disk result cache
    #[serde(default)]
    pub no_cache: bool,

    /// Jenkins job names per CI kind
    #[serde(default)]
    pub jobs: JobNames,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobNames {
    #[serde(default = "default_pr_job")]
    pub pr: String,

    #[serde(default = "default_commit_job")]
    pub commit: String,

    #[serde(default = "default_benchmark_job")]
    pub benchmark: String,
}

impl JobNames {
    pub fn name_of(&self, kind: JobKind) -> &str {
        match kind {
            JobKind::Pr => &self.pr,
            JobKind::Commit => &self.commit,
            JobKind::Benchmark => &self.benchmark,
        }
    }

    pub fn kind_of(&self, job_name: &str) -> Option<JobKind> {
        if job_name == self.pr {
            Some(JobKind::Pr)
        } else if job_name == self.commit {
            Some(JobKind::Commit)
        } else if job_name == self.benchmark {
            Some(JobKind::Benchmark)
        } else {
            None
        }
    }
}

impl Default for JobNames {
    fn default() -> Self {
        Self {
            pr: default_pr_job(),
            commit: default_commit_job(),
            benchmark: default_benchmark_job(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ci_base_url: default_ci_base_url(),
            github_base_url: default_github_base_url(),
            repo_path: default_repo_path(),
            build_window: default_build_window(),
            no_cache: false,
            jobs: JobNames::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the given path, falling back to
    /// `citriage.toml` in the current directory, then to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let local = Path::new("citriage.toml");
                if local.exists() {
                    Self::from_file(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

fn default_ci_base_url() -> String {
    "https://ci.nodejs.org".to_string()
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_repo_path() -> String {
    "nodejs/node".to_string()
}

fn default_build_window() -> usize {
    100
}

fn default_pr_job() -> String {
    "node-test-pull-request".to_string()
}

fn default_commit_job() -> String {
    "node-test-commit".to_string()
}

fn default_benchmark_job() -> String {
    "benchmark-node-micro-benchmarks".to_string()
}
