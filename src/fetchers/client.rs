use std::collections::BTreeSet;

use indexmap::IndexMap;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::config::{Config, JobNames};
use crate::dispatch;
use crate::error::{CiTriageError, Result};
use crate::models::{BuildRecord, BuildSet, JobKind, Outcome};

use super::jenkins::{JenkinsBuild, JenkinsJobListing};

/// HTTP transport to the CI instance and the source-hosting API.
///
/// Pure pass-through: no retries and no timeouts beyond reqwest defaults;
/// transient failures propagate to the caller.
#[derive(Debug, Clone)]
pub struct CiClient {
    http: reqwest::Client,
    ci_base_url: String,
    github_base_url: String,
    repo_path: String,
    build_window: usize,
    jobs: JobNames,
}

impl CiClient {
    pub fn new(config: &Config) -> Result<Self> {
        if config.repo_path.split('/').count() != 2 {
            return Err(CiTriageError::Config(format!(
                "repo-path must be in format 'owner/repo', got '{}'",
                config.repo_path
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("citriage/0.3"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            ci_base_url: config.ci_base_url.trim_end_matches('/').to_string(),
            github_base_url: config.github_base_url.trim_end_matches('/').to_string(),
            repo_path: config.repo_path.clone(),
            build_window: config.build_window,
            jobs: config.jobs.clone(),
        })
    }

    pub fn job_names(&self) -> &JobNames {
        &self.jobs
    }

    pub fn repo_path(&self) -> &str {
        &self.repo_path
    }

    /// Web URL of one build.
    pub fn job_url(&self, kind: JobKind, job_id: u64) -> String {
        format!(
            "{}/job/{}/{}/",
            self.ci_base_url,
            self.jobs.name_of(kind),
            job_id
        )
    }

    /// Makes a Jenkins-relative URL (like a sub-build's `url` field)
    /// absolute against the CI base.
    pub fn absolute_url(&self, relative: &str) -> String {
        if relative.starts_with("http") {
            relative.to_string()
        } else {
            format!("{}/{}", self.ci_base_url, relative.trim_start_matches('/'))
        }
    }

    /// Fetches one build's JSON summary.
    pub async fn fetch_build(&self, kind: JobKind, job_id: u64) -> Result<JenkinsBuild> {
        self.fetch_build_at(&self.job_url(kind, job_id)).await
    }

    /// Fetches a build summary by its web URL (used for sub-builds).
    pub async fn fetch_build_at(&self, build_url: &str) -> Result<JenkinsBuild> {
        let url = format!(
            "{}api/json?tree=result,builtOn,subBuilds[jobName,buildNumber,result,url],actions[parameters[name,value]]",
            ensure_trailing_slash(build_url)
        );
        debug!("GET {url}");

        let build = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(build)
    }

    /// Fetches a build's console text.
    pub async fn fetch_console(&self, build_url: &str) -> Result<String> {
        let url = format!("{}consoleText", ensure_trailing_slash(build_url));
        debug!("GET {url}");

        let text = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }

    /// Lists the last N builds of a kind as a build set. Records carry
    /// outcomes only; failure details require a per-build fetch.
    pub async fn list_builds(&self, kind: JobKind) -> Result<BuildSet> {
        let url = format!(
            "{}/job/{}/api/json?tree=builds[number,result]{{0,{}}}",
            self.ci_base_url,
            self.jobs.name_of(kind),
            self.build_window
        );
        debug!("GET {url}");

        let listing: JenkinsJobListing = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let records = listing
            .builds
            .into_iter()
            .map(|build| BuildRecord {
                kind,
                job_id: build.number,
                outcome: Outcome::from_ci_result(build.result.as_deref()),
                failures: vec![],
            })
            .collect();

        Ok(BuildSet::from_records(records))
    }

    /// Resolves a PR to the CI runs reported against its head commit.
    ///
    /// Walks the PR's commit statuses and keeps every target URL that
    /// parses as a direct CI job URL, keyed by kind.
    pub async fn fetch_ci_map_for_pr(
        &self,
        pr: u64,
    ) -> Result<IndexMap<JobKind, BTreeSet<u64>>> {
        let pr_url = format!("{}/repos/{}/pulls/{}", self.github_base_url, self.repo_path, pr);
        debug!("GET {pr_url}");

        let pull: PullResponse = self
            .http
            .get(&pr_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let sha = pull
            .head
            .map(|head| head.sha)
            .ok_or_else(|| CiTriageError::Api(format!("PR #{pr} has no head commit")))?;

        let statuses_url = format!(
            "{}/repos/{}/commits/{}/statuses",
            self.github_base_url, self.repo_path, sha
        );
        debug!("GET {statuses_url}");

        let statuses: Vec<CommitStatus> = self
            .http
            .get(&statuses_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut ci_map: IndexMap<JobKind, BTreeSet<u64>> = IndexMap::new();
        for status in statuses {
            let Some(target) = status.target_url else {
                continue;
            };
            if let Some(identity) = dispatch::parse_job_url(&target, &self.jobs) {
                ci_map.entry(identity.kind).or_default().insert(identity.job_id);
            }
        }

        Ok(ci_map)
    }
}

fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    head: Option<PullHead>,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitStatus {
    target_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server_url: &str) -> CiClient {
        let config = Config {
            ci_base_url: server_url.to_string(),
            github_base_url: server_url.to_string(),
            ..Config::default()
        };
        CiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn list_builds_partitions_the_listing() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                "/job/node-test-pull-request/api/json?tree=builds[number,result]{0,100}",
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"builds": [
                    {"number": 103, "result": "SUCCESS"},
                    {"number": 102, "result": "FAILURE"},
                    {"number": 101, "result": null},
                    {"number": 100, "result": "ABORTED"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server.url());
        let set = client.list_builds(JobKind::Pr).await.unwrap();

        mock.assert_async().await;
        assert_eq!(set.count, 4);
        assert_eq!(set.success.len(), 1);
        assert_eq!(set.failed.len(), 1);
        assert_eq!(set.pending.len(), 1);
        assert_eq!(set.aborted.len(), 1);
    }

    #[tokio::test]
    async fn fetch_build_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.fetch_build(JobKind::Commit, 1).await.unwrap_err();
        assert!(matches!(err, CiTriageError::Network(_)));
    }

    #[tokio::test]
    async fn ci_map_keeps_only_recognized_job_urls() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        server
            .mock("GET", "/repos/nodejs/node/pulls/55")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"head": {"sha": "abc123"}}"#)
            .create_async()
            .await;

        server
            .mock("GET", "/repos/nodejs/node/commits/abc123/statuses")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"[
                    {{"target_url": "{base}/job/node-test-pull-request/900/"}},
                    {{"target_url": "{base}/job/node-test-pull-request/901/"}},
                    {{"target_url": "{base}/job/node-test-commit/450/"}},
                    {{"target_url": "{base}/job/some-linter/3/"}},
                    {{"target_url": null}}
                ]"#
            ))
            .create_async()
            .await;

        let client = client_for(&base);
        let ci_map = client.fetch_ci_map_for_pr(55).await.unwrap();

        assert_eq!(ci_map.len(), 2);
        assert_eq!(
            ci_map[&JobKind::Pr].iter().copied().collect::<Vec<_>>(),
            vec![900, 901]
        );
        assert_eq!(
            ci_map[&JobKind::Commit].iter().copied().collect::<Vec<_>>(),
            vec![450]
        );
    }

    #[tokio::test]
    async fn pr_without_head_is_an_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/nodejs/node/pulls/7")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"head": null}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.fetch_ci_map_for_pr(7).await.unwrap_err();
        assert!(matches!(err, CiTriageError::Api(_)));
    }

    #[test]
    fn invalid_repo_path_is_a_config_error() {
        let config = Config {
            repo_path: "just-a-name".to_string(),
            ..Config::default()
        };
        let err = CiClient::new(&config).unwrap_err();
        assert!(matches!(err, CiTriageError::Config(_)));
    }

    #[test]
    fn absolute_url_leaves_absolute_urls_alone() {
        let client = client_for("https://ci.example.org");
        assert_eq!(
            client.absolute_url("job/node-test-commit/1/"),
            "https://ci.example.org/job/node-test-commit/1/"
        );
        assert_eq!(
            client.absolute_url("https://other.example.org/job/x/2/"),
            "https://other.example.org/job/x/2/"
        );
    }
}
