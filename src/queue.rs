use std::path::PathBuf;

use log::info;

use crate::cache::ResultCache;
use crate::dispatch::JobIdentity;
use crate::error::Result;
use crate::fetchers::{CiClient, Fetcher};
use crate::models::BuildRecord;
use crate::output;

#[derive(Debug, Default, Clone)]
pub struct QueueOptions {
    /// Accumulate a markdown report and copy it to the clipboard.
    pub copy: bool,
    /// Write the flattened JSON record list to this path.
    pub json_path: Option<PathBuf>,
}

pub struct QueueOutcome {
    /// Normalized records, in job order.
    pub records: Vec<BuildRecord>,
    /// Flattened JSON records across all jobs, in job order.
    pub json_records: Vec<serde_json::Value>,
}

/// Drives a list of job identities through their fetchers, strictly in
/// order.
///
/// One fetch/display cycle completes fully before the next begins: CI
/// backends are not assumed to tolerate request bursts, and the terminal,
/// clipboard and JSON outputs must all follow job input order. The
/// clipboard, the JSON file and the cache are written once, after the
/// whole queue completes, so an aborted run leaves no partial artifacts.
pub async fn run_queue(
    client: &CiClient,
    cache: &ResultCache,
    identities: &[JobIdentity],
    options: &QueueOptions,
) -> Result<QueueOutcome> {
    let mut markdown = String::new();
    let mut json_records = Vec::new();
    let mut records = Vec::new();

    for identity in identities {
        let mut fetcher = Fetcher::for_identity(client, cache, *identity);

        let progress = output::FetchProgress::start(identity.kind, identity.job_id);
        let record = match fetcher.fetch_results().await {
            Ok(record) => {
                progress.finish();
                record
            }
            Err(err) => {
                progress.abandon();
                return Err(err);
            }
        };

        fetcher.display(&record);

        if options.copy {
            markdown.push_str(&fetcher.markdown_fragment(&record));
        }
        json_records.extend(fetcher.json_records(&record));
        records.push(record);
    }

    info!("Processed {} jobs", records.len());
    cache.persist(&records)?;

    if options.copy {
        output::copy_to_clipboard(&markdown)?;
    }
    if let Some(path) = &options.json_path {
        output::write_json_file(path, &json_records)?;
    }

    Ok(QueueOutcome {
        records,
        json_records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{JobKind, Outcome};

    fn client_for(server_url: &str) -> CiClient {
        let config = Config {
            ci_base_url: server_url.to_string(),
            github_base_url: server_url.to_string(),
            ..Config::default()
        };
        CiClient::new(&config).unwrap()
    }

    async fn mock_build(server: &mut mockito::ServerGuard, job: &str, id: u64, result: &str) {
        let body = format!(r#"{{"result": "{result}", "builtOn": "agent-1"}}"#);
        server
            .mock(
                "GET",
                mockito::Matcher::Regex(format!(r"^/job/{job}/{id}/api/json.*$")),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn records_follow_job_input_order() {
        let mut server = mockito::Server::new_async().await;
        mock_build(&mut server, "node-test-pull-request", 11, "SUCCESS").await;
        mock_build(&mut server, "node-test-commit", 5, "SUCCESS").await;
        mock_build(&mut server, "node-test-pull-request", 9, "SUCCESS").await;

        let client = client_for(&server.url());
        let cache = ResultCache::disabled();
        let identities = [
            JobIdentity { kind: JobKind::Pr, job_id: 11 },
            JobIdentity { kind: JobKind::Commit, job_id: 5 },
            JobIdentity { kind: JobKind::Pr, job_id: 9 },
        ];

        let outcome = run_queue(&client, &cache, &identities, &QueueOptions::default())
            .await
            .unwrap();

        let ids: Vec<u64> = outcome.records.iter().map(|r| r.job_id).collect();
        assert_eq!(ids, vec![11, 5, 9]);
        assert_eq!(outcome.json_records.len(), 3);
        assert_eq!(outcome.json_records[1]["type"], "commit");
    }

    #[tokio::test]
    async fn json_file_is_written_once_after_the_queue() {
        let mut server = mockito::Server::new_async().await;
        mock_build(&mut server, "node-test-pull-request", 21, "SUCCESS").await;

        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("out.json");

        let client = client_for(&server.url());
        let cache = ResultCache::disabled();
        let options = QueueOptions {
            copy: false,
            json_path: Some(json_path.clone()),
        };
        let identities = [JobIdentity { kind: JobKind::Pr, job_id: 21 }];

        run_queue(&client, &cache, &identities, &options).await.unwrap();

        let written: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0]["job_id"], 21);
        assert_eq!(written[0]["outcome"], "SUCCESS");
    }

    #[tokio::test]
    async fn fetch_failure_aborts_without_partial_output() {
        let mut server = mockito::Server::new_async().await;
        mock_build(&mut server, "node-test-pull-request", 31, "SUCCESS").await;
        // No mock for job 32: the second fetch fails.

        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("out.json");

        let client = client_for(&server.url());
        let cache = ResultCache::disabled();
        let options = QueueOptions {
            copy: false,
            json_path: Some(json_path.clone()),
        };
        let identities = [
            JobIdentity { kind: JobKind::Pr, job_id: 31 },
            JobIdentity { kind: JobKind::Pr, job_id: 32 },
        ];

        let result = run_queue(&client, &cache, &identities, &options).await;
        assert!(result.is_err());
        assert!(!json_path.exists());
    }

    #[tokio::test]
    async fn completed_builds_land_in_the_cache() {
        let mut server = mockito::Server::new_async().await;
        mock_build(&mut server, "node-test-commit", 41, "SUCCESS").await;

        let dir = tempfile::tempdir().unwrap();
        let cache_file = dir.path().join("cache.json");
        let cache = ResultCache::at_file(cache_file.clone()).unwrap();

        let client = client_for(&server.url());
        let identities = [JobIdentity { kind: JobKind::Commit, job_id: 41 }];
        run_queue(&client, &cache, &identities, &QueueOptions::default())
            .await
            .unwrap();

        let reloaded = ResultCache::at_file(cache_file).unwrap();
        assert_eq!(
            reloaded.get(JobKind::Commit, 41).unwrap().outcome,
            Outcome::Success
        );
    }
}
