use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use crate::cache::ResultCache;
use crate::clustering;
use crate::config::Config;
use crate::dispatch::{self, JobIdentity};
use crate::error::CiTriageError;
use crate::fetchers::CiClient;
use crate::health;
use crate::models::{FailureEntry, JobKind};
use crate::output;
use crate::queue::{self, QueueOptions};

#[derive(Parser)]
#[command(name = "citriage")]
#[command(author, version, about = "CI result triage tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Copy the markdown report to the system clipboard
    #[arg(long, global = true, default_value_t = false)]
    copy: bool,

    /// Write the flattened JSON record list to a file
    #[arg(long, global = true)]
    json: Option<PathBuf>,

    /// Disable the on-disk result cache
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,

    /// Path to a configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a green-rate health row for recent builds of a CI kind
    Rate {
        #[arg(value_parser = parse_kind)]
        kind: JobKind,
    },
    /// Cluster failures across recent failed builds of a CI kind
    Walk {
        #[arg(value_parser = parse_kind)]
        kind: JobKind,
    },
    /// Resolve a CI job URL or a GitHub PR URL and report its builds
    Url { url: String },
    /// Report one pull-request CI job
    Pr { job_id: u64 },
    /// Report one commit CI job
    Commit { job_id: u64 },
    /// Report one benchmark CI job
    Benchmark { job_id: u64 },
}

fn parse_kind(s: &str) -> std::result::Result<JobKind, String> {
    JobKind::parse(s).ok_or_else(|| format!("unknown CI kind: {s} (expected pr, commit or benchmark)"))
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let cache = ResultCache::new(&config.repo_path, !(self.no_cache || config.no_cache))?;
        let client = CiClient::new(&config)?;

        match &self.command {
            Commands::Rate { kind } => self.execute_rate(&client, *kind).await,
            Commands::Walk { kind } => self.execute_walk(&client, &cache, *kind).await,
            Commands::Url { url } => self.execute_url(&client, &cache, url).await,
            Commands::Pr { job_id } => {
                self.run_single(&client, &cache, JobKind::Pr, *job_id).await
            }
            Commands::Commit { job_id } => {
                self.run_single(&client, &cache, JobKind::Commit, *job_id).await
            }
            Commands::Benchmark { job_id } => {
                self.run_single(&client, &cache, JobKind::Benchmark, *job_id)
                    .await
            }
        }
    }

    async fn execute_rate(&self, client: &CiClient, kind: JobKind) -> Result<()> {
        info!("Computing health rate for {kind} builds");

        let set = client.list_builds(kind).await?;
        let row = health::health_row(&set);
        println!("{}", health::header());
        println!("{}", row.to_line());
        Ok(())
    }

    async fn execute_walk(&self, client: &CiClient, cache: &ResultCache, kind: JobKind) -> Result<()> {
        info!("Walking recent {kind} builds for failures");

        let set = client.list_builds(kind).await?;
        let mut identities: Vec<JobIdentity> = set
            .failed
            .iter()
            .chain(set.unstable.iter())
            .map(|record| JobIdentity {
                kind,
                job_id: record.job_id,
            })
            .collect();
        // Most recent first.
        identities.sort_by(|a, b| b.job_id.cmp(&a.job_id));

        if identities.is_empty() {
            println!("No failed builds in the last {} {kind} runs.", set.count);
            return Ok(());
        }

        let outcome = queue::run_queue(client, cache, &identities, &self.queue_options()).await?;

        let failures: Vec<FailureEntry> = outcome
            .records
            .iter()
            .flat_map(|record| record.failures.iter().cloned())
            .collect();
        let clusters = clustering::cluster_failures(&failures)?;
        output::print_clusters(&clusters);
        Ok(())
    }

    async fn execute_url(&self, client: &CiClient, cache: &ResultCache, url: &str) -> Result<()> {
        match dispatch::resolve_url(client, url).await {
            Ok(identities) if identities.is_empty() => {
                println!("No CI runs found for: {url}");
                Ok(())
            }
            Ok(identities) => {
                queue::run_queue(client, cache, &identities, &self.queue_options()).await?;
                Ok(())
            }
            Err(CiTriageError::UnrecognizedTarget(target)) => {
                output::print_usage();
                anyhow::bail!("unrecognized URL: {target}")
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn run_single(
        &self,
        client: &CiClient,
        cache: &ResultCache,
        kind: JobKind,
        job_id: u64,
    ) -> Result<()> {
        let identity = JobIdentity { kind, job_id };
        queue::run_queue(client, cache, &[identity], &self.queue_options()).await?;
        Ok(())
    }

    fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            copy: self.copy,
            json_path: self.json.clone(),
        }
    }
}
