//! Command orchestration.
//!
//! `run` executes the full five-step pipeline for one issue; `run_index`
//! and `run_search` expose the indexing and retrieval halves on their
//! own. Control flows strictly forward with `?` short-circuits; there is
//! no branching beyond error propagation.

use anyhow::Result;

use crate::chunk::chunk_source;
use crate::config::{Config, Credentials};
use crate::error::PipelineError;
use crate::generator;
use crate::github::GithubClient;
use crate::index::{index_path, SimilarityIndex};
use crate::publish;
use crate::retrieve;
use crate::scan::scan_repository;

/// Reject anything that is not an `owner/repo` pair before building URLs
/// from it.
fn validate_repo(repo: &str) -> Result<()> {
    match repo.split_once('/') {
        Some((owner, name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok(())
        }
        _ => Err(PipelineError::Validation(format!(
            "invalid repository '{}': expected owner/repo",
            repo
        ))
        .into()),
    }
}

/// The full pipeline: index, fetch issue, retrieve context, request a
/// change, publish it as a branch and pull request.
pub async fn run(config: &Config, creds: &Credentials, repo: &str, issue_number: u64) -> Result<()> {
    validate_repo(repo)?;

    println!("index {}", repo);
    let index = SimilarityIndex::open_or_build(config, creds, repo).await?;
    let stats = index.stats().await?;
    println!("  chunks: {}", stats.chunks);
    println!("  model: {}", stats.model);

    let github = GithubClient::new(config, creds)?;

    println!("fetch issue #{}", issue_number);
    let issue = github.get_issue(repo, issue_number).await?;
    println!("  title: {}", issue.title);
    println!("  state: {}", issue.state);
    println!("  author: {}", issue.user.login);
    if !issue.labels.is_empty() {
        let labels: Vec<&str> = issue.labels.iter().map(|l| l.name.as_str()).collect();
        println!("  labels: {}", labels.join(", "));
    }

    println!("retrieve context");
    let chunks = retrieve::retrieve(&index, config, creds, &issue).await?;
    println!("  chunks: {}", chunks.len());
    index.close().await;

    let issue_text = retrieve::issue_query(&issue);
    let retrieved = retrieve::format_context(&chunks);

    println!("request change");
    let generated = generator::request_change(config, creds, &issue_text, &retrieved).await?;
    println!("  file: {}", generated.file_path);
    println!("  pr title: {}", generated.pr_data.pr_title);

    println!("publish");
    let published = publish::publish_change(&github, config, repo, &generated).await?;
    println!("  branch: {}", published.branch);
    println!(
        "  pr: #{} {}",
        published.pull_request.number, published.pull_request.html_url
    );

    println!("ok");
    Ok(())
}

/// Build (or reuse) the repository's similarity index.
pub async fn run_index(
    config: &Config,
    creds: &Credentials,
    repo: &str,
    rebuild: bool,
    dry_run: bool,
) -> Result<()> {
    validate_repo(repo)?;

    if dry_run {
        let files = scan_repository(config)?;
        let total_chunks: usize = files
            .iter()
            .map(|f| chunk_source(&f.path, &f.body, config.index.max_chunk_chars).len())
            .sum();
        println!("index {} (dry-run)", repo);
        println!("  files: {}", files.len());
        println!("  chunks: {}", total_chunks);
        return Ok(());
    }

    let path = index_path(config, repo);
    let reused = !rebuild && path.exists();

    let index = if rebuild {
        SimilarityIndex::rebuild(config, creds, repo).await?
    } else {
        SimilarityIndex::open_or_build(config, creds, repo).await?
    };
    let stats = index.stats().await?;
    index.close().await;

    println!("index {}", repo);
    println!("  path: {}", path.display());
    println!("  reused: {}", reused);
    println!("  chunks: {}", stats.chunks);
    println!("  model: {}", stats.model);
    println!("  dims: {}", stats.dims);
    println!("  created: {}", format_ts_iso(stats.created_at));
    println!("ok");
    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Query an existing index and print the ranked chunks.
pub async fn run_search(
    config: &Config,
    creds: &Credentials,
    repo: &str,
    query: &str,
    limit: Option<usize>,
) -> Result<()> {
    validate_repo(repo)?;

    let path = index_path(config, repo);
    if !path.exists() {
        return Err(PipelineError::NotFound(format!(
            "no similarity index for {}; run `palisade index {}` first",
            repo, repo
        ))
        .into());
    }

    let index = SimilarityIndex::open(&path).await?;
    let k = limit.unwrap_or(config.retrieval.top_k);
    let results = index.query(config, creds, query, k).await?;
    index.close().await;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, result.score, result.source);
        let excerpt: String = result.text.chars().take(240).collect();
        println!("    \"{}\"", excerpt.replace('\n', " "));
    }

    Ok(())
}
