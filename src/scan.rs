use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::PipelineError;
use crate::models::SourceFile;

/// Walk the configured checkout root and return matching source files,
/// tagged with their path relative to the root, in deterministic order.
pub fn scan_repository(config: &Config) -> Result<Vec<SourceFile>> {
    let root = &config.index.root;
    if !root.exists() {
        return Err(PipelineError::NotFound(format!(
            "checkout root does not exist: {}",
            root.display()
        ))
        .into());
    }

    let include_set = build_globset(&config.index.include_globs)?;

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(config.index.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        // Binary or non-UTF-8 files read as empty and are dropped by the
        // chunker.
        let body = std::fs::read_to_string(path).unwrap_or_default();
        files.push(SourceFile {
            path: rel_str,
            body,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
