//! # Palisade
//!
//! An issue-driven feature bot. Given a GitHub repository and an issue
//! number, Palisade indexes the repository's source text, retrieves the
//! chunks most similar to the issue, asks a remote generator service for
//! a single-file change, and publishes the result as a new branch and
//! pull request.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────┐   ┌─────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐
//! │  Index  │──▶│  Issue  │──▶│ Retrieve │──▶│ Generator │──▶│ Publish  │
//! │ chunk + │   │ fetch   │   │  top-K   │   │  service  │   │ branch + │
//! │ embed   │   │         │   │  chunks  │   │           │   │   PR     │
//! └─────────┘   └─────────┘   └──────────┘   └───────────┘   └──────────┘
//! ```
//!
//! The similarity index is persisted per repository (SQLite, one file
//! under `index.dir`) and reused on later runs without re-embedding.
//!
//! ## Quick Start
//!
//! ```bash
//! palisade index owner/repo                # build the index over ./tmp
//! palisade search owner/repo "null crash"  # inspect retrieval
//! palisade run owner/repo 42               # full issue-to-PR pipeline
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and credentials |
//! | [`error`] | Typed pipeline error taxonomy |
//! | [`models`] | Core data types |
//! | [`scan`] | Source-tree discovery |
//! | [`chunk`] | Whitespace-packing text chunker |
//! | [`embedding`] | Embedding providers and vector utilities |
//! | [`index`] | Persisted similarity index |
//! | [`github`] | GitHub REST client |
//! | [`retrieve`] | Query building and context rendering |
//! | [`generator`] | Change-generator service client |
//! | [`publish`] | Branch and pull-request publisher |
//! | [`pipeline`] | Command orchestration |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod github;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod retrieve;
pub mod scan;
