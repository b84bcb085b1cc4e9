//! # Review Harness
//!
//! Orchestration core for AI-assisted code review.
//!
//! Two subsystems share the LLM clients and configuration:
//!
//! - **Repository Q&A**: index a repository into embedded chunks (cached
//!   per repository state), route each question to a structural query or
//!   to retrieval-augmented answering, and fall back to retrieval when the
//!   structural path fails.
//! - **Result aggregation**: optionally re-score analyzer findings with an
//!   LLM, deduplicate them, order them deterministically, and filter them
//!   by a severity threshold.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌────────────┐   ┌────────────┐
//! │  RepoFs  │──▶│  Indexer   │──▶│ ChunkStore │──▶│ RagAnswerer│
//! │ walk+read│   │split+embed │   │  (cached)  │   └─────▲──────┘
//! └──────────┘   └────────────┘   └────────────┘         │ fallback
//!                                  ┌────────┐   ┌────────┴─────┐
//!                      question ──▶│ Router │──▶│StructuralTool│
//!                                  └────────┘   └──────────────┘
//!
//! raw issues ──▶ re-score (LLM) ──▶ dedup ──▶ order ──▶ threshold
//! ```
//!
//! Pure data types and algorithms (chunking, similarity search, dedup,
//! ordering, lenient JSON recovery) live in `review-harness-core`; this
//! crate adds I/O, providers, and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed errors per component |
//! | [`cancel`] | Cancellation helpers |
//! | [`llm`] | Embedding and completion providers |
//! | [`repo_fs`] | Repository enumeration and exclusion rules |
//! | [`fingerprint`] | Repository-state fingerprint |
//! | [`cache`] | Index cache storage and records |
//! | [`progress`] | Indexing progress reporting |
//! | [`indexer`] | Repository indexer |
//! | [`router`] | Structural vs. semantic routing |
//! | [`answer`] | Retrieval-augmented answering |
//! | [`structural`] | Structural queries over Go files |
//! | [`agent`] | Question-answering agent |
//! | [`aggregator`] | Review result aggregation |

pub mod agent;
pub mod aggregator;
pub mod answer;
pub mod ask_cmd;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod index_cmd;
pub mod indexer;
pub mod llm;
pub mod progress;
pub mod repo_fs;
pub mod review_cmd;
pub mod router;
pub mod structural;
