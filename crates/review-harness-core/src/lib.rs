//! # Review Harness Core
//!
//! Pure logic shared by the Review Harness app crate: the issue and chunk
//! data model, overlapping text windows, cosine similarity, the
//! in-memory vector index, issue aggregation (weights, dedup, ordering,
//! threshold filtering), diff line mapping, and lenient JSON recovery for
//! model output.
//!
//! This crate performs no I/O and carries no async runtime. Everything
//! that talks to a network, a filesystem, or a cache lives in
//! `review-harness`.

pub mod aggregate;
pub mod chunk;
pub mod diff_lines;
pub mod embedding;
pub mod json_recover;
pub mod models;
pub mod result;
pub mod store;
