//! `rvh index`: build or load the repository index and report it.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::config::Config;
use crate::indexer::IndexSource;
use crate::progress::ProgressSink;

pub async fn run_index(
    config: &Config,
    repo: &Path,
    progress: Arc<dyn ProgressSink>,
    cancel: &CancellationToken,
) -> Result<()> {
    let agent = Agent::new(config, repo, progress, cancel).await?;
    let stats = agent.index_stats();

    println!("Repository:  {}", agent.root().display());
    println!("Chunks:      {}", agent.chunk_count());
    match agent.index_source() {
        IndexSource::Cache => println!("Source:      cache"),
        IndexSource::Fresh => {
            println!("Source:      fresh index");
            println!("Files:       {} indexed, {} skipped", stats.files_indexed, stats.files_skipped);
            if stats.chunks_skipped > 0 {
                println!("Skipped:     {} chunks failed to embed", stats.chunks_skipped);
            }
        }
        IndexSource::Partial => {
            println!("Source:      partial (cancelled, not cached)");
            println!("Files:       {} indexed", stats.files_indexed);
        }
    }
    Ok(())
}
