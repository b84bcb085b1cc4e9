//! `rvh ask`: answer one question, or run an interactive session.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::config::Config;
use crate::progress::ProgressSink;

pub async fn run_ask(
    config: &Config,
    repo: &Path,
    question: Option<&str>,
    progress: Arc<dyn ProgressSink>,
    cancel: &CancellationToken,
) -> Result<()> {
    let agent = Agent::new(config, repo, progress, cancel).await?;

    if let Some(question) = question {
        let answer = agent.ask(question, cancel).await?;
        println!("{}", answer);
        return Ok(());
    }

    eprintln!(
        "Index ready ({} chunks). Ask a question, or type 'exit' to quit.",
        agent.chunk_count()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit(question) {
            break;
        }

        // A failed question ends only that question, not the session.
        match agent.ask(question, cancel).await {
            Ok(answer) => println!("\n{}\n", answer),
            Err(e) => eprintln!("Error: {}", e),
        }
        if cancel.is_cancelled() {
            break;
        }
    }
    Ok(())
}

fn is_exit(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}
