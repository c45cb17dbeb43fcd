//! Live session fed from stdin.
//!
//! Each non-empty input line becomes a conversation turn. The engine runs in
//! real time against the state file, so settings changed from another shell
//! with `speedchat settings set` are picked up on the next apply.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use super::state_store;
use crate::cli::output;
use crate::clock::SystemClock;
use crate::config;
use crate::content::Document;
use crate::controller::{Controller, Tuning};
use crate::error::SpeedchatError;
use crate::runtime;

/// Runs the live session until stdin is closed.
///
/// # Errors
///
/// Returns an error if the state file cannot be watched, the async runtime
/// cannot be started or stdin cannot be read.
pub fn execute(json: bool) -> Result<(), SpeedchatError> {
    let tuning = Tuning::from(config::get_config());
    let store = state_store();
    store.watch()?;
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    let status = runtime.block_on(async move {
        let document = Document::new();
        let controller = Controller::new(
            Arc::new(document.clone()),
            &document,
            store,
            Arc::new(SystemClock),
            tuning,
        );

        let (done, read) = tokio::sync::oneshot::channel();
        let feeder = feed_stdin(document, grace_period(&tuning), done);
        let controller = runtime::run(controller, feeder).await;

        read.await.unwrap_or(Ok(0)).map(|lines| (lines, controller.status()))
    })?;

    let (lines, status) = status;
    tracing::info!(lines, "input closed");
    if json {
        output::print_highlighted_json(&serde_json::to_value(&status)?);
    } else {
        output::print_status(&status);
    }
    Ok(())
}

/// Time left for the last update after input ends.
fn grace_period(tuning: &Tuning) -> Duration {
    Duration::from_millis(tuning.scheduler.debounce_ms + tuning.frame_interval_ms * 2 + 50)
}

/// Appends every stdin line to `document`, then waits `grace` so the final
/// update lands. Reports the number of turns through `done`.
async fn feed_stdin(
    document: Document,
    grace: Duration,
    done: tokio::sync::oneshot::Sender<Result<usize, std::io::Error>>,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut count = 0;

    let result = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let text = line.trim();
                if !text.is_empty() {
                    document.push_turn(text);
                    count += 1;
                }
            }
            Ok(None) => break Ok(count),
            Err(err) => break Err(err),
        }
    };

    tokio::time::sleep(grace).await;
    let _ = done.send(result);
}
