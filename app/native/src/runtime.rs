//! Async driver for a [`Controller`] in real time.
//!
//! The loop pumps the controller, then waits for whichever comes first: a
//! feed or store notification, the next timer deadline, or shutdown. The
//! controller is single-threaded, so the loop is meant for a current-thread
//! runtime and never spawns.

use std::future::Future;
use std::time::Duration;

use crate::controller::Controller;

/// Drives `controller` until `shutdown` resolves, then hands it back.
pub async fn run(mut controller: Controller, shutdown: impl Future<Output = ()>) -> Controller {
    tokio::pin!(shutdown);
    tracing::debug!(token = %controller.token(), "runtime started");

    loop {
        controller.pump();

        let wait = controller
            .next_deadline()
            .map(|deadline| Duration::from_millis(deadline.saturating_sub(controller.now_ms())));

        tokio::select! {
            () = &mut shutdown => break,
            () = controller.changed() => {}
            () = sleep_or_pending(wait) => {}
        }
    }

    controller.pump();
    tracing::debug!(status = ?controller.status(), "runtime stopped");
    controller
}

async fn sleep_or_pending(wait: Option<Duration>) {
    match wait {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::SystemClock;
    use crate::content::Document;
    use crate::controller::Tuning;
    use crate::scheduler::SchedulerTuning;
    use crate::store::MemoryStore;

    fn fast_tuning() -> Tuning {
        Tuning {
            scheduler: SchedulerTuning { debounce_ms: 10, streaming_throttle_ms: 50 },
            frame_interval_ms: 1,
            ..Tuning::default()
        }
    }

    #[tokio::test]
    async fn test_run_applies_window_in_real_time() {
        let document = Document::new();
        for n in 0..50 {
            document.push_turn(format!("turn {n}"));
        }
        let controller = Controller::new(
            Arc::new(document.clone()),
            &document,
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            fast_tuning(),
        );

        let controller = run(controller, tokio::time::sleep(Duration::from_millis(200))).await;
        assert_eq!(document.hidden_count(), 20);
        assert!(document.has_marker());
        assert_eq!(controller.last_outcome().cutoff, 20);
    }

    #[tokio::test]
    async fn test_run_reacts_to_appends() {
        let document = Document::new();
        let host = document.clone();
        let controller = Controller::new(
            Arc::new(document.clone()),
            &document,
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            fast_tuning(),
        );

        let shutdown = async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            for n in 0..45 {
                host.push_turn(format!("turn {n}"));
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        };

        run(controller, shutdown).await;
        assert_eq!(document.hidden_count(), 15);
    }
}
