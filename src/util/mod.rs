pub mod cache;
pub mod logging;
pub mod text;

use std::error::Error;
use std::future::Future;
use tracing::warn;

/// Dispatches a write that must never block or fail the caller's response.
///
/// The future is spawned and forgotten; a failure is logged under the given
/// label and swallowed. Used for usage counters, execution logs, error
/// pattern upserts and conversation appends.
pub fn best_effort<F>(what: &'static str, fut: F)
where
    F: Future<Output = Result<(), Box<dyn Error + Send + Sync>>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            warn!("best-effort {} failed: {}", what, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn best_effort_failure_does_not_reach_the_caller() {
        // The wrapper must swallow the error; the caller's own flow continues.
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);

        best_effort("test write", async move {
            ran_clone.store(true, Ordering::SeqCst);
            Err("simulated store outage".into())
        });

        // Give the spawned task a chance to run.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert!(ran.load(Ordering::SeqCst));
        // Reaching this point without a panic or propagated error is the
        // property under test.
    }
}
