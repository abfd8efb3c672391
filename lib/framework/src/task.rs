use std::future::Future;
use std::sync::LazyLock;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use tracing::error;
use tracing::info;
use tracing::info_span;

use crate::exception::CoreRsResult;

static TASK_TRACKER: LazyLock<TaskTracker> = LazyLock::new(TaskTracker::new);

/// Spawns a long-running background worker on the shared tracker.
///
/// The worker's error is logged with its error code, the returned handle only
/// signals completion. `shutdown` waits for every worker spawned here.
pub fn spawn_worker<T>(name: &'static str, worker: T) -> JoinHandle<()>
where
    T: Future<Output = CoreRsResult<()>> + Send + 'static,
{
    let span = info_span!("worker", name);
    TASK_TRACKER.spawn(
        async move {
            info!("worker started");
            match worker.await {
                Ok(()) => info!("worker stopped"),
                Err(e) => {
                    let error_code = e.error_code().unwrap_or_default();
                    error!(error_code, "worker failed, error={e}");
                }
            }
        }
        .instrument(span),
    )
}

pub async fn shutdown() {
    info!("waiting for {} task(s) to finish", TASK_TRACKER.len());
    TASK_TRACKER.close();
    TASK_TRACKER.wait().await;
    info!("tasks finished");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn spawn_worker() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let handle = super::spawn_worker("test", async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        handle.await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_worker_completes() {
        let handle = super::spawn_worker("failing", async { Err(exception!(message = "boom")) });
        assert!(handle.await.is_ok());
    }
}
