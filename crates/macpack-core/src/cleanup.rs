//! Per-run cleanup tasks
//!
//! Release actions are registered at the moment a resource is about to be
//! acquired, before acquisition succeeds, and all of them run once when the run
//! ends whether it succeeded or not.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Boxed future returned by a cleanup action
pub type CleanupFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A zero-argument deferred release action
pub struct CleanupTask {
    label: String,
    action: Box<dyn FnOnce() -> CleanupFuture + Send>,
}

impl CleanupTask {
    pub fn new<F, Fut>(label: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            label: label.into(),
            action: Box::new(move || Box::pin(action())),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Consume the task and run its action
    pub async fn run(self) -> anyhow::Result<()> {
        (self.action)().await
    }
}

impl fmt::Debug for CleanupTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupTask")
            .field("label", &self.label)
            .finish()
    }
}

/// Cleanup tasks owned by one packaging run.
///
/// Clones share the same list, so components can register tasks while the run
/// keeps the handle it drains at teardown.
#[derive(Debug, Clone, Default)]
pub struct CleanupTasks {
    tasks: Arc<Mutex<Vec<CleanupTask>>>,
}

impl CleanupTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, task: CleanupTask) {
        debug!(task = task.label(), "registered cleanup task");
        self.lock().push(task);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered task once, most recent first.
    ///
    /// Failures are logged and counted, never propagated. Tasks registered
    /// while draining run in the same call.
    pub async fn run_all(&self) -> usize {
        let mut failures = 0;

        loop {
            let next = self.lock().pop();
            let Some(task) = next else { break };

            let label = task.label().to_string();
            match task.run().await {
                Ok(()) => debug!(task = %label, "cleanup task finished"),
                Err(e) => {
                    failures += 1;
                    warn!(task = %label, error = %e, "cleanup task failed");
                }
            }
        }

        failures
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CleanupTask>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_run_all_runs_each_task_once() {
        let tasks = CleanupTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            let counter = Arc::clone(&counter);
            tasks.register(CleanupTask::new(format!("task-{}", i), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }

        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks.run_all().await, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(tasks.is_empty());

        // Draining again is a no-op
        assert_eq!(tasks.run_all().await, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failing_task_does_not_stop_others() {
        let tasks = CleanupTasks::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        tasks.register(CleanupTask::new("ok", move || async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        tasks.register(CleanupTask::new("broken", || async {
            Err(anyhow::anyhow!("keychain already gone"))
        }));

        assert_eq!(tasks.run_all().await, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clones_share_registry() {
        let tasks = CleanupTasks::new();
        let handle = tasks.clone();
        handle.register(CleanupTask::new("shared", || async { Ok(()) }));
        assert_eq!(tasks.len(), 1);
    }
}
