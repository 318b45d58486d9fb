use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a background session task.
///
/// Exposes the task's latest status and stops the task when dropped.
#[derive(Debug)]
pub struct TaskHandle<T> {
    status: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T: Clone> TaskHandle<T> {
    /// Wraps a spawned task and the receiving end of its status channel.
    pub fn new(status: watch::Receiver<T>, task: JoinHandle<()>) -> Self {
        Self { status, task }
    }

    /// The most recently published status.
    pub fn status(&self) -> T {
        self.status.borrow().clone()
    }

    /// A receiver that is notified whenever the status changes.
    pub fn watch(&self) -> watch::Receiver<T> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the task.
    pub fn abort(&self) {
        self.task.abort();
    }
}

impl<T> Drop for TaskHandle<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
