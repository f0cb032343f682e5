use std::collections::HashMap;
use tokio::task::JoinHandle;

/// Background tasks owned by a client; each kind has at most one live task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Reads inbound frames and routes them
    Reader,
    /// Periodic ping sender
    Heartbeat,
    /// One-shot delayed reconnect
    Reconnect,
}

/// Manages background tasks with proper lifecycle handling
#[derive(Debug, Default)]
pub struct TaskManager {
    handles: HashMap<TaskKind, JoinHandle<()>>,
}

impl TaskManager {
    /// Create a new empty task manager
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }

    /// Spawn a task into a slot, aborting whatever occupied it before
    pub fn spawn<F>(&mut self, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        if let Some(previous) = self.handles.insert(kind, handle) {
            tracing::debug!("Replacing running {:?} task", kind);
            previous.abort();
        }
    }

    /// Abort the task in a slot, if any
    pub fn abort(&mut self, kind: TaskKind) -> bool {
        match self.handles.remove(&kind) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Forget a slot without aborting it. Used by a task that is clearing its own slot.
    pub fn detach(&mut self, kind: TaskKind) {
        self.handles.remove(&kind);
    }

    /// Whether a slot holds a task that has not finished yet
    pub fn is_active(&self, kind: TaskKind) -> bool {
        self.handles
            .get(&kind)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Abort all tasks without waiting
    pub fn abort_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawn_replaces_previous_task_of_same_kind() {
        let mut tasks = TaskManager::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let first = tx.clone();
        tasks.spawn(TaskKind::Reconnect, async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = first.send("first");
        });
        tasks.spawn(TaskKind::Reconnect, async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send("second");
        });

        assert_eq!(rx.recv().await, Some("second"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_abort_all_clears_slots() {
        let mut tasks = TaskManager::new();
        tasks.spawn(TaskKind::Heartbeat, std::future::pending());
        tasks.spawn(TaskKind::Reader, std::future::pending());
        assert!(tasks.is_active(TaskKind::Heartbeat));

        tasks.abort_all();
        assert!(!tasks.is_active(TaskKind::Heartbeat));
        assert!(!tasks.is_active(TaskKind::Reader));
        assert!(!tasks.abort(TaskKind::Reader));
    }
}
