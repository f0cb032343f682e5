//! User-facing notification surfaces.
//!
//! The client raises an in-app toast for high-priority notifications and, when the
//! user granted permission, a native OS notification. Both are reached through
//! [`NotificationSink`] so hosts can plug in whatever UI they have.

use crate::messaging::NotificationPayload;

/// Permission state of the native notification API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotificationPermission {
    /// Not asked yet
    #[default]
    Default,
    Granted,
    Denied,
}

pub trait NotificationSink: Send + Sync {
    /// Current native notification permission
    fn permission(&self) -> NotificationPermission;

    /// Ask the user for native notification permission. Must not block.
    fn request_permission(&self) {}

    /// Show a transient in-app alert
    fn toast(&self, notification: &NotificationPayload);

    /// Raise a native OS notification. Urgent ones stay until the user dismisses them.
    fn native(&self, notification: &NotificationPayload, require_interaction: bool);
}

/// Sink that only writes to the log; used when the host provides no UI
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Denied
    }

    fn toast(&self, notification: &NotificationPayload) {
        tracing::info!(
            priority = ?notification.priority,
            "{}: {}",
            notification.display_title(),
            notification.message.as_deref().unwrap_or_default()
        );
    }

    fn native(&self, notification: &NotificationPayload, require_interaction: bool) {
        tracing::info!(
            require_interaction,
            "Native notification: {}",
            notification.display_title()
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every call so tests can count side effects
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub permission: Mutex<NotificationPermission>,
        pub permission_requests: Mutex<usize>,
        pub toasts: Mutex<Vec<NotificationPayload>>,
        pub natives: Mutex<Vec<(NotificationPayload, bool)>>,
    }

    impl RecordingSink {
        pub fn granted() -> Self {
            let sink = Self::default();
            *sink.permission.lock().unwrap() = NotificationPermission::Granted;
            sink
        }

        pub fn toast_count(&self) -> usize {
            self.toasts.lock().unwrap().len()
        }

        pub fn native_count(&self) -> usize {
            self.natives.lock().unwrap().len()
        }
    }

    impl NotificationSink for RecordingSink {
        fn permission(&self) -> NotificationPermission {
            *self.permission.lock().unwrap()
        }

        fn request_permission(&self) {
            *self.permission_requests.lock().unwrap() += 1;
        }

        fn toast(&self, notification: &NotificationPayload) {
            self.toasts.lock().unwrap().push(notification.clone());
        }

        fn native(&self, notification: &NotificationPayload, require_interaction: bool) {
            self.natives
                .lock()
                .unwrap()
                .push((notification.clone(), require_interaction));
        }
    }
}
