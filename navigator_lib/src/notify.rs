use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationPermission {
    /// Not asked yet.
    Default,
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Visual, permission-gated alerts. Everything here is best-effort.
pub trait Notifier {
    fn permission(&self) -> NotificationPermission;

    /// Asks the user once. Must not block.
    fn request_permission(&mut self);

    fn notify(&mut self, notification: Notification);

    /// Shows `notification` only when permission has been granted.
    fn notify_if_permitted(&mut self, notification: Notification) -> bool {
        if self.permission() == NotificationPermission::Granted {
            self.notify(notification);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        permission: NotificationPermission,
        shown: Vec<Notification>,
    }

    impl Notifier for Recorder {
        fn permission(&self) -> NotificationPermission {
            self.permission
        }

        fn request_permission(&mut self) {
            self.permission = NotificationPermission::Granted;
        }

        fn notify(&mut self, notification: Notification) {
            self.shown.push(notification);
        }
    }

    #[test]
    fn only_notifies_when_granted() {
        let mut recorder = Recorder {
            permission: NotificationPermission::Default,
            shown: Vec::new(),
        };

        assert!(!recorder.notify_if_permitted(Notification::new("Near Fort", "420m")));
        recorder.request_permission();
        assert!(recorder.notify_if_permitted(Notification::new("Near Fort", "420m")));
        assert_eq!(recorder.shown.len(), 1);
    }
}
