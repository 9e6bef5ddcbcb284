use navigator_lib::notify::{Notification, NotificationPermission, Notifier};

/// Shows notifications as log lines.
pub struct LogNotifier {
    permission: NotificationPermission,
    grant_on_request: bool,
}

impl LogNotifier {
    pub fn new(grant_on_request: bool) -> Self {
        Self {
            permission: NotificationPermission::Default,
            grant_on_request,
        }
    }
}

impl Notifier for LogNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn request_permission(&mut self) {
        if self.permission != NotificationPermission::Default {
            return;
        }

        self.permission = if self.grant_on_request {
            NotificationPermission::Granted
        } else {
            NotificationPermission::Denied
        };
        tracing::debug!("Notification permission: {:?}", self.permission);
    }

    fn notify(&mut self, notification: Notification) {
        tracing::info!(target: "notification", "{}: {}", notification.title, notification.body);
    }
}

#[test]
fn permission_is_asked_once() {
    let mut notifier = LogNotifier::new(false);
    notifier.request_permission();
    assert_eq!(notifier.permission(), NotificationPermission::Denied);

    notifier.grant_on_request = true;
    notifier.request_permission();
    assert_eq!(notifier.permission(), NotificationPermission::Denied);
}
