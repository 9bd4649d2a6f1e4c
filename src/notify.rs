use std::collections::HashSet;

use tracing::{error, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationClass {
    /// The renderer cannot hold the volume in its textures.
    CapabilityWarning,
    /// Progressive pixel-data loading failed.
    LoadError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub class: NotificationClass,
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

/// User-visible notification display provided by the host.
pub trait NotificationSink {
    fn show(&mut self, notification: &Notification);
}

/// Sink that only logs.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn show(&mut self, _notification: &Notification) {}
}

/// Forwards each notification class to the sink at most once per session.
pub struct Notifier {
    sink: Box<dyn NotificationSink>,
    shown: HashSet<NotificationClass>,
}

impl Notifier {
    pub fn new(sink: Box<dyn NotificationSink>) -> Self {
        Self {
            sink,
            shown: HashSet::new(),
        }
    }

    /// Log and show `notification` unless its class was already shown.
    /// Returns whether it reached the sink.
    pub fn notify_once(&mut self, notification: Notification) -> bool {
        match notification.severity {
            Severity::Warning => warn!(class = ?notification.class, "{}", notification.message),
            Severity::Error => error!(class = ?notification.class, "{}", notification.message),
        }
        if !self.shown.insert(notification.class) {
            return false;
        }
        self.sink.show(&notification);
        true
    }

    pub fn was_shown(&self, class: NotificationClass) -> bool {
        self.shown.contains(&class)
    }

    /// Start a new session: every class may be shown again.
    pub fn reset(&mut self) {
        self.shown.clear();
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Box::new(LogSink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Collect(Rc<RefCell<Vec<Notification>>>);

    impl NotificationSink for Collect {
        fn show(&mut self, notification: &Notification) {
            self.0.borrow_mut().push(notification.clone());
        }
    }

    fn load_error(message: &str) -> Notification {
        Notification {
            class: NotificationClass::LoadError,
            severity: Severity::Error,
            title: "3D view load error".into(),
            message: message.into(),
        }
    }

    #[test]
    fn each_class_is_shown_once() {
        let sink = Collect::default();
        let mut notifier = Notifier::new(Box::new(sink.clone()));

        assert!(notifier.notify_once(load_error("first")));
        assert!(!notifier.notify_once(load_error("second")));
        assert!(notifier.was_shown(NotificationClass::LoadError));
        assert!(!notifier.was_shown(NotificationClass::CapabilityWarning));
        assert_eq!(sink.0.borrow().len(), 1);
        assert_eq!(sink.0.borrow()[0].message, "first");
    }

    #[test]
    fn reset_allows_showing_again() {
        let sink = Collect::default();
        let mut notifier = Notifier::new(Box::new(sink.clone()));
        notifier.notify_once(load_error("a"));
        notifier.reset();
        assert!(notifier.notify_once(load_error("b")));
        assert_eq!(sink.0.borrow().len(), 2);
    }
}
