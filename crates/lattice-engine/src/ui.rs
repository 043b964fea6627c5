//! User-interaction collaborator
//!
//! The engine never talks to a screen. Commands that need a decision or must
//! report something go through a [`UiBridge`] injected at construction.

use std::cell::RefCell;
use std::rc::Rc;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Warning,
}

/// A message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
}

impl Notification {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Warning,
            text: text.into(),
        }
    }
}

/// Synchronous user interaction
///
/// Only the returned decision matters to the engine; how it is obtained is up
/// to the implementor.
pub trait UiBridge {
    fn notify_user(&self, notification: Notification);

    fn raise_error(&self, message: &str);

    /// `true` accepts, `false` declines
    fn ask_confirmation(&self, message: &str) -> bool;

    fn prompt_for_text(&self, title: &str, default: Option<&str>) -> Option<String>;
}

impl<T: UiBridge + ?Sized> UiBridge for Rc<T> {
    fn notify_user(&self, notification: Notification) {
        (**self).notify_user(notification)
    }

    fn raise_error(&self, message: &str) {
        (**self).raise_error(message)
    }

    fn ask_confirmation(&self, message: &str) -> bool {
        (**self).ask_confirmation(message)
    }

    fn prompt_for_text(&self, title: &str, default: Option<&str>) -> Option<String> {
        (**self).prompt_for_text(title, default)
    }
}

/// Bridge for headless and test contexts: declines every confirmation
///
/// Notifications and errors are logged and kept for inspection.
#[derive(Debug, Default)]
pub struct HeadlessUi {
    notifications: RefCell<Vec<Notification>>,
    errors: RefCell<Vec<String>>,
}

impl HeadlessUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.borrow().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }
}

impl UiBridge for HeadlessUi {
    fn notify_user(&self, notification: Notification) {
        log::info!("notification: {}", notification.text);
        self.notifications.borrow_mut().push(notification);
    }

    fn raise_error(&self, message: &str) {
        log::error!("{}", message);
        self.errors.borrow_mut().push(message.to_string());
    }

    fn ask_confirmation(&self, message: &str) -> bool {
        log::debug!("declining confirmation: {}", message);
        false
    }

    fn prompt_for_text(&self, _title: &str, _default: Option<&str>) -> Option<String> {
        None
    }
}

/// Bridge that accepts every confirmation
#[derive(Debug, Default)]
pub struct AcceptingUi;

impl UiBridge for AcceptingUi {
    fn notify_user(&self, notification: Notification) {
        log::info!("notification: {}", notification.text);
    }

    fn raise_error(&self, message: &str) {
        log::error!("{}", message);
    }

    fn ask_confirmation(&self, _message: &str) -> bool {
        true
    }

    fn prompt_for_text(&self, _title: &str, default: Option<&str>) -> Option<String> {
        default.map(str::to_string)
    }
}
