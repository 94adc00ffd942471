pub mod notifier;

pub use notifier::{Notification, NotificationResult, Notifier};
#[cfg(test)]
pub use notifier::MockNotifier;
