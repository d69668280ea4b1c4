pub mod notifier;
pub mod sender;
pub mod types;

pub use notifier::Notifier;
pub use sender::{HttpNotificationSender, NotificationSender};
pub use types::*;
