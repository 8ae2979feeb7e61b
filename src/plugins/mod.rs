pub mod notifiers;
pub mod traits;

pub use notifiers::{DiscordNotifier, LogNotifier};
pub use traits::{NotificationResult, Notifier};
