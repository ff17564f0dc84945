pub mod reminder;
pub mod subscription;

pub use reminder::{NewReminder, Priority, Reminder, ReminderType};
pub use subscription::{PushSubscription, SubscriptionKeys};
