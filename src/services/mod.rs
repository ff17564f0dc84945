pub mod notification;
pub mod scheduler;

pub use notification::{DispatchOutcome, NotificationDispatcher};
pub use scheduler::{ReminderScheduler, SchedulerConfig, SchedulerState, TickReport};
