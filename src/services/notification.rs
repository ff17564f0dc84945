use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_BADGE, DEFAULT_ICON};
use crate::db::{ReminderStore, SubscriptionRegistry};
use crate::error::{AppError, PushError};
use crate::models::{PushSubscription, Reminder};
use crate::push::{NotificationData, NotificationPayload, PushTransport};

/// Client-side route a notification click opens.
pub const NOTIFICATION_ROUTE: &str = "/chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Already sent, completed or deleted by the time it was looked up.
    Skipped,
    NoSubscription,
    Delivered,
    SubscriptionInvalidated,
    DeliveryFailed,
}

pub fn format_due_date(due_date: &DateTime<Utc>) -> String {
    due_date.format("%-m/%-d/%Y").to_string()
}

pub fn notification_title(reminder: &Reminder) -> String {
    format!("{} {}", reminder.priority.marker(), reminder.title)
}

pub fn notification_body(reminder: &Reminder) -> String {
    let mut body = format!(
        "{} Due: {}",
        reminder.reminder_type.marker(),
        format_due_date(&reminder.due_date)
    );
    if let Some(description) = &reminder.description {
        body.push_str(", ");
        body.push_str(description);
    }
    body
}

pub fn build_payload(
    reminder: &Reminder,
    icon: &str,
    badge: &str,
    now: DateTime<Utc>,
) -> NotificationPayload {
    NotificationPayload {
        title: notification_title(reminder),
        body: notification_body(reminder),
        icon: icon.to_string(),
        badge: badge.to_string(),
        data: NotificationData {
            reminder_id: reminder.id.clone(),
            reminder_type: reminder.reminder_type,
            due_date: reminder.due_date.to_rfc3339_opts(SecondsFormat::Millis, true),
            url: NOTIFICATION_ROUTE.to_string(),
        },
        timestamp: now.timestamp_millis(),
    }
}

/// Turns one due reminder into a single push attempt and records the result.
///
/// `is_sent` is written only after the transport confirmed delivery, and
/// only through the store's conditional update.
pub struct NotificationDispatcher {
    reminders: Arc<dyn ReminderStore>,
    subscriptions: Arc<dyn SubscriptionRegistry>,
    transport: Arc<dyn PushTransport>,
    send_timeout: Duration,
    icon: String,
    badge: String,
}

impl NotificationDispatcher {
    pub fn new(
        reminders: Arc<dyn ReminderStore>,
        subscriptions: Arc<dyn SubscriptionRegistry>,
        transport: Arc<dyn PushTransport>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            reminders,
            subscriptions,
            transport,
            send_timeout,
            icon: DEFAULT_ICON.to_string(),
            badge: DEFAULT_BADGE.to_string(),
        }
    }

    pub fn with_assets(mut self, icon: impl Into<String>, badge: impl Into<String>) -> Self {
        self.icon = icon.into();
        self.badge = badge.into();
        self
    }

    pub async fn dispatch(&self, reminder: &Reminder) -> Result<DispatchOutcome, AppError> {
        // The candidate may be stale if another tick or a user edit got there first.
        let current = match self.reminders.find_by_id(&reminder.id).await? {
            Some(r) if !r.is_sent && !r.is_completed => r,
            _ => {
                debug!("Skipping reminder {} (sent, completed or gone)", reminder.id);
                return Ok(DispatchOutcome::Skipped);
            }
        };

        let Some(subscription) = self.subscriptions.get(&current.user_id).await? else {
            info!("No push subscription found for user: {}", current.user_id);
            return Ok(DispatchOutcome::NoSubscription);
        };

        let payload = build_payload(&current, &self.icon, &self.badge, Utc::now());

        match self.deliver(&subscription, &payload).await {
            Ok(()) => {
                if !self.reminders.mark_sent(&current.id).await? {
                    debug!("Reminder {} was already marked sent", current.id);
                }
                info!("Push notification sent for reminder {} to user {}", current.id, current.user_id);
                Ok(DispatchOutcome::Delivered)
            }
            Err(e) if e.is_permanent() => {
                warn!(
                    "Push subscription for user {} is no longer valid ({}), removing it",
                    current.user_id, e
                );
                self.subscriptions.unset(&current.user_id).await?;
                Ok(DispatchOutcome::SubscriptionInvalidated)
            }
            Err(e) => {
                warn!("Failed to deliver reminder {}: {}", current.id, e);
                Ok(DispatchOutcome::DeliveryFailed)
            }
        }
    }

    async fn deliver(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        tokio::time::timeout(self.send_timeout, self.transport.send(subscription, payload))
            .await
            .map_err(|_| PushError::Timeout(self.send_timeout))?
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::models::{Priority, ReminderType};

    fn reminder(priority: Priority, reminder_type: ReminderType, description: Option<&str>) -> Reminder {
        let due = Utc.with_ymd_and_hms(2026, 3, 7, 9, 30, 0).unwrap();
        Reminder {
            id: "rem-1".to_string(),
            user_id: "student-1".to_string(),
            title: "Organic chemistry final".to_string(),
            description: description.map(str::to_string),
            reminder_type,
            priority,
            course: None,
            tags: vec![],
            due_date: due,
            reminder_time: due - Duration::hours(2),
            is_completed: false,
            is_sent: false,
            created_at: due.to_rfc3339(),
            updated_at: due.to_rfc3339(),
        }
    }

    #[test]
    fn title_carries_priority_marker() {
        assert_eq!(
            notification_title(&reminder(Priority::High, ReminderType::Exam, None)),
            "🔴 Organic chemistry final"
        );
        assert_eq!(
            notification_title(&reminder(Priority::Medium, ReminderType::Exam, None)),
            "⚠️ Organic chemistry final"
        );
        assert_eq!(
            notification_title(&reminder(Priority::Low, ReminderType::Exam, None)),
            "📌 Organic chemistry final"
        );
    }

    #[test]
    fn body_carries_type_marker_due_date_and_description() {
        assert_eq!(
            notification_body(&reminder(Priority::High, ReminderType::Exam, None)),
            "📚 Due: 3/7/2026"
        );
        assert_eq!(
            notification_body(&reminder(Priority::Low, ReminderType::Assignment, Some("Bring a calculator"))),
            "📝 Due: 3/7/2026, Bring a calculator"
        );
        assert!(notification_body(&reminder(Priority::Low, ReminderType::Deadline, None)).starts_with("⏰ "));
        assert!(notification_body(&reminder(Priority::Low, ReminderType::Event, None)).starts_with("📅 "));
        assert!(notification_body(&reminder(Priority::Low, ReminderType::Custom, None)).starts_with("🔔 "));
    }

    #[test]
    fn payload_is_deterministic_for_a_given_instant() {
        let r = reminder(Priority::High, ReminderType::Exam, None);
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 7, 30, 0).unwrap();

        let payload = build_payload(&r, "/icon.png", "/badge.png", now);
        assert_eq!(payload, build_payload(&r, "/icon.png", "/badge.png", now));
        assert_eq!(payload.timestamp, now.timestamp_millis());
        assert_eq!(payload.data.reminder_id, "rem-1");
        assert_eq!(payload.data.url, "/chat");
        assert_eq!(payload.data.due_date, "2026-03-07T09:30:00.000Z");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["data"]["reminderId"], "rem-1");
        assert_eq!(json["data"]["type"], "exam");
        assert_eq!(json["icon"], "/icon.png");
        assert_eq!(json["badge"], "/badge.png");
    }
}
