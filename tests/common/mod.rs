#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::Notify;

use reminder_service::db::{SqliteReminderStore, SqliteSubscriptionRegistry};
use reminder_service::error::PushError;
use reminder_service::models::{
    NewReminder, Priority, PushSubscription, Reminder, ReminderType, SubscriptionKeys,
};
use reminder_service::push::{NotificationPayload, PushTransport};
use reminder_service::services::{NotificationDispatcher, ReminderScheduler, SchedulerConfig};

pub async fn setup_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn subscription(endpoint: &str) -> PushSubscription {
    PushSubscription {
        endpoint: endpoint.to_string(),
        keys: SubscriptionKeys {
            p256dh: "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM".to_string(),
            auth: "tBHItJI5svbpez7KI4CCXg".to_string(),
        },
    }
}

pub fn new_reminder(user_id: &str, title: &str, reminder_time: DateTime<Utc>) -> NewReminder {
    NewReminder {
        user_id: user_id.to_string(),
        title: title.to_string(),
        description: None,
        reminder_type: ReminderType::Assignment,
        priority: Priority::Medium,
        course: None,
        tags: vec![],
        due_date: reminder_time + chrono::Duration::days(1),
        reminder_time,
    }
}

pub async fn seed(store: &SqliteReminderStore, req: NewReminder) -> Reminder {
    store.insert(req).await.expect("Failed to insert reminder")
}

pub enum Behavior {
    Deliver,
    Gone,
    Transient,
    /// Signals `entered`, then blocks until `release` is notified.
    Block { entered: Arc<Notify>, release: Arc<Notify> },
    Hang,
}

/// Transport whose responses are scripted in call order; once the script
/// runs out every send succeeds.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Behavior>>,
    sent: Mutex<Vec<(String, NotificationPayload)>>,
    attempts: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(&self, behavior: Behavior) -> &Self {
        self.script.lock().unwrap().push_back(behavior);
        self
    }

    /// Payloads the transport accepted, with the endpoint they went to.
    pub fn delivered(&self) -> Vec<(String, NotificationPayload)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        *self.attempts.lock().unwrap() += 1;
        let behavior = self.script.lock().unwrap().pop_front().unwrap_or(Behavior::Deliver);

        match behavior {
            Behavior::Deliver => {}
            Behavior::Gone => return Err(PushError::Gone { status: 410 }),
            Behavior::Transient => {
                return Err(PushError::Rejected { status: 503, body: "try later".to_string() });
            }
            Behavior::Block { entered, release } => {
                entered.notify_one();
                release.notified().await;
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }

        self.sent
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.clone()));
        Ok(())
    }
}

pub struct Harness {
    pub pool: SqlitePool,
    pub reminders: Arc<SqliteReminderStore>,
    pub subscriptions: Arc<SqliteSubscriptionRegistry>,
    pub transport: Arc<ScriptedTransport>,
    pub dispatcher: Arc<NotificationDispatcher>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5)).await
    }

    pub async fn with_timeout(send_timeout: Duration) -> Self {
        let pool = setup_db().await;
        let reminders = Arc::new(SqliteReminderStore::new(pool.clone()));
        let subscriptions = Arc::new(SqliteSubscriptionRegistry::new(pool.clone()));
        let transport = Arc::new(ScriptedTransport::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            reminders.clone(),
            subscriptions.clone(),
            transport.clone(),
            send_timeout,
        ));

        Self {
            pool,
            reminders,
            subscriptions,
            transport,
            dispatcher,
        }
    }

    pub fn scheduler(&self, config: SchedulerConfig) -> ReminderScheduler {
        ReminderScheduler::new(self.reminders.clone(), self.dispatcher.clone(), config)
    }

    pub async fn reload(&self, id: &str) -> Reminder {
        use reminder_service::db::ReminderStore;

        self.reminders
            .find_by_id(id)
            .await
            .expect("Failed to load reminder")
            .expect("Reminder not found")
    }
}
