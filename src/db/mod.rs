pub mod repository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::{NewReminder, PushSubscription, Reminder};

/// Read/flag access to the reminder records the engine delivers.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Unsent, uncompleted reminders with `reminder_time` in `[start, end)`.
    async fn find_due(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Reminder>, AppError>;

    /// Conditional `is_sent` update. `Ok(false)` means the reminder was
    /// already marked (or no longer exists).
    async fn mark_sent(&self, id: &str) -> Result<bool, AppError>;
}

/// At most one push subscription per user.
#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<PushSubscription>, AppError>;
    async fn set(&self, user_id: &str, subscription: &PushSubscription) -> Result<(), AppError>;
    async fn unset(&self, user_id: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct SqliteReminderStore {
    db: SqlitePool,
}

impl SqliteReminderStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn insert(&self, req: NewReminder) -> Result<Reminder, AppError> {
        let req = req.normalized().map_err(AppError::BadRequest)?;
        repository::insert_reminder(&self.db, req).await
    }
}

#[async_trait]
impl ReminderStore for SqliteReminderStore {
    async fn find_due(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, AppError> {
        Ok(repository::fetch_due_reminders(&self.db, start, end).await?)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Reminder>, AppError> {
        Ok(repository::find_reminder_by_id(&self.db, id).await?)
    }

    async fn mark_sent(&self, id: &str) -> Result<bool, AppError> {
        Ok(repository::mark_reminder_sent(&self.db, id).await?)
    }
}

#[derive(Clone)]
pub struct SqliteSubscriptionRegistry {
    db: SqlitePool,
}

impl SqliteSubscriptionRegistry {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SubscriptionRegistry for SqliteSubscriptionRegistry {
    async fn get(&self, user_id: &str) -> Result<Option<PushSubscription>, AppError> {
        Ok(repository::find_subscription(&self.db, user_id).await?)
    }

    async fn set(&self, user_id: &str, subscription: &PushSubscription) -> Result<(), AppError> {
        subscription.validate().map_err(AppError::BadRequest)?;
        repository::upsert_subscription(&self.db, user_id, subscription).await?;
        Ok(())
    }

    async fn unset(&self, user_id: &str) -> Result<(), AppError> {
        if !repository::delete_subscription(&self.db, user_id).await? {
            tracing::debug!("no push subscription to remove for user {}", user_id);
        }
        Ok(())
    }
}
