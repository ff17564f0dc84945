use std::sync::Arc;

use sqlx::SqlitePool;

use crate::db::SubscriptionRegistry;
use crate::services::ReminderScheduler;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub subscriptions: Arc<dyn SubscriptionRegistry>,
    pub scheduler: Arc<ReminderScheduler>,
}
