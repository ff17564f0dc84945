use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewReminder, PushSubscription, Reminder, SubscriptionKeys};

const REMINDER_COLUMNS: &str = "id, user_id, title, description, reminder_type, priority, course, tags, due_date, reminder_time, is_completed, is_sent, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ReminderRow {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    reminder_type: String,
    priority: String,
    course: Option<String>,
    tags: String,
    due_date: i64,
    reminder_time: i64,
    is_completed: bool,
    is_sent: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = sqlx::Error;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        let tags: Vec<String> =
            serde_json::from_str(&row.tags).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Reminder {
            reminder_type: row.reminder_type.parse().map_err(decode_error)?,
            priority: row.priority.parse().map_err(decode_error)?,
            due_date: from_millis(row.due_date)?,
            reminder_time: from_millis(row.reminder_time)?,
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            course: row.course,
            tags,
            is_completed: row.is_completed,
            is_sent: row.is_sent,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_error(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| decode_error(format!("timestamp out of range: {}", ms)))
}

/// Unsent, uncompleted reminders whose `reminder_time` lies in `[start, end)`.
pub async fn fetch_due_reminders(
    db: &SqlitePool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Reminder>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM reminders
         WHERE reminder_time >= ?1 AND reminder_time < ?2
           AND is_sent = 0 AND is_completed = 0
         ORDER BY reminder_time ASC",
        REMINDER_COLUMNS
    );

    sqlx::query_as::<_, ReminderRow>(&sql)
        .bind(start.timestamp_millis())
        .bind(end.timestamp_millis())
        .fetch_all(db)
        .await?
        .into_iter()
        .map(Reminder::try_from)
        .collect()
}

pub async fn find_reminder_by_id(db: &SqlitePool, id: &str) -> Result<Option<Reminder>, sqlx::Error> {
    let sql = format!("SELECT {} FROM reminders WHERE id = ?", REMINDER_COLUMNS);

    sqlx::query_as::<_, ReminderRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?
        .map(Reminder::try_from)
        .transpose()
}

pub async fn insert_reminder(db: &SqlitePool, req: NewReminder) -> Result<Reminder, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let tags = serde_json::to_string(&req.tags)?;

    sqlx::query(
        r#"
        INSERT INTO reminders
            (id, user_id, title, description, reminder_type, priority, course, tags,
            due_date, reminder_time, is_completed, is_sent, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, 0, ?11, ?11)
        "#,
    )
    .bind(&id)
    .bind(&req.user_id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(req.reminder_type.as_str())
    .bind(req.priority.as_str())
    .bind(&req.course)
    .bind(&tags)
    .bind(req.due_date.timestamp_millis())
    .bind(req.reminder_time.timestamp_millis())
    .bind(&now)
    .execute(db)
    .await?;

    Ok(Reminder {
        id,
        user_id: req.user_id,
        title: req.title,
        description: req.description,
        reminder_type: req.reminder_type,
        priority: req.priority,
        course: req.course,
        tags: req.tags,
        due_date: req.due_date,
        reminder_time: req.reminder_time,
        is_completed: false,
        is_sent: false,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Flips `is_sent` only if it is still false. Returns whether this call
/// performed the transition.
pub async fn mark_reminder_sent(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE reminders
        SET is_sent = 1,
            updated_at = ?2
        WHERE id = ?1 AND is_sent = 0
        "#,
    )
    .bind(id)
    .bind(now)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

#[derive(Debug, FromRow)]
struct SubscriptionRow {
    endpoint: String,
    p256dh: String,
    auth: String,
}

impl From<SubscriptionRow> for PushSubscription {
    fn from(row: SubscriptionRow) -> Self {
        PushSubscription {
            endpoint: row.endpoint,
            keys: SubscriptionKeys {
                p256dh: row.p256dh,
                auth: row.auth,
            },
        }
    }
}

pub async fn find_subscription(
    db: &SqlitePool,
    user_id: &str,
) -> Result<Option<PushSubscription>, sqlx::Error> {
    let row = sqlx::query_as::<_, SubscriptionRow>(
        "SELECT endpoint, p256dh, auth FROM push_subscriptions WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    Ok(row.map(PushSubscription::from))
}

/// Last write wins: any earlier subscription for the user is replaced.
pub async fn upsert_subscription(
    db: &SqlitePool,
    user_id: &str,
    subscription: &PushSubscription,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO push_subscriptions (user_id, endpoint, p256dh, auth, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        ON CONFLICT(user_id) DO UPDATE SET
            endpoint = excluded.endpoint,
            p256dh = excluded.p256dh,
            auth = excluded.auth,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(&subscription.endpoint)
    .bind(&subscription.keys.p256dh)
    .bind(&subscription.keys.auth)
    .bind(now)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn delete_subscription(db: &SqlitePool, user_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM push_subscriptions WHERE user_id = ?")
        .bind(user_id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}
