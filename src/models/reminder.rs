use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderType {
    Assignment,
    Exam,
    Event,
    Deadline,
    #[default]
    Custom,
}

impl ReminderType {
    pub const ALL: [ReminderType; 5] = [
        ReminderType::Assignment,
        ReminderType::Exam,
        ReminderType::Event,
        ReminderType::Deadline,
        ReminderType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderType::Assignment => "assignment",
            ReminderType::Exam => "exam",
            ReminderType::Event => "event",
            ReminderType::Deadline => "deadline",
            ReminderType::Custom => "custom",
        }
    }

    /// Leading marker of a notification body.
    pub fn marker(&self) -> &'static str {
        match self {
            ReminderType::Assignment => "📝",
            ReminderType::Exam => "📚",
            ReminderType::Event => "📅",
            ReminderType::Deadline => "⏰",
            ReminderType::Custom => "🔔",
        }
    }
}

impl FromStr for ReminderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReminderType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown reminder type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Leading marker of a notification title.
    pub fn marker(&self) -> &'static str {
        match self {
            Priority::Low => "📌",
            Priority::Medium => "⚠️",
            Priority::High => "🔴",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown priority: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub reminder_type: ReminderType,
    pub priority: Priority,
    pub course: Option<String>,
    pub tags: Vec<String>,
    pub due_date: DateTime<Utc>,
    pub reminder_time: DateTime<Utc>,
    pub is_completed: bool,
    pub is_sent: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReminder {
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub reminder_type: ReminderType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub due_date: DateTime<Utc>,
    pub reminder_time: DateTime<Utc>,
}

impl NewReminder {
    /// Trims free-text fields and enforces the length bounds.
    pub fn normalized(mut self) -> Result<Self, String> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err("Please provide a title".to_string());
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(format!("Title cannot be more than {} characters", MAX_TITLE_LEN));
        }

        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(description) = &self.description {
            if description.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(format!(
                    "Description cannot be more than {} characters",
                    MAX_DESCRIPTION_LEN
                ));
            }
        }

        self.course = self
            .course
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self.tags = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_reminder(title: &str) -> NewReminder {
        let now = Utc::now();
        NewReminder {
            user_id: "user-1".to_string(),
            title: title.to_string(),
            description: None,
            reminder_type: ReminderType::default(),
            priority: Priority::default(),
            course: None,
            tags: vec![],
            due_date: now + Duration::days(1),
            reminder_time: now,
        }
    }

    #[test]
    fn every_variant_has_a_distinct_marker_and_round_trips() {
        let type_markers: std::collections::HashSet<_> =
            ReminderType::ALL.iter().map(|t| t.marker()).collect();
        assert_eq!(type_markers.len(), ReminderType::ALL.len());
        for t in ReminderType::ALL {
            assert_eq!(t.as_str().parse::<ReminderType>(), Ok(t));
        }

        let priority_markers: std::collections::HashSet<_> =
            Priority::ALL.iter().map(|p| p.marker()).collect();
        assert_eq!(priority_markers.len(), Priority::ALL.len());
        for p in Priority::ALL {
            assert_eq!(p.as_str().parse::<Priority>(), Ok(p));
        }
    }

    #[test]
    fn defaults_match_the_schema() {
        assert_eq!(ReminderType::default(), ReminderType::Custom);
        assert_eq!(Priority::default(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn normalized_trims_and_bounds_title() {
        let ok = new_reminder("  Calculus quiz  ").normalized().expect("valid");
        assert_eq!(ok.title, "Calculus quiz");

        assert!(new_reminder("   ").normalized().is_err());
        assert!(new_reminder(&"x".repeat(MAX_TITLE_LEN + 1)).normalized().is_err());
        assert!(new_reminder(&"x".repeat(MAX_TITLE_LEN)).normalized().is_ok());
    }

    #[test]
    fn normalized_drops_blank_optionals() {
        let mut req = new_reminder("Lab report");
        req.description = Some("   ".to_string());
        req.course = Some(" CS101 ".to_string());
        req.tags = vec![" lab ".to_string(), "".to_string()];

        let req = req.normalized().expect("valid");
        assert_eq!(req.description, None);
        assert_eq!(req.course.as_deref(), Some("CS101"));
        assert_eq!(req.tags, vec!["lab".to_string()]);
    }
}
