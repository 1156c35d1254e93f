use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Completed,
}

impl Status {
    pub fn toggled(self) -> Self {
        match self {
            Status::Pending => Status::Completed,
            Status::Completed => Status::Pending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Completed => "completed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "completed" => Ok(Status::Completed),
            other => Err(anyhow!("invalid status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(anyhow!("invalid priority: {other}")),
        }
    }
}

/// A persisted task. Field names match the stored JSON layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub description: String,

    pub status: Status,

    pub priority: Priority,

    /// Empty when the task has no due date.
    #[serde(default)]
    pub due_date: String,

    /// Free text, expected to look like `"<lat>,<lng>"`. Empty when unset.
    #[serde(default)]
    pub location: String,
}

impl Task {
    pub fn from_draft(id: String, draft: &TaskDraft) -> Self {
        Self {
            id,
            description: draft.description.clone(),
            status: draft.status,
            priority: draft.priority,
            due_date: draft.due_date.clone(),
            location: draft.location.clone(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    pub fn due_date(&self) -> Option<&str> {
        non_empty(&self.due_date)
    }

    pub fn location(&self) -> Option<&str> {
        non_empty(&self.location)
    }
}

/// The editable fields of a task that has not been created yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub due_date: String,
    pub location: String,
}

impl TaskDraft {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn is_blank(&self) -> bool {
        self.description.trim().is_empty()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Millisecond timestamp id, bumped past any id already taken.
pub fn next_task_id(now: DateTime<Utc>, existing: &[Task]) -> String {
    let mut candidate = now.timestamp_millis();
    while existing.iter().any(|t| t.id == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}
