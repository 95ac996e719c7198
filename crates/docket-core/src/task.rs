use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CATEGORY_COLOR: &str = "#4299e1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    id: Uuid,

    pub title: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    created_at: DateTime<Utc>,

    #[serde(default)]
    pub is_starred: bool,
}

impl Task {
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::with_id(Uuid::new_v4(), title, now)
    }

    pub fn with_id(id: Uuid, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            completed: false,
            description: None,
            category_id: None,
            reminder_date: None,
            due_date: None,
            created_at: now,
            is_starred: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn has_blank_title(&self) -> bool {
        is_blank(&self.title)
    }

    /// Merges `patch` into the task. Returns whether any field changed.
    pub fn apply(&mut self, patch: &TaskPatch) -> bool {
        let before = self.clone();

        if let Some(title) = patch.title.as_deref()
            && !is_blank(title)
        {
            self.title = title.to_string();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = category_id;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(reminder_date) = patch.reminder_date {
            self.reminder_date = reminder_date;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(is_starred) = patch.is_starred {
            self.is_starred = is_starred;
        }

        *self != before
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    id: Uuid,
    pub name: String,
    pub color: String,
}

impl Category {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name, color)
    }

    pub fn with_id(id: Uuid, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Fields supplied when a task is created.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub reminder_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update. `None` leaves a field untouched; for clearable fields
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<Uuid>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub reminder_date: Option<Option<DateTime<Utc>>>,
    pub completed: Option<bool>,
    pub is_starred: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

pub(crate) fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Task, TaskPatch};

    #[test]
    fn patch_leaves_absent_fields_untouched() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 15, 8, 0, 0)
            .single()
            .expect("valid now");
        let mut task = Task::new("Pay rent", now);
        task.due_date = Some(now);

        let changed = task.apply(&TaskPatch {
            title: Some("Pay rent today".to_string()),
            ..TaskPatch::default()
        });

        assert!(changed);
        assert_eq!(task.title, "Pay rent today");
        assert_eq!(task.due_date, Some(now));
        assert_eq!(task.created_at(), now);
    }

    #[test]
    fn patch_distinguishes_clear_from_absent() {
        let now = Utc::now();
        let mut task = Task::new("Call mom", now);
        task.reminder_date = Some(now);

        task.apply(&TaskPatch {
            reminder_date: Some(None),
            ..TaskPatch::default()
        });
        assert_eq!(task.reminder_date, None);
    }

    #[test]
    fn blank_patch_title_is_ignored() {
        let mut task = Task::new("Water plants", Utc::now());
        let changed = task.apply(&TaskPatch {
            title: Some("   ".to_string()),
            ..TaskPatch::default()
        });
        assert!(!changed);
        assert_eq!(task.title, "Water plants");
    }

    #[test]
    fn snapshot_dates_serialize_as_iso_strings() {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 15, 9, 30, 0)
            .single()
            .expect("valid now");
        let mut task = Task::new("Dentist", now);
        task.due_date = Some(now);

        let json = serde_json::to_value(&task).expect("serialize task");
        assert_eq!(json["dueDate"], "2024-03-15T09:30:00Z");
        assert_eq!(json["createdAt"], "2024-03-15T09:30:00Z");
        assert_eq!(json["completed"], false);

        let back: Task = serde_json::from_value(json).expect("deserialize task");
        assert_eq!(back, task);
    }
}
