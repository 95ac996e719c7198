use std::collections::HashSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::reminder::{ReminderOption, resolve_reminder};
use crate::task::{Category, Snapshot, Task, TaskDraft, TaskPatch, is_blank};

/// The owned task and category collections for one session.
///
/// Both collections keep insertion order. Every change goes through the
/// methods here so ids stay unique and category deletion never leaves a
/// task pointing at a removed category.
#[derive(Debug, Clone, Default)]
pub struct Model {
    tasks: Vec<Task>,
    categories: Vec<Category>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut model = Self::new();
        model.replace(snapshot);
        model
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.tasks.clone(),
            categories: self.categories.clone(),
        }
    }

    /// Swaps in persisted state. Duplicate ids keep their first
    /// occurrence; blank-titled tasks are dropped.
    #[tracing::instrument(skip(self, snapshot), fields(tasks = snapshot.tasks.len(), categories = snapshot.categories.len()))]
    pub fn replace(&mut self, snapshot: Snapshot) {
        self.tasks.clear();
        self.categories.clear();

        for category in snapshot.categories {
            let id = category.id();
            if !self.insert_category(category) {
                warn!(category = %id, "dropping category on load");
            }
        }
        for task in snapshot.tasks {
            let id = task.id();
            if !self.insert_task(task) {
                warn!(task = %id, "dropping task on load");
            }
        }

        debug!(
            tasks = self.tasks.len(),
            categories = self.categories.len(),
            "replaced model contents"
        );
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    pub fn category(&self, id: Uuid) -> Option<&Category> {
        self.categories.iter().find(|category| category.id() == id)
    }

    /// Case-insensitive lookup by display name.
    pub fn category_named(&self, name: &str) -> Option<&Category> {
        let name = name.trim();
        self.categories
            .iter()
            .find(|category| category.name.eq_ignore_ascii_case(name))
    }

    /// Returns false (and changes nothing) for a blank title or an id that
    /// is already present.
    pub fn insert_task(&mut self, task: Task) -> bool {
        if task.has_blank_title() {
            debug!(task = %task.id(), "rejecting task with blank title");
            return false;
        }
        if self.task(task.id()).is_some() {
            debug!(task = %task.id(), "rejecting duplicate task id");
            return false;
        }
        self.tasks.push(task);
        true
    }

    pub fn insert_category(&mut self, category: Category) -> bool {
        if is_blank(&category.name) {
            debug!(category = %category.id(), "rejecting category with blank name");
            return false;
        }
        if self.category(category.id()).is_some() {
            debug!(category = %category.id(), "rejecting duplicate category id");
            return false;
        }
        self.categories.push(category);
        true
    }

    pub fn remove_task(&mut self, id: Uuid) -> Option<Task> {
        let idx = self.tasks.iter().position(|task| task.id() == id)?;
        Some(self.tasks.remove(idx))
    }

    /// Removes the category and clears it from every task that used it.
    pub fn remove_category(&mut self, id: Uuid) -> Option<(Category, usize)> {
        let idx = self
            .categories
            .iter()
            .position(|category| category.id() == id)?;
        let category = self.categories.remove(idx);

        let mut cleared = 0;
        for task in &mut self.tasks {
            if task.category_id == Some(id) {
                task.category_id = None;
                cleared += 1;
            }
        }
        Some((category, cleared))
    }

    #[tracing::instrument(skip(self, draft, now), fields(title = %draft.title))]
    pub fn create_task(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Option<Uuid> {
        if is_blank(&draft.title) {
            debug!("{}", CoreError::Validation("task title"));
            return None;
        }

        let mut task = Task::new(draft.title, now);
        task.description = draft.description;
        task.category_id = draft.category_id;
        task.reminder_date = draft.reminder_date;
        task.due_date = draft.due_date;
        if let Some(category_id) = task.category_id
            && self.category(category_id).is_none()
        {
            warn!(category = %category_id, "task created with unknown category");
        }

        let id = task.id();
        if !self.insert_task(task) {
            return None;
        }
        info!(task = %id, "created task");
        Some(id)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_complete(&mut self, id: Uuid) -> CoreResult<bool> {
        let task = self.task_mut(id)?;
        task.completed = !task.completed;
        info!(task = %id, completed = task.completed, "toggled completion");
        Ok(task.completed)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_star(&mut self, id: Uuid) -> CoreResult<bool> {
        let task = self.task_mut(id)?;
        task.is_starred = !task.is_starred;
        debug!(task = %id, starred = task.is_starred, "toggled star");
        Ok(task.is_starred)
    }

    /// Sets or clears the category. The category is not required to exist.
    #[tracing::instrument(skip(self))]
    pub fn update_category(&mut self, id: Uuid, category_id: Option<Uuid>) -> CoreResult<()> {
        if let Some(category_id) = category_id
            && self.category(category_id).is_none()
        {
            warn!(category = %category_id, "assigning unknown category");
        }
        let task = self.task_mut(id)?;
        task.category_id = category_id;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn reschedule(&mut self, id: Uuid, due: DateTime<Utc>) -> CoreResult<()> {
        let task = self.task_mut(id)?;
        task.due_date = Some(due);
        info!(task = %id, due = %due, "rescheduled task");
        Ok(())
    }

    /// Resolves `option` and stores the result. A parse failure leaves the
    /// task as it was.
    #[tracing::instrument(skip(self, now, tz))]
    pub fn set_reminder(
        &mut self,
        id: Uuid,
        option: &ReminderOption,
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> CoreResult<Option<DateTime<Utc>>> {
        if self.task(id).is_none() {
            return Err(CoreError::task_not_found(id));
        }
        let reminder = resolve_reminder(option, now, tz)?;
        let task = self.task_mut(id)?;
        task.reminder_date = reminder;
        Ok(reminder)
    }

    /// Returns whether anything changed.
    #[tracing::instrument(skip(self, patch))]
    pub fn edit_fields(&mut self, id: Uuid, patch: &TaskPatch) -> CoreResult<bool> {
        let task = self.task_mut(id)?;
        let changed = task.apply(patch);
        if changed {
            info!(task = %id, "edited task");
        }
        Ok(changed)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_task(&mut self, id: Uuid) -> CoreResult<Task> {
        let task = self
            .remove_task(id)
            .ok_or_else(|| CoreError::task_not_found(id))?;
        info!(task = %id, "deleted task");
        Ok(task)
    }

    #[tracing::instrument(skip(self))]
    pub fn create_category(&mut self, name: &str, color: &str) -> Option<Uuid> {
        if is_blank(name) {
            debug!("{}", CoreError::Validation("category name"));
            return None;
        }
        let category = Category::new(name.trim(), color.trim());
        let id = category.id();
        if !self.insert_category(category) {
            return None;
        }
        info!(category = %id, "created category");
        Some(id)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_category(&mut self, id: Uuid) -> CoreResult<Category> {
        let (category, cleared) = self
            .remove_category(id)
            .ok_or_else(|| CoreError::category_not_found(id))?;
        info!(category = %id, cleared, "deleted category");
        Ok(category)
    }

    /// Ids referenced by tasks that no longer name a category.
    pub fn dangling_category_ids(&self) -> HashSet<Uuid> {
        self.tasks
            .iter()
            .filter_map(|task| task.category_id)
            .filter(|id| self.category(*id).is_none())
            .collect()
    }

    fn task_mut(&mut self, id: Uuid) -> CoreResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id() == id)
            .ok_or_else(|| CoreError::task_not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::Model;
    use crate::error::CoreError;
    use crate::reminder::ReminderOption;
    use crate::task::{Category, Snapshot, Task, TaskDraft, TaskPatch};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 13, 9, 0, 0)
            .single()
            .expect("valid now")
    }

    #[test]
    fn create_then_lookup() {
        let mut model = Model::new();
        for title in ["Buy milk", "  padded  ", "x", "Écrire une lettre"] {
            let id = model
                .create_task(TaskDraft::titled(title), now())
                .expect("created");
            let task = model.task(id).expect("present");
            assert_eq!(task.title, title);
            assert!(!task.completed);
            assert_eq!(task.created_at(), now());
        }
        assert_eq!(model.tasks().len(), 4);
    }

    #[test]
    fn blank_titles_are_a_no_op() {
        let mut model = Model::new();
        model.create_task(TaskDraft::titled("keep"), now());
        for title in ["", " ", "\t\n", "   "] {
            assert_eq!(model.create_task(TaskDraft::titled(title), now()), None);
        }
        assert_eq!(model.tasks().len(), 1);
        assert!(!model.insert_task(Task::new("  ", now())));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut model = Model::new();
        let id = Uuid::new_v4();
        assert!(model.insert_task(Task::with_id(id, "first", now())));
        assert!(!model.insert_task(Task::with_id(id, "second", now())));
        assert_eq!(model.task(id).map(|t| t.title.as_str()), Some("first"));
    }

    #[test]
    fn toggle_twice_restores_state() {
        let mut model = Model::new();
        let id = model
            .create_task(TaskDraft::titled("flip"), now())
            .expect("created");
        assert_eq!(model.toggle_complete(id), Ok(true));
        assert_eq!(model.toggle_complete(id), Ok(false));
        assert!(!model.task(id).expect("present").completed);
    }

    #[test]
    fn unknown_ids_report_not_found() {
        let mut model = Model::new();
        let ghost = Uuid::new_v4();
        assert_eq!(
            model.toggle_complete(ghost),
            Err(CoreError::task_not_found(ghost))
        );
        assert!(model.delete_task(ghost).is_err());
        assert!(model.reschedule(ghost, now()).is_err());
        assert_eq!(
            model.delete_category(ghost),
            Err(CoreError::category_not_found(ghost))
        );
    }

    #[test]
    fn delete_category_clears_references() {
        let mut model = Model::new();
        let work = Uuid::new_v4();
        model.insert_category(Category::with_id(work, "Work", "#f00"));
        let t1 = model
            .create_task(
                TaskDraft {
                    category_id: Some(work),
                    ..TaskDraft::titled("t1")
                },
                now(),
            )
            .expect("created");
        let t2 = model
            .create_task(TaskDraft::titled("t2"), now())
            .expect("created");

        let removed = model.delete_category(work).expect("deleted");
        assert_eq!(removed.name, "Work");
        assert!(model.categories().is_empty());
        assert!(model.tasks().iter().all(|t| t.category_id != Some(work)));
        assert_eq!(model.task(t1).expect("t1").category_id, None);
        assert_eq!(model.task(t2).expect("t2").category_id, None);
    }

    #[test]
    fn update_category_tolerates_unknown_ids() {
        let mut model = Model::new();
        let id = model
            .create_task(TaskDraft::titled("loose"), now())
            .expect("created");
        let phantom = Uuid::new_v4();
        model.update_category(id, Some(phantom)).expect("updated");
        assert_eq!(model.task(id).expect("task").category_id, Some(phantom));
        assert!(model.dangling_category_ids().contains(&phantom));

        model.update_category(id, None).expect("cleared");
        assert_eq!(model.task(id).expect("task").category_id, None);
    }

    #[test]
    fn edit_fields_is_partial() {
        let mut model = Model::new();
        let id = model
            .create_task(
                TaskDraft {
                    due_date: Some(now()),
                    ..TaskDraft::titled("report")
                },
                now(),
            )
            .expect("created");

        let changed = model
            .edit_fields(
                id,
                &TaskPatch {
                    title: Some("quarterly report".to_string()),
                    ..TaskPatch::default()
                },
            )
            .expect("edited");
        assert!(changed);
        let task = model.task(id).expect("task");
        assert_eq!(task.title, "quarterly report");
        assert_eq!(task.due_date, Some(now()));

        assert_eq!(model.edit_fields(id, &TaskPatch::default()), Ok(false));
    }

    #[test]
    fn failed_reminder_parse_keeps_prior_value() {
        let mut model = Model::new();
        let id = model
            .create_task(TaskDraft::titled("call"), now())
            .expect("created");
        let tz = chrono_tz::UTC;
        let first = model
            .set_reminder(id, &ReminderOption::Tomorrow, now(), &tz)
            .expect("resolved");

        let err = model.set_reminder(
            id,
            &ReminderOption::custom("2024-13-40", "10:00"),
            now(),
            &tz,
        );
        assert!(matches!(err, Err(CoreError::Parse(_))));
        assert_eq!(model.task(id).expect("task").reminder_date, first);

        model
            .set_reminder(id, &ReminderOption::Clear, now(), &tz)
            .expect("cleared");
        assert_eq!(model.task(id).expect("task").reminder_date, None);
    }

    #[test]
    fn create_category_rejects_blank_names() {
        let mut model = Model::new();
        assert_eq!(model.create_category("  ", "#000"), None);
        let id = model.create_category(" Home ", "#0f0").expect("created");
        assert_eq!(model.category(id).expect("category").name, "Home");
        assert_eq!(model.category_named("home").map(|c| c.id()), Some(id));
    }

    #[test]
    fn replace_drops_duplicates_and_blank_titles() {
        let id = Uuid::new_v4();
        let snapshot = Snapshot {
            tasks: vec![
                Task::with_id(id, "one", now()),
                Task::with_id(id, "one again", now()),
                Task::new(" ", now()),
                Task::new("two", now()),
            ],
            categories: vec![Category::new("", "#fff"), Category::new("Errands", "#fff")],
        };

        let model = Model::from_snapshot(snapshot);
        let titles: Vec<&str> = model.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["one", "two"]);
        assert_eq!(model.categories().len(), 1);
        assert_eq!(model.snapshot().tasks.len(), 2);
    }
}
