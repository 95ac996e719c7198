use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::trace;
use uuid::Uuid;

use crate::datetime::to_local_date;
use crate::task::{
  Category,
  Task
};

pub const UNCATEGORIZED_KEY: &str =
  "uncategorized";

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum CategorySelector {
  #[default]
  All,
  Uncategorized,
  Category(Uuid)
}

impl CategorySelector {
  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Uncategorized => {
        task.category_id.is_none()
      }
      | Self::Category(id) => {
        task.category_id == Some(*id)
      }
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum Tab {
  #[default]
  All,
  Today,
  Completed
}

impl Tab {
  /// Unknown keys behave like `all`.
  pub fn from_key(key: &str) -> Self {
    match key
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "today" => Self::Today,
      | "completed" | "done" => {
        Self::Completed
      }
      | _ => Self::All
    }
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Today => !task.completed,
      | Self::Completed => task.completed
    }
  }
}

/// A conjunction of the list filters.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
  pub category:     CategorySelector,
  pub tab:          Tab,
  pub search:       Option<String>,
  pub due_on:       Option<NaiveDate>,
  pub starred_only: bool
}

impl TaskQuery {
  #[tracing::instrument(skip(
    self, tasks, tz
  ))]
  pub fn apply<'a>(
    &self,
    tasks: &'a [Task],
    tz: &Tz
  ) -> Vec<&'a Task> {
    let needle = self
      .search
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_lowercase);

    let out: Vec<&Task> = tasks
      .iter()
      .filter(|task| {
        self.category.matches(task)
      })
      .filter(|task| {
        self.tab.matches(task)
      })
      .filter(|task| {
        !self.starred_only
          || task.is_starred
      })
      .filter(|task| {
        needle.as_deref().is_none_or(
          |needle| {
            title_contains(task, needle)
          }
        )
      })
      .filter(|task| {
        self.due_on.is_none_or(|day| {
          due_on(task, day, tz)
        })
      })
      .collect();

    trace!(
      total = tasks.len(),
      matched = out.len(),
      "applied task query"
    );
    out
  }
}

fn title_contains(
  task: &Task,
  lowered_needle: &str
) -> bool {
  task
    .title
    .to_lowercase()
    .contains(lowered_needle)
}

fn due_on(
  task: &Task,
  day: NaiveDate,
  tz: &Tz
) -> bool {
  task.due_date.is_some_and(|due| {
    to_local_date(due, tz) == day
  })
}

/// Tasks whose due date falls on `day`
/// in local time.
pub fn tasks_on_date<'a>(
  tasks: &'a [Task],
  day: NaiveDate,
  tz: &Tz
) -> Vec<&'a Task> {
  tasks
    .iter()
    .filter(|task| due_on(task, day, tz))
    .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Sections<'a> {
  pub incomplete: Vec<&'a Task>,
  pub completed:  Vec<&'a Task>
}

impl<'a> Sections<'a> {
  pub fn len(&self) -> usize {
    self.incomplete.len()
      + self.completed.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Incomplete first, then completed.
  pub fn iter(
    &self
  ) -> impl Iterator<Item = &'a Task> + '_
  {
    self
      .incomplete
      .iter()
      .chain(self.completed.iter())
      .copied()
  }
}

pub fn split_by_completion<'a>(
  tasks: impl IntoIterator<Item = &'a Task>
) -> Sections<'a> {
  let (completed, incomplete) = tasks
    .into_iter()
    .partition(|task| task.completed);
  Sections {
    incomplete,
    completed
  }
}

#[derive(Debug, Clone)]
pub struct CategoryCounts<'a> {
  pub all:           usize,
  pub uncategorized: usize,
  pub per_category:  Vec<(&'a Category, usize)>
}

/// Sidebar counts. A task pointing at a
/// category that no longer exists is
/// counted as uncategorized.
pub fn category_counts<'a>(
  tasks: &[Task],
  categories: &'a [Category]
) -> CategoryCounts<'a> {
  let mut per_category: Vec<(
    &Category,
    usize
  )> = categories
    .iter()
    .map(|category| (category, 0))
    .collect();
  let mut uncategorized = 0;

  for task in tasks {
    let slot =
      task.category_id.and_then(|id| {
        per_category.iter_mut().find(
          |(category, _)| {
            category.id() == id
          }
        )
      });
    match slot {
      | Some((_, count)) => *count += 1,
      | None => {
        if let Some(id) = task.category_id
        {
          trace!(task = %task.id(), category = %id, "dangling category reference");
        }
        uncategorized += 1;
      }
    }
  }

  CategoryCounts {
    all: tasks.len(),
    uncategorized,
    per_category
  }
}
