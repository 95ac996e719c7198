use anyhow::anyhow;
use chrono::{
  DateTime,
  Utc
};
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  instrument,
  warn
};
use uuid::Uuid;

use super::modifiers::{
  Mod,
  parse_mods,
  parse_text_and_mods,
  resolve_changes
};
use super::{
  first_arg,
  position_of,
  resolve_category_ref,
  resolve_task_ref
};
use crate::model::Model;
use crate::reminder::{
  ReminderOption,
  format_reminder_text,
  resolve_reminder
};
use crate::task::{
  DEFAULT_CATEGORY_COLOR,
  TaskDraft
};

#[instrument(skip(model, args, now, tz))]
pub(super) fn cmd_add(
  model: &mut Model,
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<bool> {
  info!("command add");

  let (text, mods) =
    parse_text_and_mods(args, now, tz)?;
  let changes =
    resolve_changes(model, &mods)?;

  let reminder_date =
    match &changes.reminder {
      | Some(option) => {
        resolve_reminder(option, now, tz)?
      }
      | None => None
    };
  let patch = changes.patch;
  let draft = TaskDraft {
    title: patch.title.unwrap_or(text),
    description: patch
      .description
      .flatten(),
    category_id: patch
      .category_id
      .flatten(),
    reminder_date,
    due_date: patch.due_date.flatten()
  };

  let Some(id) =
    model.create_task(draft, now)
  else {
    println!(
      "Nothing added: a task needs a \
       title."
    );
    return Ok(false);
  };

  debug!(task = %id, total = model.tasks().len(), "task added");
  println!(
    "Created task {}.",
    position_of(model, id)
  );
  Ok(true)
}

#[instrument(skip(model, args))]
pub(super) fn cmd_done(
  model: &mut Model,
  args: &[String]
) -> anyhow::Result<bool> {
  info!("command done");

  for id in resolve_all(model, args)? {
    let completed =
      model.toggle_complete(id)?;
    let verb = if completed {
      "Completed"
    } else {
      "Reopened"
    };
    println!(
      "{verb} task {} '{}'.",
      position_of(model, id),
      title_of(model, id)
    );
  }
  Ok(true)
}

#[instrument(skip(model, args))]
pub(super) fn cmd_star(
  model: &mut Model,
  args: &[String]
) -> anyhow::Result<bool> {
  info!("command star");

  for id in resolve_all(model, args)? {
    let starred = model.toggle_star(id)?;
    let verb = if starred {
      "Starred"
    } else {
      "Unstarred"
    };
    println!(
      "{verb} task {}.",
      position_of(model, id)
    );
  }
  Ok(true)
}

#[instrument(skip(model, args, now, tz))]
pub(super) fn cmd_modify(
  model: &mut Model,
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<bool> {
  info!("command modify");

  let id = resolve_task_ref(
    model,
    first_arg(args, "task reference")?
  )?;
  let mods =
    parse_mods(&args[1..], now, tz)?;
  let changes =
    resolve_changes(model, &mods)?;

  if changes.patch.is_empty()
    && changes.reminder.is_none()
  {
    println!("Nothing to change.");
    return Ok(false);
  }

  if let Some(option) = &changes.reminder
  {
    model.set_reminder(
      id, option, now, tz
    )?;
  }
  model.edit_fields(id, &changes.patch)?;

  println!(
    "Modified task {}.",
    position_of(model, id)
  );
  Ok(true)
}

/// `remind <task> [option]`; no option
/// means one hour from now.
#[instrument(skip(model, args, now, tz))]
pub(super) fn cmd_remind(
  model: &mut Model,
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<bool> {
  info!("command remind");

  let id = resolve_task_ref(
    model,
    first_arg(args, "task reference")?
  )?;
  let option = ReminderOption::from_key(
    &args[1..].join(" ")
  );

  let position = position_of(model, id);
  match model
    .set_reminder(id, &option, now, tz)?
  {
    | Some(at) => {
      println!(
        "Reminder for task {position}: \
         {}.",
        format_reminder_text(at, now, tz)
      );
    }
    | None => {
      println!(
        "Reminder cleared for task \
         {position}."
      );
    }
  }
  Ok(true)
}

#[instrument(skip(model, args))]
pub(super) fn cmd_delete(
  model: &mut Model,
  args: &[String]
) -> anyhow::Result<bool> {
  info!("command delete");

  for id in resolve_all(model, args)? {
    let task = model.delete_task(id)?;
    println!(
      "Deleted task '{}'.",
      task.title
    );
  }
  Ok(true)
}

/// `category add <name> [color:#hex]`
/// and `category delete <name|id>`.
#[instrument(skip(model, args, now, tz))]
pub(super) fn cmd_category(
  model: &mut Model,
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<bool> {
  info!("command category");

  let sub = first_arg(
    args,
    "category subcommand (add or \
     delete)"
  )?;
  let rest = &args[1..];

  match sub {
    | "add" => {
      let (name, mods) =
        parse_text_and_mods(
          rest, now, tz
        )?;
      let mut color =
        DEFAULT_CATEGORY_COLOR
          .to_string();
      for one_mod in mods {
        match one_mod {
          | Mod::Color(value) => {
            color = value
          }
          | other => {
            warn!(modifier = ?other, "ignored for categories");
          }
        }
      }

      let Some(id) =
        model.create_category(&name, &color)
      else {
        println!(
          "Nothing added: a category \
           needs a name."
        );
        return Ok(false);
      };
      debug!(category = %id, "category added");
      println!(
        "Created category '{}'.",
        name.trim()
      );
      Ok(true)
    }
    | "delete" | "del" | "rm" => {
      let id = resolve_category_ref(
        model,
        &rest.join(" ")
      )?;
      let cleared = model
        .tasks()
        .iter()
        .filter(|task| {
          task.category_id == Some(id)
        })
        .count();
      let category =
        model.delete_category(id)?;
      println!(
        "Deleted category '{}'; cleared \
         from {cleared} task(s).",
        category.name
      );
      Ok(true)
    }
    | other => {
      Err(anyhow!(
        "unknown category subcommand: \
         {other}"
      ))
    }
  }
}

/// Resolves every reference before
/// anything changes, so positions stay
/// stable across a multi-task delete.
/// A task named twice is acted on once.
fn resolve_all(
  model: &Model,
  args: &[String]
) -> anyhow::Result<Vec<Uuid>> {
  if args.is_empty() {
    return Err(anyhow!(
      "task reference is required"
    ));
  }
  let mut ids: Vec<Uuid> =
    Vec::with_capacity(args.len());
  for token in args {
    let id = resolve_task_ref(model, token)?;
    if !ids.contains(&id) {
      ids.push(id);
    }
  }
  Ok(ids)
}

fn title_of(
  model: &Model,
  id: Uuid
) -> String {
  model
    .task(id)
    .map(|task| task.title.clone())
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::{
    cmd_add,
    cmd_category,
    cmd_delete,
    cmd_done,
    cmd_modify,
    cmd_remind
  };
  use crate::model::Model;

  fn args(raw: &[&str]) -> Vec<String> {
    raw
      .iter()
      .map(|s| s.to_string())
      .collect()
  }

  fn now() -> chrono::DateTime<Utc> {
    // a Wednesday
    Utc
      .with_ymd_and_hms(
        2024, 3, 13, 9, 0, 0
      )
      .single()
      .expect("valid now")
  }

  #[test]
  fn add_applies_modifiers() {
    let tz = chrono_tz::UTC;
    let mut model = Model::new();
    model
      .create_category("Errands", "#f80")
      .expect("category");

    let changed = cmd_add(
      &mut model,
      &args(&[
        "Buy",
        "milk",
        "cat:errands",
        "due:2024-03-15",
        "remind:weekend"
      ]),
      now(),
      &tz
    )
    .expect("add");
    assert!(changed);

    let task = &model.tasks()[0];
    assert_eq!(task.title, "Buy milk");
    assert_eq!(
      task.category_id,
      Some(model.categories()[0].id())
    );
    assert_eq!(
      task.due_date,
      Utc
        .with_ymd_and_hms(
          2024, 3, 15, 0, 0, 0
        )
        .single()
    );
    assert_eq!(
      task.reminder_date,
      Utc
        .with_ymd_and_hms(
          2024, 3, 16, 10, 0, 0
        )
        .single()
    );
  }

  #[test]
  fn add_without_title_changes_nothing() {
    let tz = chrono_tz::UTC;
    let mut model = Model::new();
    let changed = cmd_add(
      &mut model,
      &args(&["due:today"]),
      now(),
      &tz
    )
    .expect("add");
    assert!(!changed);
    assert!(model.tasks().is_empty());
  }

  #[test]
  fn bad_custom_reminder_keeps_the_old_one()
  {
    let tz = chrono_tz::UTC;
    let mut model = Model::new();
    cmd_add(
      &mut model,
      &args(&["Call", "remind:tomorrow"]),
      now(),
      &tz
    )
    .expect("add");
    let before =
      model.tasks()[0].reminder_date;
    assert!(before.is_some());

    assert!(
      cmd_remind(
        &mut model,
        &args(&["1", "2024-02-30T10:00"]),
        now(),
        &tz
      )
      .is_err()
    );
    assert_eq!(
      model.tasks()[0].reminder_date,
      before
    );

    cmd_remind(
      &mut model,
      &args(&["1", "none"]),
      now(),
      &tz
    )
    .expect("clear");
    assert_eq!(
      model.tasks()[0].reminder_date,
      None
    );
  }

  #[test]
  fn done_and_delete_take_several_refs() {
    let tz = chrono_tz::UTC;
    let mut model = Model::new();
    for title in ["a", "b", "c"] {
      cmd_add(
        &mut model,
        &args(&[title]),
        now(),
        &tz
      )
      .expect("add");
    }

    cmd_done(&mut model, &args(&["1", "3"]))
      .expect("done");
    let done: Vec<bool> = model
      .tasks()
      .iter()
      .map(|task| task.completed)
      .collect();
    assert_eq!(done, [true, false, true]);

    cmd_delete(
      &mut model,
      &args(&["1", "2"])
    )
    .expect("delete");
    let left: Vec<&str> = model
      .tasks()
      .iter()
      .map(|task| task.title.as_str())
      .collect();
    assert_eq!(left, ["c"]);
  }

  #[test]
  fn repeated_refs_act_once() {
    let tz = chrono_tz::UTC;
    let mut model = Model::new();
    for title in ["a", "b"] {
      cmd_add(
        &mut model,
        &args(&[title]),
        now(),
        &tz
      )
      .expect("add");
    }
    let first = model.tasks()[0].id();

    cmd_done(&mut model, &args(&["1", "1"]))
      .expect("done");
    assert!(
      model.task(first).expect("a").completed
    );

    let prefix =
      first.simple().to_string();
    cmd_delete(
      &mut model,
      &args(&["1", &prefix[..8], "1"])
    )
    .expect("delete once");
    let left: Vec<&str> = model
      .tasks()
      .iter()
      .map(|task| task.title.as_str())
      .collect();
    assert_eq!(left, ["b"]);
  }

  #[test]
  fn modify_without_changes_is_a_no_op() {
    let tz = chrono_tz::UTC;
    let mut model = Model::new();
    cmd_add(
      &mut model,
      &args(&["report"]),
      now(),
      &tz
    )
    .expect("add");
    assert!(
      !cmd_modify(
        &mut model,
        &args(&["1"]),
        now(),
        &tz
      )
      .expect("modify")
    );
    assert!(
      cmd_modify(
        &mut model,
        &args(&["1", "title:final report"]),
        now(),
        &tz
      )
      .expect("modify")
    );
    assert_eq!(
      model.tasks()[0].title,
      "final report"
    );
  }

  #[test]
  fn category_delete_clears_tasks() {
    let tz = chrono_tz::UTC;
    let mut model = Model::new();
    cmd_category(
      &mut model,
      &args(&["add", "Home", "color:#00ff00"]),
      now(),
      &tz
    )
    .expect("category add");
    assert_eq!(
      model.categories()[0].color,
      "#00ff00"
    );
    cmd_add(
      &mut model,
      &args(&["Water plants", "cat:Home"]),
      now(),
      &tz
    )
    .expect("add");

    cmd_category(
      &mut model,
      &args(&["delete", "home"]),
      now(),
      &tz
    )
    .expect("category delete");
    assert!(model.categories().is_empty());
    assert_eq!(
      model.tasks()[0].category_id,
      None
    );
  }
}
