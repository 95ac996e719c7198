use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Utc
};
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  instrument
};

use super::{
  first_arg,
  position_of,
  resolve_category_ref,
  resolve_task_ref
};
use crate::calendar::MonthCursor;
use crate::datetime::{
  parse_date_expr,
  to_local_date
};
use crate::error::CoreError;
use crate::model::Model;
use crate::render::Renderer;
use crate::view::{
  CategorySelector,
  Tab,
  TaskQuery,
  UNCATEGORIZED_KEY,
  category_counts,
  split_by_completion,
  tasks_on_date
};

#[instrument(skip(model, renderer, args, now, tz))]
pub(super) fn cmd_list(
  model: &Model,
  renderer: &mut Renderer,
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<()> {
  info!("command list");

  let query =
    parse_list_args(model, args, now, tz)?;
  let matched =
    query.apply(model.tasks(), tz);
  debug!(matched = matched.len(), "list query applied");

  renderer.print_sections(
    &split_by_completion(matched),
    model,
    now,
    tz
  )
}

#[instrument(skip(model, renderer, args, now, tz))]
pub(super) fn cmd_search(
  model: &Model,
  renderer: &mut Renderer,
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<()> {
  info!("command search");

  let needle = args.join(" ");
  if needle.trim().is_empty() {
    return Err(anyhow!(
      "search text is required"
    ));
  }
  let query = TaskQuery {
    search: Some(needle),
    ..TaskQuery::default()
  };

  renderer.print_sections(
    &split_by_completion(
      query.apply(model.tasks(), tz)
    ),
    model,
    now,
    tz
  )
}

#[instrument(skip(model, renderer, args, now, tz))]
pub(super) fn cmd_info(
  model: &Model,
  renderer: &mut Renderer,
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<()> {
  info!("command info");

  let id = resolve_task_ref(
    model,
    first_arg(args, "task reference")?
  )?;
  let task = model.task(id).ok_or_else(
    || CoreError::task_not_found(id)
  )?;

  renderer.print_task_info(
    position_of(model, id),
    task,
    model,
    now,
    tz
  )
}

#[instrument(skip(model, renderer))]
pub(super) fn cmd_categories(
  model: &Model,
  renderer: &mut Renderer
) -> anyhow::Result<()> {
  info!("command categories");

  renderer.print_categories(
    &category_counts(
      model.tasks(),
      model.categories()
    )
  )
}

/// `calendar`, `calendar 2024-03`,
/// `calendar next|prev` or
/// `calendar +N|-N` months from now.
#[instrument(skip(model, renderer, args, now, tz))]
pub(super) fn cmd_calendar(
  model: &Model,
  renderer: &mut Renderer,
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<()> {
  info!("command calendar");

  let today = to_local_date(now, tz);
  let current =
    MonthCursor::containing(today);
  let cursor = match args.first() {
    | Some(raw) => {
      parse_month_arg(raw, current)?
    }
    | None => current
  };

  let grid = cursor.grid()?;
  renderer.print_month(
    &grid,
    model.tasks(),
    today,
    tz
  )
}

#[instrument(skip(model, renderer, args, now, tz))]
pub(super) fn cmd_day(
  model: &Model,
  renderer: &mut Renderer,
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<()> {
  info!("command day");

  let day = if args.is_empty() {
    to_local_date(now, tz)
  } else {
    to_local_date(
      parse_date_expr(
        &args.join(" "),
        now,
        tz
      )?,
      tz
    )
  };

  println!("{}", day.format("%A, %B %-d %Y"));
  renderer.print_sections(
    &split_by_completion(tasks_on_date(
      model.tasks(),
      day,
      tz
    )),
    model,
    now,
    tz
  )
}

const USAGE: &[(&str, &str)] = &[
  ("add <title> [mods]", "create a task"),
  (
    "list [all|today|completed] [starred] \
     [cat:<name>] [due:<date>] [words]",
    "show tasks"
  ),
  ("search <text>", "find tasks by title"),
  ("info <task>", "show one task"),
  ("done <task>...", "toggle completion"),
  ("star <task>...", "toggle the star"),
  ("modify <task> <mods>", "change fields"),
  ("remind <task> [when]", "set or clear a reminder"),
  ("delete <task>...", "remove tasks"),
  (
    "category add <name> [color:#hex]",
    "create a category"
  ),
  (
    "category delete <name>",
    "remove a category"
  ),
  ("categories", "categories with task counts"),
  (
    "calendar [YYYY-MM|next|prev|+N|-N]",
    "month view"
  ),
  ("day [date]", "tasks due on one day")
];

pub(super) fn cmd_help() {
  println!("Commands:");
  for (usage, about) in USAGE {
    println!("  {usage:<36} {about}");
  }
  println!(
    "\nModifiers: cat:<name|none> \
     due:<date|none> remind:<when> \
     title:<text> desc:<text|none>"
  );
  println!(
    "Reminders: later_today, tomorrow, \
     next_week, weekend, none, \
     YYYY-MM-DDTHH:MM"
  );
  println!(
    "Tasks are referenced by list \
     position or id prefix."
  );
}

fn parse_list_args(
  model: &Model,
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<TaskQuery> {
  let mut query = TaskQuery::default();
  let mut words = Vec::new();

  for arg in args {
    let lower = arg.to_ascii_lowercase();
    match lower.as_str() {
      | "all" | "today" | "completed"
      | "done" => {
        query.tab = Tab::from_key(&lower);
        continue;
      }
      | "starred" => {
        query.starred_only = true;
        continue;
      }
      | _ => {}
    }

    if let Some((key, value)) =
      arg.split_once(':')
    {
      match key
        .to_ascii_lowercase()
        .as_str()
      {
        | "cat" | "category" => {
          query.category =
            parse_category_selector(
              model, value
            )?;
          continue;
        }
        | "due" => {
          let at =
            parse_date_expr(value, now, tz)?;
          query.due_on =
            Some(to_local_date(at, tz));
          continue;
        }
        | _ => {}
      }
    }

    words.push(arg.as_str());
  }

  if !words.is_empty() {
    query.search = Some(words.join(" "));
  }
  Ok(query)
}

fn parse_category_selector(
  model: &Model,
  value: &str
) -> anyhow::Result<CategorySelector> {
  let lower =
    value.trim().to_ascii_lowercase();
  if lower == "all" {
    return Ok(CategorySelector::All);
  }
  if lower == UNCATEGORIZED_KEY
    || lower == "none"
  {
    return Ok(
      CategorySelector::Uncategorized
    );
  }
  Ok(CategorySelector::Category(
    resolve_category_ref(model, value)?
  ))
}

fn parse_month_arg(
  raw: &str,
  current: MonthCursor
) -> anyhow::Result<MonthCursor> {
  let raw = raw.trim();
  match raw.to_ascii_lowercase().as_str()
  {
    | "next" => return Ok(current.next()),
    | "prev" | "previous" => {
      return Ok(current.prev());
    }
    | _ => {}
  }

  if raw.starts_with(['+', '-']) {
    let months: i32 =
      raw.parse().with_context(|| {
        format!(
          "invalid month offset: {raw}"
        )
      })?;
    return Ok(current.shift(months));
  }

  let (year, month) = raw
    .split_once('-')
    .ok_or_else(|| {
      anyhow!(
        "expected YYYY-MM, got {raw:?}"
      )
    })?;
  let year: i32 =
    year.parse().with_context(|| {
      format!("invalid year in {raw:?}")
    })?;
  let month: u32 =
    month.parse().with_context(|| {
      format!("invalid month in {raw:?}")
    })?;
  let month0 =
    month.checked_sub(1).ok_or_else(
      || anyhow!("months count from 1")
    )?;
  if month0 > 11 {
    return Err(
      CoreError::InvalidMonth(month0).into()
    );
  }

  Ok(MonthCursor { year, month0 })
}
