mod modifiers;
mod task_ops;
mod views;

use anyhow::{Context, anyhow};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::model::Model;
use crate::render::Renderer;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "list",
        "search",
        "info",
        "done",
        "star",
        "modify",
        "remind",
        "delete",
        "category",
        "categories",
        "calendar",
        "day",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Loads the model, runs one command against it and saves it again when the
/// command changed something.
#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let tz = cfg.timezone();
    let key = cfg.snapshot_key();
    let command = inv.command.as_str();
    let args = inv.command_args.as_slice();

    debug!(command, args = ?args, key = %key, timezone = %tz, "dispatching command");

    match command {
        "help" => {
            views::cmd_help();
            return Ok(());
        }
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let mut model = load_model(store, &key)?;

    let changed = match command {
        "add" => task_ops::cmd_add(&mut model, args, now, &tz)?,
        "done" => task_ops::cmd_done(&mut model, args)?,
        "star" => task_ops::cmd_star(&mut model, args)?,
        "modify" => task_ops::cmd_modify(&mut model, args, now, &tz)?,
        "remind" => task_ops::cmd_remind(&mut model, args, now, &tz)?,
        "delete" => task_ops::cmd_delete(&mut model, args)?,
        "category" => task_ops::cmd_category(&mut model, args, now, &tz)?,
        "list" => {
            views::cmd_list(&model, renderer, args, now, &tz)?;
            false
        }
        "search" => {
            views::cmd_search(&model, renderer, args, now, &tz)?;
            false
        }
        "info" => {
            views::cmd_info(&model, renderer, args, now, &tz)?;
            false
        }
        "categories" => {
            views::cmd_categories(&model, renderer)?;
            false
        }
        "calendar" => {
            views::cmd_calendar(&model, renderer, args, now, &tz)?;
            false
        }
        "day" => {
            views::cmd_day(&model, renderer, args, now, &tz)?;
            false
        }
        other => return Err(anyhow!("unknown command: {other}")),
    };

    if changed {
        persist(store, &key, &model);
    }

    Ok(())
}

fn load_model(store: &DataStore, key: &str) -> anyhow::Result<Model> {
    let snapshot = store
        .load(key)
        .with_context(|| format!("failed to load snapshot {key}"))?
        .unwrap_or_default();
    Ok(Model::from_snapshot(snapshot))
}

/// A failed save does not undo the in-memory change; it is reported and the
/// command still succeeds.
#[instrument(skip(store, model), fields(tasks = model.tasks().len()))]
fn persist(store: &DataStore, key: &str, model: &Model) {
    match store.save(key, &model.snapshot()) {
        Ok(()) => info!(key, "saved snapshot"),
        Err(err) => {
            warn!(key, error = %format!("{err:#}"), "failed to save snapshot");
            eprintln!("Warning: changes could not be saved: {err:#}");
        }
    }
}

/// Accepts a 1-based list position or a unique prefix of the task id.
fn resolve_task_ref(model: &Model, token: &str) -> anyhow::Result<Uuid> {
    let token = token.trim();
    if let Ok(position) = token.parse::<usize>()
        && let Some(task) = position
            .checked_sub(1)
            .and_then(|idx| model.tasks().get(idx))
    {
        return Ok(task.id());
    }

    let ids = model.tasks().iter().map(|task| task.id());
    unique_id_prefix(ids, token).with_context(|| format!("no single task matches {token:?}"))
}

/// Accepts a category name (case-insensitive) or a unique id prefix.
fn resolve_category_ref(model: &Model, token: &str) -> anyhow::Result<Uuid> {
    if let Some(category) = model.category_named(token) {
        return Ok(category.id());
    }

    let ids = model.categories().iter().map(|category| category.id());
    unique_id_prefix(ids, token.trim())
        .with_context(|| format!("no single category matches {token:?}"))
}

fn unique_id_prefix(ids: impl Iterator<Item = Uuid>, prefix: &str) -> anyhow::Result<Uuid> {
    let prefix = prefix.to_ascii_lowercase();
    if prefix.is_empty() {
        return Err(anyhow!("empty reference"));
    }

    let mut matches = ids.filter(|id| id.to_string().starts_with(&prefix));
    let first = matches.next().ok_or_else(|| anyhow!("nothing matches"))?;
    if matches.next().is_some() {
        return Err(anyhow!("reference is ambiguous"));
    }
    Ok(first)
}

fn position_of(model: &Model, id: Uuid) -> usize {
    model
        .tasks()
        .iter()
        .position(|task| task.id() == id)
        .map_or(0, |idx| idx + 1)
}

fn first_arg<'a>(args: &'a [String], what: &str) -> anyhow::Result<&'a str> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{what} is required"))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::{expand_command_abbrev, known_command_names, resolve_category_ref, resolve_task_ref};
    use crate::model::Model;
    use crate::task::{Category, Task};

    fn sample() -> (Model, Uuid, Uuid) {
        let now = Utc
            .with_ymd_and_hms(2024, 3, 13, 9, 0, 0)
            .single()
            .expect("valid now");
        let a = Uuid::parse_str("aaaaaaaa-0000-4000-8000-000000000001").expect("uuid");
        let b = Uuid::parse_str("abbbbbbb-0000-4000-8000-000000000002").expect("uuid");
        let mut model = Model::new();
        model.insert_task(Task::with_id(a, "first", now));
        model.insert_task(Task::with_id(b, "second", now));
        model.insert_category(Category::new("Work", "#f00"));
        (model, a, b)
    }

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("cal", &known), Some("calendar"));
        assert_eq!(expand_command_abbrev("category", &known), Some("category"));
        assert_eq!(expand_command_abbrev("categ", &known), None);
        assert_eq!(expand_command_abbrev("d", &known), None);
        assert_eq!(expand_command_abbrev("mod", &known), Some("modify"));
    }

    #[test]
    fn task_refs_accept_positions_and_prefixes() {
        let (model, a, b) = sample();
        assert_eq!(resolve_task_ref(&model, "1").expect("position"), a);
        assert_eq!(resolve_task_ref(&model, "2").expect("position"), b);
        assert_eq!(resolve_task_ref(&model, "ab").expect("prefix"), b);
        assert_eq!(resolve_task_ref(&model, "AAAA").expect("prefix"), a);
        assert!(resolve_task_ref(&model, "a").is_err());
        assert!(resolve_task_ref(&model, "3").is_err());
        assert!(resolve_task_ref(&model, "").is_err());
    }

    #[test]
    fn category_refs_match_names_case_insensitively() {
        let (model, _, _) = sample();
        let work = model.categories()[0].id();
        assert_eq!(resolve_category_ref(&model, "work").expect("name"), work);
        assert!(resolve_category_ref(&model, "home").is_err());
    }
}
