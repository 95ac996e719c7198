use anyhow::anyhow;
use chrono::{
  DateTime,
  Utc
};
use chrono_tz::Tz;
use tracing::{
  instrument,
  warn
};

use super::resolve_category_ref;
use crate::datetime::parse_date_expr;
use crate::model::Model;
use crate::reminder::ReminderOption;
use crate::task::TaskPatch;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Mod {
  Category(Option<String>),
  Due(Option<DateTime<Utc>>),
  Remind(ReminderOption),
  Title(String),
  Description(Option<String>),
  Color(String)
}

/// Splits free text from `key:value`
/// modifiers. Everything after `--` is
/// text.
#[instrument(skip(args, now, tz))]
pub(super) fn parse_text_and_mods(
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<(String, Vec<Mod>)>
{
  let mut text_parts = Vec::new();
  let mut mods = Vec::new();

  let mut literal = false;
  for arg in args {
    if arg == "--" {
      literal = true;
      continue;
    }

    if !literal
      && let Some(one_mod) =
        parse_one_mod(arg, now, tz)?
    {
      mods.push(one_mod);
      continue;
    }

    text_parts.push(arg.clone());
  }

  Ok((text_parts.join(" "), mods))
}

#[instrument(skip(args, now, tz))]
pub(super) fn parse_mods(
  args: &[String],
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<Vec<Mod>> {
  let mut mods = Vec::new();
  for arg in args {
    if let Some(one_mod) =
      parse_one_mod(arg, now, tz)?
    {
      mods.push(one_mod);
    } else {
      warn!(arg = %arg, "unrecognized modifier token ignored");
    }
  }
  Ok(mods)
}

fn parse_one_mod(
  tok: &str,
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<Option<Mod>> {
  let Some((key, value)) =
    tok.split_once(':')
  else {
    return Ok(None);
  };

  let key = key.to_ascii_lowercase();
  let cleared = is_clear_word(value);

  match key.as_str() {
    | "cat" | "category" => {
      Ok(Some(Mod::Category(
        (!cleared)
          .then(|| value.to_string())
      )))
    }
    | "due" => {
      if cleared {
        return Ok(Some(Mod::Due(None)));
      }
      Ok(Some(Mod::Due(Some(
        parse_date_expr(value, now, tz)?
      ))))
    }
    | "remind" | "reminder" => {
      Ok(Some(Mod::Remind(
        ReminderOption::from_key(value)
      )))
    }
    | "title" => {
      Ok(Some(Mod::Title(
        value.to_string()
      )))
    }
    | "desc" | "description" => {
      Ok(Some(Mod::Description(
        (!cleared)
          .then(|| value.to_string())
      )))
    }
    | "color" | "colour" => {
      Ok(Some(Mod::Color(
        value.trim().to_string()
      )))
    }
    | _ => Ok(None)
  }
}

fn is_clear_word(value: &str) -> bool {
  matches!(
    value
      .trim()
      .to_ascii_lowercase()
      .as_str(),
    "" | "none" | "clear"
  )
}

/// Field changes plus an optional
/// reminder, resolved against the model
/// before anything is written.
#[derive(Debug, Clone, Default)]
pub(super) struct Changes {
  pub patch:    TaskPatch,
  pub reminder: Option<ReminderOption>
}

pub(super) fn resolve_changes(
  model: &Model,
  mods: &[Mod]
) -> anyhow::Result<Changes> {
  let mut changes = Changes::default();

  for one_mod in mods {
    match one_mod {
      | Mod::Category(Some(name)) => {
        let id =
          resolve_category_ref(model, name)?;
        changes.patch.category_id =
          Some(Some(id));
      }
      | Mod::Category(None) => {
        changes.patch.category_id =
          Some(None);
      }
      | Mod::Due(due) => {
        changes.patch.due_date = Some(*due);
      }
      | Mod::Remind(option) => {
        changes.reminder =
          Some(option.clone());
      }
      | Mod::Title(title) => {
        if title.trim().is_empty() {
          return Err(anyhow!(
            "title cannot be blank"
          ));
        }
        changes.patch.title =
          Some(title.clone());
      }
      | Mod::Description(desc) => {
        changes.patch.description =
          Some(desc.clone());
      }
      | Mod::Color(_) => {
        warn!(
          "color applies to categories; \
           ignored"
        );
      }
    }
  }

  Ok(changes)
}
