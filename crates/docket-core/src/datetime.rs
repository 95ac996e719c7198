use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::CoreError;

pub const TIMEZONE_ENV_VAR: &str =
  "DOCKET_TIMEZONE";

/// Picks the local timezone: explicit
/// setting first, then the environment,
/// then UTC.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  tracing::debug!(
    "no timezone configured; using UTC"
  );
  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured local timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[must_use]
pub fn to_local_date(
  dt: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  dt.with_timezone(tz).date_naive()
}

#[must_use]
pub fn format_local(
  dt: DateTime<Utc>,
  tz: &Tz,
  fmt: &str
) -> String {
  dt.with_timezone(tz)
    .format(fmt)
    .to_string()
}

/// Converts a wall-clock time in `tz`
/// to UTC. Ambiguous times (DST fold)
/// take the earlier instant; skipped
/// times are rejected.
pub fn to_utc_from_local(
  local: NaiveDateTime,
  tz: &Tz
) -> Result<DateTime<Utc>, CoreError> {
  match tz.from_local_datetime(&local)
  {
    | LocalResult::Single(dt) => {
      Ok(dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(CoreError::Parse(format!(
        "{local} does not exist in \
         {tz}"
      )))
    }
  }
}

pub fn local_at(
  date: NaiveDate,
  hour: u32,
  minute: u32,
  tz: &Tz
) -> Result<DateTime<Utc>, CoreError> {
  let time = NaiveTime::from_hms_opt(
    hour, minute, 0
  )
  .ok_or_else(|| {
    CoreError::Parse(format!(
      "{hour:02}:{minute:02}"
    ))
  })?;
  to_utc_from_local(
    date.and_time(time),
    tz
  )
}

/// Parses a date expression typed on the
/// command line.
#[tracing::instrument(skip(now, tz), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today = to_local_date(now, tz);

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      return Ok(local_at(
        today, 0, 0, tz
      )?);
    }
    | "tomorrow" => {
      let date = today
        .succ_opt()
        .ok_or_else(|| {
          anyhow!(
            "date out of range"
          )
        })?;
      return Ok(local_at(
        date, 0, 0, tz
      )?);
    }
    | "yesterday" => {
      let date = today
        .pred_opt()
        .ok_or_else(|| {
          anyhow!(
            "date out of range"
          )
        })?;
      return Ok(local_at(
        date, 0, 0, tz
      )?);
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    let date =
      next_weekday_date(today, target);
    return Ok(local_at(
      date, 0, 0, tz
    )?);
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwh])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps["num"]
      .parse()
      .context(
        "invalid relative number"
      )?;
    let duration =
      match &caps["unit"] {
        | "d" => Duration::try_days(num),
        | "w" => Duration::try_weeks(num),
        | _ => Duration::try_hours(num)
      };
    let shifted =
      duration.and_then(|duration| {
        if &caps["sign"] == "-" {
          now.checked_sub_signed(duration)
        } else {
          now.checked_add_signed(duration)
        }
      });
    return shifted.ok_or_else(|| {
      anyhow!("date out of range")
    });
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(local_at(
      date, 0, 0, tz
    )?);
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Ok(to_utc_from_local(
        ndt, tz
      )?);
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow/yesterday, \
     weekday names (e.g. friday), \
     +Nd/+Nw/+Nh, RFC3339, \
     YYYY-MM-DD, YYYY-MM-DDTHH:MM"
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

/// The next `target` strictly after
/// `from`; a same-day match jumps a
/// full week.
pub fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_sunday()
    as i64;
  let target_idx = target
    .num_days_from_sunday()
    as i64;
  let mut delta =
    (target_idx - from_idx + 7) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}
