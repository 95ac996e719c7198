//! Turns the reminder picker's symbolic
//! choices into concrete timestamps and
//! back into short display text.

use chrono::{
  DateTime,
  Duration,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use tracing::debug;

use crate::datetime::{
  local_at,
  next_weekday_date,
  to_local_date,
  to_utc_from_local
};
use crate::error::CoreError;

#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub enum ReminderOption {
  LaterToday,
  Tomorrow,
  NextWeek,
  Weekend,
  Custom {
    date: String,
    time: String
  },
  Clear,
  NextHour
}

impl ReminderOption {
  /// Maps a picker key to an option.
  /// Unknown keys fall back to one hour
  /// from now; `YYYY-MM-DD HH:MM` and
  /// `YYYY-MM-DDTHH:MM` become custom.
  pub fn from_key(raw: &str) -> Self {
    let key = raw.trim();
    match key
      .to_ascii_lowercase()
      .as_str()
    {
      | "later_today" | "later" => {
        Self::LaterToday
      }
      | "tomorrow" => Self::Tomorrow,
      | "next_week" | "nextweek" => {
        Self::NextWeek
      }
      | "weekend" => Self::Weekend,
      | "none" | "clear" => Self::Clear,
      | _ => {
        if let Some((date, time)) =
          split_custom(key)
        {
          return Self::Custom {
            date: date.to_string(),
            time: time.to_string()
          };
        }
        debug!(key, "unrecognized reminder key; using next hour");
        Self::NextHour
      }
    }
  }

  pub fn custom(
    date: impl Into<String>,
    time: impl Into<String>
  ) -> Self {
    Self::Custom {
      date: date.into(),
      time: time.into()
    }
  }
}

fn split_custom(
  key: &str
) -> Option<(&str, &str)> {
  let (date, time) = key
    .split_once(' ')
    .or_else(|| key.split_once('T'))?;
  let looks_like_date = date.len()
    == 10
    && date.as_bytes()[4] == b'-';
  looks_like_date
    .then_some((date, time.trim()))
}

/// Resolves `option` against `now` in
/// the local timezone. `Ok(None)` means
/// the reminder is cleared.
#[tracing::instrument(skip(now, tz))]
pub fn resolve_reminder(
  option: &ReminderOption,
  now: DateTime<Utc>,
  tz: &Tz
) -> Result<Option<DateTime<Utc>>, CoreError>
{
  let today = to_local_date(now, tz);

  let resolved = match option {
    | ReminderOption::LaterToday => {
      local_at(today, 18, 0, tz)?
    }
    | ReminderOption::Tomorrow => {
      local_at(
        days_after(today, 1)?,
        9,
        0,
        tz
      )?
    }
    | ReminderOption::NextWeek => {
      local_at(
        days_after(today, 7)?,
        9,
        0,
        tz
      )?
    }
    | ReminderOption::Weekend => {
      local_at(
        next_weekday_date(
          today,
          Weekday::Sat
        ),
        10,
        0,
        tz
      )?
    }
    | ReminderOption::Custom {
      date,
      time
    } => parse_custom(date, time, tz)?,
    | ReminderOption::Clear => {
      return Ok(None);
    }
    | ReminderOption::NextHour => {
      now + Duration::hours(1)
    }
  };

  debug!(%resolved, "resolved reminder");
  Ok(Some(resolved))
}

fn days_after(
  date: NaiveDate,
  days: u64
) -> Result<NaiveDate, CoreError> {
  date
    .checked_add_days(
      chrono::Days::new(days)
    )
    .ok_or_else(|| {
      CoreError::Parse(format!(
        "{date} + {days} days"
      ))
    })
}

fn parse_custom(
  date: &str,
  time: &str,
  tz: &Tz
) -> Result<DateTime<Utc>, CoreError> {
  let date = NaiveDate::parse_from_str(
    date.trim(),
    "%Y-%m-%d"
  )
  .map_err(|err| {
    CoreError::Parse(format!(
      "date {date:?}: {err}"
    ))
  })?;
  let time = NaiveTime::parse_from_str(
    time.trim(),
    "%H:%M"
  )
  .map_err(|err| {
    CoreError::Parse(format!(
      "time {time:?}: {err}"
    ))
  })?;
  to_utc_from_local(
    NaiveDateTime::new(date, time),
    tz
  )
}

/// "Today at 18:00", "Tomorrow at
/// 09:00", or "Sat, Mar 16 at 10:00".
pub fn format_reminder_text(
  reminder: DateTime<Utc>,
  now: DateTime<Utc>,
  tz: &Tz
) -> String {
  let local = reminder.with_timezone(tz);
  let clock = local.format("%H:%M");
  let date = local.date_naive();
  let today = to_local_date(now, tz);

  if date == today {
    format!("Today at {clock}")
  } else if today.succ_opt()
    == Some(date)
  {
    format!("Tomorrow at {clock}")
  } else {
    format!(
      "{} at {clock}",
      local.format("%a, %b %-d")
    )
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    DateTime,
    Datelike,
    TimeZone,
    Timelike,
    Utc,
    Weekday
  };

  use super::{
    ReminderOption,
    format_reminder_text,
    resolve_reminder
  };
  use crate::error::CoreError;

  fn at(
    y: i32,
    m: u32,
    d: u32,
    h: u32,
    min: u32
  ) -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(y, m, d, h, min, 0)
      .single()
      .expect("valid instant")
  }

  fn resolve(
    option: ReminderOption,
    now: DateTime<Utc>
  ) -> DateTime<Utc> {
    resolve_reminder(
      &option,
      now,
      &chrono_tz::UTC
    )
    .expect("resolve")
    .expect("reminder set")
  }

  #[test]
  fn weekend_from_wednesday_is_three_days_out() {
    let wednesday = at(2024, 3, 13, 15, 42);
    assert_eq!(
      wednesday.weekday(),
      Weekday::Wed
    );
    assert_eq!(
      resolve(
        ReminderOption::Weekend,
        wednesday
      ),
      at(2024, 3, 16, 10, 0)
    );
  }

  #[test]
  fn weekend_on_saturday_skips_a_full_week() {
    let saturday = at(2024, 3, 16, 8, 0);
    assert_eq!(
      resolve(
        ReminderOption::Weekend,
        saturday
      ),
      at(2024, 3, 23, 10, 0)
    );
  }

  #[test]
  fn weekend_on_sunday_is_six_days_out() {
    let sunday = at(2024, 3, 17, 8, 0);
    assert_eq!(
      resolve(
        ReminderOption::Weekend,
        sunday
      ),
      at(2024, 3, 23, 10, 0)
    );
  }

  #[test]
  fn fixed_clock_options() {
    let now = at(2024, 1, 31, 20, 15);
    assert_eq!(
      resolve(
        ReminderOption::LaterToday,
        now
      ),
      at(2024, 1, 31, 18, 0)
    );
    assert_eq!(
      resolve(
        ReminderOption::Tomorrow,
        now
      ),
      at(2024, 2, 1, 9, 0)
    );
    assert_eq!(
      resolve(
        ReminderOption::NextWeek,
        now
      ),
      at(2024, 2, 7, 9, 0)
    );
    assert_eq!(
      resolve(
        ReminderOption::NextHour,
        now
      ),
      at(2024, 1, 31, 21, 15)
    );
  }

  #[test]
  fn options_follow_local_wall_clock() {
    let tz: chrono_tz::Tz = "Asia/Tokyo"
      .parse()
      .expect("valid tz");
    // 2024-03-13 23:30 in Tokyo
    let now = at(2024, 3, 13, 14, 30);
    let resolved = resolve_reminder(
      &ReminderOption::Tomorrow,
      now,
      &tz
    )
    .expect("resolve")
    .expect("reminder set")
    .with_timezone(&tz);
    assert_eq!(resolved.day(), 14);
    assert_eq!(resolved.hour(), 9);
  }

  #[test]
  fn clear_and_unknown_keys() {
    let now = at(2024, 3, 13, 10, 0);
    assert_eq!(
      resolve_reminder(
        &ReminderOption::from_key(
          "none"
        ),
        now,
        &chrono_tz::UTC
      ),
      Ok(None)
    );
    assert_eq!(
      ReminderOption::from_key(
        "whenever"
      ),
      ReminderOption::NextHour
    );
  }

  #[test]
  fn custom_date_and_time() {
    let now = at(2024, 3, 13, 10, 0);
    let option =
      ReminderOption::from_key(
        "2024-04-02T07:45"
      );
    assert_eq!(
      option,
      ReminderOption::custom(
        "2024-04-02",
        "07:45"
      )
    );
    assert_eq!(
      resolve(option, now),
      at(2024, 4, 2, 7, 45)
    );
  }

  #[test]
  fn custom_rejects_invalid_input() {
    let now = at(2024, 3, 13, 10, 0);
    for (date, time) in [
      ("2024-02-30", "10:00"),
      ("2024-03-01", "25:00"),
      ("tomorrow", "10:00")
    ] {
      let result = resolve_reminder(
        &ReminderOption::custom(
          date, time
        ),
        now,
        &chrono_tz::UTC
      );
      assert!(
        matches!(
          result,
          Err(CoreError::Parse(_))
        ),
        "{date} {time} should fail"
      );
    }
  }

  #[test]
  fn custom_rejects_skipped_local_time() {
    let tz: chrono_tz::Tz =
      "America/New_York"
        .parse()
        .expect("valid tz");
    let result = resolve_reminder(
      &ReminderOption::custom(
        "2024-03-10",
        "02:30"
      ),
      at(2024, 3, 1, 12, 0),
      &tz
    );
    assert!(result.is_err());
  }

  #[test]
  fn display_text_by_calendar_day() {
    let now = at(2024, 3, 13, 23, 59);
    let tz = chrono_tz::UTC;
    assert_eq!(
      format_reminder_text(
        at(2024, 3, 13, 18, 0),
        now,
        &tz
      ),
      "Today at 18:00"
    );
    assert_eq!(
      format_reminder_text(
        at(2024, 3, 14, 0, 5),
        now,
        &tz
      ),
      "Tomorrow at 00:05"
    );
    assert_eq!(
      format_reminder_text(
        at(2024, 3, 16, 10, 0),
        now,
        &tz
      ),
      "Sat, Mar 16 at 10:00"
    );
  }

  #[test]
  fn tomorrow_text_crosses_month_end() {
    let now = at(2024, 1, 31, 12, 0);
    assert_eq!(
      format_reminder_text(
        at(2024, 2, 1, 9, 0),
        now,
        &chrono_tz::UTC
      ),
      "Tomorrow at 09:00"
    );
  }
}
