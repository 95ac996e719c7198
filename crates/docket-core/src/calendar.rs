use chrono::{
  Datelike,
  Duration,
  NaiveDate
};
use chrono_tz::Tz;
use tracing::trace;

use crate::error::CoreError;
use crate::task::Task;
use crate::view::tasks_on_date;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct DayCell {
  pub day:      u32,
  pub in_month: bool,
  pub date:     NaiveDate
}

pub type Week = [DayCell; 7];

/// A Monday-first month view padded
/// with days from the neighbouring
/// months to whole weeks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
  pub year:   i32,
  /// Zero-based (January = 0).
  pub month0: u32,
  pub weeks:  Vec<Week>
}

impl MonthGrid {
  #[tracing::instrument]
  pub fn build(
    year: i32,
    month0: u32
  ) -> Result<Self, CoreError> {
    if month0 > 11 {
      return Err(
        CoreError::InvalidMonth(month0)
      );
    }
    let month = month0 + 1;
    let first =
      first_day_of_month(year, month)?;
    let days_in_month =
      days_in_month(year, month)?;

    let first_day_index = first
      .weekday()
      .num_days_from_monday();

    let mut cells = Vec::with_capacity(
      42
    );
    for offset in
      (1..=first_day_index).rev()
    {
      let date = add_days(
        first,
        -i64::from(offset)
      );
      cells.push(DayCell {
        day: date.day(),
        in_month: false,
        date
      });
    }

    for day in 1..=days_in_month {
      let date = add_days(
        first,
        i64::from(day - 1)
      );
      cells.push(DayCell {
        day,
        in_month: true,
        date
      });
    }

    let total = cells.len().div_ceil(7) * 7;
    let mut next = add_days(
      first,
      i64::from(days_in_month)
    );
    while cells.len() < total {
      cells.push(DayCell {
        day: next.day(),
        in_month: false,
        date: next
      });
      next = add_days(next, 1);
    }

    let weeks: Vec<Week> = cells
      .chunks_exact(7)
      .filter_map(|chunk| {
        chunk.try_into().ok()
      })
      .collect();

    trace!(
      year,
      month0,
      leading = first_day_index,
      weeks = weeks.len(),
      "built month grid"
    );

    Ok(Self {
      year,
      month0,
      weeks
    })
  }

  pub fn cells(
    &self
  ) -> impl Iterator<Item = &DayCell> {
    self.weeks.iter().flatten()
  }

  pub fn cell_count(&self) -> usize {
    self.weeks.len() * 7
  }

  /// Pairs every cell with the tasks due
  /// on its date.
  pub fn bucket<'a>(
    &self,
    tasks: &'a [Task],
    tz: &Tz
  ) -> Vec<Vec<(DayCell, Vec<&'a Task>)>>
  {
    self
      .weeks
      .iter()
      .map(|week| {
        week
          .iter()
          .map(|cell| {
            (
              *cell,
              tasks_on_date(
                tasks, cell.date, tz
              )
            )
          })
          .collect()
      })
      .collect()
  }
}

/// Year plus zero-based month, used to
/// step the calendar back and forth.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct MonthCursor {
  pub year:   i32,
  pub month0: u32
}

impl MonthCursor {
  pub fn containing(
    date: NaiveDate
  ) -> Self {
    Self {
      year:   date.year(),
      month0: date.month0()
    }
  }

  #[must_use]
  pub fn shift(
    self,
    months: i32
  ) -> Self {
    let total = i64::from(self.year)
      * 12
      + i64::from(self.month0)
      + i64::from(months);
    Self {
      year:   total.div_euclid(12)
        as i32,
      month0: total.rem_euclid(12)
        as u32
    }
  }

  #[must_use]
  pub fn prev(self) -> Self {
    self.shift(-1)
  }

  #[must_use]
  pub fn next(self) -> Self {
    self.shift(1)
  }

  pub fn grid(
    self
  ) -> Result<MonthGrid, CoreError> {
    MonthGrid::build(
      self.year,
      self.month0
    )
  }
}

fn first_day_of_month(
  year: i32,
  month: u32
) -> Result<NaiveDate, CoreError> {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .ok_or_else(|| {
    CoreError::Parse(format!(
      "no such month: {year}-{month:02}"
    ))
  })
}

/// `month` counts from 1.
pub fn days_in_month(
  year: i32,
  month: u32
) -> Result<u32, CoreError> {
  if !(1..=12).contains(&month) {
    return Err(CoreError::InvalidMonth(
      month
    ));
  }
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  let last = add_days(
    first_day_of_month(
      next_year, next_month
    )?,
    -1
  );
  Ok(last.day())
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}
