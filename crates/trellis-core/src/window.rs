use std::fmt;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::day::{
  CalendarDay,
  parse_day
};
use crate::event::EventSpan;

/// Contiguous, inclusive range of
/// visible days. A window whose `end` is
/// before its `start` is empty.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct DayWindow {
  pub start: CalendarDay,
  pub end:   CalendarDay
}

impl DayWindow {
  pub fn new(
    start: CalendarDay,
    end: CalendarDay
  ) -> Self {
    Self { start, end }
  }

  pub fn month(
    year: i32,
    month: u32
  ) -> anyhow::Result<Self> {
    if !(1..=12).contains(&month) {
      return Err(anyhow!(
        "invalid month value: {month}"
      ));
    }
    Ok(Self {
      start: first_day_of_month(
        year, month
      ),
      end:   last_day_of_month(
        year, month
      )
    })
  }

  pub fn month_of(
    day: CalendarDay
  ) -> Self {
    Self {
      start: first_day_of_month(
        day.year(),
        day.month()
      ),
      end:   last_day_of_month(
        day.year(),
        day.month()
      )
    }
  }

  pub fn week_of(
    day: CalendarDay,
    week_start: Weekday
  ) -> Self {
    let start =
      start_of_week(day, week_start);
    Self {
      start,
      end: start.add_days(6)
    }
  }

  /// Whole weeks covering a month, the
  /// way a month grid shows leading and
  /// trailing days of the neighbouring
  /// months.
  pub fn month_grid(
    year: i32,
    month: u32,
    week_start: Weekday
  ) -> anyhow::Result<Self> {
    let inner = Self::month(year, month)?;
    let start = start_of_week(
      inner.start,
      week_start
    );
    let end = start_of_week(
      inner.end,
      week_start
    )
    .add_days(6);
    Ok(Self { start, end })
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.end < self.start
  }

  #[must_use]
  pub fn len_days(&self) -> i64 {
    if self.is_empty() {
      0
    } else {
      self.start.days_until(self.end)
        + 1
    }
  }

  #[must_use]
  pub fn contains(
    &self,
    day: CalendarDay
  ) -> bool {
    self.start <= day && day <= self.end
  }

  pub fn days(
    &self
  ) -> impl Iterator<Item = CalendarDay>
  {
    let start = self.start;
    (0..self.len_days())
      .map(move |offset| {
        start.add_days(offset)
      })
  }

  /// 1-based position of `day` inside
  /// the window. For a month window this
  /// is the day of the month.
  #[must_use]
  pub fn day_number(
    &self,
    day: CalendarDay
  ) -> Option<u32> {
    if !self.contains(day) {
      return None;
    }
    u32::try_from(
      self.start.days_until(day) + 1
    )
    .ok()
  }

  #[must_use]
  pub fn day_at(
    &self,
    number: u32
  ) -> Option<CalendarDay> {
    if number == 0 {
      return None;
    }
    let day = self
      .start
      .add_days(i64::from(number) - 1);
    self.contains(day).then_some(day)
  }

  #[must_use]
  pub fn intersects(
    &self,
    span: &EventSpan
  ) -> bool {
    !self.is_empty()
      && span.start <= self.end
      && span.end >= self.start
  }

  /// The part of `span` that falls
  /// inside the window, if any.
  #[must_use]
  pub fn clamp(
    &self,
    span: &EventSpan
  ) -> Option<(CalendarDay, CalendarDay)>
  {
    if !self.intersects(span) {
      return None;
    }
    Some((
      span.start.max(self.start),
      span.end.min(self.end)
    ))
  }
}

impl fmt::Display for DayWindow {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}..{}",
      self.start, self.end
    )
  }
}

pub fn parse_week_start(
  raw: &str
) -> Weekday {
  if raw
    .trim()
    .eq_ignore_ascii_case("sunday")
  {
    Weekday::Sun
  } else {
    Weekday::Mon
  }
}

/// Parses a window expression:
/// `today`/`this-month`, `week`,
/// `YYYY-MM`, `grid:YYYY-MM`,
/// `week:YYYY-MM-DD`, `YYYY-MM-DD` or
/// `YYYY-MM-DD..YYYY-MM-DD`.
#[tracing::instrument(skip(week_start, today))]
pub fn parse_window(
  expr: &str,
  week_start: Weekday,
  today: CalendarDay
) -> anyhow::Result<DayWindow> {
  let token = expr.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" | "month" | "this-month" => {
      return Ok(DayWindow::month_of(
        today
      ));
    }
    | "week" | "this-week" => {
      return Ok(DayWindow::week_of(
        today, week_start
      ));
    }
    | "grid" => {
      return DayWindow::month_grid(
        today.year(),
        today.month(),
        week_start
      );
    }
    | _ => {}
  }

  if let Some(rest) =
    lower.strip_prefix("grid:")
  {
    let (year, month) =
      parse_year_month(rest)?;
    return DayWindow::month_grid(
      year, month, week_start
    );
  }

  if let Some(rest) =
    lower.strip_prefix("week:")
  {
    let day = parse_day(rest)
      .ok_or_else(|| {
        anyhow!(
          "invalid week anchor: {rest}"
        )
      })?;
    return Ok(DayWindow::week_of(
      day, week_start
    ));
  }

  if let Some((from, to)) =
    token.split_once("..")
  {
    let start = parse_day(from)
      .ok_or_else(|| {
        anyhow!(
          "invalid window start: {from}"
        )
      })?;
    let end = parse_day(to)
      .ok_or_else(|| {
        anyhow!(
          "invalid window end: {to}"
        )
      })?;
    let window =
      DayWindow::new(start, end);
    if window.is_empty() {
      debug!(%window, "window expression is empty");
    }
    return Ok(window);
  }

  if let Ok((year, month)) =
    parse_year_month(token)
  {
    return DayWindow::month(
      year, month
    );
  }

  if let Some(day) = parse_day(token) {
    return Ok(DayWindow::new(day, day));
  }

  Err(anyhow!(
    "unrecognized window expression: \
     {expr}"
  ))
  .with_context(|| {
    "supported forms: today, week, \
     grid, YYYY-MM, grid:YYYY-MM, \
     week:YYYY-MM-DD, YYYY-MM-DD, \
     YYYY-MM-DD..YYYY-MM-DD"
  })
}

fn parse_year_month(
  token: &str
) -> anyhow::Result<(i32, u32)> {
  let re = Regex::new(
    r"^(?P<year>\d{4})-(?P<month>\d{1,2})$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  let caps = re
    .captures(token.trim())
    .ok_or_else(|| {
      anyhow!(
        "expected YYYY-MM, got: {token}"
      )
    })?;

  let year: i32 = caps
    .name("year")
    .map(|m| m.as_str())
    .ok_or_else(|| anyhow!("missing year"))?
    .parse()
    .context("invalid year")?;
  let month: u32 = caps
    .name("month")
    .map(|m| m.as_str())
    .ok_or_else(|| {
      anyhow!("missing month")
    })?
    .parse()
    .context("invalid month")?;
  if !(1..=12).contains(&month) {
    return Err(anyhow!(
      "invalid month value: {month}"
    ));
  }
  Ok((year, month))
}

fn first_day_of_month(
  year: i32,
  month: u32
) -> CalendarDay {
  CalendarDay::from(
    NaiveDate::from_ymd_opt(
      year, month, 1
    )
    .unwrap_or(NaiveDate::MIN)
  )
}

fn last_day_of_month(
  year: i32,
  month: u32
) -> CalendarDay {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  first_day_of_month(
    next_year, next_month
  )
  .add_days(-1)
}

fn start_of_week(
  day: CalendarDay,
  week_start: Weekday
) -> CalendarDay {
  let day_idx = day
    .date()
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  day.add_days(-diff)
}
