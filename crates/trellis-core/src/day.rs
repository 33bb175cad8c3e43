//! Day normalisation.
//!
//! Every date the layout engine compares is first reduced to a
//! [`CalendarDay`]: a date without time of day or offset. Timestamps are
//! reduced through their UTC date fields so that the same instant maps to
//! the same day regardless of the offset it was written with.

use std::fmt;
use std::sync::OnceLock;

use chrono::{
  DateTime,
  Datelike,
  Duration,
  FixedOffset,
  NaiveDate,
  NaiveDateTime,
  Utc
};
use regex::Regex;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  trace,
  warn
};

const NAIVE_TIMESTAMP_FORMATS: [&str;
  6] = [
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%d %H:%M"
];

const OFFSET_TIMESTAMP_FORMATS: [&str;
  3] = [
  "%Y-%m-%dT%H:%M:%S%z",
  "%Y-%m-%dT%H:%M:%S%.f%z",
  "%Y-%m-%d %H:%M:%S%z"
];

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(transparent)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
  pub fn from_ymd(
    year: i32,
    month: u32,
    day: u32
  ) -> Option<Self> {
    NaiveDate::from_ymd_opt(
      year, month, day
    )
    .map(Self)
  }

  #[must_use]
  pub fn date(self) -> NaiveDate {
    self.0
  }

  #[must_use]
  pub fn year(self) -> i32 {
    self.0.year()
  }

  #[must_use]
  pub fn month(self) -> u32 {
    self.0.month()
  }

  #[must_use]
  pub fn day(self) -> u32 {
    self.0.day()
  }

  /// Saturates at the ends of the
  /// supported date range.
  #[must_use]
  pub fn add_days(
    self,
    days: i64
  ) -> Self {
    self
      .0
      .checked_add_signed(
        Duration::days(days)
      )
      .map(Self)
      .unwrap_or(self)
  }

  /// Signed number of days from `self`
  /// to `other`.
  #[must_use]
  pub fn days_until(
    self,
    other: Self
  ) -> i64 {
    (other.0 - self.0).num_days()
  }

  pub fn today_utc() -> Self {
    Self(Utc::now().date_naive())
  }
}

impl fmt::Display for CalendarDay {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}",
      self.0.format("%Y-%m-%d")
    )
  }
}

impl From<NaiveDate> for CalendarDay {
  fn from(date: NaiveDate) -> Self {
    Self(date)
  }
}

pub trait IntoCalendarDay {
  fn into_calendar_day(
    self
  ) -> CalendarDay;
}

impl IntoCalendarDay for CalendarDay {
  fn into_calendar_day(
    self
  ) -> CalendarDay {
    self
  }
}

impl IntoCalendarDay for NaiveDate {
  fn into_calendar_day(
    self
  ) -> CalendarDay {
    CalendarDay(self)
  }
}

/// Naive timestamps are read as UTC.
impl IntoCalendarDay for NaiveDateTime {
  fn into_calendar_day(
    self
  ) -> CalendarDay {
    CalendarDay(self.date())
  }
}

impl IntoCalendarDay for DateTime<Utc> {
  fn into_calendar_day(
    self
  ) -> CalendarDay {
    CalendarDay(self.date_naive())
  }
}

impl IntoCalendarDay
  for DateTime<FixedOffset>
{
  fn into_calendar_day(
    self
  ) -> CalendarDay {
    CalendarDay(
      self
        .with_timezone(&Utc)
        .date_naive()
    )
  }
}

/// Turns raw date strings into
/// calendar days, falling back to a
/// fixed "today" for anything it cannot
/// read.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct DayNormalizer {
  today: CalendarDay
}

impl DayNormalizer {
  pub fn new(
    today: impl IntoCalendarDay
  ) -> Self {
    Self {
      today: today.into_calendar_day()
    }
  }

  pub fn system() -> Self {
    Self::new(CalendarDay::today_utc())
  }

  #[must_use]
  pub fn today(&self) -> CalendarDay {
    self.today
  }

  pub fn normalize(
    &self,
    raw: &str
  ) -> CalendarDay {
    match parse_day(raw) {
      | Some(day) => day,
      | None => {
        warn!(
          input = raw,
          fallback = %self.today,
          "unparsable date; using today"
        );
        self.today
      }
    }
  }
}

#[tracing::instrument(level = "trace")]
pub fn parse_day(
  raw: &str
) -> Option<CalendarDay> {
  let token = raw.trim();
  if token.is_empty() {
    return None;
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Some(CalendarDay(date));
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Some(dt.into_calendar_day());
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      token,
      "%Y%m%dT%H%M%SZ"
    )
  {
    return Some(
      ndt.into_calendar_day()
    );
  }

  for fmt in OFFSET_TIMESTAMP_FORMATS {
    if let Ok(dt) =
      DateTime::parse_from_str(
        token, fmt
      )
    {
      return Some(
        dt.into_calendar_day()
      );
    }
  }

  for fmt in NAIVE_TIMESTAMP_FORMATS {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Some(
        ndt.into_calendar_day()
      );
    }
  }

  leading_date(token)
}

fn leading_date(
  token: &str
) -> Option<CalendarDay> {
  static LEADING_DATE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  let re = LEADING_DATE
    .get_or_init(|| {
      Regex::new(
        r"^(?P<date>\d{4}-\d{2}-\d{2})(?:[T\s]|$)"
      )
      .ok()
    })
    .as_ref()?;

  let date = re
    .captures(token)?
    .name("date")?
    .as_str();
  trace!(
    token,
    date,
    "using leading date of timestamp"
  );
  NaiveDate::parse_from_str(
    date, "%Y-%m-%d"
  )
  .ok()
  .map(CalendarDay)
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::{
    CalendarDay,
    DayNormalizer,
    IntoCalendarDay,
    parse_day
  };

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> CalendarDay {
    CalendarDay::from_ymd(y, m, d)
      .expect("valid day")
  }

  #[test]
  fn date_only_strings_are_taken_verbatim()
  {
    assert_eq!(
      parse_day("2024-03-05"),
      Some(day(2024, 3, 5))
    );
    assert_eq!(
      parse_day("  2024-12-31 "),
      Some(day(2024, 12, 31))
    );
  }

  #[test]
  fn offset_timestamps_use_the_utc_date()
  {
    // 23:30 in New York is already the
    // next day in UTC.
    assert_eq!(
      parse_day(
        "2024-03-05T23:30:00-05:00"
      ),
      Some(day(2024, 3, 6))
    );
    assert_eq!(
      parse_day(
        "2024-03-05T00:30:00+02:00"
      ),
      Some(day(2024, 3, 4))
    );
    assert_eq!(
      parse_day(
        "2024-03-05T00:30:00.000Z"
      ),
      Some(day(2024, 3, 5))
    );
  }

  #[test]
  fn other_timestamp_shapes_are_accepted()
  {
    assert_eq!(
      parse_day("20240305T120000Z"),
      Some(day(2024, 3, 5))
    );
    assert_eq!(
      parse_day("2024-03-05 09:15"),
      Some(day(2024, 3, 5))
    );
    assert_eq!(
      parse_day(
        "2024-03-05T01:00:00+0300"
      ),
      Some(day(2024, 3, 4))
    );
    assert_eq!(
      parse_day(
        "2024-03-05T10:00:00 local"
      ),
      Some(day(2024, 3, 5))
    );
  }

  #[test]
  fn garbage_falls_back_to_today() {
    let normalizer =
      DayNormalizer::new(day(2025, 1, 9));
    assert_eq!(parse_day("soon"), None);
    assert_eq!(parse_day(""), None);
    assert_eq!(
      parse_day("2024-02-30"),
      None
    );
    assert_eq!(
      normalizer.normalize("soon"),
      day(2025, 1, 9)
    );
    assert_eq!(
      normalizer.normalize("2024-07-04"),
      day(2024, 7, 4)
    );
  }

  #[test]
  fn typed_dates_convert_through_utc() {
    let instant = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 23, 59, 0
      )
      .single()
      .expect("valid instant");
    assert_eq!(
      instant.into_calendar_day(),
      day(2026, 2, 17)
    );
    assert_eq!(
      instant
        .fixed_offset()
        .into_calendar_day(),
      day(2026, 2, 17)
    );
  }

  #[test]
  fn day_arithmetic() {
    let start = day(2024, 2, 28);
    assert_eq!(
      start.add_days(2),
      day(2024, 3, 1)
    );
    assert_eq!(
      start.days_until(day(2024, 3, 1)),
      2
    );
    assert_eq!(
      start.to_string(),
      "2024-02-28"
    );
  }
}
