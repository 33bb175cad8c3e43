use serde::{
  Deserialize,
  Serialize
};
use tracing::debug;

use crate::day::{
  CalendarDay,
  DayNormalizer
};

/// Category of an event. Only used for
/// colouring and labels; layout ignores
/// it.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
  Meeting,
  Deadline,
  Milestone,
  Task,
  Reminder,
  #[default]
  #[serde(other)]
  Other
}

impl EventType {
  pub fn label(self) -> &'static str {
    match self {
      | Self::Meeting => "meeting",
      | Self::Deadline => "deadline",
      | Self::Milestone => "milestone",
      | Self::Task => "task",
      | Self::Reminder => "reminder",
      | Self::Other => "other"
    }
  }
}

/// An event record as handed over by the
/// event store. Dates stay raw until they
/// go through a [`DayNormalizer`].
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
  pub id:         String,
  #[serde(default)]
  pub title:      String,
  pub start_date: String,
  #[serde(default)]
  pub end_date:   Option<String>,
  #[serde(default, rename = "type")]
  pub event_type: EventType
}

impl CalendarEvent {
  pub fn single(
    id: impl Into<String>,
    title: impl Into<String>,
    day: CalendarDay
  ) -> Self {
    Self {
      id:         id.into(),
      title:      title.into(),
      start_date: day.to_string(),
      end_date:   None,
      event_type: EventType::Other
    }
  }

  pub fn spanning(
    id: impl Into<String>,
    title: impl Into<String>,
    start: CalendarDay,
    end: CalendarDay
  ) -> Self {
    Self {
      id:         id.into(),
      title:      title.into(),
      start_date: start.to_string(),
      end_date:   Some(end.to_string()),
      event_type: EventType::Other
    }
  }

  #[must_use]
  pub fn with_type(
    mut self,
    event_type: EventType
  ) -> Self {
    self.event_type = event_type;
    self
  }

  pub fn span(
    &self,
    normalizer: &DayNormalizer
  ) -> EventSpan {
    EventSpan::of(self, normalizer)
  }
}

/// Normalised, inclusive day range of an
/// event. Always `start <= end`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct EventSpan {
  pub start: CalendarDay,
  pub end:   CalendarDay
}

impl EventSpan {
  pub fn of(
    event: &CalendarEvent,
    normalizer: &DayNormalizer
  ) -> Self {
    let start = normalizer
      .normalize(&event.start_date);
    let end = event
      .end_date
      .as_deref()
      .map(|raw| normalizer.normalize(raw))
      .unwrap_or(start);

    if end < start {
      debug!(
        id = %event.id,
        start = %start,
        end = %end,
        "end before start; treating as single-day event"
      );
      return Self { start, end: start };
    }

    Self { start, end }
  }

  #[must_use]
  pub fn covers(
    &self,
    day: CalendarDay
  ) -> bool {
    self.start <= day && day <= self.end
  }

  #[must_use]
  pub fn is_multi_day(&self) -> bool {
    self.start != self.end
  }

  #[must_use]
  pub fn len_days(&self) -> i64 {
    self.start.days_until(self.end) + 1
  }
}
