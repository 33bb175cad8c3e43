//! Which events touch a given day.

use chrono::{
  Datelike,
  Weekday
};

use crate::day::{
  CalendarDay,
  DayNormalizer
};
use crate::event::{
  CalendarEvent,
  EventSpan
};
use crate::window::DayWindow;

/// Events whose inclusive range covers
/// `day`, in input order.
pub fn events_on_day<'a>(
  day: CalendarDay,
  events: &'a [CalendarEvent],
  normalizer: &DayNormalizer
) -> Vec<&'a CalendarEvent> {
  events
    .iter()
    .filter(|event| {
      event
        .span(normalizer)
        .covers(day)
    })
    .collect()
}

/// Events that begin on `day` and are at
/// least partly visible in `window`.
/// These render their label in that
/// cell; the rest continue silently from
/// an earlier day.
pub fn events_starting_on_day<'a>(
  day: CalendarDay,
  events: &'a [CalendarEvent],
  window: &DayWindow,
  normalizer: &DayNormalizer
) -> Vec<&'a CalendarEvent> {
  events
    .iter()
    .filter(|event| {
      let span = event.span(normalizer);
      span.start == day
        && window.intersects(&span)
    })
    .collect()
}

/// Events that render their label in the
/// `day` cell of a grid starting weeks on
/// `week_start`: the ones beginning there
/// and the ones carried into a new week
/// row (see [`label_days`]).
pub fn events_labelled_on_day<'a>(
  day: CalendarDay,
  events: &'a [CalendarEvent],
  window: &DayWindow,
  week_start: Weekday,
  normalizer: &DayNormalizer
) -> Vec<&'a CalendarEvent> {
  events
    .iter()
    .filter(|event| {
      let span = event.span(normalizer);
      span.covers(day)
        && label_days(
          &span, window, week_start
        )
        .contains(&day)
    })
    .collect()
}

/// Cells where a bar should repeat its
/// label: its first visible day, then the
/// first day of every later week row.
pub fn label_days(
  span: &EventSpan,
  window: &DayWindow,
  week_start: Weekday
) -> Vec<CalendarDay> {
  let Some((start, end)) =
    window.clamp(span)
  else {
    return vec![];
  };

  let mut out = vec![start];
  let mut day = start.add_days(1);
  while day <= end {
    if day.date().weekday() == week_start
    {
      out.push(day);
    }
    day = day.add_days(1);
  }
  out
}
