//! Lane assignment for month and week
//! grids.
//!
//! Every event visible in a window gets a
//! display row ("lane") so that two
//! events sharing a day never share a
//! lane. Multi-day events are packed
//! first into a band of low lanes;
//! single-day events only use lanes below
//! that band. Packing is greedy
//! first-fit over a total sort
//! order, so the same event set always
//! produces the same layout regardless of
//! input order.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{
  debug,
  trace
};

use crate::day::DayNormalizer;
use crate::event::{
  CalendarEvent,
  EventSpan
};
use crate::window::DayWindow;

/// Placement of one event inside a
/// window. Day numbers are 1-based
/// positions in the window (see
/// [`DayWindow::day_number`]).
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct EventLayout {
  pub event_id:      String,
  /// Position of the event in the slice
  /// passed to [`assign_lanes`].
  pub source_index:  usize,
  pub start_day:     u32,
  pub end_day:       u32,
  pub occupied_days: BTreeSet<u32>,
  pub lane:          usize,
  pub multi_day:     bool
}

#[derive(Debug)]
struct Candidate<'a> {
  index:     usize,
  id:        &'a str,
  start_day: u32,
  end_day:   u32,
  multi_day: bool
}

#[tracing::instrument(
  skip(events, window, normalizer),
  fields(events = events.len(), window = %window)
)]
pub fn assign_lanes(
  events: &[CalendarEvent],
  window: &DayWindow,
  normalizer: &DayNormalizer
) -> Vec<EventLayout> {
  let spans: Vec<EventSpan> = events
    .iter()
    .map(|event| event.span(normalizer))
    .collect();
  assign_lanes_to_spans(
    events, &spans, window
  )
}

/// [`assign_lanes`] over spans that were
/// already normalised; `spans[i]` belongs
/// to `events[i]`.
pub(crate) fn assign_lanes_to_spans(
  events: &[CalendarEvent],
  spans: &[EventSpan],
  window: &DayWindow
) -> Vec<EventLayout> {
  if window.is_empty() {
    debug!("empty window; nothing to lay out");
    return vec![];
  }

  let mut candidates: Vec<Candidate> =
    events
      .iter()
      .zip(spans)
      .enumerate()
      .filter_map(|(index, (event, span))| {
        clamp_candidate(
          index, event, span, window
        )
      })
      .collect();
  candidates.sort_by(placement_order);

  // One day-set per lane, union of its
  // occupants.
  let mut lanes: Vec<BTreeSet<u32>> =
    Vec::new();
  let mut multi_day_lanes = 0_usize;
  let mut out =
    Vec::with_capacity(candidates.len());

  for candidate in candidates {
    let occupied: BTreeSet<u32> =
      (candidate.start_day
        ..=candidate.end_day)
        .collect();

    let lane = if candidate.multi_day {
      debug_assert_eq!(
        lanes.len(),
        multi_day_lanes,
        "multi-day events are placed \
         before any single-day lane \
         opens"
      );
      let lane = first_fit(
        &lanes,
        0,
        multi_day_lanes,
        &occupied
      )
      .unwrap_or(multi_day_lanes);
      if lane == multi_day_lanes {
        multi_day_lanes += 1;
      }
      lane
    } else {
      first_fit(
        &lanes,
        multi_day_lanes,
        lanes.len(),
        &occupied
      )
      .unwrap_or(lanes.len())
    };

    if lane == lanes.len() {
      lanes.push(BTreeSet::new());
    }
    lanes[lane]
      .extend(occupied.iter().copied());

    trace!(
      id = candidate.id,
      lane,
      start = candidate.start_day,
      end = candidate.end_day,
      multi_day = candidate.multi_day,
      "placed event"
    );

    out.push(EventLayout {
      event_id: candidate
        .id
        .to_string(),
      source_index: candidate.index,
      start_day: candidate.start_day,
      end_day: candidate.end_day,
      occupied_days: occupied,
      lane,
      multi_day: candidate.multi_day
    });
  }

  debug_assert!(
    lanes_are_disjoint(&out),
    "events sharing a lane overlap"
  );
  debug!(
    placed = out.len(),
    lanes = lanes.len(),
    multi_day_lanes,
    "assigned lanes"
  );
  out
}

/// Number of lanes used by `layouts`.
pub fn lane_count(
  layouts: &[EventLayout]
) -> usize {
  layouts
    .iter()
    .map(|layout| layout.lane + 1)
    .max()
    .unwrap_or(0)
}

/// Size of the band reserved for
/// multi-day events.
pub fn multi_day_lane_count(
  layouts: &[EventLayout]
) -> usize {
  layouts
    .iter()
    .filter(|layout| layout.multi_day)
    .map(|layout| layout.lane + 1)
    .max()
    .unwrap_or(0)
}

fn clamp_candidate<'a>(
  index: usize,
  event: &'a CalendarEvent,
  span: &EventSpan,
  window: &DayWindow
) -> Option<Candidate<'a>> {
  let (start, end) = window.clamp(span)?;
  let start_day =
    window.day_number(start)?;
  let end_day = window.day_number(end)?;

  Some(Candidate {
    index,
    id: event.id.as_str(),
    start_day,
    end_day,
    multi_day: start_day != end_day
  })
}

/// Multi-day first, then by start day;
/// longer multi-day spans win ties. The
/// id and input position only break
/// what remains.
fn placement_order(
  a: &Candidate<'_>,
  b: &Candidate<'_>
) -> Ordering {
  b.multi_day
    .cmp(&a.multi_day)
    .then(a.start_day.cmp(&b.start_day))
    .then_with(|| {
      if a.multi_day {
        b.end_day.cmp(&a.end_day)
      } else {
        Ordering::Equal
      }
    })
    .then_with(|| a.id.cmp(b.id))
    .then(a.index.cmp(&b.index))
}

fn first_fit(
  lanes: &[BTreeSet<u32>],
  from: usize,
  to: usize,
  occupied: &BTreeSet<u32>
) -> Option<usize> {
  (from..to).find(|&lane| {
    lanes
      .get(lane)
      .is_some_and(|days| {
        days.is_disjoint(occupied)
      })
  })
}

fn lanes_are_disjoint(
  layouts: &[EventLayout]
) -> bool {
  layouts.iter().enumerate().all(
    |(i, a)| {
      layouts[i + 1..].iter().all(|b| {
        a.lane != b.lane
          || a
            .occupied_days
            .is_disjoint(&b.occupied_days)
      })
    }
  )
}
