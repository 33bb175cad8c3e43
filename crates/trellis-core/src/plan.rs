//! Per-day render plans: which events a
//! day cell shows, in which order, and how
//! many are left for a "+N more"
//! indicator.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::day::{
  CalendarDay,
  DayNormalizer
};
use crate::event::{
  CalendarEvent,
  EventSpan
};
use crate::lanes::{
  EventLayout,
  assign_lanes_to_spans
};
use crate::window::DayWindow;

pub const DEFAULT_MAX_VISIBLE: usize = 5;

#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct RenderPlan {
  pub day:            CalendarDay,
  /// 1-based position of `day` in the
  /// window; `None` outside it.
  pub day_number:     Option<u32>,
  pub visible_events: Vec<String>,
  pub overflow_count: usize
}

impl RenderPlan {
  /// Number of events covering the day.
  #[must_use]
  pub fn total(&self) -> usize {
    self.visible_events.len()
      + self.overflow_count
  }
}

/// Lanes and per-day plans for a whole
/// window, computed from one lane
/// assignment.
#[derive(Debug, Clone, Serialize)]
pub struct WindowLayout {
  pub window:  DayWindow,
  pub layouts: Vec<EventLayout>,
  pub plans:   Vec<RenderPlan>
}

/// Plan for a single `day`. `layouts`
/// must come from laying out `events` in
/// `window`.
pub fn build_render_plan(
  day: CalendarDay,
  events: &[CalendarEvent],
  layouts: &[EventLayout],
  window: &DayWindow,
  max_visible: usize,
  normalizer: &DayNormalizer
) -> RenderPlan {
  let spans = normalize_spans(
    events, normalizer
  );
  plan_day(
    day,
    window.day_number(day),
    events,
    &spans,
    &index_layouts(layouts),
    max_visible
  )
}

#[tracing::instrument(
  skip(events, window, normalizer),
  fields(events = events.len(), window = %window)
)]
pub fn build_window_plans(
  events: &[CalendarEvent],
  window: DayWindow,
  max_visible: usize,
  normalizer: &DayNormalizer
) -> WindowLayout {
  // Dates are normalised once here and
  // shared by the lanes and every day.
  let spans = normalize_spans(
    events, normalizer
  );
  let layouts = assign_lanes_to_spans(
    events, &spans, &window
  );
  let by_index =
    index_layouts(&layouts);
  let plans: Vec<RenderPlan> = window
    .days()
    .map(|day| {
      plan_day(
        day,
        window.day_number(day),
        events,
        &spans,
        &by_index,
        max_visible
      )
    })
    .collect();

  let crowded = plans
    .iter()
    .filter(|plan| plan.overflow_count > 0)
    .count();
  debug!(
    days = plans.len(),
    crowded,
    "built render plans"
  );

  WindowLayout {
    window,
    layouts,
    plans
  }
}

fn normalize_spans(
  events: &[CalendarEvent],
  normalizer: &DayNormalizer
) -> Vec<EventSpan> {
  events
    .iter()
    .map(|event| event.span(normalizer))
    .collect()
}

fn index_layouts(
  layouts: &[EventLayout]
) -> HashMap<usize, &EventLayout> {
  layouts
    .iter()
    .map(|layout| {
      (layout.source_index, layout)
    })
    .collect()
}

fn plan_day(
  day: CalendarDay,
  day_number: Option<u32>,
  events: &[CalendarEvent],
  spans: &[EventSpan],
  by_index: &HashMap<
    usize,
    &EventLayout
  >,
  max_visible: usize
) -> RenderPlan {
  let mut covering: Vec<(
    usize,
    &CalendarEvent
  )> = events
    .iter()
    .zip(spans)
    .enumerate()
    .filter(|(_, (_, span))| {
      span.covers(day)
    })
    .map(|(index, (event, _))| {
      (index, event)
    })
    .collect();

  // Multi-day rows first, then
  // single-day rows, each by lane.
  // Events without a layout (day outside
  // the laid-out window) go last.
  covering.sort_by_key(|(index, _)| {
    match by_index.get(index) {
      | Some(layout) if layout.multi_day => {
        (0_u8, layout.lane, *index)
      }
      | Some(layout) => {
        (1, layout.lane, *index)
      }
      | None => (2, usize::MAX, *index)
    }
  });

  let total = covering.len();
  let visible_events = covering
    .into_iter()
    .take(max_visible)
    .map(|(_, event)| event.id.clone())
    .collect();

  RenderPlan {
    day,
    day_number,
    visible_events,
    overflow_count: total
      .saturating_sub(max_visible)
  }
}
