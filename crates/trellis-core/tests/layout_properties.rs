use std::collections::BTreeSet;

use trellis_core::day::{CalendarDay, DayNormalizer};
use trellis_core::event::CalendarEvent;
use trellis_core::lanes::{EventLayout, assign_lanes};
use trellis_core::membership::events_on_day;
use trellis_core::plan::build_window_plans;
use trellis_core::window::DayWindow;

/// Small xorshift generator so the event sets are varied but reproducible.
struct Rng(u64);

impl Rng {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

fn base_day() -> CalendarDay {
    CalendarDay::from_ymd(2024, 2, 20).expect("valid day")
}

fn window() -> DayWindow {
    DayWindow::month(2024, 3).expect("month window")
}

fn normalizer() -> DayNormalizer {
    DayNormalizer::new(CalendarDay::from_ymd(2024, 3, 1).expect("valid day"))
}

fn random_events(seed: u64, count: usize) -> Vec<CalendarEvent> {
    let mut rng = Rng(seed);
    (0..count)
        .map(|n| {
            let start = base_day().add_days(rng.below(50) as i64);
            let id = format!("evt-{n:03}");
            match rng.below(4) {
                0 => CalendarEvent::single(id, "single", start),
                1 => {
                    // Inverted on purpose.
                    CalendarEvent::spanning(id, "inverted", start, start.add_days(-3))
                }
                _ => {
                    let end = start.add_days(rng.below(9) as i64);
                    CalendarEvent::spanning(id, "span", start, end)
                }
            }
        })
        .collect()
}

fn shuffle<T>(items: &mut [T], seed: u64) {
    let mut rng = Rng(seed);
    for i in (1..items.len()).rev() {
        let j = rng.below(i as u64 + 1) as usize;
        items.swap(i, j);
    }
}

fn placement(layouts: &[EventLayout]) -> Vec<(String, usize, BTreeSet<u32>)> {
    let mut out: Vec<_> = layouts
        .iter()
        .map(|layout| {
            (
                layout.event_id.clone(),
                layout.lane,
                layout.occupied_days.clone(),
            )
        })
        .collect();
    out.sort();
    out
}

#[test]
fn lanes_never_hold_overlapping_events() {
    for seed in 1..=20 {
        let events = random_events(seed * 7919, 40);
        let layouts = assign_lanes(&events, &window(), &normalizer());

        for (i, a) in layouts.iter().enumerate() {
            for b in &layouts[i + 1..] {
                if a.lane == b.lane {
                    assert!(
                        a.occupied_days.is_disjoint(&b.occupied_days),
                        "seed {seed}: {} and {} share lane {}",
                        a.event_id,
                        b.event_id,
                        a.lane
                    );
                }
            }
        }
    }
}

#[test]
fn multi_day_band_sits_above_single_day_lanes() {
    for seed in 1..=20 {
        let events = random_events(seed * 104_729, 40);
        let layouts = assign_lanes(&events, &window(), &normalizer());

        let deepest_multi = layouts
            .iter()
            .filter(|layout| layout.multi_day)
            .map(|layout| layout.lane)
            .max();
        let highest_single = layouts
            .iter()
            .filter(|layout| !layout.multi_day)
            .map(|layout| layout.lane)
            .min();
        if let (Some(multi), Some(single)) = (deepest_multi, highest_single) {
            assert!(multi < single, "seed {seed}: multi lane {multi} >= single lane {single}");
        }

        if let Some(first_multi) = layouts.iter().find(|layout| layout.multi_day) {
            assert_eq!(first_multi.lane, 0);
        }
    }
}

#[test]
fn occupied_days_are_the_visible_part_of_each_event() {
    let events = random_events(42, 60);
    let window = window();
    let normalizer = normalizer();
    let layouts = assign_lanes(&events, &window, &normalizer);

    let visible = events
        .iter()
        .filter(|event| window.intersects(&event.span(&normalizer)))
        .count();
    assert_eq!(layouts.len(), visible);

    for layout in &layouts {
        let event = &events[layout.source_index];
        assert_eq!(event.id, layout.event_id);
        let span = event.span(&normalizer);
        let expected: BTreeSet<u32> = window
            .days()
            .filter(|day| span.covers(*day))
            .filter_map(|day| window.day_number(day))
            .collect();
        assert_eq!(layout.occupied_days, expected, "{}", layout.event_id);
        assert_eq!(layout.start_day, *expected.first().expect("non-empty"));
        assert_eq!(layout.end_day, *expected.last().expect("non-empty"));
        assert_eq!(layout.multi_day, expected.len() > 1);
    }
}

#[test]
fn repeated_and_reordered_input_gives_the_same_lanes() {
    for seed in 1..=10 {
        let events = random_events(seed * 31, 35);
        let first = assign_lanes(&events, &window(), &normalizer());

        let rebuilt: Vec<CalendarEvent> = events.iter().cloned().collect();
        let second = assign_lanes(&rebuilt, &window(), &normalizer());
        assert_eq!(first, second);

        let mut shuffled = events.clone();
        shuffle(&mut shuffled, seed * 977);
        let third = assign_lanes(&shuffled, &window(), &normalizer());
        assert_eq!(placement(&first), placement(&third), "seed {seed}");
    }
}

#[test]
fn render_plans_account_for_every_event_on_each_day() {
    for max_visible in [1, 3, 5] {
        let events = random_events(2024, 80);
        let normalizer = normalizer();
        let planned = build_window_plans(&events, window(), max_visible, &normalizer);

        assert_eq!(planned.plans.len(), 31);
        for plan in &planned.plans {
            let total = events_on_day(plan.day, &events, &normalizer).len();
            assert!(plan.visible_events.len() <= max_visible);
            assert_eq!(plan.visible_events.len() + plan.overflow_count, total);

            // Multi-day rows first, each group ordered by lane.
            let rows: Vec<(bool, usize)> = plan
                .visible_events
                .iter()
                .map(|id| {
                    let layout = planned
                        .layouts
                        .iter()
                        .find(|layout| &layout.event_id == id)
                        .expect("visible event laid out");
                    (!layout.multi_day, layout.lane)
                })
                .collect();
            let mut sorted = rows.clone();
            sorted.sort();
            assert_eq!(rows, sorted, "day {}", plan.day);
        }
    }
}
