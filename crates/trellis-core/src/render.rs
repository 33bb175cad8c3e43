use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::day::CalendarDay;
use crate::event::CalendarEvent;
use crate::lanes::EventLayout;
use crate::plan::WindowLayout;
use crate::window::DayWindow;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, value))]
    pub fn print_json<T: Serialize>(&mut self, value: &T) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, events, layouts))]
    pub fn print_layouts(
        &mut self,
        events: &[CalendarEvent],
        layouts: &[EventLayout],
        window: &DayWindow,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_layouts(out, events, layouts, window)
    }

    pub fn write_layouts<W: Write>(
        &self,
        writer: W,
        events: &[CalendarEvent],
        layouts: &[EventLayout],
        window: &DayWindow,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "Lane".to_string(),
            "ID".to_string(),
            "Title".to_string(),
            "Type".to_string(),
            "From".to_string(),
            "To".to_string(),
            "Days".to_string(),
        ];

        let mut sorted: Vec<&EventLayout> = layouts.iter().collect();
        sorted.sort_by_key(|layout| (layout.lane, layout.start_day, layout.source_index));

        let mut rows = Vec::with_capacity(sorted.len());
        for layout in sorted {
            let event = events.get(layout.source_index);
            let title = event.map(|e| e.title.clone()).unwrap_or_default();
            let kind = event.map(|e| e.event_type.label()).unwrap_or("-");
            let from = day_label(window.day_at(layout.start_day));
            let to = day_label(window.day_at(layout.end_day));
            let lane = layout.lane.to_string();
            let lane = if layout.multi_day {
                self.paint(&lane, "36")
            } else {
                lane
            };

            rows.push(vec![
                lane,
                layout.event_id.clone(),
                title,
                kind.to_string(),
                from,
                to,
                layout.occupied_days.len().to_string(),
            ]);
        }

        write_table(writer, headers, rows)
    }

    #[tracing::instrument(skip(self, events, layout))]
    pub fn print_plans(
        &mut self,
        events: &[CalendarEvent],
        layout: &WindowLayout,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_plans(out, events, layout)
    }

    pub fn write_plans<W: Write>(
        &self,
        writer: W,
        events: &[CalendarEvent],
        layout: &WindowLayout,
    ) -> anyhow::Result<()> {
        let titles = titles_by_id(events);
        let headers = vec![
            "Day".to_string(),
            "Date".to_string(),
            "Events".to_string(),
            "More".to_string(),
        ];

        let mut rows = Vec::with_capacity(layout.plans.len());
        for plan in &layout.plans {
            let number = plan.day_number.map(|n| n.to_string()).unwrap_or_default();
            let shown = plan
                .visible_events
                .iter()
                .map(|id| titles.get(id.as_str()).copied().unwrap_or(id.as_str()))
                .collect::<Vec<_>>()
                .join(", ");
            let more = if plan.overflow_count > 0 {
                self.paint(&format!("+{} more", plan.overflow_count), "33")
            } else {
                String::new()
            };

            rows.push(vec![number, plan.day.to_string(), shown, more]);
        }

        write_table(writer, headers, rows)
    }

    #[tracing::instrument(skip(self, on_day, starting, labelled))]
    pub fn print_day(
        &mut self,
        day: CalendarDay,
        on_day: &[&CalendarEvent],
        starting: &[&CalendarEvent],
        labelled: &[&CalendarEvent],
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_day(out, day, on_day, starting, labelled)
    }

    /// One row per covering event. Bars that begin here show "starts",
    /// bars that repeat their label at a new week row show "label".
    pub fn write_day<W: Write>(
        &self,
        mut writer: W,
        day: CalendarDay,
        on_day: &[&CalendarEvent],
        starting: &[&CalendarEvent],
        labelled: &[&CalendarEvent],
    ) -> anyhow::Result<()> {
        writeln!(writer, "{day}")?;

        let headers = vec![
            "ID".to_string(),
            "Title".to_string(),
            "Type".to_string(),
            "Label".to_string(),
        ];
        let rows = on_day
            .iter()
            .map(|event| {
                let label = if starting.iter().any(|s| std::ptr::eq(*s, *event)) {
                    self.paint("starts", "32")
                } else if labelled.iter().any(|s| std::ptr::eq(*s, *event)) {
                    "label".to_string()
                } else {
                    "continues".to_string()
                };
                vec![
                    event.id.clone(),
                    event.title.clone(),
                    event.event_type.label().to_string(),
                    label,
                ]
            })
            .collect();

        write_table(writer, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn titles_by_id(events: &[CalendarEvent]) -> HashMap<&str, &str> {
    let mut out = HashMap::new();
    for event in events {
        let title = if event.title.is_empty() {
            event.id.as_str()
        } else {
            event.title.as_str()
        };
        out.entry(event.id.as_str()).or_insert(title);
    }
    out
}

fn day_label(day: Option<CalendarDay>) -> String {
    day.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;

    use super::{Renderer, strip_ansi, write_table};
    use crate::config::Config;
    use crate::day::{CalendarDay, DayNormalizer};
    use crate::event::{CalendarEvent, EventType};
    use crate::lanes::assign_lanes;
    use crate::membership::{events_labelled_on_day, events_on_day, events_starting_on_day};
    use crate::plan::build_window_plans;
    use crate::window::DayWindow;

    fn day(d: u32) -> CalendarDay {
        CalendarDay::from_ymd(2024, 3, d).expect("valid day")
    }

    #[test]
    fn table_columns_align_on_visible_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["A".to_string(), "B".to_string()],
            vec![
                vec!["\x1b[33mlong\x1b[0m".to_string(), "x".to_string()],
                vec!["é".to_string(), "y".to_string()],
            ],
        )
        .expect("write table");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A    B ");
        assert_eq!(lines[1], "---- - ");
        assert_eq!(strip_ansi(lines[2]), "long x ");
        assert_eq!(lines[3], "é    y ");
    }

    #[test]
    fn plan_table_shows_overflow_indicator() {
        let events: Vec<CalendarEvent> = (0..7)
            .map(|n| CalendarEvent::single(format!("e{n}"), format!("Event {n}"), day(2)))
            .collect();
        let normalizer = DayNormalizer::new(day(1));
        let window = DayWindow::new(day(1), day(2));
        let layout = build_window_plans(&events, window, 5, &normalizer);

        let mut buf = Vec::new();
        Renderer::plain()
            .write_plans(&mut buf, &events, &layout)
            .expect("write plans");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("Event 0, Event 1, Event 2, Event 3, Event 4"));
        assert!(text.contains("+2 more"));
        assert!(!text.contains("Event 5"));
    }

    #[test]
    fn layout_table_lists_lanes_in_order() {
        let events = vec![
            CalendarEvent::single("s", "Standup", day(5)),
            CalendarEvent::spanning("t", "Travel", day(3), day(7)),
        ];
        let normalizer = DayNormalizer::new(day(1));
        let window = DayWindow::month(2024, 3).expect("month window");
        let layouts = assign_lanes(&events, &window, &normalizer);

        let mut buf = Vec::new();
        Renderer::plain()
            .write_layouts(&mut buf, &events, &layouts, &window)
            .expect("write layouts");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[2].starts_with("0 "));
        assert!(lines[2].contains("Travel"));
        assert!(lines[2].contains("2024-03-03"));
        assert!(lines[3].starts_with("1 "));
        assert!(lines[3].contains("Standup"));
    }

    #[test]
    fn color_setting_goes_through_the_bool_parser() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "off".to_string())]);
        assert!(Renderer::new(&cfg).is_ok());

        cfg.apply_overrides(vec![("color".to_string(), "loud".to_string())]);
        let err = Renderer::new(&cfg).expect_err("invalid color");
        assert!(err.to_string().contains("color"));
    }

    fn day_table(events: &[CalendarEvent], on: CalendarDay) -> String {
        let normalizer = DayNormalizer::new(day(1));
        let window = DayWindow::month(2024, 3).expect("month window");
        let on_day = events_on_day(on, events, &normalizer);
        let starting = events_starting_on_day(on, events, &window, &normalizer);
        let labelled = events_labelled_on_day(on, events, &window, Weekday::Mon, &normalizer);

        let mut buf = Vec::new();
        Renderer::plain()
            .write_day(&mut buf, on, &on_day, &starting, &labelled)
            .expect("write day");
        String::from_utf8(buf).expect("utf8")
    }

    fn row<'a>(text: &'a str, id: &str) -> &'a str {
        text.lines()
            .find(|line| line.starts_with(id))
            .map(str::trim_end)
            .unwrap_or_default()
    }

    #[test]
    fn day_table_marks_starts_and_repeated_labels() {
        let events = vec![
            CalendarEvent::spanning("sprint", "Sprint", day(2), day(15))
                .with_type(EventType::Milestone),
            CalendarEvent::single("standup", "Standup", day(4)).with_type(EventType::Meeting),
            CalendarEvent::spanning("trip", "Trip", day(3), day(5)),
        ];

        // 2024-03-04 is a Monday: every bar crossing into it opens a new
        // week row and shows its label again.
        let monday = day_table(&events, day(4));
        assert!(monday.starts_with("2024-03-04"));
        assert!(row(&monday, "sprint").contains("milestone"));
        assert!(row(&monday, "sprint").ends_with("label"));
        assert!(row(&monday, "trip").ends_with("label"));
        assert!(row(&monday, "standup").contains("meeting"));
        assert!(row(&monday, "standup").ends_with("starts"));

        let tuesday = day_table(&events, day(5));
        assert!(row(&tuesday, "sprint").ends_with("continues"));
        assert!(row(&tuesday, "trip").ends_with("continues"));
        assert_eq!(row(&tuesday, "standup"), "");
    }
}
