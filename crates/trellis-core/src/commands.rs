use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::day::{CalendarDay, DayNormalizer, parse_day};
use crate::event::CalendarEvent;
use crate::lanes::{EventLayout, assign_lanes, lane_count, multi_day_lane_count};
use crate::membership::{events_labelled_on_day, events_on_day, events_starting_on_day};
use crate::plan::build_window_plans;
use crate::render::Renderer;
use crate::source::load_events;
use crate::window::{DayWindow, parse_window};

/// Options that come from global flags rather than from the rc file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub events_path: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct LayoutReport<'a> {
    window: DayWindow,
    lane_count: usize,
    multi_day_lane_count: usize,
    layouts: &'a [EventLayout],
}

#[derive(Debug, Serialize)]
struct DayReport<'a> {
    day: CalendarDay,
    events: Vec<&'a str>,
    starting: Vec<&'a str>,
    labelled: Vec<&'a str>,
}

pub fn known_command_names() -> Vec<&'static str> {
    vec!["layout", "plan", "day", "show", "help", "version"]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(cfg, renderer, inv, opts))]
pub fn dispatch(
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
    opts: &RunOptions,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "layout" => cmd_layout(cfg, renderer, &inv.command_args, opts),
        "plan" => cmd_plan(cfg, renderer, &inv.command_args, opts),
        "day" => cmd_day(cfg, renderer, &inv.command_args, opts),
        "show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

pub fn normalizer_for(cfg: &Config) -> anyhow::Result<DayNormalizer> {
    Ok(match cfg.today()? {
        Some(today) => DayNormalizer::new(today),
        None => DayNormalizer::system(),
    })
}

fn resolve_window(
    cfg: &Config,
    args: &[String],
    normalizer: &DayNormalizer,
) -> anyhow::Result<DayWindow> {
    let expr = if args.is_empty() {
        "today".to_string()
    } else {
        args.join(" ")
    };
    parse_window(&expr, cfg.week_start(), normalizer.today())
        .with_context(|| format!("invalid window: {expr}"))
}

fn read_events(opts: &RunOptions) -> anyhow::Result<Vec<CalendarEvent>> {
    load_events(opts.events_path.as_deref())
}

#[instrument(skip(cfg, renderer, args, opts))]
fn cmd_layout(
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
    opts: &RunOptions,
) -> anyhow::Result<()> {
    let normalizer = normalizer_for(cfg)?;
    let window = resolve_window(cfg, args, &normalizer)?;
    let events = read_events(opts)?;
    let layouts = assign_lanes(&events, &window, &normalizer);

    let report = LayoutReport {
        window,
        lane_count: lane_count(&layouts),
        multi_day_lane_count: multi_day_lane_count(&layouts),
        layouts: &layouts,
    };
    info!(
        window = %window,
        placed = layouts.len(),
        lanes = report.lane_count,
        "computed layout"
    );

    if opts.json {
        return renderer.print_json(&report);
    }

    renderer.print_layouts(&events, &layouts, &window)?;
    println!();
    println!(
        "{} event(s) in {} lane(s), {} reserved for multi-day events.",
        layouts.len(),
        report.lane_count,
        report.multi_day_lane_count
    );
    Ok(())
}

#[instrument(skip(cfg, renderer, args, opts))]
fn cmd_plan(
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
    opts: &RunOptions,
) -> anyhow::Result<()> {
    let normalizer = normalizer_for(cfg)?;
    let window = resolve_window(cfg, args, &normalizer)?;
    let max_visible = cfg.max_visible()?;
    let events = read_events(opts)?;
    let layout = build_window_plans(&events, window, max_visible, &normalizer);

    if opts.json {
        return renderer.print_json(&layout);
    }
    renderer.print_plans(&events, &layout)
}

#[instrument(skip(cfg, renderer, args, opts))]
fn cmd_day(
    cfg: &Config,
    renderer: &mut Renderer,
    args: &[String],
    opts: &RunOptions,
) -> anyhow::Result<()> {
    let raw_day = args
        .first()
        .ok_or_else(|| anyhow!("day: expected a date (YYYY-MM-DD)"))?;
    let day = parse_day(raw_day).ok_or_else(|| anyhow!("day: invalid date: {raw_day}"))?;

    let normalizer = normalizer_for(cfg)?;
    let window = if args.len() > 1 {
        resolve_window(cfg, &args[1..], &normalizer)?
    } else {
        DayWindow::month_of(day)
    };
    let events = read_events(opts)?;
    let on_day = events_on_day(day, &events, &normalizer);
    let starting = events_starting_on_day(day, &events, &window, &normalizer);
    let labelled =
        events_labelled_on_day(day, &events, &window, cfg.week_start(), &normalizer);

    if opts.json {
        let report = DayReport {
            day,
            events: event_ids(&on_day),
            starting: event_ids(&starting),
            labelled: event_ids(&labelled),
        };
        return renderer.print_json(&report);
    }
    renderer.print_day(day, &on_day, &starting, &labelled)
}

fn event_ids<'a>(events: &[&'a CalendarEvent]) -> Vec<&'a str> {
    events.iter().map(|event| event.id.as_str()).collect()
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let sorted: BTreeMap<&String, &String> = cfg.iter().collect();
    for (key, value) in sorted {
        println!("{key}={value}");
    }
    for file in &cfg.loaded_files {
        println!("# loaded {}", file.display());
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "usage: trellis [--events FILE] [--json] [--rc KEY=VALUE]... [COMMAND] [ARGS]\n\n\
         commands:\n  \
         layout [WINDOW]    lane assignment for every visible event\n  \
         plan [WINDOW]      per-day rows with overflow counts (default)\n  \
         day DATE [WINDOW]  events covering DATE and those starting on it\n  \
         show               effective configuration\n  \
         version            print version\n\n\
         windows: today, week, grid, YYYY-MM, grid:YYYY-MM, week:YYYY-MM-DD,\n         \
         YYYY-MM-DD, YYYY-MM-DD..YYYY-MM-DD"
    );
    Ok(())
}
