pub mod cli;
pub mod commands;
pub mod config;
pub mod day;
pub mod event;
pub mod lanes;
pub mod membership;
pub mod plan;
pub mod render;
pub mod source;
pub mod window;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

pub use crate::day::{
  CalendarDay,
  DayNormalizer
};
pub use crate::event::{
  CalendarEvent,
  EventType
};
pub use crate::lanes::{
  EventLayout,
  assign_lanes
};
pub use crate::plan::{
  RenderPlan,
  build_render_plan
};
pub use crate::window::DayWindow;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting trellis CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.trellisrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let mut renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;
  let opts = commands::RunOptions {
    events_path: cli.events,
    json:        cli.json
  };

  commands::dispatch(
    &cfg,
    &mut renderer,
    inv,
    &opts
  )?;

  info!("done");
  Ok(())
}
