use std::fs;
use std::io::{
  self,
  Read
};
use std::path::Path;

use anyhow::Context;
use tracing::{
  debug,
  info
};

use crate::event::CalendarEvent;

/// Reads event records from `path`, or
/// from stdin when `path` is `None` or
/// `-`.
#[tracing::instrument]
pub fn load_events(
  path: Option<&Path>
) -> anyhow::Result<Vec<CalendarEvent>> {
  let (text, origin) = match path {
    | Some(path)
      if path != Path::new("-") =>
    {
      let text =
        fs::read_to_string(path)
          .with_context(|| {
            format!(
              "failed to read {}",
              path.display()
            )
          })?;
      (text, path.display().to_string())
    }
    | _ => {
      let mut text = String::new();
      io::stdin()
        .read_to_string(&mut text)
        .context(
          "failed to read events from \
           stdin"
        )?;
      (text, "<stdin>".to_string())
    }
  };

  let events = parse_events(&text)
    .with_context(|| {
      format!(
        "failed parsing events from \
         {origin}"
      )
    })?;
  info!(
    count = events.len(),
    origin = %origin,
    "loaded events"
  );
  Ok(events)
}

/// Accepts a JSON array, a single JSON
/// object, or one JSON object per line.
pub fn parse_events(
  text: &str
) -> anyhow::Result<Vec<CalendarEvent>> {
  let trimmed = text.trim();
  if trimmed.is_empty() {
    debug!("empty event input");
    return Ok(vec![]);
  }

  if trimmed.starts_with('[') {
    return serde_json::from_str(trimmed)
      .context(
        "failed parsing JSON array"
      );
  }

  if trimmed.starts_with('{')
    && let Ok(event) =
      serde_json::from_str::<
        CalendarEvent
      >(trimmed)
  {
    return Ok(vec![event]);
  }

  let mut out = Vec::new();
  for (idx, line) in
    trimmed.lines().enumerate()
  {
    let token = line.trim();
    if token.is_empty() {
      continue;
    }
    let event: CalendarEvent =
      serde_json::from_str(token)
        .with_context(|| {
          format!(
            "failed parsing event line \
             {}",
            idx + 1
          )
        })?;
    out.push(event);
  }

  debug!(
    count = out.len(),
    "parsed json lines"
  );
  Ok(out)
}
