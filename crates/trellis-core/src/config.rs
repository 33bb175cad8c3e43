use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Weekday;
use tracing::{
  debug,
  info,
  trace
};

use crate::day::{
  CalendarDay,
  parse_day
};
use crate::plan::DEFAULT_MAX_VISIBLE;
use crate::window::parse_week_start;

const RC_ENV_VAR: &str = "TRELLISRC";
const RC_FILE_NAME: &str = ".trellisrc";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "default.command".to_string(),
      "plan".to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    map.insert(
      "render.max_visible".to_string(),
      DEFAULT_MAX_VISIBLE.to_string()
    );
    map.insert(
      "calendar.week_start".to_string(),
      "monday".to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading rc file");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no rc file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key) else {
      return Ok(None);
    };
    parse_bool(raw).map(Some).ok_or_else(
      || {
        anyhow!(
          "invalid boolean for {key}: \
           {raw}"
        )
      }
    )
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn max_visible(
    &self
  ) -> anyhow::Result<usize> {
    let Some(raw) =
      self.get("render.max_visible")
    else {
      return Ok(DEFAULT_MAX_VISIBLE);
    };
    let value: usize = raw
      .trim()
      .parse()
      .with_context(|| {
        format!(
          "invalid render.max_visible: \
           {raw}"
        )
      })?;
    if value == 0 {
      return Err(anyhow!(
        "render.max_visible must be at \
         least 1"
      ));
    }
    Ok(value)
  }

  pub fn week_start(&self) -> Weekday {
    self
      .get("calendar.week_start")
      .map(|raw| parse_week_start(&raw))
      .unwrap_or(Weekday::Mon)
  }

  /// Pinned "today", if configured.
  pub fn today(
    &self
  ) -> anyhow::Result<Option<CalendarDay>>
  {
    let Some(raw) =
      self.get("calendar.today")
    else {
      return Ok(None);
    };
    parse_day(&raw)
      .map(Some)
      .ok_or_else(|| {
        anyhow!(
          "invalid calendar.today: {raw}"
        )
      })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          tracing::warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    debug!(
      "cannot determine home \
       directory; skipping rc lookup"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s.trim().to_ascii_lowercase().as_str()
  {
    | "1" | "y" | "yes" | "on" | "true" => {
      Some(true)
    }
    | "0" | "n" | "no" | "off" | "false" => {
      Some(false)
    }
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use chrono::Weekday;
  use tempfile::tempdir;

  use super::Config;
  use crate::day::CalendarDay;

  #[test]
  fn defaults_without_rc_file() {
    let cfg = Config::default();
    assert_eq!(
      cfg.max_visible()
        .expect("max visible"),
      5
    );
    assert_eq!(
      cfg.week_start(),
      Weekday::Mon
    );
    assert_eq!(
      cfg.get("default.command")
        .as_deref(),
      Some("plan")
    );
    assert_eq!(
      cfg.today().expect("today"),
      None
    );
  }

  #[test]
  fn rc_file_with_include_and_overrides()
  {
    let temp = tempdir().expect("tempdir");
    let main = temp.path().join("main.rc");
    let extra =
      temp.path().join("extra.rc");
    fs::write(
      &main,
      "# trellis settings\n\
       render.max_visible = 3\n\
       include extra.rc\n\
       color = off # no ansi\n"
    )
    .expect("write main rc");
    fs::write(
      &extra,
      "calendar.week_start=sunday\n\
       calendar.today=2024-03-15\n"
    )
    .expect("write extra rc");

    let mut cfg = Config::load(Some(main.as_path()))
      .expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.max_visible()
        .expect("max visible"),
      3
    );
    assert_eq!(
      cfg.week_start(),
      Weekday::Sun
    );
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("color flag"),
      Some(false)
    );
    assert_eq!(
      cfg.today().expect("today"),
      CalendarDay::from_ymd(2024, 3, 15)
    );

    cfg.apply_overrides(vec![(
      "rc.render.max_visible".to_string(),
      "8".to_string()
    )]);
    assert_eq!(
      cfg.max_visible()
        .expect("max visible"),
      8
    );
  }

  #[test]
  fn rejects_zero_and_malformed_values() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      (
        "render.max_visible".to_string(),
        "0".to_string()
      ),
      (
        "calendar.today".to_string(),
        "someday".to_string()
      ),
      (
        "color".to_string(),
        "sometimes".to_string()
      ),
    ]);
    assert!(cfg.max_visible().is_err());
    assert!(cfg.today().is_err());
    let err = cfg
      .get_bool("color")
      .expect_err("invalid color");
    assert!(
      err.to_string().contains("sometimes")
    );
    assert_eq!(
      cfg.get_bool("missing").expect("absent"),
      None
    );
  }

  #[test]
  fn malformed_rc_line_reports_location() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("bad.rc");
    fs::write(&path, "color on\n")
      .expect("write rc");
    let err = Config::load(Some(path.as_path()))
      .expect_err("invalid line");
    assert!(
      err.to_string().contains(":1:")
    );
  }
}
