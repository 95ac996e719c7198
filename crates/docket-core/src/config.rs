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
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::datastore::DEFAULT_SNAPSHOT_KEY;

pub const RC_ENV_VAR: &str = "DOCKETRC";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

const DEFAULTS: [(&str, &str); 4] = [
  ("data.location", "~/.docket"),
  ("snapshot.key", DEFAULT_SNAPSHOT_KEY),
  ("default.command", "list"),
  ("color", "on")
];

impl Default for Config {
  fn default() -> Self {
    Self {
      map:          DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

/// One meaningful line of a docketrc.
#[derive(Debug, PartialEq, Eq)]
enum RcLine<'a> {
  Include(&'a str),
  Setting(&'a str, &'a str)
}

fn parse_rc_line(
  raw: &str
) -> Option<Result<RcLine<'_>, ()>> {
  let line = raw
    .split('#')
    .next()
    .unwrap_or_default()
    .trim();
  if line.is_empty() {
    return None;
  }
  if let Some(target) =
    line.strip_prefix("include ")
  {
    return Some(Ok(RcLine::Include(
      target.trim()
    )));
  }
  Some(
    line
      .split_once('=')
      .map(|(k, v)| {
        RcLine::Setting(k.trim(), v.trim())
      })
      .ok_or(())
  )
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
      info!(rc = %path.display(), "loading docketrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no docketrc found; using \
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
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn snapshot_key(&self) -> String {
    self
      .get("snapshot.key")
      .filter(|key| !key.trim().is_empty())
      .unwrap_or_else(|| {
        DEFAULT_SNAPSHOT_KEY.to_string()
      })
  }

  pub fn timezone(&self) -> Tz {
    crate::datetime::resolve_timezone(
      self.map.get("timezone").map(
        String::as_str
      )
    )
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    self.loaded_files.push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_default();

    for (index, raw) in
      text.lines().enumerate()
    {
      let parsed = match parse_rc_line(raw)
      {
        | None => continue,
        | Some(Ok(line)) => line,
        | Some(Err(())) => {
          return Err(anyhow!(
            "{}:{}: expected `key = \
             value` or `include \
             <path>`, got `{}`",
            path.display(),
            index + 1,
            raw.trim()
          ));
        }
      };

      match parsed {
        | RcLine::Setting(key, value) => {
          trace!(key, value, "rc setting");
          self.map.insert(
            key.to_string(),
            value.to_string()
          );
        }
        | RcLine::Include(target) => {
          self.include(
            &base_dir, target
          )?
        }
      }
    }

    Ok(())
  }

  fn include(
    &mut self,
    base_dir: &Path,
    target: &str
  ) -> anyhow::Result<()> {
    if target.is_empty() {
      return Err(anyhow!(
        "include needs a path"
      ));
    }
    let expanded =
      expand_tilde(Path::new(target));
    let include = if expanded.is_absolute()
    {
      expanded
    } else {
      base_dir.join(expanded)
    };

    if self.loaded_files.contains(&include)
    {
      warn!(include = %include.display(), "include cycle; skipping");
      return Ok(());
    }
    if !include.exists() {
      warn!(include = %include.display(), "missing include; skipping");
      return Ok(());
    }
    debug!(include = %include.display(), "following include");
    self.load_file(&include)
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

/// `--rc-file`, then `$DOCKETRC` (where
/// `/dev/null` disables the file), then
/// `~/.docketrc` when it exists.
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(from_env) =
    std::env::var(RC_ENV_VAR)
  {
    return Ok(
      (from_env != "/dev/null")
        .then(|| PathBuf::from(from_env))
    );
  }

  match dirs::home_dir() {
    | Some(home) => {
      let candidate =
        home.join(".docketrc");
      Ok(candidate
        .exists()
        .then_some(candidate))
    }
    | None => {
      warn!("no home directory; skipping docketrc");
      Ok(None)
    }
  }
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  dirs::home_dir()
    .map(|home| home.join(".docket"))
    .ok_or_else(|| {
      anyhow!("no home directory for data")
    })
}

pub fn expand_tilde(
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

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
