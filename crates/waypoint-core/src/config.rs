use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::datastore::DEFAULT_TASKS_KEY;
use crate::filter::Filter;
use crate::map::{
  Coordinate,
  DEFAULT_CENTER,
  DEFAULT_ZOOM
};

const RC_ENV_VAR: &str = "WAYPOINTRC";
const RC_FILE_NAME: &str =
  ".waypointrc";

#[derive(Debug, Clone)]
pub struct Config {
  map:              BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = BTreeMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.waypoint".to_string()
    );
    map.insert(
      "storage.key".to_string(),
      DEFAULT_TASKS_KEY.to_string()
    );
    map.insert(
      "default.filter".to_string(),
      "all".to_string()
    );
    map.insert(
      "map.center".to_string(),
      format!(
        "{},{}",
        DEFAULT_CENTER.lat,
        DEFAULT_CENTER.lng
      )
    );
    map.insert(
      "map.zoom".to_string(),
      DEFAULT_ZOOM.to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
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

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading waypointrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no waypointrc found; using \
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

  pub fn color(
    &self
  ) -> anyhow::Result<bool> {
    let raw = self
      .get("color")
      .unwrap_or_else(|| "on".to_string());
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "on" | "yes" | "true" | "1" => {
        Ok(true)
      }
      | "off" | "no" | "false" | "0" => {
        Ok(false)
      }
      | other => Err(anyhow!(
        "invalid color setting: {other}"
      ))
    }
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn storage_key(&self) -> String {
    self
      .get("storage.key")
      .filter(|k| !k.trim().is_empty())
      .unwrap_or_else(|| {
        DEFAULT_TASKS_KEY.to_string()
      })
  }

  pub fn default_filter(
    &self
  ) -> anyhow::Result<Filter> {
    match self.get("default.filter") {
      | Some(raw) => raw
        .parse::<Filter>()
        .context(
          "invalid default.filter"
        ),
      | None => Ok(Filter::All)
    }
  }

  pub fn map_center(
    &self
  ) -> anyhow::Result<Coordinate> {
    let Some(raw) =
      self.get("map.center")
    else {
      return Ok(DEFAULT_CENTER);
    };

    let (lat, lng) = raw
      .split_once(',')
      .ok_or_else(|| {
        anyhow!(
          "invalid map.center {raw:?}: \
           expected LAT,LNG"
        )
      })?;
    let lat: f64 =
      lat.trim().parse::<f64>().with_context(
        || {
          format!(
            "invalid map.center \
             latitude: {lat}"
          )
        }
      )?;
    let lng: f64 =
      lng.trim().parse::<f64>().with_context(
        || {
          format!(
            "invalid map.center \
             longitude: {lng}"
          )
        }
      )?;

    Ok(Coordinate { lat, lng })
  }

  pub fn map_zoom(
    &self
  ) -> anyhow::Result<u8> {
    match self.get("map.zoom") {
      | Some(raw) => raw
        .trim()
        .parse::<u8>()
        .with_context(|| {
          format!(
            "invalid map.zoom: {raw}"
          )
        }),
      | None => Ok(DEFAULT_ZOOM)
    }
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path =
      canonical_or_raw(expand_tilde(path));
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
          canonical_or_raw(
            resolve_include_path(
              &base_dir,
              include_rest.trim()
            )?
          );
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include cycle detected; skipping");
        } else if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
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
    warn!(
      "cannot determine home \
       directory; skipping \
       waypointrc lookup"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".waypoint"))
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

fn canonical_or_raw(
  path: PathBuf
) -> PathBuf {
  fs::canonicalize(&path)
    .unwrap_or(path)
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
