//! Per-story visual-test configuration and archive options.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::path::PathBuf;

/// Environment variable overriding the archive directory.
pub const ARCHIVE_DIR_ENV: &str = "CHROMATIC_ARCHIVE_DIR";

/// Visual-test configuration passed through to each story's `parameters.chromatic`.
///
/// Stored as the JSON object it was given, so every key (known or not, explicit `null`s and
/// fractional numbers included) is written back exactly once and unchanged. The knobs the review
/// tool understands have typed accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChromaticConfig {
  values: Map<String, Value>,
}

impl ChromaticConfig {
  pub const DELAY: &'static str = "delay";
  pub const DIFF_INCLUDE_ANTI_ALIASING: &'static str = "diffIncludeAntiAliasing";
  pub const DIFF_THRESHOLD: &'static str = "diffThreshold";
  pub const FORCED_COLORS: &'static str = "forcedColors";
  pub const PAUSE_ANIMATION_AT_END: &'static str = "pauseAnimationAtEnd";
  pub const PREFERS_REDUCED_MOTION: &'static str = "prefersReducedMotion";
  pub const CROP_TO_VIEWPORT: &'static str = "cropToViewport";

  pub fn new() -> Self {
    Self::default()
  }

  /// Sets `key`, replacing any previous value.
  pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.values.insert(key.into(), value.into());
    self
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.values.get(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
    self.values.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Milliseconds to wait before capturing.
  pub fn delay(&self) -> Option<&Number> {
    self.get(Self::DELAY).and_then(as_number)
  }

  pub fn diff_include_anti_aliasing(&self) -> Option<bool> {
    self.get(Self::DIFF_INCLUDE_ANTI_ALIASING).and_then(Value::as_bool)
  }

  pub fn diff_threshold(&self) -> Option<&Number> {
    self.get(Self::DIFF_THRESHOLD).and_then(as_number)
  }

  pub fn forced_colors(&self) -> Option<&str> {
    self.get(Self::FORCED_COLORS).and_then(Value::as_str)
  }

  pub fn pause_animation_at_end(&self) -> Option<bool> {
    self.get(Self::PAUSE_ANIMATION_AT_END).and_then(Value::as_bool)
  }

  pub fn prefers_reduced_motion(&self) -> Option<&str> {
    self.get(Self::PREFERS_REDUCED_MOTION).and_then(Value::as_str)
  }

  pub fn crop_to_viewport(&self) -> Option<bool> {
    self.get(Self::CROP_TO_VIEWPORT).and_then(Value::as_bool)
  }
}

fn as_number(value: &Value) -> Option<&Number> {
  match value {
    Value::Number(n) => Some(n),
    _ => None,
  }
}

/// Where and how archives are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveOptions {
  /// Archive root. When unset the root sits next to the test's output directory.
  #[serde(default)]
  pub archive_dir: Option<PathBuf>,
}

impl ArchiveOptions {
  pub fn with_archive_dir(archive_dir: impl Into<PathBuf>) -> Self {
    Self {
      archive_dir: Some(archive_dir.into()),
    }
  }

  /// Options from the environment (`CHROMATIC_ARCHIVE_DIR`). Empty values count as unset.
  pub fn from_env() -> Self {
    Self::from_env_value(std::env::var_os(ARCHIVE_DIR_ENV))
  }

  fn from_env_value(value: Option<std::ffi::OsString>) -> Self {
    let archive_dir = value
      .filter(|v| !v.is_empty())
      .map(PathBuf::from);
    Self { archive_dir }
  }
}
