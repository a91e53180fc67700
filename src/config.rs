//! Application configuration
//!
//! Read from `config.json` (or a `.toml` file) in the data directory. Every
//! field has a default, unknown fields are ignored, and a missing file means
//! "all defaults".

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vocab::algorithm::Grade;

/// Smallest interval the scheduler will ever hand out (one minute, in days)
pub const MIN_INTERVAL_DAYS: f64 = 1.0 / 1440.0;

/// Largest interval the scheduler will ever hand out (about a century)
pub const MAX_INTERVAL_DAYS: f64 = 36_500.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Data directory not found")]
    DataDirNotFound,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Lower and upper bound for the ease factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EaseBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for EaseBounds {
    fn default() -> Self {
        Self { min: 1.3, max: 3.0 }
    }
}

impl EaseBounds {
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Base interval in days for each grade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseIntervals {
    pub again: f64,
    pub hard: f64,
    pub good: f64,
    pub easy: f64,
}

impl Default for BaseIntervals {
    fn default() -> Self {
        Self {
            again: 0.5,
            hard: 1.0,
            good: 3.0,
            easy: 7.0,
        }
    }
}

impl BaseIntervals {
    pub fn for_grade(&self, grade: Grade) -> f64 {
        match grade {
            Grade::Again => self.again,
            Grade::Hard => self.hard,
            Grade::Good => self.good,
            Grade::Easy => self.easy,
        }
    }
}

/// Interval multiplier for each successful grade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradeMultipliers {
    pub hard: f64,
    pub good: f64,
    pub easy: f64,
}

impl Default for GradeMultipliers {
    fn default() -> Self {
        Self {
            hard: 0.6,
            good: 1.0,
            easy: 1.3,
        }
    }
}

impl GradeMultipliers {
    /// Multiplier for a successful grade; Again has no entry and maps to 0.
    pub fn for_grade(&self, grade: Grade) -> f64 {
        match grade {
            Grade::Again => 0.0,
            Grade::Hard => self.hard,
            Grade::Good => self.good,
            Grade::Easy => self.easy,
        }
    }
}

/// Ease change for each successful grade. Again uses `againPenalty`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EaseDeltas {
    pub hard: f64,
    pub good: f64,
    pub easy: f64,
}

impl Default for EaseDeltas {
    fn default() -> Self {
        Self {
            hard: -0.15,
            good: 0.05,
            easy: 0.15,
        }
    }
}

impl EaseDeltas {
    pub fn for_grade(&self, grade: Grade) -> f64 {
        match grade {
            Grade::Again => 0.0,
            Grade::Hard => self.hard,
            Grade::Good => self.good,
            Grade::Easy => self.easy,
        }
    }
}

/// Options read by the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Fraction of the ease range a Reviewing word must reach to be mastered (0..=1)
    pub mastery_threshold: f64,
    /// Repetitions needed before Reviewing -> Mastered
    pub mastery_review_count: u32,
    /// Repetitions needed before Learning -> Reviewing
    pub reviewing_after: u32,
    pub max_interval_days: f64,
    pub sr_base_intervals: BaseIntervals,
    pub grade_multipliers: GradeMultipliers,
    pub ease_deltas: EaseDeltas,
    pub again_penalty: f64,
    pub ease_bounds: EaseBounds,
    pub initial_ease: f64,
    /// Keep scheduling reviews for mastered words
    pub mastered_schedulable: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mastery_threshold: 0.8,
            mastery_review_count: 3,
            reviewing_after: 2,
            max_interval_days: 30.0,
            sr_base_intervals: BaseIntervals::default(),
            grade_multipliers: GradeMultipliers::default(),
            ease_deltas: EaseDeltas::default(),
            again_penalty: 0.2,
            ease_bounds: EaseBounds::default(),
            initial_ease: 2.5,
            mastered_schedulable: true,
        }
    }
}

impl SchedulerConfig {
    /// The interval an Again answer shrinks to
    pub fn min_interval_days(&self) -> f64 {
        self.sr_base_intervals.again
    }

    /// Ease factor a Reviewing word needs before it can be mastered
    pub fn mastery_ease(&self) -> f64 {
        let bounds = &self.ease_bounds;
        bounds.min + self.mastery_threshold * (bounds.max - bounds.min)
    }

    /// Repair values that would break the scheduler's guarantees.
    pub fn normalized(mut self) -> Self {
        if !(self.ease_bounds.min > 0.0) {
            log::warn!("Config: easeBounds.min {} is not positive, using 1.3", self.ease_bounds.min);
            self.ease_bounds.min = EaseBounds::default().min;
        }
        if !(self.ease_bounds.max >= self.ease_bounds.min) {
            log::warn!(
                "Config: easeBounds.max {} is below min {}, raising it",
                self.ease_bounds.max,
                self.ease_bounds.min
            );
            self.ease_bounds.max = self.ease_bounds.min;
        }
        let clamped = self.ease_bounds.clamp(self.initial_ease);
        if clamped != self.initial_ease {
            log::warn!("Config: initialEase {} clamped to {}", self.initial_ease, clamped);
            self.initial_ease = clamped;
        }
        if !(0.0..=1.0).contains(&self.mastery_threshold) {
            let clamped = if self.mastery_threshold.is_nan() {
                SchedulerConfig::default().mastery_threshold
            } else {
                self.mastery_threshold.clamp(0.0, 1.0)
            };
            log::warn!("Config: masteryThreshold {} clamped to {}", self.mastery_threshold, clamped);
            self.mastery_threshold = clamped;
        }

        let intervals = &mut self.sr_base_intervals;
        for (name, value) in [
            ("again", &mut intervals.again),
            ("hard", &mut intervals.hard),
            ("good", &mut intervals.good),
            ("easy", &mut intervals.easy),
        ] {
            if !(*value >= MIN_INTERVAL_DAYS) {
                log::warn!("Config: srBaseIntervals.{} {} raised to one minute", name, value);
                *value = MIN_INTERVAL_DAYS;
            }
        }
        if !(self.max_interval_days >= self.sr_base_intervals.again) {
            log::warn!(
                "Config: maxIntervalDays {} below the minimum interval, raising it",
                self.max_interval_days
            );
            self.max_interval_days = self.sr_base_intervals.again;
        }
        if self.max_interval_days > MAX_INTERVAL_DAYS {
            log::warn!(
                "Config: maxIntervalDays {} capped at {}",
                self.max_interval_days,
                MAX_INTERVAL_DAYS
            );
            self.max_interval_days = MAX_INTERVAL_DAYS;
        }
        for (name, value) in [
            ("hard", &mut self.grade_multipliers.hard),
            ("good", &mut self.grade_multipliers.good),
            ("easy", &mut self.grade_multipliers.easy),
        ] {
            if !(*value > 0.0) {
                log::warn!("Config: gradeMultipliers.{} {} is not positive, using 1.0", name, value);
                *value = 1.0;
            }
        }
        if !(self.again_penalty >= 0.0) {
            self.again_penalty = 0.0;
        }
        self
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Persist after every mutation. When off, call `flush`.
    pub auto_save: bool,
    /// Data file, relative to the data directory unless absolute
    pub data_file: PathBuf,
    pub backup_enabled: bool,
    /// Number of backups kept
    pub backup_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
    pub search_result_limit: usize,
    /// Tags applied to every newly added word
    pub default_tags: Vec<String>,
    /// Bound on each storage load/save, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub scheduler: SchedulerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auto_save: true,
            data_file: PathBuf::from("vocabulary.json"),
            backup_enabled: true,
            backup_count: 5,
            backup_dir: None,
            search_result_limit: 20,
            default_tags: Vec::new(),
            storage_timeout_ms: None,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("wordhoard"))
            .ok_or(ConfigError::DataDirNotFound)
    }

    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join("config.json")
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config: {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = if is_toml(path) {
            toml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Ok(config.normalized())
    }

    /// Save configuration, format chosen by extension
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = if is_toml(path) {
            toml::to_string_pretty(self)?
        } else {
            serde_json::to_string_pretty(self)?
        };
        fs::write(path, content)?;
        Ok(())
    }

    pub fn normalized(mut self) -> Self {
        self.scheduler = self.scheduler.normalized();
        self
    }

    pub fn data_path(&self, data_dir: &Path) -> PathBuf {
        if self.data_file.is_absolute() {
            self.data_file.clone()
        } else {
            data_dir.join(&self.data_file)
        }
    }

    pub fn backup_path(&self, data_dir: &Path) -> PathBuf {
        match &self.backup_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => data_dir.join(dir),
            None => data_dir.join("backups"),
        }
    }

    pub fn storage_timeout(&self) -> Option<Duration> {
        self.storage_timeout_ms.map(Duration::from_millis)
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "toml")
}
