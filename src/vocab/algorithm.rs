//! Spaced repetition scheduling
//!
//! A simplified SM-2 variant. Every function here is pure: the caller passes
//! the current time in, so identical inputs always give identical outputs.
//!
//! Grades:
//! - Again: not recalled. Progress resets, the word drops one stage.
//! - Hard: recalled with serious difficulty
//! - Good: recalled after some hesitation
//! - Easy: recalled immediately

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{Result, VocabError};
use super::models::{days_to_duration, LearningData, WordStatus};
use crate::config::SchedulerConfig;

/// Outcome reported for one review attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Self::Again, Self::Hard, Self::Good, Self::Easy];

    /// Map a UI rating (1-4: Again, Hard, Good, Easy) to a grade
    pub fn from_rating(rating: i32) -> Result<Self> {
        match rating {
            1 => Ok(Self::Again),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            other => Err(VocabError::InvalidGrade(other.to_string())),
        }
    }

    pub fn is_correct(self) -> bool {
        matches!(self, Self::Good | Self::Easy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = VocabError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        if let Ok(rating) = s.parse::<i32>() {
            return Self::from_rating(rating);
        }
        match s.as_str() {
            "again" | "a" | "poor" => Ok(Self::Again),
            "hard" | "h" | "fair" => Ok(Self::Hard),
            "good" | "g" => Ok(Self::Good),
            "easy" | "e" | "excellent" => Ok(Self::Easy),
            _ => Err(VocabError::InvalidGrade(s)),
        }
    }
}

impl TryFrom<i32> for Grade {
    type Error = VocabError;

    fn try_from(rating: i32) -> Result<Self> {
        Self::from_rating(rating)
    }
}

/// Result of calculating the next review
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewResult {
    pub learning_data: LearningData,
    pub status: WordStatus,
}

/// Calculate the learning data and status after a review graded `grade` at `now`.
///
/// Does not promote; see [`should_promote_status`] and [`review`].
pub fn calculate_next_review(
    data: &LearningData,
    status: WordStatus,
    grade: Grade,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> ReviewResult {
    let bounds = &config.ease_bounds;
    let min_interval = config.min_interval_days();
    let max_interval = config.max_interval_days.max(min_interval);

    let mut next = data.clone();
    let mut next_status = status;

    // Ease may arrive out of range from old data; clamp before using it.
    let ease = bounds.clamp(data.ease_factor);

    if grade == Grade::Again {
        next.repetitions = 0;
        next.interval_days = min_interval;
        next.set_ease_factor(ease - config.again_penalty, bounds);
        next_status = status.regressed();
    } else {
        let first_review = status == WordStatus::New || !(data.interval_days > 0.0);

        let interval = if first_review {
            next.repetitions = 1;
            config.sr_base_intervals.for_grade(grade)
        } else {
            next.repetitions = data.repetitions.saturating_add(1);
            data.interval_days * ease * config.grade_multipliers.for_grade(grade)
        };
        next.interval_days = clamp_interval(interval, min_interval, max_interval);
        next.set_ease_factor(ease + config.ease_deltas.for_grade(grade), bounds);

        if status == WordStatus::New {
            next_status = WordStatus::Learning;
        }
    }

    next.review_count = data.review_count.saturating_add(1);
    if grade.is_correct() {
        next.correct_count = data.correct_count.saturating_add(1);
    }
    next.last_reviewed_at = Some(now);
    next.next_review_at = schedule_for(next_status, &next, now, config);

    ReviewResult {
        learning_data: next,
        status: next_status,
    }
}

/// Whether a word with this status and learning data has earned the next stage.
///
/// Thresholds are inclusive.
pub fn should_promote_status(status: WordStatus, data: &LearningData, config: &SchedulerConfig) -> bool {
    match status {
        WordStatus::Learning => data.repetitions >= config.reviewing_after,
        WordStatus::Reviewing => {
            data.repetitions >= config.mastery_review_count
                && data.ease_factor >= config.mastery_ease()
        }
        WordStatus::New | WordStatus::Mastered | WordStatus::Suspended => false,
    }
}

/// Apply a review: calculate the next state, then promote at most one stage.
/// An Again answer never promotes.
pub fn review(
    data: &LearningData,
    status: WordStatus,
    grade: Grade,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> ReviewResult {
    let mut result = calculate_next_review(data, status, grade, now, config);

    if grade != Grade::Again && should_promote_status(result.status, &result.learning_data, config) {
        if let Some(promoted) = result.status.next_stage() {
            log::debug!("Promoting word from {} to {}", result.status, promoted);
            result.status = promoted;
            result.learning_data.next_review_at =
                schedule_for(promoted, &result.learning_data, now, config);
        }
    }

    result
}

/// Preview the interval (in days) each grade would produce, in the order
/// Again, Hard, Good, Easy
pub fn preview_intervals(
    data: &LearningData,
    status: WordStatus,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> [f64; 4] {
    Grade::ALL.map(|grade| calculate_next_review(data, status, grade, now, config).learning_data.interval_days)
}

fn schedule_for(
    status: WordStatus,
    data: &LearningData,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Option<DateTime<Utc>> {
    match status {
        WordStatus::Learning | WordStatus::Reviewing => Some(after_interval(now, data)),
        WordStatus::Mastered if config.mastered_schedulable => Some(after_interval(now, data)),
        WordStatus::Mastered | WordStatus::New => None,
        WordStatus::Suspended => data.next_review_at,
    }
}

/// `now` plus the current interval, saturating at the latest representable time
fn after_interval(now: DateTime<Utc>, data: &LearningData) -> DateTime<Utc> {
    now.checked_add_signed(data.current_interval())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn clamp_interval(days: f64, min: f64, max: f64) -> f64 {
    if days.is_nan() {
        return min;
    }
    days.clamp(min, max)
}

/// Format an interval in days to a human-readable string
pub fn format_interval(days: f64) -> String {
    let duration = days_to_duration(days);
    let minutes = duration.num_minutes();
    if minutes <= 0 {
        return "now".to_string();
    }
    if minutes < 60 {
        return format!("{}m", minutes);
    }
    let hours = duration.num_hours();
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = duration.num_days();
    if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}
