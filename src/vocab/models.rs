//! Data models for the vocabulary collection

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{Result, VocabError};
use crate::config::{EaseBounds, MAX_INTERVAL_DAYS};

/// Opaque identifier of a word, stable across storage round-trips
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordId(Uuid);

impl WordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for WordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for WordId {
    type Err = VocabError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| VocabError::InvalidInput(format!("'{}' is not a valid word id", s)))
    }
}

impl From<Uuid> for WordId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Where a word is in the learning progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WordStatus {
    /// Added, never reviewed
    New,
    /// Early reviews, short intervals
    Learning,
    /// Regular spaced review
    Reviewing,
    /// Considered known
    Mastered,
    /// Taken out of the review cycle by the user
    Suspended,
}

impl Default for WordStatus {
    fn default() -> Self {
        Self::New
    }
}

impl WordStatus {
    pub const ALL: [WordStatus; 5] = [
        Self::New,
        Self::Learning,
        Self::Reviewing,
        Self::Mastered,
        Self::Suspended,
    ];

    /// The next stage in the progression, if any.
    pub fn next_stage(self) -> Option<Self> {
        match self {
            Self::New => Some(Self::Learning),
            Self::Learning => Some(Self::Reviewing),
            Self::Reviewing => Some(Self::Mastered),
            Self::Mastered | Self::Suspended => None,
        }
    }

    /// The stage a failed review falls back to. Never below Learning.
    pub fn regressed(self) -> Self {
        match self {
            Self::Mastered => Self::Reviewing,
            Self::Reviewing | Self::Learning | Self::New => Self::Learning,
            Self::Suspended => Self::Suspended,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Reviewing => "reviewing",
            Self::Mastered => "mastered",
            Self::Suspended => "suspended",
        }
    }
}

impl fmt::Display for WordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WordStatus {
    type Err = VocabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "new" | "draft" => Ok(Self::New),
            "learning" => Ok(Self::Learning),
            "reviewing" | "review" => Ok(Self::Reviewing),
            "mastered" => Ok(Self::Mastered),
            "suspended" => Ok(Self::Suspended),
            other => Err(VocabError::InvalidInput(format!("unknown status '{}'", other))),
        }
    }
}

/// How hard the user considers a word
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    VeryHard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Medium
    }
}

impl FromStr for Difficulty {
    type Err = VocabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "easy" | "1" => Ok(Self::Easy),
            "medium" | "2" => Ok(Self::Medium),
            "hard" | "3" => Ok(Self::Hard),
            "veryhard" | "4" => Ok(Self::VeryHard),
            other => Err(VocabError::InvalidInput(format!("unknown difficulty '{}'", other))),
        }
    }
}

/// A free-form note attached to a word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Note {
    pub fn new<I, S>(content: &str, tags: I, now: DateTime<Utc>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let content = content.trim();
        if content.is_empty() {
            return Err(VocabError::InvalidInput("note content must not be empty".to_string()));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            content: content.to_string(),
            created_at: now,
            tags: normalize_tags(tags),
        })
    }
}

/// Core descriptive information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreInfo {
    pub pronunciation: String,
    pub primary_definition: String,
    pub part_of_speech: String,
}

/// Optional, richer descriptive information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedInfo {
    pub definitions: Vec<String>,
    pub examples: Vec<String>,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
    pub etymology: String,
    pub memory_tips: String,
}

/// Spaced repetition state of a word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningData {
    /// Consecutive successful reviews since the last reset
    #[serde(default)]
    pub repetitions: u32,
    /// Current interval in days (fractional)
    #[serde(default)]
    pub interval_days: f64,
    /// Interval growth multiplier
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    /// Every review ever recorded, failures included
    #[serde(default)]
    pub review_count: u32,
    /// Reviews graded Good or Easy
    #[serde(default)]
    pub correct_count: u32,
}

fn default_ease_factor() -> f64 {
    2.5
}

impl Default for LearningData {
    fn default() -> Self {
        Self {
            repetitions: 0,
            interval_days: 0.0,
            ease_factor: default_ease_factor(),
            next_review_at: None,
            last_reviewed_at: None,
            review_count: 0,
            correct_count: 0,
        }
    }
}

impl LearningData {
    pub fn with_ease(ease_factor: f64, bounds: &EaseBounds) -> Self {
        let mut data = Self::default();
        data.set_ease_factor(ease_factor, bounds);
        data
    }

    /// Set the ease factor, clamped into `bounds`.
    pub fn set_ease_factor(&mut self, value: f64, bounds: &EaseBounds) {
        self.ease_factor = bounds.clamp(value);
    }

    pub fn current_interval(&self) -> Duration {
        days_to_duration(self.interval_days)
    }

    /// Share of reviews answered Good or Easy, `None` before the first review
    pub fn accuracy(&self) -> Option<f64> {
        if self.review_count == 0 {
            None
        } else {
            Some(self.correct_count as f64 / self.review_count as f64)
        }
    }
}

/// Convert fractional days to a duration with millisecond resolution.
pub fn days_to_duration(days: f64) -> Duration {
    if days.is_nan() || days <= 0.0 {
        return Duration::zero();
    }
    let days = days.min(MAX_INTERVAL_DAYS);
    Duration::milliseconds((days * 86_400_000.0).round() as i64)
}

/// A vocabulary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub id: WordId,
    pub text: String,
    #[serde(default)]
    pub status: WordStatus,
    /// Status the word had when it was suspended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspended_from: Option<WordStatus>,
    /// Derived from the metadata; recomputed after every change and on load
    #[serde(default, skip_deserializing)]
    pub completeness: f64,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub core: CoreInfo,
    #[serde(default)]
    pub extended: ExtendedInfo,
    #[serde(default)]
    pub context: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub learning_data: LearningData,
}

fn default_source() -> String {
    "manual_input".to_string()
}

impl Word {
    pub fn new(text: &str, now: DateTime<Utc>) -> Result<Self> {
        let text = clean_text(text)?;
        let mut word = Self {
            id: WordId::new(),
            text,
            status: WordStatus::New,
            suspended_from: None,
            completeness: 0.0,
            tags: BTreeSet::new(),
            notes: Vec::new(),
            core: CoreInfo::default(),
            extended: ExtendedInfo::default(),
            context: String::new(),
            source: default_source(),
            difficulty: Difficulty::default(),
            added_at: now,
            learning_data: LearningData::default(),
        };
        word.refresh_completeness();
        Ok(word)
    }

    /// Key used for duplicate detection: lowercase, whitespace collapsed.
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }

    /// Whether the word takes part in review scheduling right now.
    pub fn is_active(&self) -> bool {
        !matches!(self.status, WordStatus::New | WordStatus::Suspended)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active()
            && self
                .learning_data
                .next_review_at
                .map_or(false, |at| at <= now)
    }

    pub fn add_note(&mut self, note: Note) -> &Note {
        self.notes.push(note);
        self.refresh_completeness();
        let last = self.notes.len() - 1;
        &self.notes[last]
    }

    /// Remove a note by id, returning it.
    pub fn remove_note(&mut self, note_id: Uuid) -> Option<Note> {
        let pos = self.notes.iter().position(|n| n.id == note_id)?;
        let note = self.notes.remove(pos);
        self.refresh_completeness();
        Some(note)
    }

    pub fn calculate_completeness(&self) -> f64 {
        let mut score = 0.0;
        let total = 10.0;

        if !self.core.pronunciation.is_empty() {
            score += 1.5;
        }
        if !self.core.primary_definition.is_empty() {
            score += 2.0;
        }
        if !self.core.part_of_speech.is_empty() {
            score += 1.0;
        }

        if !self.extended.definitions.is_empty() {
            score += 1.5;
        }
        if !self.extended.examples.is_empty() {
            score += 1.5;
        }
        if !self.extended.synonyms.is_empty() {
            score += 1.0;
        }
        if !self.extended.etymology.is_empty() {
            score += 0.5;
        }
        if !self.extended.memory_tips.is_empty() {
            score += 0.5;
        }

        if !self.notes.is_empty() {
            score += 0.5;
        }

        f64::min(score / total, 1.0)
    }

    pub fn refresh_completeness(&mut self) {
        self.completeness = self.calculate_completeness();
    }

    /// Apply a metadata patch. Renames are validated but not checked for
    /// duplicates here; that is a collection-level concern.
    pub fn apply_patch(&mut self, patch: &WordPatch) -> Result<()> {
        if let Some(text) = &patch.text {
            self.text = clean_text(text)?;
        }
        if let Some(v) = &patch.pronunciation {
            self.core.pronunciation = v.trim().to_string();
        }
        if let Some(v) = &patch.primary_definition {
            self.core.primary_definition = v.trim().to_string();
        }
        if let Some(v) = &patch.part_of_speech {
            self.core.part_of_speech = v.trim().to_string();
        }
        if let Some(v) = &patch.definitions {
            self.extended.definitions = clean_list(v);
        }
        if let Some(v) = &patch.examples {
            self.extended.examples = clean_list(v);
        }
        if let Some(v) = &patch.synonyms {
            self.extended.synonyms = clean_list(v);
        }
        if let Some(v) = &patch.antonyms {
            self.extended.antonyms = clean_list(v);
        }
        if let Some(v) = &patch.etymology {
            self.extended.etymology = v.trim().to_string();
        }
        if let Some(v) = &patch.memory_tips {
            self.extended.memory_tips = v.trim().to_string();
        }
        if let Some(v) = &patch.context {
            self.context = v.trim().to_string();
        }
        if let Some(v) = &patch.source {
            self.source = v.trim().to_string();
        }
        if let Some(v) = patch.difficulty {
            self.difficulty = v;
        }
        if let Some(tags) = &patch.tags {
            self.tags = normalize_tags(tags);
        }
        self.tags.extend(normalize_tags(&patch.add_tags));
        for tag in normalize_tags(&patch.remove_tags) {
            self.tags.remove(&tag);
        }

        self.refresh_completeness();
        Ok(())
    }
}

/// A metadata edit. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WordPatch {
    pub text: Option<String>,
    pub pronunciation: Option<String>,
    pub primary_definition: Option<String>,
    pub part_of_speech: Option<String>,
    pub definitions: Option<Vec<String>>,
    pub examples: Option<Vec<String>>,
    pub synonyms: Option<Vec<String>>,
    pub antonyms: Option<Vec<String>>,
    pub etymology: Option<String>,
    pub memory_tips: Option<String>,
    pub context: Option<String>,
    pub source: Option<String>,
    pub difficulty: Option<Difficulty>,
    /// Replaces the whole tag set
    pub tags: Option<Vec<String>>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
}

impl WordPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Trim and collapse internal whitespace; reject empty text.
pub fn clean_text(text: &str) -> Result<String> {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return Err(VocabError::InvalidInput("word text must not be empty".to_string()));
    }
    Ok(cleaned)
}

pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().trim_start_matches('#').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-03-01T08:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_new_word_defaults() {
        let word = Word::new("  lexicon ", now()).unwrap();
        assert_eq!(word.text, "lexicon");
        assert_eq!(word.status, WordStatus::New);
        assert_eq!(word.learning_data.repetitions, 0);
        assert!(word.learning_data.next_review_at.is_none());
        assert_eq!(word.completeness, 0.0);
    }

    #[test]
    fn test_empty_text_rejected() {
        assert!(matches!(Word::new("   ", now()), Err(VocabError::InvalidInput(_))));
    }

    #[test]
    fn test_normalized_text_collapses_case_and_whitespace() {
        let word = Word::new("Ad   Hoc", now()).unwrap();
        assert_eq!(word.text, "Ad Hoc");
        assert_eq!(word.normalized_text(), "ad hoc");
    }

    #[test]
    fn test_word_id_parse() {
        let id = WordId::new();
        assert_eq!(id.to_string().parse::<WordId>().unwrap(), id);
        assert!("not-a-uuid".parse::<WordId>().is_err());
    }

    #[test]
    fn test_completeness_tracks_metadata() {
        let mut word = Word::new("ubiquitous", now()).unwrap();
        let patch = WordPatch {
            pronunciation: Some("/juːˈbɪkwɪtəs/".to_string()),
            primary_definition: Some("existing everywhere".to_string()),
            ..Default::default()
        };
        word.apply_patch(&patch).unwrap();
        assert!((word.completeness - 0.35).abs() < 1e-9);

        word.add_note(Note::new("seen in The Economist", ["reading"], now()).unwrap());
        assert!((word.completeness - 0.4).abs() < 1e-9);

        let note_id = word.notes[0].id;
        word.remove_note(note_id).unwrap();
        assert!((word.completeness - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_completeness_is_capped() {
        let mut word = Word::new("full", now()).unwrap();
        word.apply_patch(&WordPatch {
            pronunciation: Some("x".into()),
            primary_definition: Some("x".into()),
            part_of_speech: Some("n.".into()),
            definitions: Some(vec!["x".into()]),
            examples: Some(vec!["x".into()]),
            synonyms: Some(vec!["x".into()]),
            etymology: Some("x".into()),
            memory_tips: Some("x".into()),
            ..Default::default()
        })
        .unwrap();
        word.add_note(Note::new("x", Vec::<String>::new(), now()).unwrap());
        assert_eq!(word.completeness, 1.0);
    }

    #[test]
    fn test_tags_are_deduplicated() {
        let mut word = Word::new("tagged", now()).unwrap();
        word.apply_patch(&WordPatch {
            tags: Some(vec!["gre".into(), " gre ".into(), "#latin".into(), "".into()]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(word.tags.iter().cloned().collect::<Vec<_>>(), vec!["gre", "latin"]);

        word.apply_patch(&WordPatch {
            add_tags: vec!["verb".into()],
            remove_tags: vec!["gre".into()],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(word.tags.iter().cloned().collect::<Vec<_>>(), vec!["latin", "verb"]);
    }

    #[test]
    fn test_empty_note_rejected() {
        assert!(Note::new("  ", Vec::<String>::new(), now()).is_err());
    }

    #[test]
    fn test_notes_keep_insertion_order() {
        let mut word = Word::new("ordered", now()).unwrap();
        for content in ["first", "second", "third"] {
            word.add_note(Note::new(content, Vec::<String>::new(), now()).unwrap());
        }
        let contents: Vec<_> = word.notes.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_status_stages() {
        assert_eq!(WordStatus::New.next_stage(), Some(WordStatus::Learning));
        assert_eq!(WordStatus::Reviewing.next_stage(), Some(WordStatus::Mastered));
        assert_eq!(WordStatus::Mastered.next_stage(), None);
        assert_eq!(WordStatus::Mastered.regressed(), WordStatus::Reviewing);
        assert_eq!(WordStatus::Learning.regressed(), WordStatus::Learning);
    }

    #[test]
    fn test_days_to_duration() {
        assert_eq!(days_to_duration(0.5), Duration::hours(12));
        assert_eq!(days_to_duration(-1.0), Duration::zero());
        assert_eq!(days_to_duration(f64::NAN), Duration::zero());
    }
}
