//! Resource identifiers and language codes
//!
//! Every entity the feed talks about is identified by a URN of the form
//! `prefix:type:id` (e.g. `sr:match:1234`). The type segment decides which
//! cache category the entity lives in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ==================== ERRORS ====================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrnParseError {
    #[error("URN '{0}' must have the form prefix:type:id")]
    Malformed(String),

    #[error("URN '{urn}' has a non-numeric id: {reason}")]
    InvalidId { urn: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid language code '{0}'")]
pub struct LanguageError(pub String);

// ==================== TYPE GROUPS ====================

/// Coarse grouping of URN types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceTypeGroup {
    Match,
    Stage,
    Tournament,
    BasicTournament,
    Season,
    Draw,
    Lottery,
    Other,
    Unknown,
}

impl ResourceTypeGroup {
    pub fn from_type(urn_type: &str) -> Self {
        match urn_type {
            "match" => Self::Match,
            "stage" | "race_event" => Self::Stage,
            "tournament" => Self::Tournament,
            "simple_tournament" => Self::BasicTournament,
            "season" => Self::Season,
            "draw" => Self::Draw,
            "lottery" => Self::Lottery,
            "competitor" | "player" | "sport" | "category" | "venue" => Self::Other,
            _ => Self::Unknown,
        }
    }
}

/// Cache category an entity belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    SportEvent,
    Tournament,
    Competitor,
}

// ==================== URN ====================

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Urn {
    prefix: String,
    urn_type: String,
    id: i64,
}

impl Urn {
    pub fn new(prefix: impl Into<String>, urn_type: impl Into<String>, id: i64) -> Self {
        Self {
            prefix: prefix.into(),
            urn_type: urn_type.into(),
            id,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn urn_type(&self) -> &str {
        &self.urn_type
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn type_group(&self) -> ResourceTypeGroup {
        ResourceTypeGroup::from_type(&self.urn_type)
    }

    /// Cache category, or `None` for reference data (sports, categories,
    /// venues) that is never cached as an entity
    pub fn category(&self) -> Option<EntityCategory> {
        match self.type_group() {
            ResourceTypeGroup::Match
            | ResourceTypeGroup::Stage
            | ResourceTypeGroup::Draw
            | ResourceTypeGroup::Lottery
            | ResourceTypeGroup::Unknown => Some(EntityCategory::SportEvent),
            ResourceTypeGroup::Tournament
            | ResourceTypeGroup::BasicTournament
            | ResourceTypeGroup::Season => Some(EntityCategory::Tournament),
            ResourceTypeGroup::Other => match self.urn_type.as_str() {
                "competitor" | "player" => Some(EntityCategory::Competitor),
                _ => None,
            },
        }
    }

    pub fn is_tournament(&self) -> bool {
        self.category() == Some(EntityCategory::Tournament)
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.prefix, self.urn_type, self.id)
    }
}

impl FromStr for Urn {
    type Err = UrnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(prefix), Some(urn_type), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(UrnParseError::Malformed(s.to_string()));
        };

        if prefix.is_empty() || urn_type.is_empty() || id.is_empty() {
            return Err(UrnParseError::Malformed(s.to_string()));
        }

        let id = id.parse::<i64>().map_err(|e| UrnParseError::InvalidId {
            urn: s.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self::new(prefix, urn_type, id))
    }
}

impl TryFrom<String> for Urn {
    type Error = UrnParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Urn> for String {
    fn from(urn: Urn) -> Self {
        urn.to_string()
    }
}

// ==================== LANGUAGE ====================

/// Lower-cased language code (`en`, `de`, `zh-hk`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(String);

impl Language {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Language {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        let valid = match code.split_once('-') {
            Some((lang, region)) => is_code(lang) && is_code(region),
            None => is_code(&code),
        };
        if valid {
            Ok(Self(code))
        } else {
            Err(LanguageError(s.to_string()))
        }
    }
}

fn is_code(part: &str) -> bool {
    (2..=3).contains(&part.len()) && part.chars().all(|c| c.is_ascii_alphabetic())
}

impl TryFrom<String> for Language {
    type Error = LanguageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.0
    }
}
