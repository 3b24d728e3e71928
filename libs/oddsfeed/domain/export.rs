//! Snapshot records
//!
//! Plain, behaviour-free representation of cached entities. One record
//! type per cache category; the list as a whole is what gets persisted.

use super::messages::EventStatus;
use super::urn::{Language, Urn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportableCacheItem {
    SportEvent(ExportableSportEvent),
    Tournament(ExportableTournament),
    Competitor(ExportableCompetitor),
}

impl ExportableCacheItem {
    pub fn id(&self) -> &Urn {
        match self {
            Self::SportEvent(r) => &r.id,
            Self::Tournament(r) => &r.id,
            Self::Competitor(r) => &r.id,
        }
    }

    pub fn loaded_languages(&self) -> &BTreeSet<Language> {
        match self {
            Self::SportEvent(r) => &r.loaded_languages,
            Self::Tournament(r) => &r.loaded_languages,
            Self::Competitor(r) => &r.loaded_languages,
        }
    }

    pub fn fixture_languages(&self) -> &BTreeSet<Language> {
        match self {
            Self::SportEvent(r) => &r.fixture_languages,
            Self::Tournament(r) => &r.fixture_languages,
            Self::Competitor(r) => &r.fixture_languages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportableSportEvent {
    pub id: Urn,
    #[serde(default)]
    pub names: BTreeMap<Language, String>,
    #[serde(default)]
    pub scheduled: Option<i64>,
    #[serde(default)]
    pub scheduled_end: Option<i64>,
    #[serde(default)]
    pub sport_id: Option<Urn>,
    #[serde(default)]
    pub tournament_id: Option<Urn>,
    #[serde(default)]
    pub competitors: Option<Vec<Urn>>,
    #[serde(default)]
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub loaded_languages: BTreeSet<Language>,
    #[serde(default)]
    pub fixture_languages: BTreeSet<Language>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportableTournament {
    pub id: Urn,
    #[serde(default)]
    pub names: BTreeMap<Language, String>,
    #[serde(default)]
    pub category_names: BTreeMap<Language, String>,
    #[serde(default)]
    pub scheduled: Option<i64>,
    #[serde(default)]
    pub scheduled_end: Option<i64>,
    #[serde(default)]
    pub sport_id: Option<Urn>,
    #[serde(default)]
    pub schedule: Option<Vec<Urn>>,
    #[serde(default)]
    pub loaded_languages: BTreeSet<Language>,
    #[serde(default)]
    pub fixture_languages: BTreeSet<Language>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportableCompetitor {
    pub id: Urn,
    #[serde(default)]
    pub names: BTreeMap<Language, String>,
    #[serde(default)]
    pub abbreviations: BTreeMap<Language, String>,
    #[serde(default)]
    pub countries: BTreeMap<Language, String>,
    #[serde(default)]
    pub sport_id: Option<Urn>,
    #[serde(default)]
    pub loaded_languages: BTreeSet<Language>,
    #[serde(default)]
    pub fixture_languages: BTreeSet<Language>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache_item::{CacheItem, DtoSource, EntityDto};
    use crate::domain::urn::EntityCategory;

    #[test]
    fn test_record_is_tagged_json() {
        let mut item = CacheItem::stub(Urn::new("sr", "season", 3), EntityCategory::Tournament);
        let en: Language = "en".parse().unwrap();
        item.merge(
            &EntityDto {
                name: Some("Premier League 24/25".into()),
                category_name: Some("England".into()),
                ..Default::default()
            },
            &en,
            DtoSource::Summary,
            true,
        );

        let value = serde_json::to_value(item.to_record()).unwrap();
        assert_eq!(value["type"], "tournament");
        assert_eq!(value["id"], "sr:season:3");
        assert_eq!(value["names"]["en"], "Premier League 24/25");
        assert_eq!(value["category_names"]["en"], "England");
        assert_eq!(value["loaded_languages"][0], "en");
    }

    #[test]
    fn test_record_round_trip_reproduces_item() {
        let mut item = CacheItem::stub(Urn::new("sr", "match", 9), EntityCategory::SportEvent);
        let (en, de): (Language, Language) = ("en".parse().unwrap(), "de".parse().unwrap());
        item.merge(
            &EntityDto {
                name: Some("A vs B".into()),
                scheduled: Some(100),
                competitors: Some(vec![Urn::new("sr", "competitor", 1), Urn::new("sr", "competitor", 2)]),
                ..Default::default()
            },
            &en,
            DtoSource::Fixture,
            true,
        );
        item.merge(
            &EntityDto {
                name: Some("A gegen B".into()),
                ..Default::default()
            },
            &de,
            DtoSource::Summary,
            true,
        );

        let record = item.to_record();
        let json = serde_json::to_string(&record).unwrap();
        let decoded: ExportableCacheItem = serde_json::from_str(&json).unwrap();

        let mut restored = CacheItem::stub(item.id().clone(), EntityCategory::SportEvent);
        restored.merge_record(&decoded);

        assert_eq!(restored.to_record(), record);
        assert_eq!(restored.name(&de), Some("A gegen B"));
        assert_eq!(restored.competitors().map(|c| c.len()), Some(2));
        assert_eq!(restored.loaded_languages(), item.loaded_languages());
        assert_eq!(restored.fixture_languages(), item.fixture_languages());
    }
}
