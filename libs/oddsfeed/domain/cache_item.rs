//! Cached entity state
//!
//! A `CacheItem` accumulates data for one entity across languages and
//! across REST endpoints of different detail. Merging is field-level and
//! append-only: a value already present is only replaced by a value from a
//! strictly more detailed source.

use super::export::{
    ExportableCacheItem, ExportableCompetitor, ExportableSportEvent, ExportableTournament,
};
use super::messages::EventStatus;
use super::urn::{EntityCategory, Language, Urn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// REST endpoint a DTO came from, ordered by detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtoSource {
    Summary,
    Fixture,
}

/// Entity data returned by the REST boundary for one language
///
/// Only the fields relevant to the entity's category are merged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityDto {
    pub id: Option<Urn>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
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
    pub schedule: Option<Vec<Urn>>,
}

/// A cached value and the source it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: DtoSource,
}

fn merge_field<T: Clone>(slot: &mut Option<Sourced<T>>, value: Option<&T>, source: DtoSource) {
    let Some(value) = value else {
        return;
    };
    match slot {
        Some(existing) if existing.source >= source => {}
        _ => {
            *slot = Some(Sourced {
                value: value.clone(),
                source,
            })
        }
    }
}

fn value_of<T>(slot: &Option<Sourced<T>>) -> Option<&T> {
    slot.as_ref().map(|s| &s.value)
}

/// Per-language fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalizedFields {
    pub name: Option<Sourced<String>>,
    pub abbreviation: Option<Sourced<String>>,
    pub country: Option<Sourced<String>>,
    pub category_name: Option<Sourced<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem {
    id: Urn,
    category: EntityCategory,
    localized: BTreeMap<Language, LocalizedFields>,
    scheduled: Option<Sourced<i64>>,
    scheduled_end: Option<Sourced<i64>>,
    sport_id: Option<Sourced<Urn>>,
    tournament_id: Option<Sourced<Urn>>,
    competitors: Option<Sourced<Vec<Urn>>>,
    status: Option<EventStatus>,
    schedule: Option<Vec<Urn>>,
    loaded_languages: BTreeSet<Language>,
    fixture_languages: BTreeSet<Language>,
}

impl CacheItem {
    /// Empty item with no languages loaded
    pub fn stub(id: Urn, category: EntityCategory) -> Self {
        Self {
            id,
            category,
            localized: BTreeMap::new(),
            scheduled: None,
            scheduled_end: None,
            sport_id: None,
            tournament_id: None,
            competitors: None,
            status: None,
            schedule: None,
            loaded_languages: BTreeSet::new(),
            fixture_languages: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &Urn {
        &self.id
    }

    pub fn category(&self) -> EntityCategory {
        self.category
    }

    pub fn loaded_languages(&self) -> &BTreeSet<Language> {
        &self.loaded_languages
    }

    pub fn fixture_languages(&self) -> &BTreeSet<Language> {
        &self.fixture_languages
    }

    fn languages_for(&self, source: DtoSource) -> &BTreeSet<Language> {
        match source {
            DtoSource::Summary => &self.loaded_languages,
            DtoSource::Fixture => &self.fixture_languages,
        }
    }

    /// Requested languages not yet loaded from `source`
    pub fn missing_languages(&self, languages: &[Language], source: DtoSource) -> Vec<Language> {
        let loaded = self.languages_for(source);
        let mut missing: Vec<Language> = Vec::new();
        for language in languages {
            if !loaded.contains(language) && !missing.contains(language) {
                missing.push(language.clone());
            }
        }
        missing
    }

    /// Merge one language worth of REST data
    ///
    /// `accept_status` is false when the feed owns this event's status.
    pub fn merge(
        &mut self,
        dto: &EntityDto,
        language: &Language,
        source: DtoSource,
        accept_status: bool,
    ) {
        let category = self.category;
        let localized = self.localized.entry(language.clone()).or_default();
        merge_field(&mut localized.name, dto.name.as_ref(), source);
        if category == EntityCategory::Competitor {
            merge_field(&mut localized.abbreviation, dto.abbreviation.as_ref(), source);
            merge_field(&mut localized.country, dto.country.as_ref(), source);
        }
        if category == EntityCategory::Tournament {
            merge_field(&mut localized.category_name, dto.category_name.as_ref(), source);
        }

        merge_field(&mut self.sport_id, dto.sport_id.as_ref(), source);
        if category != EntityCategory::Competitor {
            merge_field(&mut self.scheduled, dto.scheduled.as_ref(), source);
            merge_field(&mut self.scheduled_end, dto.scheduled_end.as_ref(), source);
        }
        if category == EntityCategory::SportEvent {
            merge_field(&mut self.tournament_id, dto.tournament_id.as_ref(), source);
            merge_field(&mut self.competitors, dto.competitors.as_ref(), source);
            if accept_status && self.status.is_none() {
                self.status = dto.status.clone();
            }
        }
        if category == EntityCategory::Tournament && self.schedule.is_none() {
            self.schedule = dto.schedule.clone();
        }

        match source {
            DtoSource::Summary => self.loaded_languages.insert(language.clone()),
            DtoSource::Fixture => self.fixture_languages.insert(language.clone()),
        };
    }

    // ---- feed-owned state ----

    pub fn status(&self) -> Option<&EventStatus> {
        self.status.as_ref()
    }

    pub fn set_status(&mut self, status: EventStatus) {
        self.status = Some(status);
    }

    pub fn clear_status(&mut self) -> bool {
        self.status.take().is_some()
    }

    pub fn schedule(&self) -> Option<&[Urn]> {
        self.schedule.as_deref()
    }

    pub fn set_schedule(&mut self, events: Vec<Urn>) {
        self.schedule = Some(events);
    }

    // ---- accessors ----

    pub fn name(&self, language: &Language) -> Option<&str> {
        self.localized
            .get(language)
            .and_then(|l| value_of(&l.name))
            .map(String::as_str)
    }

    pub fn abbreviation(&self, language: &Language) -> Option<&str> {
        self.localized
            .get(language)
            .and_then(|l| value_of(&l.abbreviation))
            .map(String::as_str)
    }

    pub fn country(&self, language: &Language) -> Option<&str> {
        self.localized
            .get(language)
            .and_then(|l| value_of(&l.country))
            .map(String::as_str)
    }

    pub fn category_name(&self, language: &Language) -> Option<&str> {
        self.localized
            .get(language)
            .and_then(|l| value_of(&l.category_name))
            .map(String::as_str)
    }

    pub fn localized(&self, language: &Language) -> Option<&LocalizedFields> {
        self.localized.get(language)
    }

    pub fn scheduled(&self) -> Option<i64> {
        value_of(&self.scheduled).copied()
    }

    pub fn scheduled_end(&self) -> Option<i64> {
        value_of(&self.scheduled_end).copied()
    }

    pub fn sport_id(&self) -> Option<&Urn> {
        value_of(&self.sport_id)
    }

    pub fn tournament_id(&self) -> Option<&Urn> {
        value_of(&self.tournament_id)
    }

    pub fn competitors(&self) -> Option<&[Urn]> {
        value_of(&self.competitors).map(Vec::as_slice)
    }

    // ---- export ----

    /// Plain record of this item for snapshot export
    pub fn to_record(&self) -> ExportableCacheItem {
        let localized = |field: fn(&LocalizedFields) -> &Option<Sourced<String>>| {
            self.localized
                .iter()
                .filter_map(|(language, fields)| {
                    value_of(field(fields)).map(|v| (language.clone(), v.clone()))
                })
                .collect::<BTreeMap<Language, String>>()
        };

        match self.category {
            EntityCategory::SportEvent => ExportableCacheItem::SportEvent(ExportableSportEvent {
                id: self.id.clone(),
                names: localized(|l| &l.name),
                scheduled: self.scheduled(),
                scheduled_end: self.scheduled_end(),
                sport_id: self.sport_id().cloned(),
                tournament_id: self.tournament_id().cloned(),
                competitors: value_of(&self.competitors).cloned(),
                status: self.status.clone(),
                loaded_languages: self.loaded_languages.clone(),
                fixture_languages: self.fixture_languages.clone(),
            }),
            EntityCategory::Tournament => ExportableCacheItem::Tournament(ExportableTournament {
                id: self.id.clone(),
                names: localized(|l| &l.name),
                category_names: localized(|l| &l.category_name),
                scheduled: self.scheduled(),
                scheduled_end: self.scheduled_end(),
                sport_id: self.sport_id().cloned(),
                schedule: self.schedule.clone(),
                loaded_languages: self.loaded_languages.clone(),
                fixture_languages: self.fixture_languages.clone(),
            }),
            EntityCategory::Competitor => ExportableCacheItem::Competitor(ExportableCompetitor {
                id: self.id.clone(),
                names: localized(|l| &l.name),
                abbreviations: localized(|l| &l.abbreviation),
                countries: localized(|l| &l.country),
                sport_id: self.sport_id().cloned(),
                loaded_languages: self.loaded_languages.clone(),
                fixture_languages: self.fixture_languages.clone(),
            }),
        }
    }

    /// Merge an exported record back into this item
    ///
    /// Values count as fixture data for languages the record lists as
    /// fixture-loaded and as summary data otherwise.
    pub fn merge_record(&mut self, record: &ExportableCacheItem) {
        let fixture_languages = record.fixture_languages().clone();
        let source_for = |language: &Language| {
            if fixture_languages.contains(language) {
                DtoSource::Fixture
            } else {
                DtoSource::Summary
            }
        };
        let neutral_source = if fixture_languages.is_empty() {
            DtoSource::Summary
        } else {
            DtoSource::Fixture
        };

        let mut merge_localized =
            |values: &BTreeMap<Language, String>, field: fn(&mut LocalizedFields) -> &mut Option<Sourced<String>>| {
                for (language, value) in values {
                    let fields = self.localized.entry(language.clone()).or_default();
                    merge_field(field(fields), Some(value), source_for(language));
                }
            };

        match record {
            ExportableCacheItem::SportEvent(r) => {
                merge_localized(&r.names, |l| &mut l.name);
                merge_field(&mut self.scheduled, r.scheduled.as_ref(), neutral_source);
                merge_field(&mut self.scheduled_end, r.scheduled_end.as_ref(), neutral_source);
                merge_field(&mut self.sport_id, r.sport_id.as_ref(), neutral_source);
                merge_field(&mut self.tournament_id, r.tournament_id.as_ref(), neutral_source);
                merge_field(&mut self.competitors, r.competitors.as_ref(), neutral_source);
                if self.status.is_none() {
                    self.status = r.status.clone();
                }
            }
            ExportableCacheItem::Tournament(r) => {
                merge_localized(&r.names, |l| &mut l.name);
                merge_localized(&r.category_names, |l| &mut l.category_name);
                merge_field(&mut self.scheduled, r.scheduled.as_ref(), neutral_source);
                merge_field(&mut self.scheduled_end, r.scheduled_end.as_ref(), neutral_source);
                merge_field(&mut self.sport_id, r.sport_id.as_ref(), neutral_source);
                if self.schedule.is_none() {
                    self.schedule = r.schedule.clone();
                }
            }
            ExportableCacheItem::Competitor(r) => {
                merge_localized(&r.names, |l| &mut l.name);
                merge_localized(&r.abbreviations, |l| &mut l.abbreviation);
                merge_localized(&r.countries, |l| &mut l.country);
                merge_field(&mut self.sport_id, r.sport_id.as_ref(), neutral_source);
            }
        }

        self.loaded_languages.extend(record.loaded_languages().iter().cloned());
        self.fixture_languages.extend(fixture_languages);
    }
}
