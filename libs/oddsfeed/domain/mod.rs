//! Domain Layer
//!
//! Identifiers, feed messages, producers and cached entity state.
//! This layer has no dependencies on infrastructure or application layers.

pub mod cache_item;
pub mod export;
pub mod messages;
pub mod producer;
pub mod urn;

pub use cache_item::{CacheItem, DtoSource, EntityDto, LocalizedFields, Sourced};
pub use export::{
    ExportableCacheItem, ExportableCompetitor, ExportableSportEvent, ExportableTournament,
};
pub use messages::{
    Alive, BetCancel, BetSettlement, BetStop, DeserializationError, EventStatus, FeedMessage,
    FixtureChange, MarketList, MarketRef, MessageKind, OddsChange, PeriodScore, SnapshotComplete,
};
pub use producer::{Producer, ProducerSettings, UNKNOWN_PRODUCER_ID};
pub use urn::{EntityCategory, Language, LanguageError, ResourceTypeGroup, Urn, UrnParseError};
