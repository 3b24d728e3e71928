//! Feed message model
//!
//! Broker bodies are JSON documents with a `type` tag naming the message
//! kind, an envelope shared by all kinds and a kind-specific payload.

use super::urn::Urn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeserializationError {
    #[error("empty message body")]
    EmptyBody,

    #[error("invalid feed message: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("{kind} message carries no event id")]
    MissingEventId { kind: &'static str },
}

// ==================== PAYLOADS ====================

/// Live status of a sport event as carried by `odds_change`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStatus {
    pub status: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_status: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_score: Option<f64>,
    #[serde(default)]
    pub period_scores: Vec<PeriodScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodScore {
    pub number: u32,
    pub home_score: f64,
    pub away_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_status: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRef {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifiers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Alive {
    #[serde(default)]
    pub subscribed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotComplete {}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OddsChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_change_reason: Option<i32>,
    #[serde(default)]
    pub markets: Vec<MarketRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BetStop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_status: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BetSettlement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certainty: Option<i32>,
    #[serde(default)]
    pub markets: Vec<MarketRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarketList {
    #[serde(default)]
    pub markets: Vec<MarketRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BetCancel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub markets: Vec<MarketRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FixtureChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
}

// ==================== MESSAGE ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageKind {
    Alive(Alive),
    SnapshotComplete(SnapshotComplete),
    OddsChange(OddsChange),
    BetStop(BetStop),
    BetSettlement(BetSettlement),
    RollbackBetSettlement(MarketList),
    BetCancel(BetCancel),
    RollbackBetCancel(MarketList),
    FixtureChange(FixtureChange),
}

impl MessageKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Alive(_) => "alive",
            Self::SnapshotComplete(_) => "snapshot_complete",
            Self::OddsChange(_) => "odds_change",
            Self::BetStop(_) => "bet_stop",
            Self::BetSettlement(_) => "bet_settlement",
            Self::RollbackBetSettlement(_) => "rollback_bet_settlement",
            Self::BetCancel(_) => "bet_cancel",
            Self::RollbackBetCancel(_) => "rollback_bet_cancel",
            Self::FixtureChange(_) => "fixture_change",
        }
    }

    pub fn is_event_related(&self) -> bool {
        !matches!(self, Self::Alive(_) | Self::SnapshotComplete(_))
    }

    /// Settlements and cancellations (and their rollbacks) must be remembered
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            Self::BetSettlement(_)
                | Self::RollbackBetSettlement(_)
                | Self::BetCancel(_)
                | Self::RollbackBetCancel(_)
        )
    }
}

/// A decoded feed message
///
/// `sent_at`, `received_at` and `sport_id` are not part of the body; the
/// receiver fills them from the delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMessage {
    /// Producer id
    pub product: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Urn>,
    /// Generated-at, epoch millis
    #[serde(rename = "timestamp")]
    pub generated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<i64>,
    #[serde(flatten)]
    pub kind: MessageKind,
    #[serde(skip)]
    pub sent_at: i64,
    #[serde(skip)]
    pub received_at: i64,
    #[serde(skip)]
    pub sport_id: Option<Urn>,
}

impl FeedMessage {
    pub fn new(product: u32, event_id: Option<Urn>, generated_at: i64, kind: MessageKind) -> Self {
        Self {
            product,
            event_id,
            generated_at,
            request_id: None,
            kind,
            sent_at: generated_at,
            received_at: 0,
            sport_id: None,
        }
    }

    /// Decode a broker body
    ///
    /// Event-related kinds must carry an event id.
    pub fn decode(body: &[u8]) -> Result<Self, DeserializationError> {
        if body.is_empty() {
            return Err(DeserializationError::EmptyBody);
        }

        let mut message: FeedMessage = serde_json::from_slice(body)?;
        if message.kind.is_event_related() && message.event_id.is_none() {
            return Err(DeserializationError::MissingEventId {
                kind: message.kind.name(),
            });
        }
        message.sent_at = message.generated_at;
        Ok(message)
    }

    pub fn is_event_related(&self) -> bool {
        self.kind.is_event_related()
    }

    pub fn is_stateful(&self) -> bool {
        self.kind.is_stateful()
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }
}
