//! Routing keys and message interests
//!
//! Routing keys have eight dot-separated segments:
//! `priority.prematch.live.message_type.sport_id.urn_prefix:urn_type.event_id.node_id`
//! with `-` marking an absent segment.

use crate::domain::Urn;
use thiserror::Error;
use tracing::debug;

const SEGMENTS: usize = 8;
const ABSENT: &str = "-";

const ALIVE_BINDING: &str = "-.-.-.alive.#";
const SNAPSHOT_COMPLETE_BINDING: &str = "-.-.-.snapshot_complete.-.-.-.-";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingKeyError {
    #[error("routing key '{key}' has {found} segments, expected 8")]
    SegmentCount { key: String, found: usize },
}

/// Information recovered from a routing key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingKeyInfo {
    pub priority: Option<String>,
    pub prematch: bool,
    pub live: bool,
    pub virtual_sports: bool,
    pub message_type: String,
    pub sport_id: Option<Urn>,
    pub event_id: Option<Urn>,
    pub node_id: Option<i32>,
}

fn segment(value: &str) -> Option<&str> {
    (value != ABSENT && !value.is_empty()).then_some(value)
}

impl RoutingKeyInfo {
    pub fn parse(key: &str) -> Result<Self, RoutingKeyError> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() < SEGMENTS {
            return Err(RoutingKeyError::SegmentCount {
                key: key.to_string(),
                found: parts.len(),
            });
        }

        let event_id = match (segment(parts[5]), segment(parts[6])) {
            (Some(prefix_type), Some(id)) => match format!("{prefix_type}:{id}").parse::<Urn>() {
                Ok(urn) => Some(urn),
                Err(e) => {
                    debug!(key, error = %e, "Routing key carries an unparseable event id");
                    None
                }
            },
            _ => None,
        };

        let sport_prefix = event_id.as_ref().map_or("sr", Urn::prefix).to_string();
        let sport_id = match segment(parts[4]) {
            Some(sport) => match sport.parse::<i64>() {
                Ok(id) => Some(Urn::new(sport_prefix, "sport", id)),
                Err(_) => {
                    debug!(key, sport, "Routing key carries a non-numeric sport id");
                    None
                }
            },
            None => {
                debug!(key, "Routing key carries no sport id");
                None
            }
        };

        Ok(Self {
            priority: segment(parts[0]).map(str::to_string),
            prematch: parts[1] == "pre",
            live: parts[2] == "live",
            virtual_sports: parts[1] == "virt",
            message_type: parts[3].to_string(),
            sport_id,
            event_id,
            node_id: segment(parts[7]).and_then(|n| n.parse().ok()),
        })
    }
}

/// Which messages a session subscribes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageInterest {
    AllMessages,
    LiveMessagesOnly,
    PrematchMessagesOnly,
    HiPrioMessagesOnly,
    LoPrioMessagesOnly,
    VirtualSports,
    SpecifiedMatchesOnly(Vec<Urn>),
    SystemAliveOnly,
}

impl MessageInterest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AllMessages => "all",
            Self::LiveMessagesOnly => "live",
            Self::PrematchMessagesOnly => "prematch",
            Self::HiPrioMessagesOnly => "hi_prio",
            Self::LoPrioMessagesOnly => "lo_prio",
            Self::VirtualSports => "virtual",
            Self::SpecifiedMatchesOnly(_) => "specified_matches",
            Self::SystemAliveOnly => "system_alive",
        }
    }

    fn base_keys(&self) -> Vec<String> {
        match self {
            Self::AllMessages => vec!["*.*.*.*.*.*.*.-".to_string()],
            Self::LiveMessagesOnly => vec!["*.*.live.*.*.*.*.-".to_string()],
            Self::PrematchMessagesOnly => vec!["*.pre.*.*.*.*.*.-".to_string()],
            Self::HiPrioMessagesOnly => vec!["hi.*.*.*.*.*.*.-".to_string()],
            Self::LoPrioMessagesOnly => vec!["lo.*.*.*.*.*.*.-".to_string()],
            Self::VirtualSports => vec!["*.virt.*.*.*.*.*.-".to_string()],
            Self::SpecifiedMatchesOnly(ids) => ids
                .iter()
                .map(|id| format!("*.*.*.*.*.{}:{}.{}.-", id.prefix(), id.urn_type(), id.id()))
                .collect(),
            Self::SystemAliveOnly => Vec::new(),
        }
    }

    /// Binding patterns for this interest
    pub fn routing_keys(&self, node_id: Option<i32>) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        let mut push = |key: String| {
            if !keys.contains(&key) {
                keys.push(key);
            }
        };

        for key in self.base_keys() {
            if let (Some(node), Some(stem)) = (node_id, key.strip_suffix(ABSENT)) {
                push(format!("{stem}{node}"));
            }
            push(key);
        }

        if *self != Self::SystemAliveOnly {
            push(SNAPSHOT_COMPLETE_BINDING.to_string());
            if let Some(node) = node_id {
                push(format!("-.-.-.snapshot_complete.-.-.-.{node}"));
            }
        }
        push(ALIVE_BINDING.to_string());

        keys
    }
}
