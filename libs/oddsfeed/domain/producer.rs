//! Upstream data producers

use serde::{Deserialize, Serialize};

/// Id reserved for the unknown-producer sentinel
pub const UNKNOWN_PRODUCER_ID: u32 = 0;

/// Default stateful recovery window (three days)
pub const DEFAULT_RECOVERY_WINDOW_MINUTES: u32 = 4320;

/// Static producer definition, as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerSettings {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_recovery_window")]
    pub stateful_recovery_window_minutes: u32,
    #[serde(default)]
    pub disabled: bool,
}

fn default_recovery_window() -> u32 {
    DEFAULT_RECOVERY_WINDOW_MINUTES
}

impl ProducerSettings {
    pub fn new(id: u32, name: impl Into<String>, stateful_recovery_window_minutes: u32) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            stateful_recovery_window_minutes,
            disabled: false,
        }
    }

    /// Producers registered when configuration lists none
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(1, "LO", DEFAULT_RECOVERY_WINDOW_MINUTES),
            Self::new(3, "Ctrl", DEFAULT_RECOVERY_WINDOW_MINUTES),
            Self::new(6, "VF", 180),
        ]
    }
}

/// Runtime view of a producer
///
/// Values handed out by the registry are snapshots; mutate through the
/// registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Producer {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub is_available: bool,
    pub is_disabled: bool,
    /// True until the first alive/snapshot_complete, and again after a disconnect
    pub is_producer_down: bool,
    pub stateful_recovery_window_minutes: u32,
    /// Epoch millis of the last processed message before the producer went down
    pub last_timestamp_before_disconnect: Option<i64>,
    pub last_alive_at: Option<i64>,
    pub last_processed_message_at: Option<i64>,
}

impl Producer {
    pub fn from_settings(settings: &ProducerSettings) -> Self {
        Self {
            id: settings.id,
            name: settings.name.clone(),
            description: settings.description.clone(),
            is_available: true,
            is_disabled: settings.disabled,
            is_producer_down: true,
            stateful_recovery_window_minutes: settings.stateful_recovery_window_minutes,
            last_timestamp_before_disconnect: None,
            last_alive_at: None,
            last_processed_message_at: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            id: UNKNOWN_PRODUCER_ID,
            name: "Unknown".to_string(),
            description: "Unknown producer".to_string(),
            is_available: false,
            is_disabled: false,
            is_producer_down: true,
            stateful_recovery_window_minutes: 0,
            last_timestamp_before_disconnect: None,
            last_alive_at: None,
            last_processed_message_at: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.id == UNKNOWN_PRODUCER_ID
    }

    /// Messages from this producer may reach the cache and user dispatch
    pub fn is_active(&self) -> bool {
        self.is_available && !self.is_disabled && !self.is_producer_down
    }

    pub fn recovery_window_millis(&self) -> i64 {
        i64::from(self.stateful_recovery_window_minutes) * 60_000
    }
}
