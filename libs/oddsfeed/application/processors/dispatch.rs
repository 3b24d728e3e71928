//! User dispatch

use super::FeedMessageProcessor;
use crate::application::listeners::ListenerRegistry;
use crate::domain::{
    BetCancel, BetSettlement, BetStop, FeedMessage, FixtureChange, MarketList, MessageKind,
    OddsChange,
};
use std::sync::Arc;

/// Session callbacks, one per message kind; all default to no-ops
pub trait SessionListener: Send + Sync {
    fn on_odds_change(&self, _message: &FeedMessage, _odds: &OddsChange) {}

    fn on_bet_stop(&self, _message: &FeedMessage, _bet_stop: &BetStop) {}

    fn on_bet_settlement(&self, _message: &FeedMessage, _settlement: &BetSettlement) {}

    fn on_rollback_bet_settlement(&self, _message: &FeedMessage, _rollback: &MarketList) {}

    fn on_bet_cancel(&self, _message: &FeedMessage, _cancel: &BetCancel) {}

    fn on_rollback_bet_cancel(&self, _message: &FeedMessage, _rollback: &MarketList) {}

    fn on_fixture_change(&self, _message: &FeedMessage, _change: &FixtureChange) {}

    /// `alive` and `snapshot_complete`
    fn on_system_message(&self, _message: &FeedMessage) {}
}

/// Last link of the chain: hands messages to session listeners
pub struct DispatchProcessor {
    listeners: Arc<ListenerRegistry<dyn SessionListener>>,
}

impl DispatchProcessor {
    pub fn new(listeners: Arc<ListenerRegistry<dyn SessionListener>>) -> Self {
        Self { listeners }
    }
}

impl FeedMessageProcessor for DispatchProcessor {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    fn process(&self, message: &FeedMessage) {
        self.listeners.for_each(|listener| match &message.kind {
            MessageKind::OddsChange(odds) => listener.on_odds_change(message, odds),
            MessageKind::BetStop(bet_stop) => listener.on_bet_stop(message, bet_stop),
            MessageKind::BetSettlement(settlement) => {
                listener.on_bet_settlement(message, settlement)
            }
            MessageKind::RollbackBetSettlement(rollback) => {
                listener.on_rollback_bet_settlement(message, rollback)
            }
            MessageKind::BetCancel(cancel) => listener.on_bet_cancel(message, cancel),
            MessageKind::RollbackBetCancel(rollback) => {
                listener.on_rollback_bet_cancel(message, rollback)
            }
            MessageKind::FixtureChange(change) => listener.on_fixture_change(message, change),
            MessageKind::Alive(_) | MessageKind::SnapshotComplete(_) => {
                listener.on_system_message(message)
            }
        });
    }
}
