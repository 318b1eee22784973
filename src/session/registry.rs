/// Per-channel subscription registry: tracks each symbol's [`ChannelState`]
/// and correlates acks back to the request that caused them, discarding
/// anything stamped with a stale connection epoch.
use std::collections::HashMap;

use crate::data::{ChannelKind, ChannelState, ReqId, Symbol};
use crate::errors::KrakenError;

pub struct SubscriptionRegistry {
    kind: ChannelKind,
    entries: HashMap<Symbol, ChannelState>,
}

impl SubscriptionRegistry {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn state_of(&self, symbol: &Symbol) -> ChannelState {
        self.entries.get(symbol).copied().unwrap_or(ChannelState::Inactive)
    }

    /// Record a newly issued subscribe request. Rejects locally if the
    /// symbol is already active or already has a request in flight.
    pub fn issue_subscribe(&mut self, symbol: Symbol, req_id: ReqId, epoch: u64) -> Result<(), KrakenError> {
        match self.entries.get(&symbol) {
            Some(ChannelState::Active { .. }) => Err(KrakenError::AlreadyActive(symbol)),
            Some(s) if s.is_pending() => Err(KrakenError::AlreadyPending(symbol)),
            _ => {
                self.entries.insert(symbol, ChannelState::PendingSubscribe { req_id, epoch });
                Ok(())
            }
        }
    }

    /// Record a newly issued unsubscribe request. Rejects locally if the
    /// symbol is not active or already has a request in flight.
    pub fn issue_unsubscribe(&mut self, symbol: Symbol, req_id: ReqId, epoch: u64) -> Result<(), KrakenError> {
        match self.entries.get(&symbol) {
            Some(ChannelState::Active { .. }) => {
                self.entries.insert(symbol, ChannelState::PendingUnsubscribe { req_id, epoch });
                Ok(())
            }
            Some(s) if s.is_pending() => Err(KrakenError::AlreadyPending(symbol)),
            _ => Err(KrakenError::NotActive(symbol)),
        }
    }

    /// Apply a subscribe ack. Ignored if no matching pending request exists
    /// at this `(req_id, epoch)` — including acks that outlived a reconnect.
    pub fn on_subscribe_ack(&mut self, symbol: &Symbol, req_id: u64, epoch: u64, success: bool) {
        let Some(state) = self.entries.get(symbol) else { return };
        if let ChannelState::PendingSubscribe { req_id: pending, epoch: pending_epoch } = state {
            if pending.0 == req_id && *pending_epoch == epoch {
                if success {
                    self.entries.insert(symbol.clone(), ChannelState::Active { epoch });
                } else {
                    self.entries.remove(symbol);
                }
            }
        }
    }

    /// Apply an unsubscribe ack, symmetric to [`Self::on_subscribe_ack`].
    pub fn on_unsubscribe_ack(&mut self, symbol: &Symbol, req_id: u64, epoch: u64, success: bool) {
        let Some(state) = self.entries.get(symbol) else { return };
        if let ChannelState::PendingUnsubscribe { req_id: pending, epoch: pending_epoch } = state {
            if pending.0 == req_id && *pending_epoch == epoch {
                if success {
                    self.entries.remove(symbol);
                } else {
                    self.entries.insert(symbol.clone(), ChannelState::Active { epoch });
                }
            }
        }
    }

    pub fn active_symbols(&self) -> Vec<Symbol> {
        self.entries
            .iter()
            .filter(|(_, s)| s.is_active())
            .map(|(sym, _)| sym.clone())
            .collect()
    }

    pub fn pending_requests(&self) -> Vec<(Symbol, ReqId)> {
        self.entries
            .iter()
            .filter_map(|(sym, s)| match s {
                ChannelState::PendingSubscribe { req_id, .. } | ChannelState::PendingUnsubscribe { req_id, .. } => {
                    Some((sym.clone(), *req_id))
                }
                _ => None,
            })
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.entries.values().any(|s| s.is_pending())
    }

    pub fn has_active(&self) -> bool {
        self.entries.values().any(|s| s.is_active())
    }

    /// On reconnect: drop every entry stamped with a prior epoch (pending
    /// requests lapse silently; active subscriptions must be replayed by
    /// the caller) and return the symbols that were active, for replay
    /// under the new epoch.
    pub fn take_for_replay(&mut self) -> Vec<Symbol> {
        let active: Vec<Symbol> = self.active_symbols();
        self.entries.clear();
        active
    }
}
