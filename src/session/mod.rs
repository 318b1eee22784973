/// The public streaming session: owns the connection, both channel
/// subscription registries, and the rings the caller drains from
/// `poll()`.
pub mod registry;
pub mod router;

use std::collections::HashMap;

use crate::config::SessionConfig;
use crate::data::{ChannelKind, ChannelState, Depth, ReqId, ReqIdAllocator, Symbol};
use crate::errors::KrakenError;
use crate::protocol::encoder::{PingRequest, SubscribeRequest, UnsubscribeRequest};
use crate::protocol::messages::{BookEnvelope, Pong, Rejection, Status, TradeEnvelope};
use crate::ring::{LatestSlot, Ring};
use crate::transport::{Connection, ConnectionState, TransitionEvent};

use registry::SubscriptionRegistry;
use router::Routed;

/// Replayable parameters of an active subscription, recorded at `subscribe`
/// time so a reconnect can re-issue the exact same request shape.
#[derive(Debug, Clone, Copy)]
enum ReplayParams {
    Trade { snapshot: Option<bool> },
    Book { depth: Depth },
}

pub struct KrakenSession {
    connection: Connection,
    trade_registry: SubscriptionRegistry,
    book_registry: SubscriptionRegistry,
    req_ids: ReqIdAllocator,
    epoch: u64,
    replay_params: HashMap<(ChannelKind, Symbol), ReplayParams>,
    trades: Ring<TradeEnvelope>,
    books: Ring<BookEnvelope>,
    rejections: Ring<Rejection>,
    transition_events: Ring<TransitionEvent>,
    pong: LatestSlot<Pong>,
    status: LatestSlot<Status>,
    heartbeats_received: u64,
    poll_fairness_cap: usize,
}

impl KrakenSession {
    pub fn new(url: impl Into<String>, config: SessionConfig) -> Self {
        let ring_capacity = config.ring_capacity;
        let poll_fairness_cap = config.poll_fairness_cap;
        let transition_event_ring_capacity = config.ws.transition_event_ring_capacity;
        Self {
            connection: Connection::new(url, config.ws),
            trade_registry: SubscriptionRegistry::new(ChannelKind::Trade),
            book_registry: SubscriptionRegistry::new(ChannelKind::Book),
            req_ids: ReqIdAllocator::new(),
            epoch: 0,
            replay_params: HashMap::new(),
            trades: Ring::new(ring_capacity),
            books: Ring::new(ring_capacity),
            rejections: Ring::new(64),
            transition_events: Ring::new(transition_event_ring_capacity),
            pong: LatestSlot::new(),
            status: LatestSlot::new(),
            heartbeats_received: 0,
            poll_fairness_cap,
        }
    }

    pub fn connect(&mut self) -> Result<(), KrakenError> {
        self.connection
            .connect()
            .map_err(|e| KrakenError::ConnectFailed(format!("{e:?}")))
    }

    pub fn close(&mut self) {
        self.connection.close();
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn force_reconnect(&mut self) {
        self.connection.force_reconnect();
    }

    pub fn trade_subscriptions(&self) -> &SubscriptionRegistry {
        &self.trade_registry
    }

    pub fn book_subscriptions(&self) -> &SubscriptionRegistry {
        &self.book_registry
    }

    fn registry_mut(&mut self, kind: ChannelKind) -> &mut SubscriptionRegistry {
        match kind {
            ChannelKind::Trade => &mut self.trade_registry,
            ChannelKind::Book => &mut self.book_registry,
        }
    }

    fn send(&self, payload: &serde_json::Value) -> Result<(), KrakenError> {
        let socket = self.connection.socket().ok_or(KrakenError::NotConnected)?;
        if !socket.send(payload.to_string().into_bytes()) {
            return Err(KrakenError::NotConnected);
        }
        Ok(())
    }

    pub fn subscribe(&mut self, req: SubscribeRequest) -> Result<ReqId, KrakenError> {
        if self.connection.socket().is_none() {
            return Err(KrakenError::NotConnected);
        }
        let kind = match &req {
            SubscribeRequest::Trade { .. } => ChannelKind::Trade,
            SubscribeRequest::Book { .. } => ChannelKind::Book,
        };
        let registry = self.registry_mut(kind);
        for sym in req.symbols() {
            match registry.state_of(sym) {
                ChannelState::Active { .. } => return Err(KrakenError::AlreadyActive(sym.clone())),
                s if s.is_pending() => return Err(KrakenError::AlreadyPending(sym.clone())),
                _ => {}
            }
        }

        let req_id = req.req_id().unwrap_or_else(|| self.req_ids.next());
        let req = req.with_req_id(req_id);
        let epoch = self.epoch;
        let registry = self.registry_mut(kind);
        for sym in req.symbols() {
            registry
                .issue_subscribe(sym.clone(), req_id, epoch)
                .expect("availability already checked above");
        }

        match &req {
            SubscribeRequest::Trade { symbols, snapshot, .. } => {
                for sym in symbols {
                    self.replay_params
                        .insert((ChannelKind::Trade, sym.clone()), ReplayParams::Trade { snapshot: *snapshot });
                }
            }
            SubscribeRequest::Book { symbols, depth, .. } => {
                for sym in symbols {
                    self.replay_params
                        .insert((ChannelKind::Book, sym.clone()), ReplayParams::Book { depth: *depth });
                }
            }
        }

        self.send(&req.to_json())?;
        Ok(req_id)
    }

    pub fn unsubscribe(&mut self, req: UnsubscribeRequest) -> Result<ReqId, KrakenError> {
        if self.connection.socket().is_none() {
            return Err(KrakenError::NotConnected);
        }
        let kind = match &req {
            UnsubscribeRequest::Trade { .. } => ChannelKind::Trade,
            UnsubscribeRequest::Book { .. } => ChannelKind::Book,
        };
        let registry = self.registry_mut(kind);
        for sym in req.symbols() {
            match registry.state_of(sym) {
                ChannelState::Active { .. } => {}
                s if s.is_pending() => return Err(KrakenError::AlreadyPending(sym.clone())),
                _ => return Err(KrakenError::NotActive(sym.clone())),
            }
        }

        let req_id = req.req_id().unwrap_or_else(|| self.req_ids.next());
        let req = req.with_req_id(req_id);
        let epoch = self.epoch;
        let registry = self.registry_mut(kind);
        for sym in req.symbols() {
            registry
                .issue_unsubscribe(sym.clone(), req_id, epoch)
                .expect("availability already checked above");
        }

        self.send(&req.to_json())?;
        Ok(req_id)
    }

    pub fn ping(&mut self, req_id: Option<ReqId>) -> Result<ReqId, KrakenError> {
        if self.connection.socket().is_none() {
            return Err(KrakenError::NotConnected);
        }
        let req_id = req_id.unwrap_or_else(|| self.req_ids.next());
        let ping = PingRequest::new(Some(req_id))?;
        self.send(&ping.to_json())?;
        Ok(req_id)
    }

    /// Drain transport/connection events, dispatch inbound messages, and
    /// replay subscriptions after a reconnect. Never blocks.
    pub fn poll(&mut self) {
        self.connection.poll();

        while let Some(ev) = self.connection.poll_transition_event() {
            if ev == TransitionEvent::Connected {
                self.on_reconnect();
            }
            let _ = self.transition_events.try_push(ev);
        }

        for _ in 0..self.poll_fairness_cap {
            let Some(socket) = self.connection.socket_mut() else { break };
            let Some(bytes) = socket.peek_message() else { break };
            let routed = router::route(bytes);
            self.connection.record_activity();
            self.dispatch(routed);
            if let Some(socket) = self.connection.socket_mut() {
                socket.release_message();
            }
        }
    }

    fn on_reconnect(&mut self) {
        self.epoch += 1;
        let trade_replay = self.trade_registry.take_for_replay();
        let book_replay = self.book_registry.take_for_replay();

        for sym in trade_replay {
            let snapshot = match self.replay_params.get(&(ChannelKind::Trade, sym.clone())) {
                Some(ReplayParams::Trade { snapshot }) => *snapshot,
                _ => None,
            };
            if let Ok(req) = SubscribeRequest::trade(vec![sym], snapshot, None) {
                let _ = self.subscribe(req);
            }
        }
        for sym in book_replay {
            let depth = match self.replay_params.get(&(ChannelKind::Book, sym.clone())) {
                Some(ReplayParams::Book { depth }) => depth.as_u32(),
                _ => Depth::D10.as_u32(),
            };
            if let Ok(req) = SubscribeRequest::book(vec![sym], depth, None) {
                let _ = self.subscribe(req);
            }
        }
    }

    fn dispatch(&mut self, routed: Routed) {
        match routed {
            Routed::TradeUpdate(env) => {
                let _ = self.trades.try_push(env);
            }
            Routed::BookUpdate(env) => {
                let _ = self.books.try_push(env);
            }
            Routed::SubscribeAck(ack) => {
                if let (Some(req_id), Some(channel), Some(symbol)) = (ack.req_id, ack.channel, ack.symbol.clone()) {
                    self.registry_mut(channel).on_subscribe_ack(&symbol, req_id, self.epoch, ack.success);
                }
            }
            Routed::UnsubscribeAck(ack) => {
                if let (Some(req_id), Some(channel), Some(symbol)) = (ack.req_id, ack.channel, ack.symbol.clone()) {
                    self.registry_mut(channel).on_unsubscribe_ack(&symbol, req_id, self.epoch, ack.success);
                    if ack.success {
                        self.replay_params.remove(&(channel, symbol));
                    }
                }
            }
            Routed::PingAck(pong) => self.pong.publish(pong),
            Routed::Heartbeat => self.heartbeats_received += 1,
            Routed::Status(status) => self.status.publish(status),
            Routed::Rejection(rejection) => {
                let _ = self.rejections.try_push(rejection);
            }
            Routed::Invalid => log::debug!("kraken session: dropped frame with invalid schema"),
            Routed::Unrecognized => log::debug!("kraken session: dropped unrecognized frame shape"),
            Routed::Malformed => log::debug!("kraken session: dropped non-JSON frame"),
        }
    }

    pub fn next_trade(&self) -> Option<TradeEnvelope> {
        self.trades.try_pop()
    }

    pub fn next_book(&self) -> Option<BookEnvelope> {
        self.books.try_pop()
    }

    pub fn next_rejection(&self) -> Option<Rejection> {
        self.rejections.try_pop()
    }

    /// Drain the next connection state-transition notice, if any. Best
    /// effort: under sustained load an old, unread transition can be
    /// dropped in favor of a newer one.
    pub fn next_transition_event(&self) -> Option<TransitionEvent> {
        self.transition_events.try_pop()
    }

    pub fn latest_pong(&self) -> Option<Pong> {
        self.pong.read()
    }

    pub fn latest_status(&self) -> Option<Status> {
        self.status.read()
    }

    pub fn heartbeats_received(&self) -> u64 {
        self.heartbeats_received
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}
