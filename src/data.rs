/// Shared data model: symbols, request ids, and per-channel subscription
/// state.
use serde::{Deserialize, Deserializer, Serialize};

/// A short textual pair identifier such as `"BTC/USD"`. Opaque to the
/// session beyond the `BASE/QUOTE` shape enforced in [`Symbol::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(String);

impl Symbol {
    /// Parse and validate a symbol string. Must contain exactly one `/`.
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.matches('/').count() == 1 && !raw.starts_with('/') && !raw.ends_with('/') {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Construct without validation — used for symbols already validated by
    /// the server (e.g. when decoding an ack).
    pub fn new_unchecked(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Self(String::new())
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Symbol::parse(raw).ok_or_else(|| serde::de::Error::custom("symbol must be BASE/QUOTE"))
    }
}

/// 64-bit positive client-assigned id correlating a request with its ack.
/// Zero is reserved as "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReqId(pub u64);

impl ReqId {
    pub const UNSET: ReqId = ReqId(0);

    pub fn is_set(&self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for ReqId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic allocator of [`ReqId`]s for a session. Never reuses a value.
#[derive(Debug, Default)]
pub struct ReqIdAllocator {
    next: u64,
}

impl ReqIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next(&mut self) -> ReqId {
        let id = ReqId(self.next);
        self.next += 1;
        id
    }
}

/// A channel this session supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Trade,
    Book,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Trade => "trade",
            ChannelKind::Book => "book",
        }
    }
}

/// Book subscription depth. Kraken only accepts these five values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    D10,
    D25,
    D100,
    D500,
    D1000,
}

impl Depth {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            10 => Some(Depth::D10),
            25 => Some(Depth::D25),
            100 => Some(Depth::D100),
            500 => Some(Depth::D500),
            1000 => Some(Depth::D1000),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            Depth::D10 => 10,
            Depth::D25 => 25,
            Depth::D100 => 100,
            Depth::D500 => 500,
            Depth::D1000 => 1000,
        }
    }
}

/// Trade side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// Trade order type, as reported on trade update messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "market" => Some(OrderType::Market),
            "limit" => Some(OrderType::Limit),
            _ => None,
        }
    }
}

/// System connection status, as reported on the `status` channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Online,
    Maintenance,
    CancelOnly,
    LimitOnly,
    PostOnly,
}

impl SystemState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "online" => Some(SystemState::Online),
            "maintenance" => Some(SystemState::Maintenance),
            "cancel_only" => Some(SystemState::CancelOnly),
            "limit_only" => Some(SystemState::LimitOnly),
            "post_only" => Some(SystemState::PostOnly),
            _ => None,
        }
    }
}

/// Per-(channel, symbol) subscription state.
///
/// `Pending*` variants carry the req_id awaiting an ack and the epoch at
/// which that req_id was issued, so stale acks from a prior connection
/// epoch can be detected and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Inactive,
    PendingSubscribe { req_id: ReqId, epoch: u64 },
    Active { epoch: u64 },
    PendingUnsubscribe { req_id: ReqId, epoch: u64 },
}

impl ChannelState {
    pub fn is_active(&self) -> bool {
        matches!(self, ChannelState::Active { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ChannelState::PendingSubscribe { .. } | ChannelState::PendingUnsubscribe { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_requires_single_slash() {
        assert!(Symbol::parse("BTC/USD").is_some());
        assert!(Symbol::parse("BTCUSD").is_none());
        assert!(Symbol::parse("BTC/USD/EXTRA").is_none());
        assert!(Symbol::parse("/USD").is_none());
    }

    #[test]
    fn req_id_allocator_is_monotonic_and_never_reuses() {
        let mut alloc = ReqIdAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        let c = alloc.next();
        assert!(a.0 < b.0 && b.0 < c.0);
    }

    #[test]
    fn depth_round_trips_valid_values() {
        for v in [10, 25, 100, 500, 1000] {
            assert_eq!(Depth::from_u32(v).unwrap().as_u32(), v);
        }
        assert!(Depth::from_u32(48).is_none());
    }

    #[test]
    fn channel_state_classification() {
        assert!(ChannelState::Active { epoch: 1 }.is_active());
        assert!(ChannelState::PendingSubscribe {
            req_id: ReqId(1),
            epoch: 1
        }
        .is_pending());
        assert!(!ChannelState::Inactive.is_pending());
    }
}
