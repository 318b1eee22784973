/// Typed inbound message shapes decoded by [`crate::protocol::parser`].
use crate::data::{ChannelKind, Depth, OrderType, Side, Symbol};

/// One trade print within a trade snapshot/update message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeItem {
    pub symbol: Symbol,
    pub side: Option<Side>,
    pub price: f64,
    pub qty: f64,
    pub order_type: Option<OrderType>,
    pub trade_id: u64,
    pub timestamp_ns: i64,
}

/// One book price level within a book snapshot/update message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookLevel {
    pub price: f64,
    pub qty: f64,
}

/// Trade channel envelope: `{ channel: "trade", type, data }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeEnvelope {
    pub is_snapshot: bool,
    pub trades: Vec<TradeItem>,
}

/// Book channel envelope: `{ channel: "book", type, data }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookEnvelope {
    pub is_snapshot: bool,
    pub symbol: Symbol,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub checksum: Option<u32>,
}

/// Server acknowledgement of a subscribe/unsubscribe/ping request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ack {
    pub success: bool,
    pub req_id: Option<u64>,
    pub channel: Option<ChannelKind>,
    pub symbol: Option<Symbol>,
    pub snapshot: Option<bool>,
    /// Present and required on a successful `book` channel ack.
    pub depth: Option<Depth>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub time_in: Option<i64>,
    pub time_out: Option<i64>,
}

/// Heartbeat notice. Carries no payload beyond its arrival.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Heartbeat;

/// System status notice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Status {
    pub system: Option<crate::data::SystemState>,
    pub api_version: Option<String>,
    pub connection_id: Option<u64>,
    pub version: Option<String>,
}

/// Pong response. Kraken emits two shapes; both map onto this struct with
/// `success`/`warnings`/`error` left `None`/empty for the heartbeat-only
/// form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pong {
    pub req_id: Option<u64>,
    pub success: Option<bool>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub time_in: Option<i64>,
    pub time_out: Option<i64>,
}

/// A well-formed server rejection of a client request, not correlated to a
/// known pending req_id by the router (the registry does that correlation).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rejection {
    pub req_id: Option<u64>,
    pub error: String,
}
