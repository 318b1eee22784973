/// Strictly-validating parsers: one per Kraken message kind. Each parser
/// never allocates beyond the output value's owned storage, never panics,
/// and returns a tri-state outcome:
///
/// - `Parsed(value)` — schema matched and fields validated.
/// - `InvalidSchema` — the shape matched but a field failed validation.
/// - `NotMatched` — the root shape does not correspond to this message kind.
///
/// On anything but `Parsed`, callers treat the message as dropped; use
/// [`ParseOutcome::unwrap_or_default`] where a default-constructed value is
/// an acceptable fallback.
use log::debug;
use serde_json::Value;

use crate::data::ChannelKind;

use super::messages::{Ack, BookEnvelope, BookLevel, Heartbeat, Pong, Rejection, Status, TradeEnvelope, TradeItem};
use super::schema::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome<T> {
    Parsed(T),
    InvalidSchema,
    NotMatched,
}

impl<T> ParseOutcome<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }

    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        match self {
            ParseOutcome::Parsed(v) => v,
            ParseOutcome::InvalidSchema | ParseOutcome::NotMatched => T::default(),
        }
    }
}

fn channel_kind(raw: &str) -> Option<ChannelKind> {
    match raw {
        "trade" => Some(ChannelKind::Trade),
        "book" => Some(ChannelKind::Book),
        _ => None,
    }
}

/// Parse a `subscribe`/`unsubscribe`/`ping` acknowledgement.
///
/// `expected_method` restricts matching to one method so a `pong` ack is
/// never mistaken for a `subscribe` ack sharing the same `success` shape.
pub fn parse_ack(value: &Value, expected_method: &str) -> ParseOutcome<Ack> {
    let Some(obj) = value.as_object() else {
        return ParseOutcome::NotMatched;
    };
    let Some(method) = req_str(obj, "method") else {
        return ParseOutcome::NotMatched;
    };
    if method != expected_method {
        return ParseOutcome::NotMatched;
    }
    let Some(success) = req_bool(obj, "success") else {
        debug!("kraken ack: missing required `success` field");
        return ParseOutcome::InvalidSchema;
    };

    let mut ack = Ack {
        success,
        ..Default::default()
    };

    match opt_u64(obj, "req_id") {
        Some(v) => ack.req_id = v,
        None => {
            debug!("kraken ack: `req_id` present but not a u64");
            return ParseOutcome::InvalidSchema;
        }
    }

    if success {
        let Some(result) = obj.get("result").and_then(|v| v.as_object()) else {
            debug!("kraken ack: success without `result`");
            return ParseOutcome::InvalidSchema;
        };
        if let Some(ch) = req_str(result, "channel") {
            match channel_kind(ch) {
                Some(kind) => ack.channel = Some(kind),
                None => {
                    debug!("kraken ack: unknown channel '{ch}'");
                    return ParseOutcome::InvalidSchema;
                }
            }
        }
        if let Some(sym) = opt_str(result, "symbol") {
            match parse_symbol(sym) {
                Some(s) => ack.symbol = Some(s),
                None => {
                    debug!("kraken ack: invalid symbol '{sym}'");
                    return ParseOutcome::InvalidSchema;
                }
            }
        }
        if ack.channel == Some(ChannelKind::Book) {
            let Some(raw_depth) = req_u64(result, "depth") else {
                debug!("kraken ack: book ack missing required `depth`");
                return ParseOutcome::InvalidSchema;
            };
            let Some(depth) = parse_depth(raw_depth) else {
                debug!("kraken ack: book ack has invalid `depth` {raw_depth}");
                return ParseOutcome::InvalidSchema;
            };
            ack.depth = Some(depth);
        }
        match opt_bool(result, "snapshot") {
            Some(v) => ack.snapshot = v,
            None => return ParseOutcome::InvalidSchema,
        }
        if let Some(warnings) = result.get("warnings") {
            match warnings.as_array() {
                Some(arr) => {
                    for w in arr {
                        match w.as_str() {
                            Some(s) => ack.warnings.push(s.to_string()),
                            None => return ParseOutcome::InvalidSchema,
                        }
                    }
                }
                None => return ParseOutcome::InvalidSchema,
            }
        }
    } else {
        let Some(err) = req_str(obj, "error") else {
            debug!("kraken ack: failure without `error`");
            return ParseOutcome::InvalidSchema;
        };
        ack.error = Some(err.to_string());
    }

    match opt_str(obj, "time_in").map(parse_timestamp_ns) {
        Some(Some(ns)) => ack.time_in = Some(ns),
        Some(None) => return ParseOutcome::InvalidSchema,
        None => {}
    }
    match opt_str(obj, "time_out").map(parse_timestamp_ns) {
        Some(Some(ns)) => ack.time_out = Some(ns),
        Some(None) => return ParseOutcome::InvalidSchema,
        None => {}
    }

    ParseOutcome::Parsed(ack)
}

/// Parse a `pong` message, tolerating both the heartbeat-only and
/// request-style shapes Kraken emits.
pub fn parse_pong(value: &Value) -> ParseOutcome<Pong> {
    let Some(obj) = value.as_object() else {
        return ParseOutcome::NotMatched;
    };
    if req_str(obj, "method") != Some("pong") {
        return ParseOutcome::NotMatched;
    }

    let mut pong = Pong::default();

    match opt_u64(obj, "req_id") {
        Some(v) => pong.req_id = v,
        None => return ParseOutcome::InvalidSchema,
    }
    match opt_str(obj, "time_in").map(parse_timestamp_ns) {
        Some(Some(ns)) => pong.time_in = Some(ns),
        Some(None) => return ParseOutcome::InvalidSchema,
        None => {}
    }
    match opt_str(obj, "time_out").map(parse_timestamp_ns) {
        Some(Some(ns)) => pong.time_out = Some(ns),
        Some(None) => return ParseOutcome::InvalidSchema,
        None => {}
    }

    match opt_bool(obj, "success") {
        Some(None) => {}
        Some(Some(success)) => {
            pong.success = Some(success);
            if success {
                let Some(result) = obj.get("result").and_then(|v| v.as_object()) else {
                    debug!("kraken pong: success without `result`");
                    return ParseOutcome::InvalidSchema;
                };
                if let Some(warnings) = result.get("warnings") {
                    match warnings.as_array() {
                        Some(arr) => {
                            for w in arr {
                                match w.as_str() {
                                    Some(s) => pong.warnings.push(s.to_string()),
                                    None => return ParseOutcome::InvalidSchema,
                                }
                            }
                        }
                        None => return ParseOutcome::InvalidSchema,
                    }
                }
            } else {
                let Some(err) = req_str(obj, "error") else {
                    debug!("kraken pong: failure without `error`");
                    return ParseOutcome::InvalidSchema;
                };
                pong.error = Some(err.to_string());
            }
        }
        None => return ParseOutcome::InvalidSchema,
    }

    ParseOutcome::Parsed(pong)
}

/// Parse a `heartbeat` channel message.
pub fn parse_heartbeat(value: &Value) -> ParseOutcome<Heartbeat> {
    let Some(obj) = value.as_object() else {
        return ParseOutcome::NotMatched;
    };
    if req_str(obj, "channel") != Some("heartbeat") {
        return ParseOutcome::NotMatched;
    }
    ParseOutcome::Parsed(Heartbeat)
}

/// Parse a `status` channel message.
pub fn parse_status(value: &Value) -> ParseOutcome<Status> {
    let Some(obj) = value.as_object() else {
        return ParseOutcome::NotMatched;
    };
    if req_str(obj, "channel") != Some("status") {
        return ParseOutcome::NotMatched;
    }
    let Some(data) = obj.get("data").and_then(|v| v.as_array()).and_then(|a| a.first()) else {
        debug!("kraken status: missing `data[0]`");
        return ParseOutcome::InvalidSchema;
    };
    let Some(entry) = data.as_object() else {
        return ParseOutcome::InvalidSchema;
    };

    let mut status = Status::default();
    if let Some(sys) = opt_str(entry, "system") {
        match parse_system_state(sys) {
            Some(s) => status.system = Some(s),
            None => {
                debug!("kraken status: unknown system state '{sys}'");
                return ParseOutcome::InvalidSchema;
            }
        }
    }
    status.api_version = opt_str(entry, "api_version").map(String::from);
    status.version = opt_str(entry, "version").map(String::from);
    match opt_u64(entry, "connection_id") {
        Some(v) => status.connection_id = v,
        None => return ParseOutcome::InvalidSchema,
    }

    ParseOutcome::Parsed(status)
}

/// Parse a rejection notice: any message with `error` at the root and no
/// `method`.
pub fn parse_rejection(value: &Value) -> ParseOutcome<Rejection> {
    let Some(obj) = value.as_object() else {
        return ParseOutcome::NotMatched;
    };
    if obj.contains_key("method") {
        return ParseOutcome::NotMatched;
    }
    let Some(err) = req_str(obj, "error") else {
        return ParseOutcome::NotMatched;
    };

    let mut rejection = Rejection {
        error: err.to_string(),
        ..Default::default()
    };
    match opt_u64(obj, "req_id") {
        Some(v) => rejection.req_id = v,
        None => return ParseOutcome::InvalidSchema,
    }
    ParseOutcome::Parsed(rejection)
}

fn parse_trade_item(value: &Value) -> Option<TradeItem> {
    let obj = value.as_object()?;
    let symbol = parse_symbol(req_str(obj, "symbol")?)?;
    let side = match opt_str(obj, "side") {
        Some(s) => Some(parse_side(s)?),
        None => None,
    };
    let order_type = match opt_str(obj, "ord_type") {
        Some(s) => Some(parse_order_type(s)?),
        None => None,
    };
    let price = req_f64(obj, "price")?;
    let qty = req_f64(obj, "qty")?;
    let trade_id = req_u64(obj, "trade_id")?;
    let timestamp_ns = parse_timestamp_ns(req_str(obj, "timestamp")?)?;
    Some(TradeItem {
        symbol,
        side,
        price,
        qty,
        order_type,
        trade_id,
        timestamp_ns,
    })
}

/// Parse a `trade` channel snapshot/update message.
pub fn parse_trade_envelope(value: &Value) -> ParseOutcome<TradeEnvelope> {
    let Some(obj) = value.as_object() else {
        return ParseOutcome::NotMatched;
    };
    if req_str(obj, "channel") != Some("trade") {
        return ParseOutcome::NotMatched;
    }
    let Some(kind) = req_str(obj, "type") else {
        return ParseOutcome::NotMatched;
    };
    let is_snapshot = match kind {
        "snapshot" => true,
        "update" => false,
        _ => return ParseOutcome::NotMatched,
    };
    let Some(data) = obj.get("data").and_then(|v| v.as_array()) else {
        debug!("kraken trade: missing `data` array");
        return ParseOutcome::InvalidSchema;
    };

    let mut trades = Vec::with_capacity(data.len());
    for item in data {
        match parse_trade_item(item) {
            Some(t) => trades.push(t),
            None => {
                debug!("kraken trade: malformed trade item");
                return ParseOutcome::InvalidSchema;
            }
        }
    }

    ParseOutcome::Parsed(TradeEnvelope { is_snapshot, trades })
}

fn parse_levels(value: &Value) -> Option<Vec<BookLevel>> {
    let arr = value.as_array()?;
    let mut levels = Vec::with_capacity(arr.len());
    for item in arr {
        let obj = item.as_object()?;
        levels.push(BookLevel {
            price: req_f64(obj, "price")?,
            qty: req_f64(obj, "qty")?,
        });
    }
    Some(levels)
}

/// Parse a `book` channel snapshot/update message.
pub fn parse_book_envelope(value: &Value) -> ParseOutcome<BookEnvelope> {
    let Some(obj) = value.as_object() else {
        return ParseOutcome::NotMatched;
    };
    if req_str(obj, "channel") != Some("book") {
        return ParseOutcome::NotMatched;
    }
    let Some(kind) = req_str(obj, "type") else {
        return ParseOutcome::NotMatched;
    };
    let is_snapshot = match kind {
        "snapshot" => true,
        "update" => false,
        _ => return ParseOutcome::NotMatched,
    };
    let Some(data) = obj.get("data").and_then(|v| v.as_array()).and_then(|a| a.first()) else {
        debug!("kraken book: missing `data[0]`");
        return ParseOutcome::InvalidSchema;
    };
    let Some(entry) = data.as_object() else {
        return ParseOutcome::InvalidSchema;
    };

    let Some(symbol) = req_str(entry, "symbol").and_then(parse_symbol) else {
        debug!("kraken book: missing or invalid `symbol`");
        return ParseOutcome::InvalidSchema;
    };
    let Some(bids) = entry.get("bids").and_then(parse_levels) else {
        return ParseOutcome::InvalidSchema;
    };
    let Some(asks) = entry.get("asks").and_then(parse_levels) else {
        return ParseOutcome::InvalidSchema;
    };
    let checksum = match opt_u64(entry, "checksum") {
        Some(v) => v.map(|c| c as u32),
        None => return ParseOutcome::InvalidSchema,
    };

    ParseOutcome::Parsed(BookEnvelope {
        is_snapshot,
        symbol,
        bids,
        asks,
        checksum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_subscribe_ack_success() {
        let v = json!({
            "method": "subscribe",
            "success": true,
            "req_id": 1,
            "result": { "channel": "trade", "symbol": "BTC/USD", "snapshot": true }
        });
        let ParseOutcome::Parsed(ack) = parse_ack(&v, "subscribe") else {
            panic!("expected Parsed");
        };
        assert!(ack.success);
        assert_eq!(ack.req_id, Some(1));
        assert_eq!(ack.symbol.unwrap().as_str(), "BTC/USD");
        assert_eq!(ack.snapshot, Some(true));
    }

    #[test]
    fn ack_failure_requires_error() {
        let v = json!({ "method": "subscribe", "success": false, "req_id": 2 });
        assert_eq!(parse_ack(&v, "subscribe"), ParseOutcome::InvalidSchema);
    }

    #[test]
    fn book_ack_requires_depth() {
        let v = json!({
            "method": "subscribe",
            "success": true,
            "req_id": 1,
            "result": { "channel": "book", "symbol": "BTC/USD" }
        });
        assert_eq!(parse_ack(&v, "subscribe"), ParseOutcome::InvalidSchema);
    }

    #[test]
    fn book_ack_rejects_invalid_depth() {
        let v = json!({
            "method": "subscribe",
            "success": true,
            "req_id": 1,
            "result": { "channel": "book", "symbol": "BTC/USD", "depth": 48 }
        });
        assert_eq!(parse_ack(&v, "subscribe"), ParseOutcome::InvalidSchema);
    }

    #[test]
    fn book_ack_parses_valid_depth() {
        let v = json!({
            "method": "subscribe",
            "success": true,
            "req_id": 1,
            "result": { "channel": "book", "symbol": "BTC/USD", "depth": 25 }
        });
        let ParseOutcome::Parsed(ack) = parse_ack(&v, "subscribe") else {
            panic!("expected Parsed");
        };
        assert_eq!(ack.depth, Some(crate::data::Depth::D25));
    }

    #[test]
    fn trade_ack_does_not_require_depth() {
        let v = json!({
            "method": "subscribe",
            "success": true,
            "req_id": 1,
            "result": { "channel": "trade", "symbol": "BTC/USD" }
        });
        assert!(parse_ack(&v, "subscribe").is_parsed());
    }

    #[test]
    fn ack_wrong_method_not_matched() {
        let v = json!({ "method": "unsubscribe", "success": true, "result": {"channel": "trade"} });
        assert_eq!(parse_ack(&v, "subscribe"), ParseOutcome::NotMatched);
    }

    #[test]
    fn pong_heartbeat_only_form_parses() {
        let v = json!({
            "method": "pong",
            "req_id": 7,
            "time_in": "2024-01-01T00:00:00.000Z",
            "time_out": "2024-01-01T00:00:00.050Z"
        });
        let ParseOutcome::Parsed(pong) = parse_pong(&v) else {
            panic!("expected Parsed");
        };
        assert_eq!(pong.req_id, Some(7));
        assert_eq!(pong.success, None);
        assert!(pong.time_in.is_some());
    }

    #[test]
    fn pong_request_style_form_parses() {
        let v = json!({
            "method": "pong",
            "success": true,
            "result": { "warnings": ["slow down"] },
            "req_id": 9
        });
        let ParseOutcome::Parsed(pong) = parse_pong(&v) else {
            panic!("expected Parsed");
        };
        assert_eq!(pong.success, Some(true));
        assert_eq!(pong.warnings, vec!["slow down".to_string()]);
    }

    #[test]
    fn heartbeat_matches_only_heartbeat_channel() {
        let v = json!({ "channel": "heartbeat" });
        assert!(parse_heartbeat(&v).is_parsed());
        let other = json!({ "channel": "status" });
        assert_eq!(parse_heartbeat(&other), ParseOutcome::NotMatched);
    }

    #[test]
    fn rejection_requires_no_method() {
        let v = json!({ "error": "boom", "req_id": 5 });
        let ParseOutcome::Parsed(r) = parse_rejection(&v) else {
            panic!("expected Parsed");
        };
        assert_eq!(r.error, "boom");
        assert_eq!(r.req_id, Some(5));

        let with_method = json!({ "method": "subscribe", "error": "boom" });
        assert_eq!(parse_rejection(&with_method), ParseOutcome::NotMatched);
    }

    #[test]
    fn trade_envelope_parses_multiple_items_in_order() {
        let v = json!({
            "channel": "trade",
            "type": "update",
            "data": [
                { "symbol": "BTC/USD", "side": "buy", "price": 1.0, "qty": 2.0,
                  "ord_type": "limit", "trade_id": 100, "timestamp": "2024-01-01T00:00:00.000Z" },
                { "symbol": "BTC/USD", "side": "sell", "price": 1.1, "qty": 2.1,
                  "ord_type": "market", "trade_id": 101, "timestamp": "2024-01-01T00:00:00.100Z" }
            ]
        });
        let ParseOutcome::Parsed(env) = parse_trade_envelope(&v) else {
            panic!("expected Parsed");
        };
        assert!(!env.is_snapshot);
        assert_eq!(env.trades.len(), 2);
        assert_eq!(env.trades[0].trade_id, 100);
        assert_eq!(env.trades[1].trade_id, 101);
    }

    #[test]
    fn book_envelope_requires_symbol_and_levels() {
        let v = json!({
            "channel": "book",
            "type": "snapshot",
            "data": [{
                "symbol": "ETH/USD",
                "bids": [{"price": 10.0, "qty": 1.0}],
                "asks": [{"price": 11.0, "qty": 1.0}],
                "checksum": 123
            }]
        });
        let ParseOutcome::Parsed(env) = parse_book_envelope(&v) else {
            panic!("expected Parsed");
        };
        assert!(env.is_snapshot);
        assert_eq!(env.symbol.as_str(), "ETH/USD");
        assert_eq!(env.bids.len(), 1);
        assert_eq!(env.checksum, Some(123));
    }

    #[test]
    fn unknown_shape_is_not_matched_never_panics() {
        let v = json!({ "totally": "unrelated" });
        assert_eq!(parse_ack(&v, "subscribe"), ParseOutcome::NotMatched);
        assert_eq!(parse_pong(&v), ParseOutcome::NotMatched);
        assert_eq!(parse_heartbeat(&v), ParseOutcome::NotMatched);
        assert_eq!(parse_status(&v), ParseOutcome::NotMatched);
        assert_eq!(parse_trade_envelope(&v), ParseOutcome::NotMatched);
        assert_eq!(parse_book_envelope(&v), ParseOutcome::NotMatched);
        assert_eq!(parse_rejection(&v), ParseOutcome::NotMatched);
    }

    #[test]
    fn parser_is_total_over_arbitrary_json_scalars() {
        for v in [json!(null), json!(1), json!("x"), json!([1, 2, 3]), json!(true)] {
            assert_eq!(parse_ack(&v, "subscribe"), ParseOutcome::NotMatched);
            assert_eq!(parse_trade_envelope(&v), ParseOutcome::NotMatched);
        }
    }
}
