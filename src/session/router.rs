/// Discriminates a raw inbound frame into its message kind and parses it.
/// One JSON decode per frame; the discriminant is read directly off the
/// parsed value so each shape is tried at most once.
use serde_json::Value;

use crate::protocol::messages::{Ack, BookEnvelope, Pong, Rejection, Status, TradeEnvelope};
use crate::protocol::parser::{
    parse_ack, parse_book_envelope, parse_heartbeat, parse_pong, parse_rejection, parse_status, parse_trade_envelope,
};
use crate::protocol::ParseOutcome;

#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    TradeUpdate(TradeEnvelope),
    BookUpdate(BookEnvelope),
    SubscribeAck(Ack),
    UnsubscribeAck(Ack),
    PingAck(Pong),
    Heartbeat,
    Status(Status),
    Rejection(Rejection),
    /// Valid JSON, recognizable shape, but a field failed validation. The
    /// session drops it and logs; callers never see this.
    Invalid,
    /// Valid JSON but none of the known shapes. Forward-compatible no-op.
    Unrecognized,
    /// Not even valid JSON.
    Malformed,
}

pub fn route(raw: &[u8]) -> Routed {
    let value: Value = match serde_json::from_slice(raw) {
        Ok(v) => v,
        Err(_) => return Routed::Malformed,
    };

    if let Some(method) = value.get("method").and_then(|m| m.as_str()) {
        return match method {
            "subscribe" => outcome_to(parse_ack(&value, "subscribe"), Routed::SubscribeAck),
            "unsubscribe" => outcome_to(parse_ack(&value, "unsubscribe"), Routed::UnsubscribeAck),
            "pong" => outcome_to(parse_pong(&value), Routed::PingAck),
            _ => Routed::Unrecognized,
        };
    }

    if let Some(channel) = value.get("channel").and_then(|c| c.as_str()) {
        return match channel {
            "trade" => outcome_to(parse_trade_envelope(&value), Routed::TradeUpdate),
            "book" => outcome_to(parse_book_envelope(&value), Routed::BookUpdate),
            "heartbeat" => outcome_to(parse_heartbeat(&value), |_| Routed::Heartbeat),
            "status" => outcome_to(parse_status(&value), Routed::Status),
            _ => Routed::Unrecognized,
        };
    }

    if value.get("error").is_some() {
        return outcome_to(parse_rejection(&value), Routed::Rejection);
    }

    Routed::Unrecognized
}

fn outcome_to<T>(outcome: ParseOutcome<T>, wrap: impl FnOnce(T) -> Routed) -> Routed {
    match outcome {
        ParseOutcome::Parsed(v) => wrap(v),
        ParseOutcome::InvalidSchema => Routed::Invalid,
        ParseOutcome::NotMatched => Routed::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn routes_trade_update() {
        let raw = json!({
            "channel": "trade", "type": "update",
            "data": [{ "symbol": "BTC/USD", "side": "buy", "price": 1.0, "qty": 1.0,
                       "ord_type": "limit", "trade_id": 1, "timestamp": "2024-01-01T00:00:00.000Z" }]
        })
        .to_string();
        assert!(matches!(route(raw.as_bytes()), Routed::TradeUpdate(_)));
    }

    #[test]
    fn routes_subscribe_ack() {
        let raw = json!({ "method": "subscribe", "success": true, "req_id": 1,
                           "result": { "channel": "trade", "symbol": "BTC/USD" } })
        .to_string();
        assert!(matches!(route(raw.as_bytes()), Routed::SubscribeAck(_)));
    }

    #[test]
    fn routes_unsubscribe_ack_distinct_from_subscribe() {
        let raw = json!({ "method": "unsubscribe", "success": true, "req_id": 1,
                           "result": { "channel": "trade", "symbol": "BTC/USD" } })
        .to_string();
        assert!(matches!(route(raw.as_bytes()), Routed::UnsubscribeAck(_)));
    }

    #[test]
    fn routes_pong() {
        let raw = json!({ "method": "pong", "req_id": 7 }).to_string();
        assert!(matches!(route(raw.as_bytes()), Routed::PingAck(_)));
    }

    #[test]
    fn routes_heartbeat_and_status() {
        assert_eq!(route(json!({ "channel": "heartbeat" }).to_string().as_bytes()), Routed::Heartbeat);
        let status = json!({ "channel": "status", "data": [{ "system": "online", "connection_id": 1 }] }).to_string();
        assert!(matches!(route(status.as_bytes()), Routed::Status(_)));
    }

    #[test]
    fn malformed_json_is_malformed_not_panic() {
        assert_eq!(route(b"not json"), Routed::Malformed);
    }

    #[test]
    fn unknown_shape_is_unrecognized() {
        assert_eq!(route(json!({ "foo": "bar" }).to_string().as_bytes()), Routed::Unrecognized);
    }

    #[test]
    fn invalid_schema_surfaces_as_invalid() {
        let raw = json!({ "channel": "book", "type": "snapshot", "data": [{ "symbol": "BTC/USD" }] }).to_string();
        assert_eq!(route(raw.as_bytes()), Routed::Invalid);
    }
}
