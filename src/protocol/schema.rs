/// Field adapters enforcing the domain shapes used throughout the Kraken
/// wire schema.
use crate::data::{Depth, OrderType, Side, Symbol, SystemState};

/// Parse an RFC3339 timestamp with sub-second precision into a nanosecond
/// offset since the Unix epoch.
pub fn parse_timestamp_ns(raw: &str) -> Option<i64> {
    let dt = chrono::DateTime::parse_from_rfc3339(raw).ok()?;
    dt.timestamp_nanos_opt()
}

pub fn parse_symbol(raw: &str) -> Option<Symbol> {
    Symbol::parse(raw)
}

pub fn parse_side(raw: &str) -> Option<Side> {
    Side::parse(raw)
}

pub fn parse_order_type(raw: &str) -> Option<OrderType> {
    OrderType::parse(raw)
}

pub fn parse_system_state(raw: &str) -> Option<SystemState> {
    SystemState::parse(raw)
}

pub fn parse_depth(raw: u64) -> Option<Depth> {
    u32::try_from(raw).ok().and_then(Depth::from_u32)
}

/// Get a required string field from a JSON object, or `None` if missing or
/// the wrong type.
pub fn req_str<'a>(obj: &'a serde_json::Map<String, serde_json::Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(|v| v.as_str())
}

pub fn opt_str<'a>(obj: &'a serde_json::Map<String, serde_json::Value>, key: &str) -> Option<&'a str> {
    match obj.get(key) {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => v.as_str(),
    }
}

pub fn req_bool(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(|v| v.as_bool())
}

pub fn opt_bool(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<Option<bool>> {
    match obj.get(key) {
        None | Some(serde_json::Value::Null) => Some(None),
        Some(v) => v.as_bool().map(Some),
    }
}

pub fn req_u64(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<u64> {
    obj.get(key).and_then(|v| v.as_u64())
}

pub fn opt_u64(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<Option<u64>> {
    match obj.get(key) {
        None | Some(serde_json::Value::Null) => Some(None),
        Some(v) => v.as_u64().map(Some),
    }
}

pub fn req_f64(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(|v| v.as_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_parses_subsecond_rfc3339() {
        let ns = parse_timestamp_ns("2024-01-01T00:00:00.050Z").unwrap();
        assert_eq!(ns % 1_000_000_000, 50_000_000);
    }

    #[test]
    fn timestamp_rejects_garbage() {
        assert!(parse_timestamp_ns("not-a-date").is_none());
    }

    #[test]
    fn depth_rejects_non_enumerated_values() {
        assert!(parse_depth(48).is_none());
        assert_eq!(parse_depth(25).unwrap().as_u32(), 25);
    }
}
