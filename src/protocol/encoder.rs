/// JSON encoders for outbound requests.
///
/// Each request carries exactly one intent — subscribe, unsubscribe, or
/// control (ping) — enforced by construction: these are three distinct
/// types, so a caller cannot build a value that is ill-formed by carrying
/// two intents or none. Optional fields are omitted from the encoded JSON
/// when unset, never emitted as `null`.
use serde_json::{json, Value};

use crate::data::{Depth, ReqId, Symbol};
use crate::errors::KrakenError;

fn validate_symbols(symbols: &[Symbol]) -> Result<(), KrakenError> {
    if symbols.is_empty() {
        return Err(KrakenError::EmptySymbols);
    }
    Ok(())
}

fn validate_req_id(req_id: Option<ReqId>) -> Result<(), KrakenError> {
    if let Some(id) = req_id {
        if !id.is_set() {
            return Err(KrakenError::ZeroReqId);
        }
    }
    Ok(())
}

/// A `subscribe` request for the `trade` or `book` channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeRequest {
    Trade {
        symbols: Vec<Symbol>,
        snapshot: Option<bool>,
        req_id: Option<ReqId>,
    },
    Book {
        symbols: Vec<Symbol>,
        depth: Depth,
        req_id: Option<ReqId>,
    },
}

impl SubscribeRequest {
    pub fn trade(
        symbols: Vec<Symbol>,
        snapshot: Option<bool>,
        req_id: Option<ReqId>,
    ) -> Result<Self, KrakenError> {
        validate_symbols(&symbols)?;
        validate_req_id(req_id)?;
        Ok(SubscribeRequest::Trade {
            symbols,
            snapshot,
            req_id,
        })
    }

    pub fn book(
        symbols: Vec<Symbol>,
        depth: u32,
        req_id: Option<ReqId>,
    ) -> Result<Self, KrakenError> {
        validate_symbols(&symbols)?;
        validate_req_id(req_id)?;
        let depth = Depth::from_u32(depth).ok_or(KrakenError::InvalidDepth(depth))?;
        Ok(SubscribeRequest::Book {
            symbols,
            depth,
            req_id,
        })
    }

    pub fn req_id(&self) -> Option<ReqId> {
        match self {
            SubscribeRequest::Trade { req_id, .. } | SubscribeRequest::Book { req_id, .. } => *req_id,
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        match self {
            SubscribeRequest::Trade { symbols, .. } | SubscribeRequest::Book { symbols, .. } => symbols,
        }
    }

    /// Reconstruct this request with a freshly allocated req_id, for
    /// reconnect replay.
    pub fn with_req_id(&self, req_id: ReqId) -> Self {
        match self {
            SubscribeRequest::Trade { symbols, snapshot, .. } => SubscribeRequest::Trade {
                symbols: symbols.clone(),
                snapshot: *snapshot,
                req_id: Some(req_id),
            },
            SubscribeRequest::Book { symbols, depth, .. } => SubscribeRequest::Book {
                symbols: symbols.clone(),
                depth: *depth,
                req_id: Some(req_id),
            },
        }
    }

    pub fn to_json(&self) -> Value {
        let mut params = serde_json::Map::new();
        match self {
            SubscribeRequest::Trade { symbols, snapshot, req_id } => {
                params.insert("channel".into(), json!("trade"));
                params.insert("symbol".into(), json!(symbols));
                if let Some(s) = snapshot {
                    params.insert("snapshot".into(), json!(s));
                }
                if let Some(id) = req_id {
                    params.insert("req_id".into(), json!(id.0));
                }
            }
            SubscribeRequest::Book { symbols, depth, req_id } => {
                params.insert("channel".into(), json!("book"));
                params.insert("symbol".into(), json!(symbols));
                params.insert("depth".into(), json!(depth.as_u32()));
                if let Some(id) = req_id {
                    params.insert("req_id".into(), json!(id.0));
                }
            }
        }
        json!({ "method": "subscribe", "params": Value::Object(params) })
    }

    pub fn to_compact_string(&self) -> String {
        self.to_json().to_string()
    }
}

/// An `unsubscribe` request for the `trade` or `book` channel.
#[derive(Debug, Clone, PartialEq)]
pub enum UnsubscribeRequest {
    Trade {
        symbols: Vec<Symbol>,
        req_id: Option<ReqId>,
    },
    Book {
        symbols: Vec<Symbol>,
        depth: Option<Depth>,
        req_id: Option<ReqId>,
    },
}

impl UnsubscribeRequest {
    pub fn trade(symbols: Vec<Symbol>, req_id: Option<ReqId>) -> Result<Self, KrakenError> {
        validate_symbols(&symbols)?;
        validate_req_id(req_id)?;
        Ok(UnsubscribeRequest::Trade { symbols, req_id })
    }

    pub fn book(
        symbols: Vec<Symbol>,
        depth: Option<u32>,
        req_id: Option<ReqId>,
    ) -> Result<Self, KrakenError> {
        validate_symbols(&symbols)?;
        validate_req_id(req_id)?;
        let depth = match depth {
            Some(d) => Some(Depth::from_u32(d).ok_or(KrakenError::InvalidDepth(d))?),
            None => None,
        };
        Ok(UnsubscribeRequest::Book { symbols, depth, req_id })
    }

    pub fn symbols(&self) -> &[Symbol] {
        match self {
            UnsubscribeRequest::Trade { symbols, .. } | UnsubscribeRequest::Book { symbols, .. } => symbols,
        }
    }

    pub fn req_id(&self) -> Option<ReqId> {
        match self {
            UnsubscribeRequest::Trade { req_id, .. } | UnsubscribeRequest::Book { req_id, .. } => *req_id,
        }
    }

    /// Reconstruct this request with a freshly allocated req_id.
    pub fn with_req_id(&self, req_id: ReqId) -> Self {
        match self {
            UnsubscribeRequest::Trade { symbols, .. } => UnsubscribeRequest::Trade {
                symbols: symbols.clone(),
                req_id: Some(req_id),
            },
            UnsubscribeRequest::Book { symbols, depth, .. } => UnsubscribeRequest::Book {
                symbols: symbols.clone(),
                depth: *depth,
                req_id: Some(req_id),
            },
        }
    }

    pub fn to_json(&self) -> Value {
        let mut params = serde_json::Map::new();
        match self {
            UnsubscribeRequest::Trade { symbols, req_id } => {
                params.insert("channel".into(), json!("trade"));
                params.insert("symbol".into(), json!(symbols));
                if let Some(id) = req_id {
                    params.insert("req_id".into(), json!(id.0));
                }
            }
            UnsubscribeRequest::Book { symbols, depth, req_id } => {
                params.insert("channel".into(), json!("book"));
                params.insert("symbol".into(), json!(symbols));
                if let Some(d) = depth {
                    params.insert("depth".into(), json!(d.as_u32()));
                }
                if let Some(id) = req_id {
                    params.insert("req_id".into(), json!(id.0));
                }
            }
        }
        json!({ "method": "unsubscribe", "params": Value::Object(params) })
    }

    pub fn to_compact_string(&self) -> String {
        self.to_json().to_string()
    }
}

/// A `ping` request — the lone control-intent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingRequest {
    pub req_id: Option<ReqId>,
}

impl PingRequest {
    pub fn new(req_id: Option<ReqId>) -> Result<Self, KrakenError> {
        validate_req_id(req_id)?;
        Ok(Self { req_id })
    }

    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("method".into(), json!("ping"));
        if let Some(id) = self.req_id {
            obj.insert("req_id".into(), json!(id.0));
        }
        Value::Object(obj)
    }

    pub fn to_compact_string(&self) -> String {
        self.to_json().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[test]
    fn trade_subscribe_omits_unset_optionals() {
        let req = SubscribeRequest::trade(vec![sym("BTC/USD")], None, None).unwrap();
        let s = req.to_compact_string();
        assert!(s.contains("\"method\":\"subscribe\""));
        assert!(s.contains("\"channel\":\"trade\""));
        assert!(!s.contains("snapshot"));
        assert!(!s.contains("req_id"));
    }

    #[test]
    fn trade_subscribe_includes_set_optionals() {
        let req = SubscribeRequest::trade(vec![sym("BTC/USD")], Some(true), Some(ReqId(5))).unwrap();
        let s = req.to_compact_string();
        assert!(s.contains("\"snapshot\":true"));
        assert!(s.contains("\"req_id\":5"));
    }

    #[test]
    fn empty_symbols_rejected() {
        assert!(matches!(
            SubscribeRequest::trade(vec![], None, None),
            Err(KrakenError::EmptySymbols)
        ));
    }

    #[test]
    fn invalid_depth_rejected() {
        assert!(matches!(
            SubscribeRequest::book(vec![sym("BTC/USD")], 48, None),
            Err(KrakenError::InvalidDepth(48))
        ));
    }

    #[test]
    fn zero_req_id_rejected() {
        assert!(matches!(
            SubscribeRequest::trade(vec![sym("BTC/USD")], None, Some(ReqId(0))),
            Err(KrakenError::ZeroReqId)
        ));
    }

    #[test]
    fn book_unsubscribe_never_carries_snapshot() {
        let req = UnsubscribeRequest::book(vec![sym("BTC/USD")], Some(25), None).unwrap();
        assert!(!req.to_compact_string().contains("snapshot"));
    }

    #[test]
    fn ping_encodes_method_only_when_req_id_unset() {
        let req = PingRequest::new(None).unwrap();
        assert_eq!(req.to_compact_string(), "{\"method\":\"ping\"}");
    }

    #[test]
    fn with_req_id_preserves_channel_shape() {
        let req = SubscribeRequest::book(vec![sym("BTC/USD")], 10, None).unwrap();
        let replayed = req.with_req_id(ReqId(42));
        assert!(replayed.to_compact_string().contains("\"req_id\":42"));
        assert!(replayed.to_compact_string().contains("\"depth\":10"));
    }
}
