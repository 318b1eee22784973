//! Kraken v2 public market-data WebSocket client.
//!
//! A session-oriented client for Kraken's v2 `wss://ws.kraken.com/v2`
//! endpoint: typed `trade`/`book` subscriptions, reconnect-with-replay, and
//! a non-blocking, poll-driven API suitable for embedding in a tight
//! application loop.
//!
//! # What This Crate Provides
//!
//! - A typestated request model: [`protocol::SubscribeRequest`],
//!   [`protocol::UnsubscribeRequest`], [`protocol::PingRequest`] — a
//!   request carries exactly one intent by construction.
//! - A strictly-validating, total parser for every inbound message shape:
//!   [`protocol::ParseOutcome`].
//! - A reconnecting [`transport::Connection`] with bounded exponential
//!   backoff, a liveness timer, and hysteresis-debounced back-pressure
//!   escalation.
//! - [`session::KrakenSession`]: the single entry point wiring transport,
//!   protocol, and per-channel subscription registries together.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kraken_stream::config::SessionConfig;
//! use kraken_stream::data::Symbol;
//! use kraken_stream::protocol::SubscribeRequest;
//! use kraken_stream::session::KrakenSession;
//!
//! fn main() -> Result<(), kraken_stream::errors::KrakenError> {
//!     let mut session = KrakenSession::new(kraken_stream::config::KRAKEN_WS_URL, SessionConfig::default());
//!     session.connect()?;
//!
//!     let btc_usd = Symbol::parse("BTC/USD").expect("valid symbol");
//!     session.subscribe(SubscribeRequest::trade(vec![btc_usd], Some(true), None)?)?;
//!
//!     loop {
//!         session.poll();
//!         while let Some(trade) = session.next_trade() {
//!             println!("{trade:?}");
//!         }
//!         std::thread::sleep(std::time::Duration::from_millis(10));
//!     }
//! }
//! ```
//!
//! # Concurrency model
//!
//! [`session::KrakenSession`] is driven entirely from one thread via
//! [`session::KrakenSession::poll`]; it never blocks and never allocates on
//! the hot path beyond what a single inbound frame requires. Underneath,
//! each [`transport::WebSocket`] owns a dedicated background thread running
//! its own single-threaded Tokio runtime to drive `tokio-tungstenite` — the
//! only place in this crate where async I/O lives. That thread and the
//! caller's poll thread communicate exclusively through the lock-free
//! single-producer/single-consumer primitives in [`ring`].
//!
//! # Errors
//!
//! Local, synchronous request validation failures are returned as
//! [`errors::KrakenError`] — see [`errors::KrakenError::is_local_rejection`].
//! Transport and protocol-level conditions are not `Result` failures: they
//! are observable state surfaced through [`transport::ConnectionState`],
//! [`transport::TransitionEvent`], and the session's ring/latest-slot
//! accessors.
//!
//! # Logging
//!
//! This crate emits debug-level logs through the [`log`](https://docs.rs/log/)
//! facade on every dropped or rejected frame. Configure any compatible
//! logger in your binary and set `RUST_LOG=debug` to inspect parse drops.
pub mod config;
pub mod data;
pub mod errors;
pub mod hysteresis;
pub mod protocol;
pub mod ring;
pub mod session;
pub mod transport;

pub use config::{KRAKEN_WS_URL, SessionConfig, WsConfig};
pub use data::{ChannelKind, Depth, OrderType, ReqId, Side, Symbol, SystemState};
pub use errors::KrakenError;
pub use protocol::{PingRequest, SubscribeRequest, UnsubscribeRequest};
pub use session::KrakenSession;
pub use transport::{Connection, ConnectionState, TransitionEvent};
