/// The Kraken v2 JSON-over-WebSocket protocol dialect: schema validation,
/// typed message decoders, and request encoders.
pub mod encoder;
pub mod messages;
pub mod parser;
pub mod schema;

pub use encoder::{PingRequest, SubscribeRequest, UnsubscribeRequest};
pub use messages::*;
pub use parser::ParseOutcome;
