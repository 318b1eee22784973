/// Transport layer: the WebSocket byte pipe and the connection state
/// machine that manages its lifecycle.
pub mod connection;
pub mod websocket;

pub use connection::{Connection, ConnectionState, TransitionEvent};
pub use websocket::{ControlEvent, TransportError, WebSocket};
