/// Framed, fragmented, message-oriented byte transport.
///
/// Owns a dedicated receive thread that drives a single-threaded Tokio
/// runtime over `tokio-tungstenite`, which supplies the TLS+WebSocket
/// framing itself. Everything above this module only ever touches the
/// connection through rings and atomics: `peek_message`/`release_message`
/// for committed data blocks, and `poll_event` for lossless control events.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc as tokio_mpsc;
use tokio_tungstenite::tungstenite::Message as WsMsg;

use crate::ring::Ring;

/// Transport-level error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    LocalShutdown,
    RemoteClosed,
    Timeout,
    ConnectionFailed(String),
    ProtocolError,
    TransportFailure,
}

/// Lossless control events. The event ring must never drop an entry; a
/// failed push is a fatal transport condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Close,
    Error(TransportError),
    BackpressureDetected,
    BackpressureCleared,
}

struct MessageBlock {
    data: Vec<u8>,
}

enum OutboundCommand {
    Send(Vec<u8>),
    Close,
}

/// Owned handle to the background receive thread and its rings.
pub struct WebSocket {
    message_buffer_size: usize,
    filled: Arc<Ring<MessageBlock>>,
    events: Arc<Ring<ControlEvent>>,
    fatal: Arc<AtomicBool>,
    outbound: std_mpsc::Sender<OutboundCommand>,
    current: Option<MessageBlock>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl WebSocket {
    /// Connect synchronously: blocks the calling thread until the TLS/
    /// WebSocket handshake completes or fails, then detaches the receive
    /// thread.
    pub fn connect(url: &str, message_buffer_size: usize, ring_capacity: usize) -> Result<Self, TransportError> {
        let (outbound_tx, outbound_rx) = std_mpsc::channel::<OutboundCommand>();
        let (handshake_tx, handshake_rx) = std_mpsc::sync_channel::<Result<(), TransportError>>(1);

        let filled: Arc<Ring<MessageBlock>> = Arc::new(Ring::new(ring_capacity));
        let events: Arc<Ring<ControlEvent>> = Arc::new(Ring::new(64));
        let fatal = Arc::new(AtomicBool::new(false));

        let filled_clone = filled.clone();
        let events_clone = events.clone();
        let fatal_clone = fatal.clone();
        let url = url.to_string();

        let join = std::thread::Builder::new()
            .name("kraken-ws-recv".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = handshake_tx.send(Err(TransportError::ConnectionFailed(e.to_string())));
                        return;
                    }
                };
                rt.block_on(Self::run(
                    url,
                    message_buffer_size,
                    filled_clone,
                    events_clone,
                    fatal_clone,
                    outbound_rx,
                    handshake_tx,
                ));
            })
            .expect("failed to spawn websocket receive thread");

        match handshake_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                message_buffer_size,
                filled,
                events,
                fatal,
                outbound: outbound_tx,
                current: None,
                join: Some(join),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::TransportFailure),
        }
    }

    async fn run(
        url: String,
        message_buffer_size: usize,
        filled: Arc<Ring<MessageBlock>>,
        events: Arc<Ring<ControlEvent>>,
        fatal: Arc<AtomicBool>,
        mut outbound_rx: std_mpsc::Receiver<OutboundCommand>,
        handshake_tx: std_mpsc::SyncSender<Result<(), TransportError>>,
    ) {
        let stream = match tokio_tungstenite::connect_async(&url).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                let _ = handshake_tx.send(Err(TransportError::ConnectionFailed(e.to_string())));
                return;
            }
        };
        let _ = handshake_tx.send(Ok(()));
        let (mut sink, mut stream) = stream.split();

        // Bridge the std::mpsc outbound queue into this async task: poll it
        // on a short interval so the loop remains a single `select!`.
        let (tx_bridge, mut rx_bridge) = tokio_mpsc::unbounded_channel::<OutboundCommand>();
        std::thread::spawn(move || {
            while let Ok(cmd) = outbound_rx.recv() {
                if tx_bridge.send(cmd).is_err() {
                    break;
                }
            }
        });

        let push_event = |ev: ControlEvent| {
            if events.try_push(ev).is_err() {
                fatal.store(true, Ordering::Release);
            }
        };

        loop {
            tokio::select! {
                cmd = rx_bridge.recv() => {
                    match cmd {
                        Some(OutboundCommand::Send(bytes)) => {
                            if sink.send(WsMsg::Binary(bytes)).await.is_err() {
                                push_event(ControlEvent::Error(TransportError::TransportFailure));
                                return;
                            }
                        }
                        Some(OutboundCommand::Close) => {
                            let _ = sink.send(WsMsg::Close(None)).await;
                            push_event(ControlEvent::Close);
                            return;
                        }
                        None => return,
                    }
                }
                msg = stream.next() => {
                    match msg {
                        Some(Ok(WsMsg::Text(text))) => {
                            let bytes = text.into_bytes();
                            if bytes.len() > message_buffer_size {
                                push_event(ControlEvent::Error(TransportError::ProtocolError));
                                continue;
                            }
                            if filled.try_push(MessageBlock { data: bytes }).is_err() {
                                push_event(ControlEvent::BackpressureDetected);
                            }
                        }
                        Some(Ok(WsMsg::Binary(bytes))) => {
                            if bytes.len() > message_buffer_size {
                                push_event(ControlEvent::Error(TransportError::ProtocolError));
                                continue;
                            }
                            if filled.try_push(MessageBlock { data: bytes }).is_err() {
                                push_event(ControlEvent::BackpressureDetected);
                            }
                        }
                        Some(Ok(WsMsg::Ping(payload))) => {
                            let _ = sink.send(WsMsg::Pong(payload)).await;
                        }
                        Some(Ok(WsMsg::Pong(_))) => {}
                        Some(Ok(WsMsg::Close(_))) | None => {
                            push_event(ControlEvent::Error(TransportError::RemoteClosed));
                            return;
                        }
                        Some(Ok(WsMsg::Frame(_))) => {}
                        Some(Err(_)) => {
                            push_event(ControlEvent::Error(TransportError::TransportFailure));
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Send raw bytes. Returns `false` if the receive thread is gone.
    pub fn send(&self, bytes: Vec<u8>) -> bool {
        self.outbound.send(OutboundCommand::Send(bytes)).is_ok()
    }

    /// Request a graceful close. Cooperative: best-effort.
    pub fn close(&self) {
        let _ = self.outbound.send(OutboundCommand::Close);
    }

    /// Zero-copy view of the oldest committed message, if any. The returned
    /// slice borrows `self` mutably, so it is statically impossible to call
    /// [`WebSocket::release_message`] (or peek again) while it is still
    /// held. Must be followed by `release_message` before the next peek.
    pub fn peek_message(&mut self) -> Option<&[u8]> {
        if self.current.is_none() {
            self.current = self.filled.try_pop();
        }
        self.current.as_ref().map(|b| b.data.as_slice())
    }

    /// Release the currently peeked message.
    pub fn release_message(&mut self) {
        self.current = None;
    }

    /// Drain the next control event, if any. Events are never dropped in
    /// normal operation; see [`WebSocket::is_fatal`].
    pub fn poll_event(&self) -> Option<ControlEvent> {
        self.events.try_pop()
    }

    /// True once the control-event ring has overflowed — a fatal
    /// transport state.
    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::Acquire)
    }

    pub fn message_buffer_size(&self) -> usize {
        self.message_buffer_size
    }
}

impl Drop for WebSocket {
    fn drop(&mut self) {
        self.close();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
