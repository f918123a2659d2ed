//! WebSocket-based live reload.
//!
//! Only one browser is kept subscribed at a time: every new connection takes
//! over the slot, and the previous connection stops receiving signals.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Path of the reload socket. Any request path ending in this is an upgrade.
pub const RELOAD_PATH: &str = "/hot";

/// Payload pushed to the browser once a rebuild has finished.
pub const RELOAD_SENTINEL: &str = "/hot";

#[derive(Debug)]
struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<&'static str>,
}

/// Holds the most recently connected browser, if any.
#[derive(Debug, Clone, Default)]
pub struct ReloadChannel {
    slot: Arc<Mutex<Option<Subscriber>>>,
    next_id: Arc<AtomicU64>,
}

impl ReloadChannel {
    /// Create an empty channel with no subscriber.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a new connection the subscriber, replacing any previous one.
    ///
    /// Returns the subscriber id and the receiver its socket task forwards
    /// from. Dropping the previous sender closes the previous receiver.
    pub fn bind(&self) -> (u64, mpsc::UnboundedReceiver<&'static str>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        let previous = self.slot.lock().replace(Subscriber { id, sender });
        if let Some(previous) = previous {
            tracing::debug!("Reload client {} replaced by {}", previous.id, id);
        }

        (id, receiver)
    }

    /// Push the reload sentinel to the current subscriber.
    ///
    /// Returns `true` if a live subscriber accepted it. With no subscriber
    /// this does nothing.
    pub fn push(&self) -> bool {
        let mut slot = self.slot.lock();
        let Some(subscriber) = slot.as_ref() else {
            return false;
        };

        if subscriber.sender.send(RELOAD_SENTINEL).is_ok() {
            return true;
        }

        tracing::debug!("Reload client {} is gone", subscriber.id);
        *slot = None;
        false
    }

    /// Clear the slot if it still belongs to `id`.
    pub fn release(&self, id: u64) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|s| s.id == id) {
            *slot = None;
        }
    }

    /// Whether a subscriber currently holds the slot.
    pub fn is_bound(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Drive one upgraded connection until it closes or is replaced.
pub async fn handle_socket(
    mut socket: WebSocket,
    channel: ReloadChannel,
    peer: Option<SocketAddr>,
) {
    let peer = peer.map_or_else(|| "unknown peer".to_string(), |addr| addr.to_string());
    let (id, mut signals) = channel.bind();
    tracing::info!("Reload client {} connected from {}", id, peer);

    loop {
        tokio::select! {
            signal = signals.recv() => match signal {
                Some(sentinel) => {
                    if socket.send(Message::Text(sentinel.to_string().into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    tracing::info!("Received {} from {}", text.as_str(), peer);
                }
                Some(Ok(Message::Binary(bytes))) => {
                    tracing::info!("Received {} bytes from {}", bytes.len(), peer);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("Reload socket error from {}: {}", peer, e);
                    break;
                }
            },
        }
    }

    channel.release(id);
    tracing::info!("Reload client {} disconnected", id);
}

/// Generate the inline client script injected into served pages.
///
/// `ws_url` must already be a safe JavaScript string literal body.
pub fn reload_client_script(ws_url: &str) -> String {
    format!(
        r#"(()=>{{const socket=new WebSocket("{url}");socket.onmessage=({{data}})=>{{if(data==="{sentinel}"){{console.log("Received reload signal, reloading window...");location.reload();}}}};console.log("Live reload enabled.");window.addEventListener("beforeunload",()=>{{console.log("Closing live reload socket...");socket.close();}});}})();"#,
        url = ws_url,
        sentinel = RELOAD_SENTINEL,
    )
}
