//! Solana account-subscription feed over one shared WebSocket.
//!
//! A single connection task owns the socket. Pool tasks ask it for a
//! subscription through [`AccountFeed::subscribe`] and get back a channel of
//! raw account bytes; `accountNotification` messages are routed to the right
//! channel by subscription id. There is no reconnection: when the socket
//! closes, every subscription channel closes with it.

use crate::errors::{AppError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Buffered updates per subscription before new ones are dropped.
const UPDATE_BUFFER: usize = 64;

/// How often a handle-less connection checks whether any consumer is left.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

type SubscribeReply = oneshot::Sender<Result<mpsc::Receiver<Vec<u8>>>>;

enum FeedCommand {
    Subscribe {
        address: String,
        reply: SubscribeReply,
    },
}

/// Cloneable handle to the shared connection task.
#[derive(Clone, Debug)]
pub struct AccountFeed {
    commands: mpsc::Sender<FeedCommand>,
}

impl AccountFeed {
    /// Open the shared connection.
    ///
    /// # Errors
    /// `Startup` if the URL is invalid or the handshake fails; nothing can be
    /// monitored without this connection.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let url = Url::parse(ws_url).map_err(|e| AppError::Startup(format!("{ws_url}: {e}")))?;
        let (ws_stream, _resp) = connect_async(url)
            .await
            .map_err(|e| AppError::Startup(format!("{ws_url}: {e}")))?;
        info!(ws_url, "[FEED] connected");

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(run_connection(ws_stream, rx));
        Ok(Self { commands: tx })
    }

    /// Subscribe to one account and receive its decoded data on every change.
    ///
    /// # Errors
    /// `Subscription` if the node rejects the request or the connection is gone.
    pub async fn subscribe(&self, address: &str) -> Result<mpsc::Receiver<Vec<u8>>> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(FeedCommand::Subscribe {
                address: address.to_string(),
                reply,
            })
            .await
            .map_err(|_| AppError::Subscription(format!("{address}: feed connection closed")))?;
        reply_rx
            .await
            .map_err(|_| AppError::Subscription(format!("{address}: feed connection closed")))?
    }
}

async fn run_connection<S>(ws_stream: S, mut commands: mpsc::Receiver<FeedCommand>)
where
    S: futures::Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut sink, mut stream) = ws_stream.split();
    let mut router = SubscriptionRouter::default();
    let mut commands_open = true;
    let mut idle_check = tokio::time::interval(IDLE_CHECK_INTERVAL);

    loop {
        if !commands_open && router.is_idle() {
            break;
        }
        tokio::select! {
            // Wakes the loop so the idle check above runs on a quiet socket.
            _ = idle_check.tick(), if !commands_open => {}
            cmd = commands.recv(), if commands_open => match cmd {
                Some(FeedCommand::Subscribe { address, reply }) => {
                    let (id, request) = router.begin(address, reply);
                    if let Err(e) = sink.send(Message::Text(request)).await {
                        router.fail(id, format!("send failed: {e}"));
                        warn!(error = %e, "[FEED] websocket send error");
                        break;
                    }
                }
                // Every handle dropped; keep serving live subscriptions.
                None => commands_open = false,
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(txt))) => router.handle_text(&txt),
                Some(Ok(Message::Close(frame))) => {
                    warn!(?frame, "[FEED] websocket closed by peer");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "[FEED] websocket message error");
                    break;
                }
                None => break,
            },
        }
    }
    info!(
        active = router.active.len(),
        "[FEED] connection task finished; closing subscriptions"
    );
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcMessage {
    Notification {
        method: String,
        params: NotificationParams,
    },
    Response {
        id: u64,
        #[serde(default)]
        result: Option<u64>,
        #[serde(default)]
        error: Option<RpcError>,
    },
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    subscription: u64,
    result: NotificationResult,
}

#[derive(Debug, Deserialize)]
struct NotificationResult {
    value: AccountValue,
}

#[derive(Debug, Deserialize)]
struct AccountValue {
    /// `[payload, encoding]`
    data: (String, String),
}

/// Request-id and subscription-id bookkeeping for the connection task.
#[derive(Default)]
struct SubscriptionRouter {
    next_id: u64,
    pending: HashMap<u64, (String, SubscribeReply)>,
    active: HashMap<u64, mpsc::Sender<Vec<u8>>>,
}

impl SubscriptionRouter {
    /// Register a pending subscription and build its JSON-RPC request.
    fn begin(&mut self, address: String, reply: SubscribeReply) -> (u64, String) {
        self.next_id += 1;
        let id = self.next_id;
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "accountSubscribe",
            "params": [
                &address,
                { "encoding": "base64", "commitment": "confirmed" }
            ],
        })
        .to_string();
        self.pending.insert(id, (address, reply));
        (id, request)
    }

    /// No request in flight and every consumer gone.
    fn is_idle(&mut self) -> bool {
        self.active.retain(|_, tx| !tx.is_closed());
        self.pending.is_empty() && self.active.is_empty()
    }

    fn fail(&mut self, id: u64, reason: String) {
        if let Some((address, reply)) = self.pending.remove(&id) {
            let _ = reply.send(Err(AppError::Subscription(format!("{address}: {reason}"))));
        }
    }

    fn handle_text(&mut self, txt: &str) {
        let parsed: RpcMessage = match serde_json::from_str(txt) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "[FEED] unrecognized message");
                return;
            }
        };

        match parsed {
            RpcMessage::Response { id, result, error } => {
                let Some((address, reply)) = self.pending.remove(&id) else {
                    debug!(id, "[FEED] response for unknown request");
                    return;
                };
                match (result, error) {
                    (Some(subscription), _) => {
                        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
                        self.active.insert(subscription, tx);
                        debug!(address = %address, subscription, "[FEED] subscription confirmed");
                        let _ = reply.send(Ok(rx));
                    }
                    (None, Some(err)) => {
                        let _ = reply.send(Err(AppError::Subscription(format!(
                            "{address}: rpc error {}: {}",
                            err.code, err.message
                        ))));
                    }
                    (None, None) => {
                        let _ = reply.send(Err(AppError::Subscription(format!(
                            "{address}: empty subscribe response"
                        ))));
                    }
                }
            }
            RpcMessage::Notification { method, params } if method == "accountNotification" => {
                self.route(params.subscription, &params.result.value.data);
            }
            RpcMessage::Notification { method, .. } => {
                debug!(method = %method, "[FEED] ignoring notification");
            }
        }
    }

    fn route(&mut self, subscription: u64, (payload, encoding): &(String, String)) {
        let Some(tx) = self.active.get(&subscription) else {
            debug!(subscription, "[FEED] notification for unknown subscription");
            return;
        };
        if encoding != "base64" {
            warn!(subscription, encoding = %encoding, "[FEED] unexpected account encoding");
            return;
        }
        let bytes = match STANDARD.decode(payload) {
            Ok(b) => b,
            Err(e) => {
                warn!(subscription, error = %AppError::from(e), "[FEED] bad account payload");
                return;
            }
        };
        match tx.try_send(bytes) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(subscription, "[FEED] consumer lagging, dropping update");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.active.remove(&subscription);
            }
        }
    }
}
