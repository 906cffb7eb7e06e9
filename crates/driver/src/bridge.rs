//! WebSocket bridge to the browser-automation sidecar.
//!
//! One socket carries both directions: RPC requests matched to responses by
//! id, and unsolicited lifecycle events forwarded onto the driver's event
//! channel. A dropped socket fails every in-flight RPC and surfaces as a
//! `Disconnected` event.

use std::{collections::HashMap, sync::Arc};

use {
    async_trait::async_trait,
    futures::{SinkExt, StreamExt},
    serde_json::json,
    tokio::sync::{RwLock, mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, warn},
    uuid::Uuid,
};

use crate::{
    DriverError, DriverEvent, PlatformDriver,
    protocol::{Frame, Request, WireError},
};

type RpcOutcome = Result<serde_json::Value, WireError>;
type PendingMap = Arc<RwLock<HashMap<String, oneshot::Sender<RpcOutcome>>>>;
type OutboundSlot = Arc<RwLock<Option<mpsc::UnboundedSender<String>>>>;

/// Driver implementation speaking JSON frames over a WebSocket to the
/// automation sidecar that drives the platform's web client.
pub struct BridgeDriver {
    url: String,
    events: mpsc::UnboundedSender<DriverEvent>,
    /// In-flight RPCs awaiting a response frame.
    pending: PendingMap,
    /// Sender into the writer task; present only while connected.
    outbound: OutboundSlot,
}

impl BridgeDriver {
    pub fn new(url: impl Into<String>, events: mpsc::UnboundedSender<DriverEvent>) -> Self {
        Self {
            url: url.into(),
            events,
            pending: Arc::new(RwLock::new(HashMap::new())),
            outbound: Arc::new(RwLock::new(None)),
        }
    }

    /// Issue one RPC and wait for the sidecar's response.
    async fn call(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, DriverError> {
        let sender = self
            .outbound
            .read()
            .await
            .clone()
            .ok_or_else(|| DriverError::new("bridge is not connected"))?;

        let id = Uuid::new_v4().to_string();
        let (done_tx, done_rx) = oneshot::channel();
        self.pending.write().await.insert(id.clone(), done_tx);

        let frame = serde_json::to_string(&Request {
            id: id.clone(),
            method: method.to_string(),
            params,
        })
        .map_err(|e| DriverError::new(format!("encode request: {e}")))?;

        if sender.send(frame).is_err() {
            self.pending.write().await.remove(&id);
            return Err(DriverError::new("bridge connection closed"));
        }

        match done_rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(DriverError {
                code: err.code,
                message: err.message,
            }),
            Err(_) => Err(DriverError::new("bridge connection closed mid-call")),
        }
    }
}

#[async_trait]
impl PlatformDriver for BridgeDriver {
    async fn initialize(&self) -> Result<(), DriverError> {
        {
            // Hold the slot's write lock across the dial so concurrent
            // initialize calls cannot open two sockets.
            let mut outbound = self.outbound.write().await;
            if outbound.is_some() {
                return Ok(());
            }

            let (socket, _) = connect_async(self.url.as_str())
                .await
                .map_err(|e| DriverError::new(format!("connect {}: {e}", self.url)))?;
            debug!(url = %self.url, "bridge connected");
            let (mut sink, mut stream) = socket.split();

            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
            tokio::spawn(async move {
                while let Some(frame) = out_rx.recv().await {
                    if sink.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
            });

            let pending = Arc::clone(&self.pending);
            let events = self.events.clone();
            let outbound_slot = Arc::clone(&self.outbound);
            tokio::spawn(async move {
                while let Some(msg) = stream.next().await {
                    match msg {
                        Ok(Message::Text(txt)) => {
                            handle_frame(txt.as_str(), &pending, &events).await;
                        },
                        Ok(Message::Close(_)) | Err(_) => break,
                        Ok(_) => {},
                    }
                }
                disconnect_cleanup(&outbound_slot, &pending, &events).await;
            });

            *outbound = Some(out_tx);
        }

        self.call("initialize", None).await.map(|_| ())
    }

    async fn send_message(&self, address: &str, body: &str) -> Result<(), DriverError> {
        self.call("sendMessage", Some(json!({ "to": address, "body": body })))
            .await
            .map(|_| ())
    }

    async fn is_registered_user(&self, address: &str) -> Result<bool, DriverError> {
        let result = self
            .call("isRegisteredUser", Some(json!({ "to": address })))
            .await?;
        result
            .as_bool()
            .ok_or_else(|| DriverError::new("malformed isRegisteredUser response"))
    }
}

/// Dispatch one inbound frame: complete the matching RPC, or forward a
/// lifecycle event. Unknown ids and malformed frames are logged and dropped.
async fn handle_frame(
    raw: &str,
    pending: &PendingMap,
    events: &mpsc::UnboundedSender<DriverEvent>,
) {
    match serde_json::from_str::<Frame>(raw) {
        Ok(Frame::Response(resp)) => {
            let Some(done) = pending.write().await.remove(&resp.id) else {
                warn!(id = %resp.id, "response for unknown request id");
                return;
            };
            let outcome = if resp.ok {
                Ok(resp.result.unwrap_or(serde_json::Value::Null))
            } else {
                Err(resp.error.unwrap_or_else(|| WireError {
                    code: None,
                    message: "unspecified bridge error".into(),
                }))
            };
            let _ = done.send(outcome);
        },
        Ok(Frame::Event(ev)) => {
            let name = ev.event.clone();
            match ev.into_event() {
                Some(event) => {
                    let _ = events.send(event);
                },
                None => warn!(event = %name, "unknown bridge event"),
            }
        },
        Err(e) => warn!(error = %e, "malformed bridge frame"),
    }
}

/// Tear down connection state after the socket drops: fail in-flight RPCs
/// and tell the session the platform is gone.
async fn disconnect_cleanup(
    outbound: &OutboundSlot,
    pending: &PendingMap,
    events: &mpsc::UnboundedSender<DriverEvent>,
) {
    warn!("bridge connection lost");
    *outbound.write().await = None;
    let waiters: Vec<_> = pending.write().await.drain().collect();
    for (_, done) in waiters {
        let _ = done.send(Err(WireError {
            code: None,
            message: "bridge connection lost".into(),
        }));
    }
    let _ = events.send(DriverEvent::Disconnected("bridge connection lost".into()));
}
