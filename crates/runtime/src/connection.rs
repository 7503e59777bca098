//! WebSocket session with request/response correlation.
//!
//! One [`CdpSession`] is one attached target: requests get sequential ids,
//! responses are correlated back through oneshot channels, and unsolicited
//! events are logged and dropped (the control plane reads page state by
//! polling, not by event subscription).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use pilot_protocol::{Message, Request, Response};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, trace};

use crate::error::{Error, Result};

/// Deadline for any single protocol call.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

type CallbackMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>;

/// Correlates responses with pending requests by id.
#[derive(Default)]
pub(crate) struct Router {
    callbacks: CallbackMap,
}

impl Router {
    /// Registers a pending request and returns its completion channel.
    pub(crate) fn register(&self, id: u64) -> oneshot::Receiver<Result<Value>> {
        let (tx, rx) = oneshot::channel();
        self.callbacks.lock().insert(id, tx);
        rx
    }

    /// Drops a pending request, e.g. after a call timeout.
    pub(crate) fn forget(&self, id: u64) {
        self.callbacks.lock().remove(&id);
    }

    /// Routes one inbound message to its waiter.
    pub(crate) fn dispatch(&self, message: Message) {
        match message {
            Message::Response(Response { id, result, error }) => {
                let Some(callback) = self.callbacks.lock().remove(&id) else {
                    debug!(target = "pilot.transport", id, "response for unknown request");
                    return;
                };
                let outcome = match error {
                    Some(payload) => Err(Error::Remote {
                        code: payload.code,
                        message: payload.message,
                    }),
                    None => Ok(result.unwrap_or(Value::Null)),
                };
                let _ = callback.send(outcome);
            }
            Message::Event(event) => {
                trace!(target = "pilot.transport", method = %event.method, "event ignored");
            }
            Message::Unknown(value) => {
                debug!(target = "pilot.transport", %value, "unknown message shape ignored");
            }
        }
    }

    /// Fails every pending request, used when the socket goes away.
    pub(crate) fn fail_all(&self) {
        for (_, callback) in self.callbacks.lock().drain() {
            let _ = callback.send(Err(Error::ChannelClosed));
        }
    }
}

/// One attached debugging session over a WebSocket.
pub struct CdpSession {
    last_id: AtomicU64,
    router: Arc<Router>,
    outbound_tx: mpsc::UnboundedSender<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl CdpSession {
    /// Dials the per-target debugger endpoint and starts the read/write
    /// tasks.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let (mut sink, mut source) = stream.split();

        let router = Arc::new(Router::default());

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(WsMessage::text(text)).await {
                    error!(target = "pilot.transport", error = %e, "write failed");
                    break;
                }
            }
        });

        let reader_router = Arc::clone(&router);
        let reader = tokio::spawn(async move {
            while let Some(next) = source.next().await {
                match next {
                    Ok(WsMessage::Text(text)) => match serde_json::from_str::<Message>(&text) {
                        Ok(message) => reader_router.dispatch(message),
                        Err(e) => {
                            error!(target = "pilot.transport", error = %e, "unparseable message");
                        }
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        error!(target = "pilot.transport", error = %e, "read failed");
                        break;
                    }
                }
            }
            reader_router.fail_all();
        });

        debug!(target = "pilot.transport", %ws_url, "session established");
        Ok(Self {
            last_id: AtomicU64::new(0),
            router,
            outbound_tx,
            reader,
            writer,
        })
    }

    /// Sends one protocol call and awaits its response.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst);
        let rx = self.router.register(id);

        let request = Request {
            id,
            method: method.to_string(),
            params,
        };
        let text = serde_json::to_string(&request)?;
        trace!(target = "pilot.transport", id, method, "sending");

        if self.outbound_tx.send(text).is_err() {
            self.router.forget(id);
            return Err(Error::ChannelClosed);
        }

        match tokio::time::timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::ChannelClosed),
            Err(_) => {
                self.router.forget(id);
                Err(Error::Timeout(method.to_string()))
            }
        }
    }

    /// Tears the session down.
    pub fn close(&self) {
        self.reader.abort();
        self.writer.abort();
        self.router.fail_all();
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_protocol::ErrorPayload;
    use serde_json::json;

    #[tokio::test]
    async fn router_correlates_success_by_id() {
        let router = Router::default();
        let rx = router.register(4);

        router.dispatch(Message::Response(Response {
            id: 4,
            result: Some(json!({"value": 2})),
            error: None,
        }));

        let value = rx.await.unwrap().unwrap();
        assert_eq!(value["value"], 2);
    }

    #[tokio::test]
    async fn router_maps_protocol_errors() {
        let router = Router::default();
        let rx = router.register(9);

        router.dispatch(Message::Response(Response {
            id: 9,
            result: None,
            error: Some(ErrorPayload {
                code: -32000,
                message: "Target closed".into(),
                data: None,
            }),
        }));

        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Remote { code: -32000, .. }));
    }

    #[tokio::test]
    async fn unknown_response_id_is_ignored() {
        let router = Router::default();
        router.dispatch(Message::Response(Response {
            id: 99,
            result: Some(Value::Null),
            error: None,
        }));
    }

    #[tokio::test]
    async fn fail_all_drains_pending_requests() {
        let router = Router::default();
        let rx1 = router.register(1);
        let rx2 = router.register(2);

        router.fail_all();

        assert!(matches!(rx1.await.unwrap(), Err(Error::ChannelClosed)));
        assert!(matches!(rx2.await.unwrap(), Err(Error::ChannelClosed)));
    }

    #[tokio::test]
    async fn events_do_not_disturb_pending_requests() {
        let router = Router::default();
        let rx = router.register(1);

        router.dispatch(Message::Event(pilot_protocol::Event {
            method: "Page.frameNavigated".into(),
            params: json!({}),
        }));
        router.dispatch(Message::Response(Response {
            id: 1,
            result: Some(json!(true)),
            error: None,
        }));

        assert_eq!(rx.await.unwrap().unwrap(), json!(true));
    }
}
