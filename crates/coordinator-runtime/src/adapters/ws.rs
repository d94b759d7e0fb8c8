//! WebSocket JSON-RPC implementation of the [`NodeRpc`] port.
//!
//! One connection per node. Requests are correlated by id; subscription
//! pushes arrive as `strata_subscription` notifications and are routed
//! to per-subscription channels. Dropping a subscription receiver ends
//! delivery for that subscription.

use async_trait::async_trait;
use coordinator::ports::{MissingBlockRequest, NodeRpc, SyncState};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use primitive_types::H256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{
    ClientError, ExternalBlock, Location, Receipt, ReceiptBlock, SealedBlock, Tier, TieredHeader,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

/// Capacity of each subscription delivery channel.
const SUBSCRIPTION_BUFFER: usize = 64;

/// JSON-RPC request frame.
#[derive(Debug, Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// Any frame the node sends back: a response or a notification.
#[derive(Debug, Deserialize)]
struct Incoming {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<RpcErrorBody>,
    method: Option<String>,
    params: Option<NotificationParams>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    subscription: String,
    result: Value,
}

/// Sync status as reported on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncStateJson {
    starting_block: u64,
    current_block: u64,
    highest_block: u64,
}

/// Missing-block request as reported on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MissingBlockJson {
    hash: H256,
    context: u8,
    location: [u8; 2],
}

/// Where a subscription's pushes are delivered.
enum SubscriptionSink {
    PendingBlocks(mpsc::Sender<TieredHeader>),
    NewHeads(mpsc::Sender<TieredHeader>),
    MissingBlocks(mpsc::Sender<MissingBlockRequest>),
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, ClientError>>>>>;
type SinkMap = Arc<Mutex<HashMap<String, SubscriptionSink>>>;

/// WebSocket JSON-RPC client for one chain node.
pub struct WsNodeClient {
    url: String,
    timeout: Duration,
    next_id: AtomicU64,
    writer_tx: mpsc::Sender<Message>,
    pending: PendingMap,
    sinks: SinkMap,
}

impl WsNodeClient {
    /// Dial `url` and start the connection tasks.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Arc<Self>, ClientError> {
        let (stream, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| ClientError::Timeout {
                timeout_secs: timeout.as_secs(),
            })?
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        let (mut write, mut read) = stream.split();

        let (writer_tx, mut writer_rx) = mpsc::channel::<Message>(64);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let sinks: SinkMap = Arc::new(Mutex::new(HashMap::new()));

        // Writer task: serializes all outbound frames.
        tokio::spawn(async move {
            while let Some(message) = writer_rx.recv().await {
                if write.send(message).await.is_err() {
                    break;
                }
            }
        });

        // Reader task: routes responses and notifications until the
        // connection drops.
        let client = Arc::new(Self {
            url: url.to_string(),
            timeout,
            next_id: AtomicU64::new(1),
            writer_tx: writer_tx.clone(),
            pending: Arc::clone(&pending),
            sinks: Arc::clone(&sinks),
        });
        let reader_url = url.to_string();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        route_frame(&text, &pending, &sinks);
                    }
                    Ok(Message::Ping(payload)) => {
                        let _ = writer_tx.send(Message::Pong(payload)).await;
                    }
                    Ok(Message::Close(_)) => break,
                    Err(error) => {
                        warn!(url = %reader_url, %error, "websocket read failed");
                        break;
                    }
                    _ => {}
                }
            }
            // Fail everything still waiting; subscription receivers see
            // their channel close when the sinks drop.
            let waiting: Vec<_> = pending.lock().drain().collect();
            for (_, responder) in waiting {
                let _ = responder.send(Err(ClientError::Connection(
                    "connection closed".into(),
                )));
            }
            sinks.lock().clear();
            debug!(url = %reader_url, "websocket connection closed");
        });

        Ok(client)
    }

    /// Issue one request and await its response under the deadline.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = Request {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        let text = serde_json::to_string(&frame)
            .map_err(|e| ClientError::Serialization(e.to_string()))?;

        let (responder, response) = oneshot::channel();
        self.pending.lock().insert(id, responder);

        if self
            .writer_tx
            .send(Message::Text(text.into()))
            .await
            .is_err()
        {
            self.pending.lock().remove(&id);
            return Err(ClientError::Connection(format!(
                "connection to {} lost",
                self.url
            )));
        }

        match tokio::time::timeout(self.timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::Connection(format!(
                "connection to {} lost",
                self.url
            ))),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(ClientError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }

    /// Establish a subscription and register its sink under the
    /// returned subscription id.
    async fn subscribe(&self, kind: &str, sink: SubscriptionSink) -> Result<(), ClientError> {
        let result = self.request("strata_subscribe", json!([kind])).await?;
        let subscription_id = result
            .as_str()
            .ok_or_else(|| ClientError::Subscription("non-string subscription id".into()))?
            .to_string();
        self.sinks.lock().insert(subscription_id, sink);
        Ok(())
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ClientError> {
        serde_json::from_value(value).map_err(|e| ClientError::Serialization(e.to_string()))
    }

    fn decode_optional<T: serde::de::DeserializeOwned>(
        value: Value,
    ) -> Result<Option<T>, ClientError> {
        if value.is_null() {
            return Ok(None);
        }
        Self::decode(value).map(Some)
    }
}

/// Route one inbound frame to its waiter or subscription sink.
fn route_frame(text: &str, pending: &PendingMap, sinks: &SinkMap) {
    let Ok(incoming) = serde_json::from_str::<Incoming>(text) else {
        debug!("unparseable frame ignored");
        return;
    };

    // Response to an outstanding request.
    if let Some(id) = incoming.id {
        if let Some(responder) = pending.lock().remove(&id) {
            let outcome = match incoming.error {
                Some(error) => Err(ClientError::Rpc {
                    code: error.code,
                    message: error.message,
                }),
                None => Ok(incoming.result.unwrap_or(Value::Null)),
            };
            let _ = responder.send(outcome);
        }
        return;
    }

    // Subscription push.
    if incoming.method.as_deref() != Some("strata_subscription") {
        return;
    }
    let Some(params) = incoming.params else {
        return;
    };
    deliver_notification(params, sinks);
}

fn deliver_notification(params: NotificationParams, sinks: &SinkMap) {
    let sinks = sinks.lock();
    let Some(sink) = sinks.get(&params.subscription) else {
        debug!(subscription = %params.subscription, "push for unknown subscription");
        return;
    };
    // try_send keeps the reader responsive; notifications are triggers,
    // so dropping one under backpressure is safe.
    match sink {
        SubscriptionSink::PendingBlocks(sender) | SubscriptionSink::NewHeads(sender) => {
            if let Ok(header) = serde_json::from_value::<TieredHeader>(params.result) {
                let _ = sender.try_send(header);
            }
        }
        SubscriptionSink::MissingBlocks(sender) => {
            if let Ok(raw) = serde_json::from_value::<MissingBlockJson>(params.result) {
                if let Some(context) = Tier::from_index(raw.context as usize) {
                    let _ = sender.try_send(MissingBlockRequest {
                        hash: raw.hash,
                        context,
                        location: Location::from_bytes(raw.location),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl NodeRpc for WsNodeClient {
    async fn sync_progress(&self) -> Result<Option<SyncState>, ClientError> {
        let result = self.request("strata_syncing", json!([])).await?;
        if result == Value::Bool(false) {
            return Ok(None);
        }
        let state: SyncStateJson = Self::decode(result)?;
        Ok(Some(SyncState {
            starting_block: state.starting_block,
            current_block: state.current_block,
            highest_block: state.highest_block,
        }))
    }

    async fn subscribe_pending_blocks(
        &self,
    ) -> Result<mpsc::Receiver<TieredHeader>, ClientError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.subscribe("pendingBlock", SubscriptionSink::PendingBlocks(tx))
            .await?;
        Ok(rx)
    }

    async fn subscribe_new_heads(&self) -> Result<mpsc::Receiver<TieredHeader>, ClientError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.subscribe("newHeads", SubscriptionSink::NewHeads(tx))
            .await?;
        Ok(rx)
    }

    async fn subscribe_missing_external_blocks(
        &self,
    ) -> Result<mpsc::Receiver<MissingBlockRequest>, ClientError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.subscribe("missingExternalBlock", SubscriptionSink::MissingBlocks(tx))
            .await?;
        Ok(rx)
    }

    async fn pending_block(&self) -> Result<Option<ReceiptBlock>, ClientError> {
        let result = self.request("strata_getPendingBlock", json!([])).await?;
        Self::decode_optional(result)
    }

    async fn block_by_hash(&self, hash: H256) -> Result<Option<SealedBlock>, ClientError> {
        let result = self.request("strata_getBlockByHash", json!([hash])).await?;
        Self::decode_optional(result)
    }

    async fn header_by_number(&self, number: Option<u64>) -> Result<TieredHeader, ClientError> {
        let param = match number {
            Some(number) => json!(number),
            None => json!("latest"),
        };
        let result = self
            .request("strata_getHeaderByNumber", json!([param]))
            .await?;
        Self::decode(result)
    }

    async fn block_receipts(&self, hash: H256) -> Result<Option<ReceiptBlock>, ClientError> {
        let result = self
            .request("strata_getBlockReceipts", json!([hash]))
            .await?;
        Self::decode_optional(result)
    }

    async fn external_block(
        &self,
        hash: H256,
        context: Tier,
    ) -> Result<Option<ExternalBlock>, ClientError> {
        let result = self
            .request(
                "strata_getExternalBlockByHashAndContext",
                json!([hash, context.index()]),
            )
            .await?;
        Self::decode_optional(result)
    }

    async fn send_external_block(
        &self,
        block: &SealedBlock,
        receipts: &[Receipt],
        context: Tier,
    ) -> Result<(), ClientError> {
        self.request(
            "strata_sendExternalBlock",
            json!([block, receipts, context.index()]),
        )
        .await?;
        Ok(())
    }

    async fn send_mined_block(
        &self,
        block: &SealedBlock,
        broadcast: bool,
        announce: bool,
    ) -> Result<(), ClientError> {
        self.request("strata_sendMinedBlock", json!([block, broadcast, announce]))
            .await?;
        Ok(())
    }

    async fn submit_hashrate(&self, rate: u64, id: H256) -> Result<(), ClientError> {
        self.request("strata_submitHashrate", json!([rate, id]))
            .await?;
        Ok(())
    }
}
