// ABOUTME: Line-delimited JSON bridge between a UI process and the transfer API
// ABOUTME: Requests and pushed progress events share one serialized output stream

use crate::api;
use crate::progress::{FnListener, ProgressEvent};
use crate::transfer::TransferController;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Event name the UI subscribes to for progress pushes
pub const PROGRESS_EVENT: &str = "on_transfer_progress";

#[derive(Debug, Deserialize)]
struct BridgeRequest {
    #[serde(default)]
    id: JsonValue,
    method: String,
    #[serde(default)]
    params: BridgeParams,
}

#[derive(Debug, Default, Deserialize)]
struct BridgeParams {
    #[serde(default)]
    url: Option<String>,
}

/// One output line
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum BridgeMessage {
    Result {
        id: JsonValue,
        result: JsonValue,
    },
    Error {
        id: JsonValue,
        error: String,
    },
    Event {
        event: &'static str,
        data: ProgressEvent,
    },
}

/// Serve requests from `reader` until EOF, writing responses and events to `writer`
///
/// Each request runs on its own task so status queries are answered while a
/// start is still connecting. Returns after all in-flight requests have been
/// answered and the output is flushed; a transfer started through the bridge
/// keeps running on the controller.
pub async fn serve<R, W>(controller: TransferController, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<BridgeMessage>();

    // Weak so that a long-lived controller does not keep the output open
    let events = tx.downgrade();
    controller.add_listener(Arc::new(FnListener(move |event: &ProgressEvent| {
        if let Some(tx) = events.upgrade() {
            let _ = tx.send(BridgeMessage::Event {
                event: PROGRESS_EVENT,
                data: event.clone(),
            });
        }
    })));

    let writer_task = tokio::spawn(write_messages(rx, writer));

    let mut in_flight = JoinSet::new();
    let mut lines = reader.lines();
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read bridge input")?
    {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let request: BridgeRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Malformed bridge request: {}", e);
                let _ = tx.send(BridgeMessage::Error {
                    id: JsonValue::Null,
                    error: format!("Invalid request: {}", e),
                });
                continue;
            }
        };

        let controller = controller.clone();
        let tx = tx.clone();
        in_flight.spawn(async move {
            let message = handle_request(&controller, request).await;
            let _ = tx.send(message);
        });
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Bridge request task failed: {}", e);
        }
    }

    drop(tx);
    writer_task.await.context("Bridge writer task failed")?
}

async fn write_messages<W>(mut rx: mpsc::UnboundedReceiver<BridgeMessage>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line =
            serde_json::to_string(&message).context("Failed to serialize bridge message")?;
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .context("Failed to write bridge output")?;
        writer.flush().await.context("Failed to flush bridge output")?;
    }
    writer
        .shutdown()
        .await
        .context("Failed to close bridge output")?;
    Ok(())
}

async fn handle_request(controller: &TransferController, request: BridgeRequest) -> BridgeMessage {
    let url = request.params.url.unwrap_or_default();
    tracing::debug!("Bridge call: {}", request.method);

    let result = match request.method.as_str() {
        "start_db_transfer" => serde_json::to_value(api::start_db_transfer(controller, &url).await),
        "cancel_db_transfer" => serde_json::to_value(api::cancel_db_transfer(controller)),
        "get_transfer_status" => serde_json::to_value(api::get_transfer_status(controller)),
        "test_db_connection" => serde_json::to_value(api::test_db_connection(controller, &url).await),
        "reset_db_transfer" => serde_json::to_value(api::reset_db_transfer(controller)),
        other => {
            return BridgeMessage::Error {
                id: request.id,
                error: format!("Unknown method '{}'", other),
            }
        }
    };

    match result {
        Ok(result) => BridgeMessage::Result {
            id: request.id,
            result,
        },
        Err(e) => BridgeMessage::Error {
            id: request.id,
            error: format!("Failed to encode response: {}", e),
        },
    }
}
