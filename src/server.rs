//! Line-delimited JSON server
//!
//! Reads one [`ToolRequest`] per line and writes one [`ToolResponse`] per
//! line. Requests run on the blocking pool, so a slow diff does not hold up
//! other requests; responses are written as they complete.

use crate::tools::{ToolRegistry, ToolRequest, ToolResponse};
use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Serve requests on stdin/stdout until stdin closes
pub async fn serve_stdio(registry: Arc<ToolRegistry>) -> Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    serve(registry, reader, tokio::io::stdout()).await?;
    Ok(())
}

/// Serve requests from `reader`, writing responses to `writer`.
/// Returns the writer once every in-flight request has been answered.
pub async fn serve<R, W>(registry: Arc<ToolRegistry>, reader: R, writer: W) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<ToolResponse>();
    let writer_task = tokio::spawn(write_responses(rx, writer));

    let mut lines = reader.lines();
    let mut received = 0usize;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        received += 1;

        let request = match serde_json::from_str::<ToolRequest>(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Invalid request: {}", e);
                let id = recover_id(line).unwrap_or_default();
                let _ = tx.send(ToolResponse::error(&id, &format!("Invalid request: {}", e)));
                continue;
            }
        };

        debug!("Request {} for {}", request.id, request.tool);

        let registry = Arc::clone(&registry);
        let tx = tx.clone();
        tokio::task::spawn_blocking(move || {
            let response = registry.handle(&request);
            let _ = tx.send(response);
        });
    }

    // The writer finishes once the last in-flight handler drops its sender.
    drop(tx);
    let writer = writer_task.await??;

    info!("Input closed after {} requests", received);
    Ok(writer)
}

async fn write_responses<W>(mut rx: mpsc::UnboundedReceiver<ToolResponse>, mut writer: W) -> Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(writer)
}

/// Best-effort request id from a line that failed to parse as a request
fn recover_id(line: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    value.get("id")?.as_str().map(str::to_string)
}
