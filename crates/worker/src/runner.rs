//! Newline-delimited JSON request loop.
//!
//! Each input line is one request tagged by `kind`:
//!
//! ```json
//! {"kind":"create_order","customer_id":"cust-1","total_cents":500,"correlation_id":"c-1"}
//! {"kind":"events","order_id":"o1"}
//! {"kind":"get_order","order_id":"o1"}
//! ```
//!
//! Each response is written as one JSON line.

use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use common::FailureKind;

use crate::boundary::{Response, handle_command, handle_events, handle_get_order};
use crate::context::AppContext;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Request {
    CreateOrder {
        #[serde(default)]
        correlation_id: Option<String>,
    },
    Events {
        order_id: String,
    },
    GetOrder {
        order_id: String,
    },
}

/// Handles a single request line.
pub async fn handle_line(ctx: &AppContext, line: &str) -> Response {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            return Response::failure(FailureKind::Validation, format!("malformed request: {e}"));
        }
    };

    let request: Request = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return Response::failure(FailureKind::Validation, format!("unknown request: {e}"));
        }
    };

    match request {
        // The command body is the whole line; unknown fields are ignored.
        Request::CreateOrder { correlation_id } => {
            handle_command(ctx, line.as_bytes(), correlation_id.as_deref()).await
        }
        Request::Events { order_id } => handle_events(ctx, &order_id).await,
        Request::GetOrder { order_id } => handle_get_order(ctx, &order_id).await,
    }
}

/// Reads requests from `reader` until EOF, writing one response line each.
/// Blank lines are skipped.
pub async fn serve<R, W>(ctx: &AppContext, reader: R, mut writer: W) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_line(ctx, line).await;
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
        handled += 1;
    }

    tracing::info!(handled, "input closed");
    Ok(handled)
}
