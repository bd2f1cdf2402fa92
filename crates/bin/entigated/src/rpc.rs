//! Line-delimited JSON-RPC over stdin/stdout.
//!
//! One request per input line, one response per output line. Notifications
//! produce no output.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use entigate_domain::Payload;
use entigate_domain::transport::{Request, Response, RpcError, codes};

use crate::Gateway;

/// Serve requests from stdin until it is closed.
///
/// # Errors
///
/// Returns an I/O error if stdin or stdout fails.
pub async fn serve_stdio(gateway: std::sync::Arc<Gateway>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = handle_line(&gateway, &line).await {
            let mut out = serde_json::to_string(&response)?;
            out.push('\n');
            stdout.write_all(out.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    tracing::info!("stdin closed, JSON-RPC endpoint stopped");
    Ok(())
}

/// Decode one line and run it through the gateway.
pub async fn handle_line(gateway: &Gateway, line: &str) -> Option<Response> {
    let value: Payload = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            return Some(Response::failure(
                Payload::Null,
                RpcError::new(codes::PARSE_ERROR, format!("parse error: {err}")),
            ));
        }
    };

    let id = value.get("id").cloned().unwrap_or(Payload::Null);
    match serde_json::from_value::<Request>(value) {
        Ok(request) => gateway.handle_request(request).await,
        Err(err) => Some(Response::failure(
            id,
            RpcError::new(codes::INVALID_REQUEST, format!("invalid request: {err}")),
        )),
    }
}
