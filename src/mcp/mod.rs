pub mod handler;
pub mod protocol;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::AppState;
use handler::{handle_mcp_request, McpContext};
use protocol::{error_codes, Request, Response};

/// Serves newline-delimited JSON-RPC from `reader` to `writer` until EOF.
/// One connection is one user, so the loop owns a single conversation.
pub async fn serve<R, W>(state: AppState, reader: R, mut writer: W)
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let ctx = McpContext::new(state);
    let mut lines = reader.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("EOF received, shutting down MCP server");
                break;
            }
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        debug!("Received: {}", line);

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => handle_mcp_request(request, &ctx).await,
            Err(parse_error) => {
                error!("JSON parse error: {}", parse_error);
                Some(Response::error(
                    serde_json::Value::Null,
                    error_codes::PARSE_ERROR,
                    format!("Parse error: {}", parse_error),
                ))
            }
        };

        if let Some(response) = response {
            if let Ok(response_json) = serde_json::to_string(&response) {
                debug!("Sending: {}", response_json);
                let written = async {
                    writer.write_all(format!("{}\n", response_json).as_bytes()).await?;
                    writer.flush().await
                };
                if let Err(e) = written.await {
                    error!("Failed to write response: {}", e);
                    break;
                }
            }
        }
    }

    info!("MCP server shutting down");
}
