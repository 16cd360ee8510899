//! stdio transport for JSON-lines commands
//!
//! Each request line is handled on its own task so a slow console exchange
//! does not hold up registry-only commands; the gateway still serializes the
//! console traffic itself. Responses may therefore arrive out of order and
//! are matched to requests by `id`.

use crate::WhitelistServer;
use crate::commands::handle_command;
use crate::protocol::{Request, Response};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use whitelist_core::{Result, WhitelistError};

/// Run the command loop on stdin/stdout
pub async fn run(server: WhitelistServer) -> Result<()> {
    serve(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Run the command loop on any line-oriented reader/writer pair
pub async fn serve<R, W>(server: WhitelistServer, input: R, output: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let output = Arc::new(Mutex::new(output));
    let mut reader = BufReader::new(input);
    let mut line = String::new();
    let mut in_flight = JoinSet::new();

    info!("Whitelist command loop starting on stdio");

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| WhitelistError::Io(format!("Failed to read stdin: {}", e)))?;

        if bytes_read == 0 {
            info!("Client disconnected (EOF)");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        debug!("Received: {}", trimmed);

        let request: Request = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let err = WhitelistError::InvalidFormat(format!("malformed request: {}", e));
                write_response(&output, &Response::failure(None, &err)).await?;
                continue;
            }
        };

        let service = server.service();
        let output = output.clone();
        in_flight.spawn(async move {
            let response = handle_command(&service, &request).await;
            if let Err(e) = write_response(&output, &response).await {
                error!("Failed to write response: {}", e);
            }
        });

        // Reap finished tasks so the set does not grow unbounded
        while let Some(done) = in_flight.try_join_next() {
            if let Err(e) = done {
                error!("Command task failed: {}", e);
            }
        }
    }

    while let Some(done) = in_flight.join_next().await {
        if let Err(e) = done {
            error!("Command task failed: {}", e);
        }
    }

    Ok(())
}

async fn write_response<W>(output: &Mutex<W>, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(response)
        .map_err(|e| WhitelistError::Io(format!("Failed to serialize response: {}", e)))?;
    debug!("Sending: {}", json);

    let mut out = output.lock().await;
    out.write_all(json.as_bytes())
        .await
        .map_err(|e| WhitelistError::Io(format!("Failed to write stdout: {}", e)))?;
    out.write_all(b"\n")
        .await
        .map_err(|e| WhitelistError::Io(format!("Failed to write newline: {}", e)))?;
    out.flush()
        .await
        .map_err(|e| WhitelistError::Io(format!("Failed to flush stdout: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::BindingService;
    use crate::orchestrator::stub::StubGateway;
    use crate::policy::AccessPolicy;
    use crate::protocol::RequestId;
    use crate::registry::BindingRegistry;
    use tokio::io::AsyncReadExt;
    use whitelist_core::{ErrorKind, ListMode};
    use whitelist_rcon::CommandTranslator;

    fn server() -> WhitelistServer {
        let service = BindingService::new(
            BindingRegistry::open_in_memory(3).unwrap(),
            Arc::new(StubGateway::replying("")),
            CommandTranslator::new(ListMode::Legacy),
            AccessPolicy::default(),
        );
        WhitelistServer::new(service)
    }

    async fn run_lines(input: &'static str) -> Vec<Response> {
        let (writer, mut reader) = tokio::io::duplex(64 * 1024);
        serve(server(), input.as_bytes(), writer).await.unwrap();

        let mut raw = String::new();
        reader.read_to_string(&mut raw).await.unwrap();
        raw.lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_response_per_request() {
        let responses = run_lines(concat!(
            r#"{"id": 1, "command": "bind", "args": ["Steve"], "sender": {"id": "10001", "name": "alice"}}"#,
            "\n\n",
            r#"{"id": 2, "command": "help", "sender": {"id": "10001"}}"#,
            "\n",
        ))
        .await;

        assert_eq!(responses.len(), 2);
        let bind = responses
            .iter()
            .find(|r| r.id == Some(RequestId::Number(1)))
            .unwrap();
        assert!(bind.ok, "{}", bind.text);
    }

    #[tokio::test]
    async fn test_malformed_line_gets_null_id() {
        let responses = run_lines("not json\n").await;
        assert_eq!(responses.len(), 1);
        assert!(responses[0].id.is_none());
        assert_eq!(responses[0].kind, Some(ErrorKind::InvalidFormat));
    }
}
