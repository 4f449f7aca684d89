//! Stdio transport for the support service

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use super::SupportService;
use super::protocol::{Reply, Request};

/// Serve requests from stdin, writing replies to stdout, until EOF
#[inline]
pub async fn serve_stdio(service: Arc<SupportService>) -> Result<()> {
    info!("Starting support service with stdio transport");
    let reader = BufReader::new(io::stdin());
    let writer = io::stdout();
    serve(service, reader, writer).await?;
    info!("Support service stopped");
    Ok(())
}

/// Process one JSON request per line from `reader` until EOF
#[inline]
pub async fn serve<R, W>(service: Arc<SupportService>, mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("EOF reached, closing connection");
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let reply = match serde_json::from_str::<Request>(line) {
                    Ok(request) => handle_request(&service, request).await,
                    Err(e) => {
                        warn!("Rejected malformed request: {}", e);
                        Reply::invalid_request(format!("Malformed request: {}", e))
                    }
                };
                send_reply(&mut writer, &reply).await?;
            }
            Err(e) => {
                error!("Error reading from stdin: {}", e);
                break;
            }
        }
    }
    Ok(())
}

/// Dispatch a single request to the service
#[inline]
pub async fn handle_request(service: &SupportService, request: Request) -> Reply {
    debug!("Handling request: {:?}", request);
    let result = match request {
        Request::StartSession => {
            let session_id = service.start_session().await;
            return Reply::SessionStarted { session_id };
        }
        Request::Query { session_id, query } => {
            service.query(&session_id, query).await.map(Reply::Answer)
        }
        Request::AgentReply { session_id, text } => service
            .agent_reply(&session_id, &text)
            .await
            .map(|()| Reply::ack()),
        Request::Resume { session_id } => service.resume(&session_id).await.map(|()| Reply::ack()),
        Request::EndSession { session_id } => {
            service.end_session(&session_id).await.map(|()| Reply::ack())
        }
    };

    result.unwrap_or_else(|e| {
        warn!("Request failed: {}", e);
        Reply::from(&e)
    })
}

async fn send_reply<W>(writer: &mut W, reply: &Reply) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let json = serde_json::to_string(reply)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
