//! WebSocket transport
//!
//! This file implements the WebSocket server that feeds the `Dispatcher`.
//! Responsibilities:
//! - Accept TCP/WebSocket connections, capturing the credential from the
//!   handshake request (`?token=` or `Authorization: Bearer`)
//! - Authenticate once; rejected sockets get a close frame with a reason
//!   and are never admitted
//! - Run one writer task per connection that drains its outbound channel
//!   into the socket, and a read loop that hands text and binary frames to
//!   the dispatcher
//! - Clean the connection up on close or error, from whichever side notices
//!   first (cleanup is idempotent)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tracing::{debug, info, warn};
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::header::AUTHORIZATION;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::frame::coding::CloseCode;

use crate::auth::token_from_handshake;
use crate::broker::Dispatcher;
use crate::utils::error::AdmissionError;

/// How long a rejected client gets to acknowledge our close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

pub async fn start_websocket_server(addr: &str, dispatcher: Dispatcher) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("WebSocket server listening on ws://{}", listener.local_addr()?);
    serve(listener, dispatcher).await;
    Ok(())
}

/// Accept connections from an already-bound listener until it fails.
pub async fn serve(listener: TcpListener, dispatcher: Dispatcher) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handle_connection(stream, peer, dispatcher.clone()));
            }
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, dispatcher: Dispatcher) {
    let mut token: Option<String> = None;
    let capture_token = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let authorization = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        token = token_from_handshake(req.uri().query(), authorization);
        Ok(resp)
    };

    let mut ws_stream = match accept_hdr_async(stream, capture_token).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "WebSocket handshake error");
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
    let conn_id = match dispatcher.connect(token.as_deref(), Arc::new(tx)) {
        Ok(id) => id,
        Err(err) => {
            warn!(%peer, error = %err, "Connection rejected");
            let (code, reason) = match err {
                AdmissionError::Unauthenticated(_) => (CloseCode::Policy, "not authenticated"),
                AdmissionError::AtCapacity { .. } => (CloseCode::Again, "server at capacity"),
            };
            let frame = CloseFrame {
                code,
                reason: reason.to_string().into(),
            };
            if let Err(e) = ws_stream.close(Some(frame)).await {
                debug!(%peer, error = %e, "Failed to send close frame");
                return;
            }
            // let the client answer the close so it sees a clean shutdown
            let _ = tokio::time::timeout(CLOSE_GRACE, async {
                while let Some(Ok(_)) = ws_stream.next().await {}
            })
            .await;
            return;
        }
    };
    info!(conn_id = %conn_id, %peer, "WebSocket connected");

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    {
        let dispatcher = dispatcher.clone();
        let conn_id = conn_id.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    debug!(conn_id = %conn_id, error = %e, "Failed to send frame");
                    break;
                }
            }
            dispatcher.disconnect(&conn_id);
            debug!(conn_id = %conn_id, "Send loop closed");
        });
    }

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(WsMessage::Text(text)) => dispatcher.handle_text(&conn_id, text.as_str()),
            Ok(WsMessage::Binary(bytes)) => dispatcher.handle_binary(&conn_id, &bytes),
            Ok(WsMessage::Close(frame)) => {
                debug!(conn_id = %conn_id, ?frame, "Close requested");
            }
            Ok(_) => {}
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // dropping the registry entry drops the sender, which ends the writer
    dispatcher.disconnect(&conn_id);
    info!(conn_id = %conn_id, "WebSocket disconnected");
}
