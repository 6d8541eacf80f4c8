use tokio::sync::mpsc::UnboundedSender;
use tungstenite::protocol::Message as WsMessage;

use crate::utils::error::DeliveryError;

/// Outbound half of a connection's transport.
///
/// `send` must not block: the WebSocket writer task owns the socket and
/// drains whatever is queued here, so one connection has exactly one
/// outbound path and frames keep their enqueue order.
pub trait FrameSink: Send + Sync {
    fn is_open(&self) -> bool;

    fn send(&self, frame: WsMessage) -> Result<(), DeliveryError>;
}

impl FrameSink for UnboundedSender<WsMessage> {
    fn is_open(&self) -> bool {
        !self.is_closed()
    }

    fn send(&self, frame: WsMessage) -> Result<(), DeliveryError> {
        UnboundedSender::send(self, frame).map_err(|_| DeliveryError::Closed)
    }
}
