use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::broker::Dispatcher;

/// Spawn a background task that queues a WebSocket Ping on every admitted
/// connection once per `period`.
///
/// Connections whose channel is already closed are skipped; their own close
/// path removes them. A zero `period` disables the heartbeat.
pub fn start_heartbeat(dispatcher: Dispatcher, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        if period.is_zero() {
            warn!("Heartbeat period is zero, liveness pings disabled");
            return;
        }
        let mut interval = tokio::time::interval(period);
        // first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let pinged = dispatcher.ping_all();
            debug!(pinged, "WebSocket heartbeat ping");
        }
    })
}
