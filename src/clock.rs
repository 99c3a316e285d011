//! Periodic clock tick broadcast

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::hub::Hub;
use crate::protocol::ClockTick;

/// Broadcast the current local time every `period` until `shutdown` fires
pub fn spawn_clock_broadcaster(
    hub: Arc<Hub>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let period = period.max(Duration::from_millis(10));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Clock broadcaster started ({:?} period)", period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match serde_json::to_string(&ClockTick::now()) {
                Ok(payload) => hub.broadcast(payload).await,
                Err(e) => warn!("Failed to encode clock tick: {}", e),
            }
        }

        info!("Clock broadcaster stopped");
    })
}
