//! Room expiration sweep.
//!
//! A background task marks expired rooms inactive once a minute. Live peer
//! memberships are unaffected; a session already in flight keeps signaling
//! until a peer disconnects.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::store::RoomStore;

/// Sweep interval.
const SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Spawn the periodic expiration sweep.
pub fn spawn(store: Arc<dyn RoomStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_PERIOD);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.deactivate_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(count) => debug!(count, "Expired rooms deactivated"),
                Err(e) => warn!(error = %e, "Room expiration sweep failed"),
            }
        }
    })
}
