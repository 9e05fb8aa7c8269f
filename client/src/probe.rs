//! TURN reachability probe.
//!
//! Builds a relay-only peer connection and waits for the engine to gather a
//! relay candidate. Used by setup UIs to tell the user whether fallback
//! would actually work before a call.

use std::time::Duration;

use futures::{Stream, StreamExt};
use serde_json::Value;

use tandem_common::TurnConfig;

use crate::peer::{PeerConfig, PeerConnector, PeerError, PeerEvent, TransportPolicy};

/// Probe budget.
pub const TURN_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Returns true if a relay candidate is gathered within the timeout.
///
/// `events` is the host's WebRTC event stream for the probe connection.
pub async fn turn_reachability<S>(
    connector: &dyn PeerConnector,
    turn: &TurnConfig,
    events: S,
) -> Result<bool, PeerError>
where
    S: Stream<Item = PeerEvent> + Unpin,
{
    let mut pc = connector
        .connect(PeerConfig {
            ice_servers: turn.relay_servers(),
            policy: TransportPolicy::Relay,
        })
        .await?;

    // A local description is what kicks off candidate gathering.
    let offer = pc.create_offer().await?;
    pc.set_local_description(offer).await?;

    let reachable = tokio::time::timeout(TURN_PROBE_TIMEOUT, wait_for_relay(events))
        .await
        .unwrap_or(false);

    pc.close().await;
    Ok(reachable)
}

async fn wait_for_relay<S>(mut events: S) -> bool
where
    S: Stream<Item = PeerEvent> + Unpin,
{
    while let Some(event) = events.next().await {
        if let PeerEvent::IceCandidate(candidate) = event {
            if is_relay_candidate(&candidate) {
                return true;
            }
        }
    }
    false
}

fn is_relay_candidate(candidate: &Value) -> bool {
    candidate["candidate"]
        .as_str()
        .is_some_and(|c| c.contains(" typ relay"))
}
