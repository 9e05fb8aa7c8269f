//! Connection audit.
//!
//! Records device/os/browser and coarse geolocation per signaling
//! connection. Everything here is fire-and-forget: an audit failure must
//! never block or fail signaling.

use chrono::Utc;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use tandem_common::{PeerId, RoomCode, SessionId};

use crate::api::AppState;
use crate::rooms::NewConnectionAudit;

/// Geolocation lookup budget.
const GEO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct GeoResponse {
    country: Option<String>,
    city: Option<String>,
}

/// Spawn the audit insert (and optional geolocation enrichment) for a join.
pub fn record_join(
    state: &AppState,
    room_id: RoomCode,
    peer_id: PeerId,
    session_id: SessionId,
    user_agent: Option<String>,
    source_ip: String,
) {
    let store = state.store.clone();
    let http = state.http.clone();
    let geoip_url = state.config.geoip_url.clone();

    tokio::spawn(async move {
        let (device, os, browser) = parse_user_agent(user_agent.as_deref());

        if let Err(e) = store
            .record_connection(NewConnectionAudit {
                room_id,
                peer_id: peer_id.clone(),
                session_id,
                device,
                os,
                browser,
                connected_at: Utc::now(),
            })
            .await
        {
            warn!(peer_id = %peer_id, error = %e, "Failed to record connection audit");
            return;
        }

        let Some(base) = geoip_url else { return };
        let (country, city) = lookup_geo(&http, &base, &source_ip).await;
        if country.is_none() && city.is_none() {
            return;
        }
        if let Err(e) = store
            .set_connection_geo(&peer_id, session_id, country, city)
            .await
        {
            warn!(peer_id = %peer_id, error = %e, "Failed to store connection geolocation");
        }
    });
}

/// Spawn the audit-row close for a disconnect.
pub fn record_disconnect(state: &AppState, peer_id: PeerId, session_id: SessionId) {
    let store = state.store.clone();
    tokio::spawn(async move {
        if let Err(e) = store.close_connection(&peer_id, session_id, Utc::now()).await {
            warn!(peer_id = %peer_id, error = %e, "Failed to close connection audit");
        }
    });
}

fn parse_user_agent(ua: Option<&str>) -> (Option<String>, Option<String>, Option<String>) {
    let Some(ua) = ua else {
        return (None, None, None);
    };
    woothee::parser::Parser::new().parse(ua).map_or(
        (None, None, None),
        |parsed| {
            (
                Some(parsed.category.to_string()),
                Some(parsed.os.to_string()),
                Some(parsed.name.to_string()),
            )
        },
    )
}

async fn lookup_geo(
    client: &reqwest::Client,
    base_url: &str,
    ip: &str,
) -> (Option<String>, Option<String>) {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), ip);
    let response = client.get(&url).timeout(GEO_TIMEOUT).send().await;

    match response {
        Ok(resp) => match resp.json::<GeoResponse>().await {
            Ok(geo) => (geo.country, geo.city),
            Err(e) => {
                warn!(error = %e, "Geolocation response parse failed");
                (None, None)
            }
        },
        Err(e) => {
            warn!(error = %e, "Geolocation lookup failed");
            (None, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_browser_user_agent() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        let (device, os, browser) = parse_user_agent(Some(ua));
        assert_eq!(device.as_deref(), Some("pc"));
        assert!(os.is_some());
        assert_eq!(browser.as_deref(), Some("Chrome"));
    }

    #[test]
    fn missing_user_agent_yields_nulls() {
        assert_eq!(parse_user_agent(None), (None, None, None));
    }
}
