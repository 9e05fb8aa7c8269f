//! TURN/STUN configuration handed to admitted peers.

use serde::{Deserialize, Serialize};

/// TURN credential triple plus optional STUN URLs, stored per room and
/// returned (decrypted) by the admission API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnConfig {
    /// TURN relay URLs, e.g. `turn:turn.example.com:3478`.
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stun_urls: Option<Vec<String>>,
}

/// One ICE server entry for building a peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl TurnConfig {
    /// Full ICE server list: STUN entries (if any) followed by the TURN
    /// relay entry.
    #[must_use]
    pub fn ice_servers(&self) -> Vec<IceServer> {
        let mut servers = Vec::new();
        if let Some(stun) = &self.stun_urls {
            if !stun.is_empty() {
                servers.push(IceServer {
                    urls: stun.clone(),
                    username: None,
                    credential: None,
                });
            }
        }
        servers.push(IceServer {
            urls: self.urls.clone(),
            username: Some(self.username.clone()),
            credential: Some(self.credential.clone()),
        });
        servers
    }

    /// Relay entry only, for relay-forced rebuilds.
    #[must_use]
    pub fn relay_servers(&self) -> Vec<IceServer> {
        vec![IceServer {
            urls: self.urls.clone(),
            username: Some(self.username.clone()),
            credential: Some(self.credential.clone()),
        }]
    }
}
